//! Image backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the pipeline's only way to touch pixels. It
//! has two operations:
//!
//! - **identify**: read a source's natural size and format
//! - **transform**: produce one variant's bytes plus a description of them
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend). Tests use the recording
//! `MockBackend` defined below, which never decodes anything.

use crate::options::{ImageOptions, OptionKey};
use crate::source::{SourceImage, SourceMeta};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid value for `{key}`: {value}")]
    InvalidOption { key: &'static str, value: String },
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

impl BackendError {
    pub fn invalid(key: OptionKey, value: impl ToString) -> Self {
        BackendError::InvalidOption {
            key: key.as_str(),
            value: value.to_string(),
        }
    }
}

/// What a transform produced. Stored in the metadata cache namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformInfo {
    pub width: u32,
    pub height: u32,
    /// Output format name, lowercase (`"webp"`, `"jpeg"`, ...).
    pub format: String,
    /// Payload size in bytes. Absent for synthetic descriptions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// A transformed variant: encoded bytes and their description.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformed {
    pub bytes: Vec<u8>,
    pub info: TransformInfo,
}

/// Trait for image processing backends.
///
/// `Sync` so one backend can serve every variant of a source in parallel.
pub trait ImageBackend: Sync {
    /// Read natural dimensions and format of a source.
    fn identify(&self, source: &SourceImage) -> Result<SourceMeta, BackendError>;

    /// Produce one variant. `meta` is the source's logical metadata, with any
    /// density scale already merged in.
    fn transform(
        &self,
        source: &SourceImage,
        meta: &SourceMeta,
        options: &ImageOptions,
    ) -> Result<Transformed, BackendError>;
}
