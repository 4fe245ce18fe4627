//! Persistent variant cache.
//!
//! Transforms are the bottleneck of the pipeline. This module lets a run skip
//! a transform when the same source bytes were already processed with the
//! same options.
//!
//! # Design
//!
//! Every variant is stored as **two entries** under one
//! [`CacheKey`]: the encoded bytes (namespace `buffer`) and the JSON-encoded
//! [`TransformInfo`] (namespace `meta`). A variant is only served from cache
//! when both entries are readable. A partial hit is a miss, and the variant
//! is transformed again.
//!
//! ## Storage
//!
//! Entries are plain files under the cache directory:
//!
//! ```text
//! <dir>/<namespace>/<aa>/<sha256 of namespaced key>
//! ```
//!
//! Each file starts with the SHA-256 of its content and a newline. A read
//! that finds a mismatched digest (torn write, disk corruption, manual edit)
//! is treated as a miss. Writes go to a temporary file in the same directory
//! and are renamed into place, so a concurrent reader never sees a partial
//! entry.
//!
//! ## Failure policy
//!
//! - **Read failures** of any kind are misses, logged at `debug`.
//! - **Write failures** are errors, and fail the variant being stored.
//!
//! ## Bypassing the cache
//!
//! Pass `--no-cache` to the `build` command, or leave `cache` unset in the
//! config. A disabled cache never reads and silently drops writes.

use crate::fingerprint::{CacheKey, Namespace, hash_bytes};
use crate::imaging::{TransformInfo, Transformed};
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

/// Length of the hex digest header, excluding the newline.
const HEADER_LEN: usize = 64;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache IO error: {0}")]
    Io(#[from] io::Error),
    #[error("cache serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// File-backed store for transformed variants.
#[derive(Debug, Clone, Default)]
pub struct VariantCache {
    dir: Option<PathBuf>,
}

impl VariantCache {
    /// A cache that never hits and never writes.
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self::new(Some(dir.into()))
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    fn entry_path(dir: &Path, ns: Namespace, key: &CacheKey) -> PathBuf {
        let hashed = hash_bytes(key.namespaced(ns).as_bytes());
        dir.join(ns.prefix()).join(&hashed[..2]).join(&hashed)
    }

    /// Read one entry. Any failure is a miss.
    pub fn get(&self, ns: Namespace, key: &CacheKey) -> Option<Vec<u8>> {
        let dir = self.dir.as_deref()?;
        let path = Self::entry_path(dir, ns, key);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    debug!(path = %path.display(), error = %e, "cache read failed");
                }
                return None;
            }
        };
        match verify_entry(&data) {
            Some(content) => Some(content.to_vec()),
            None => {
                debug!(path = %path.display(), "corrupt cache entry, ignoring");
                None
            }
        }
    }

    /// Write one entry atomically.
    pub fn put(&self, ns: Namespace, key: &CacheKey, bytes: &[u8]) -> Result<(), CacheError> {
        let Some(dir) = self.dir.as_deref() else {
            return Ok(());
        };
        let path = Self::entry_path(dir, ns, key);
        let parent = path.parent().unwrap_or(dir);
        fs::create_dir_all(parent)?;

        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(hash_bytes(bytes).as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.write_all(bytes)?;
        tmp.persist(&path).map_err(io::Error::from)?;
        Ok(())
    }

    /// Look up both entries of a variant concurrently.
    ///
    /// Returns `None` unless payload and metadata are both present and valid.
    pub fn get_variant(&self, key: &CacheKey) -> Option<Transformed> {
        if !self.is_enabled() {
            return None;
        }
        let (payload, meta) = rayon::join(
            || self.get(Namespace::Payload, key),
            || self.get(Namespace::Metadata, key),
        );
        match (payload, meta) {
            (Some(bytes), Some(meta)) => match serde_json::from_slice::<TransformInfo>(&meta) {
                Ok(info) => Some(Transformed { bytes, info }),
                Err(e) => {
                    debug!(key = %key, error = %e, "unreadable cached metadata");
                    None
                }
            },
            (None, None) => None,
            _ => {
                debug!(key = %key, "partial cache hit, treating as miss");
                None
            }
        }
    }

    /// Store both entries of a variant concurrently.
    pub fn put_variant(&self, key: &CacheKey, variant: &Transformed) -> Result<(), CacheError> {
        if !self.is_enabled() {
            return Ok(());
        }
        let meta = serde_json::to_vec(&variant.info)?;
        let (payload, meta) = rayon::join(
            || self.put(Namespace::Payload, key, &variant.bytes),
            || self.put(Namespace::Metadata, key, &meta),
        );
        payload?;
        meta?;
        Ok(())
    }
}

/// Split a stored entry into its content if the digest header matches.
fn verify_entry(data: &[u8]) -> Option<&[u8]> {
    if data.len() <= HEADER_LEN || data[HEADER_LEN] != b'\n' {
        return None;
    }
    let (header, rest) = data.split_at(HEADER_LEN);
    let content = &rest[1..];
    (hash_bytes(content).as_bytes() == header).then_some(content)
}

/// Summary of cache performance for a pipeline run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub cached: u32,
    pub transformed: u32,
    pub synthetic: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.cached += 1;
    }

    pub fn miss(&mut self) {
        self.transformed += 1;
    }

    pub fn synthesized(&mut self) {
        self.synthetic += 1;
    }

    pub fn total(&self) -> u32 {
        self.cached + self.transformed + self.synthetic
    }
}

impl AddAssign for CacheStats {
    fn add_assign(&mut self, other: Self) {
        self.cached += other.cached;
        self.transformed += other.transformed;
        self.synthetic += other.synthetic;
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.synthetic > 0 {
            write!(f, "{} synthetic", self.synthetic)
        } else if self.cached > 0 {
            write!(
                f,
                "{} cached, {} transformed ({} total)",
                self.cached,
                self.transformed,
                self.total()
            )
        } else {
            write!(f, "{} transformed", self.transformed)
        }
    }
}
