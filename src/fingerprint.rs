//! Deterministic cache keys for variants.
//!
//! A key is `identity + digest(options)`:
//!
//! - **identity** identifies the source: its path plus a SHA-256 of its bytes
//!   ([`source_identity`]). Editing an image invalidates its variants even if
//!   the path is unchanged; two different files never share entries.
//! - **digest** is a SHA-256 over the variant's option values, visited in
//!   canonical key order so construction order never matters. Each value is
//!   written with a type tag, so `"100"` and `100` hash differently.
//!
//! The preset label is not hashed: it names where options came from, not
//! what the transform does.
//!
//! Each key addresses two cache entries, distinguished by a namespace prefix
//! so a metadata write can never land on a payload entry.

use crate::options::{ImageOptions, Scalar};
use crate::source::SourceImage;
use sha2::{Digest, Sha256};
use std::fmt;

/// Version of the key derivation. Bump when hashing changes.
const KEY_VERSION: &[u8] = b"imgplex-key-v1\0";

/// The two cache namespaces every variant uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Raw transformed bytes.
    Payload,
    /// JSON-serialized transform info.
    Metadata,
}

impl Namespace {
    pub fn prefix(self) -> &'static str {
        match self {
            Namespace::Payload => "buffer",
            Namespace::Metadata => "meta",
        }
    }
}

/// Base cache key for one (source, options) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub(crate) base: String,
    digest: String,
}

impl CacheKey {
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Hex digest of the options alone. Used for `[hash]` in synthetic mode.
    pub fn options_digest(&self) -> &str {
        &self.digest
    }

    /// The key as stored in one namespace.
    pub fn namespaced(&self, ns: Namespace) -> String {
        format!("{}{}", ns.prefix(), self.base)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)
    }
}

/// SHA-256 of arbitrary bytes as lowercase hex.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Stable identity of a source: `path#sha256(bytes)`.
pub fn source_identity(source: &SourceImage) -> String {
    format!(
        "{}#{}",
        source.path().to_string_lossy(),
        hash_bytes(source.bytes())
    )
}

fn update_scalar(hasher: &mut Sha256, value: &Scalar) {
    match value {
        Scalar::Bool(b) => {
            hasher.update(b"b");
            hasher.update([u8::from(*b)]);
        }
        Scalar::Number(n) => {
            hasher.update(b"n");
            // Collapse every NaN payload and -0.0 to one representation.
            let canonical = if n.is_nan() {
                f64::NAN
            } else if *n == 0.0 {
                0.0
            } else {
                *n
            };
            hasher.update(canonical.to_bits().to_le_bytes());
        }
        Scalar::Text(s) => {
            hasher.update(b"s");
            hasher.update((s.len() as u64).to_le_bytes());
            hasher.update(s.as_bytes());
        }
    }
}

/// SHA-256 of a variant's option values, independent of insertion order.
pub fn hash_options(options: &ImageOptions) -> String {
    let mut hasher = Sha256::new();
    hasher.update(KEY_VERSION);
    // BTreeMap iteration is already in canonical key order.
    for (key, value) in &options.values {
        hasher.update(key.as_str().as_bytes());
        hasher.update(b"\0");
        update_scalar(&mut hasher, value);
    }
    format!("{:x}", hasher.finalize())
}

/// Cache key for a variant of a source with the given identity.
pub fn cache_key(identity: &str, options: &ImageOptions) -> CacheKey {
    let digest = hash_options(options);
    CacheKey {
        base: format!("{identity}{digest}"),
        digest,
    }
}
