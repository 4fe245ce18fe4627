//! # imgplex
//!
//! Expand one source image into many output variants (sizes, formats, blurs,
//! pixel densities) from a compact declarative spec, with a persistent cache
//! so unchanged variants are never transformed twice.
//!
//! # Architecture: Per-Source Pipeline
//!
//! Every source image flows through the same stages:
//!
//! ```text
//! 1. Identify    bytes     →  SourceMeta        (natural size, format, @Nx density)
//! 2. Resolve     outputs   →  OutputSpecs       (presets layered under inline fields)
//! 3. Normalize   spec      →  NormalizedOptions (computed values resolved, lists)
//! 4. Multiplex   lists     →  ImageOptions[]    (cartesian product, ordered)
//! 5. Produce     options   →  VariantResult[]   (cache or transform, assemble, emit)
//! ```
//!
//! Stages 2–4 are pure functions of the config and the source metadata, so
//! the `plan` command can show exactly what a build would produce without
//! decoding a pixel.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`options`] | Option values, output specs, normalization and coercion |
//! | [`multiplex`] | Cartesian expansion of normalized options |
//! | [`preset`] | Preset lookup, output resolution and expansion |
//! | [`fingerprint`] | Deterministic cache keys from source identity and options |
//! | [`cache`] | File-backed variant cache with integrity checks |
//! | [`source`] | Source images, metadata, density suffixes, discovery |
//! | [`imaging`] | Image backend trait, transform planning, pure-Rust backend |
//! | [`assemble`] | Result descriptors, name templates, file emitters |
//! | [`pipeline`] | Per-source orchestration, parallel variant processing |
//! | [`config`] | `imgplex.toml` loading, validation and merging |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Content-Addressed Cache
//!
//! A cache key combines the source path, a SHA-256 of the source bytes and a
//! SHA-256 of the variant's options. Editing an image invalidates its variants
//! even when the path is unchanged, and restoring old bytes (e.g. `git
//! checkout`) hits the cache again. Modification times are never consulted.
//!
//! ## Missing Presets Are Not Errors
//!
//! Naming an unknown preset produces no variants and a warning; sibling
//! outputs still expand. An invalid option *value* (say `width = "wide"`)
//! is different: it is carried through normalization and fails the variant
//! when the transform is planned.
//!
//! ## Deterministic Output Order
//!
//! Variants run in parallel but results always come back in multiplex order,
//! and when several variants fail, the first one in that order is reported.

pub mod assemble;
pub mod cache;
pub mod config;
pub mod fingerprint;
pub mod imaging;
pub mod multiplex;
pub mod options;
pub mod output;
pub mod pipeline;
pub mod preset;
pub mod source;
