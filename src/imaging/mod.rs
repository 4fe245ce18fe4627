//! Image processing in pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader` header read |
//! | **Resize** | Lanczos3 (`contain`, `cover`, `stretch`) |
//! | **Blur** | gaussian |
//! | **Encode** | JPEG, PNG, WebP, TIFF, AVIF (rav1e) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Operations**: Option validation, planning and synthetic descriptions
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend, TransformInfo, Transformed};
pub use calculations::{calculate_fit_dimensions, calculate_target_box};
pub use operations::{plan_transform, synthetic_info};
pub use params::{OutputFormat, Quality, ResizeMode, TransformPlan};
pub use rust_backend::RustBackend;
