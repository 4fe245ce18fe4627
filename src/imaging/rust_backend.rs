//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::ImageReader::into_dimensions` (header only) |
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | Resize (contain) | `DynamicImage::resize` with `Lanczos3` |
//! | Resize (cover) | `DynamicImage::resize_to_fill` |
//! | Resize (stretch) | `DynamicImage::resize_exact` |
//! | Blur | `DynamicImage::blur` (gaussian) |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` with quality |
//! | Encode → PNG, WebP, TIFF | `DynamicImage::write_to` |
//!
//! AVIF sources can be identified but not decoded; the `image` crate's
//! `avif` feature only enables the encoder.

use super::backend::{BackendError, ImageBackend, TransformInfo, Transformed};
use super::operations::plan_transform;
use super::params::{OutputFormat, Quality, ResizeMode, TransformPlan};
use crate::options::ImageOptions;
use crate::source::{SourceImage, SourceMeta};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend {
    quality: Quality,
}

impl RustBackend {
    pub fn new() -> Self {
        Self {
            quality: Quality::default(),
        }
    }

    pub fn with_quality(quality: Quality) -> Self {
        Self { quality }
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase name for a detected container format.
fn format_name(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "jpeg".into(),
        ImageFormat::Png => "png".into(),
        ImageFormat::WebP => "webp".into(),
        ImageFormat::Tiff => "tiff".into(),
        ImageFormat::Avif => "avif".into(),
        ImageFormat::Gif => "gif".into(),
        other => other
            .extensions_str()
            .first()
            .copied()
            .unwrap_or("unknown")
            .to_string(),
    }
}

fn reader(source: &SourceImage) -> Result<ImageReader<Cursor<&[u8]>>, BackendError> {
    Ok(ImageReader::new(Cursor::new(source.bytes())).with_guessed_format()?)
}

/// Decode a source from its in-memory bytes.
fn load_image(source: &SourceImage) -> Result<DynamicImage, BackendError> {
    reader(source)?.decode().map_err(|e| {
        BackendError::ProcessingFailed(format!(
            "Failed to decode {}: {}",
            source.path().display(),
            e
        ))
    })
}

fn apply_plan(img: DynamicImage, plan: &TransformPlan) -> DynamicImage {
    let resized = match plan.resize {
        None => img,
        Some((w, h)) => match plan.mode {
            ResizeMode::Contain => img.resize(w, h, FilterType::Lanczos3),
            // Fill-resize then center-crop to exact dimensions
            ResizeMode::Cover => img.resize_to_fill(w, h, FilterType::Lanczos3),
            ResizeMode::Stretch => img.resize_exact(w, h, FilterType::Lanczos3),
        },
    };
    match plan.blur {
        Some(sigma) => resized.blur(sigma),
        None => resized,
    }
}

/// Encode an image into memory.
fn encode(
    img: &DynamicImage,
    format: OutputFormat,
    quality: Quality,
) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let quality = quality.value().min(100) as u8;
    let result = match format {
        OutputFormat::Jpeg => {
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)
        }
        // rav1e at speed 6 for reasonable throughput
        OutputFormat::Avif => {
            let encoder =
                image::codecs::avif::AvifEncoder::new_with_speed_quality(&mut buf, 6, quality);
            DynamicImage::ImageRgba8(img.to_rgba8()).write_with_encoder(encoder)
        }
        // The WebP encoder only accepts 8-bit RGB(A)
        OutputFormat::WebP => DynamicImage::ImageRgba8(img.to_rgba8())
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::WebP),
        OutputFormat::Png => img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png),
        OutputFormat::Tiff => img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Tiff),
    };
    result.map_err(|e| {
        BackendError::ProcessingFailed(format!("{} encode failed: {}", format.name(), e))
    })?;
    Ok(buf)
}

impl ImageBackend for RustBackend {
    fn identify(&self, source: &SourceImage) -> Result<SourceMeta, BackendError> {
        let reader = reader(source)?;
        let format = reader.format().ok_or_else(|| {
            BackendError::UnsupportedFormat(format!(
                "unrecognized image data in {}",
                source.path().display()
            ))
        })?;
        let (width, height) = reader.into_dimensions().map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to read dimensions: {}", e))
        })?;
        Ok(SourceMeta::new(
            f64::from(width),
            f64::from(height),
            format_name(format),
        ))
    }

    fn transform(
        &self,
        source: &SourceImage,
        meta: &SourceMeta,
        options: &ImageOptions,
    ) -> Result<Transformed, BackendError> {
        // Validate before paying for a decode
        let plan = plan_transform(meta, options)?;
        let img = apply_plan(load_image(source)?, &plan);
        let bytes = encode(&img, plan.format, self.quality)?;
        let info = TransformInfo {
            width: img.width(),
            height: img.height(),
            format: plan.format.name().to_string(),
            size: Some(bytes.len() as u64),
        };
        Ok(Transformed { bytes, info })
    }
}
