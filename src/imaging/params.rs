//! Parameter types for image operations.
//!
//! These types describe *what* to do, not *how*. [`TransformPlan`] is built
//! from a variant's [`ImageOptions`](crate::options::ImageOptions) by
//! [`plan_transform`](super::operations::plan_transform), which is also where
//! bad option values are rejected. Backends execute plans.
//!
//! ## Types
//!
//! - [`Quality`]: lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`ResizeMode`]: how a target box is filled (`contain`, `cover`, `stretch`).
//! - [`OutputFormat`]: encodable output formats and their names/extensions.
//! - [`TransformPlan`]: resize box, mode, blur, output format.

use super::backend::BackendError;
use crate::options::OptionKey;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// How an image is fitted into a target box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResizeMode {
    /// Fit inside the box, preserving aspect ratio.
    #[default]
    Contain,
    /// Fill the box, preserving aspect ratio, then center-crop the overflow.
    Cover,
    /// Resize to exactly the box, ignoring aspect ratio.
    Stretch,
}

impl ResizeMode {
    pub fn parse(name: &str) -> Result<Self, BackendError> {
        match name.to_ascii_lowercase().as_str() {
            "contain" => Ok(ResizeMode::Contain),
            "cover" => Ok(ResizeMode::Cover),
            "stretch" => Ok(ResizeMode::Stretch),
            _ => Err(BackendError::invalid(OptionKey::Mode, name)),
        }
    }
}

/// Formats the backend can encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Tiff,
    Avif,
}

impl OutputFormat {
    /// Parse a format name as written in options (`"jpg"` and `"jpeg"` both work).
    pub fn from_name(name: &str) -> Result<Self, BackendError> {
        match name.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::WebP),
            "tif" | "tiff" => Ok(OutputFormat::Tiff),
            "avif" => Ok(OutputFormat::Avif),
            _ => Err(BackendError::UnsupportedFormat(name.to_string())),
        }
    }

    /// Canonical name, as reported in [`TransformInfo`](super::TransformInfo).
    pub fn name(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Avif => "avif",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Tiff => "tif",
            other => other.name(),
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::WebP => "image/webp",
            OutputFormat::Tiff => "image/tiff",
            OutputFormat::Avif => "image/avif",
        }
    }
}

/// A fully validated transform.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformPlan {
    /// Target box in output pixels. `None` keeps the decoded size.
    pub resize: Option<(u32, u32)>,
    pub mode: ResizeMode,
    /// Gaussian blur sigma.
    pub blur: Option<f32>,
    pub format: OutputFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_90() {
        assert_eq!(Quality::default().value(), 90);
    }

    #[test]
    fn resize_mode_parse() {
        assert_eq!(ResizeMode::parse("cover").unwrap(), ResizeMode::Cover);
        assert_eq!(ResizeMode::parse("Contain").unwrap(), ResizeMode::Contain);
        assert_eq!(ResizeMode::parse("stretch").unwrap(), ResizeMode::Stretch);
        assert!(matches!(
            ResizeMode::parse("squash"),
            Err(BackendError::InvalidOption { key: "mode", .. })
        ));
    }

    #[test]
    fn output_format_aliases() {
        assert_eq!(OutputFormat::from_name("JPG").unwrap(), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::from_name("jpeg").unwrap(), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::from_name("tif").unwrap(), OutputFormat::Tiff);
        assert!(matches!(
            OutputFormat::from_name("bmp"),
            Err(BackendError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn output_format_names_and_extensions() {
        assert_eq!(OutputFormat::Jpeg.name(), "jpeg");
        assert_eq!(OutputFormat::Jpeg.extension(), "jpg");
        assert_eq!(OutputFormat::WebP.extension(), "webp");
        assert_eq!(OutputFormat::Avif.mime_type(), "image/avif");
    }
}
