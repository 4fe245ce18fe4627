//! High-level planning: options in, validated plans and descriptions out.
//!
//! [`plan_transform`] is the single place where a variant's option values are
//! checked. A numeric property that is not a finite positive number (including
//! the `NaN` produced by an unparsable string) fails here, as does an unknown
//! mode or format. Backends and synthetic mode both go through it, so a bad
//! value fails the same way whether or not pixels are touched.

use super::backend::{BackendError, TransformInfo};
use super::calculations::{
    MAX_DIMENSION, calculate_fit_dimensions, natural_dimensions, target_extent, to_pixels,
};
use super::params::{OutputFormat, ResizeMode, TransformPlan};
use crate::options::{ImageOptions, OptionKey, Scalar};
use crate::source::SourceMeta;

/// A numeric option that must be finite and strictly positive.
fn positive(options: &ImageOptions, key: OptionKey) -> Result<Option<f64>, BackendError> {
    match options.get(key) {
        None => Ok(None),
        Some(value) => {
            let n = value.as_f64().unwrap_or(f64::NAN);
            if n.is_finite() && n > 0.0 {
                Ok(Some(n))
            } else {
                Err(BackendError::invalid(key, value))
            }
        }
    }
}

/// Fail when a target side exceeds [`MAX_DIMENSION`], blaming the first
/// present option in `blame`.
fn bounded(
    extent: f64,
    options: &ImageOptions,
    blame: [OptionKey; 3],
) -> Result<u32, BackendError> {
    if extent <= f64::from(MAX_DIMENSION) {
        return Ok(to_pixels(extent));
    }
    let (key, value) = blame
        .into_iter()
        .find_map(|key| options.get(key).map(|v| (key, v.to_string())))
        .unwrap_or((blame[0], extent.to_string()));
    Err(BackendError::invalid(key, value))
}

fn resize_mode(options: &ImageOptions) -> Result<ResizeMode, BackendError> {
    match options.get(OptionKey::Mode) {
        None => Ok(ResizeMode::default()),
        Some(Scalar::Text(name)) => ResizeMode::parse(name),
        Some(other) => Err(BackendError::invalid(OptionKey::Mode, other)),
    }
}

fn output_format(meta: &SourceMeta, options: &ImageOptions) -> Result<OutputFormat, BackendError> {
    match options.get(OptionKey::Format) {
        None => OutputFormat::from_name(&meta.format),
        Some(Scalar::Text(name)) => OutputFormat::from_name(name),
        Some(other) => Err(BackendError::invalid(OptionKey::Format, other)),
    }
}

/// Validate a variant's options and turn them into a plan.
pub fn plan_transform(
    meta: &SourceMeta,
    options: &ImageOptions,
) -> Result<TransformPlan, BackendError> {
    let width = positive(options, OptionKey::Width)?;
    let height = positive(options, OptionKey::Height)?;
    let scale = positive(options, OptionKey::Scale)?;
    let blur = positive(options, OptionKey::Blur)?;
    let mode = resize_mode(options)?;
    let format = output_format(meta, options)?;

    let wants_resize = width.is_some() || height.is_some() || scale.is_some();
    let resize = if wants_resize {
        if !meta.aspect_ratio().is_some_and(|a| a > 0.0) {
            return Err(BackendError::ProcessingFailed(format!(
                "source has no usable dimensions ({}x{})",
                meta.width, meta.height
            )));
        }
        match target_extent((meta.width, meta.height), width, height, scale) {
            Some((w, h)) => Some((
                bounded(w, options, [OptionKey::Width, OptionKey::Scale, OptionKey::Height])?,
                bounded(h, options, [OptionKey::Height, OptionKey::Scale, OptionKey::Width])?,
            )),
            None => None,
        }
    } else {
        None
    };

    Ok(TransformPlan {
        resize,
        mode,
        blur: blur.map(|sigma| sigma as f32),
        format,
    })
}

/// Pixel dimensions a plan will produce for a source.
pub fn planned_dimensions(meta: &SourceMeta, plan: &TransformPlan) -> (u32, u32) {
    match (plan.resize, plan.mode) {
        (None, _) => natural_dimensions((meta.width, meta.height), meta.scale),
        (Some(bounds), ResizeMode::Contain) => match meta.aspect_ratio() {
            Some(aspect) if aspect > 0.0 => calculate_fit_dimensions(aspect, bounds),
            _ => bounds,
        },
        (Some(bounds), ResizeMode::Cover | ResizeMode::Stretch) => bounds,
    }
}

/// Describe a variant without producing it.
///
/// Used when emission is synthetic: dimensions come from the plan and the
/// source aspect ratio, the format from the options or the source.
pub fn synthetic_info(
    meta: &SourceMeta,
    options: &ImageOptions,
) -> Result<TransformInfo, BackendError> {
    let plan = plan_transform(meta, options)?;
    let (width, height) = planned_dimensions(meta, &plan);
    Ok(TransformInfo {
        width,
        height,
        format: plan.format.name().to_string(),
        size: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> SourceMeta {
        SourceMeta::new(800.0, 600.0, "png")
    }

    fn opts() -> ImageOptions {
        ImageOptions::default()
    }

    // =========================================================================
    // plan_transform
    // =========================================================================

    #[test]
    fn empty_options_keep_source() {
        let plan = plan_transform(&meta(), &opts()).unwrap();
        assert_eq!(plan.resize, None);
        assert_eq!(plan.mode, ResizeMode::Contain);
        assert_eq!(plan.blur, None);
        assert_eq!(plan.format, OutputFormat::Png);
    }

    #[test]
    fn width_and_format() {
        let plan = plan_transform(
            &meta(),
            &opts()
                .with(OptionKey::Width, 400u32)
                .with(OptionKey::Format, "webp"),
        )
        .unwrap();
        assert_eq!(plan.resize, Some((400, 300)));
        assert_eq!(plan.format, OutputFormat::WebP);
    }

    #[test]
    fn unparsable_number_is_rejected() {
        let err = plan_transform(&meta(), &opts().with(OptionKey::Width, "wide")).unwrap_err();
        assert!(
            matches!(&err, BackendError::InvalidOption { key: "width", value } if value == "NaN"),
            "{err}"
        );
    }

    #[test]
    fn zero_and_negative_are_rejected() {
        assert!(plan_transform(&meta(), &opts().with(OptionKey::Height, 0u32)).is_err());
        assert!(plan_transform(&meta(), &opts().with(OptionKey::Scale, -1.0)).is_err());
        assert!(plan_transform(&meta(), &opts().with(OptionKey::Blur, f64::INFINITY)).is_err());
    }

    #[test]
    fn oversized_box_is_rejected() {
        let err = plan_transform(&meta(), &opts().with(OptionKey::Width, 1e12)).unwrap_err();
        assert!(
            matches!(&err, BackendError::InvalidOption { key: "width", .. }),
            "{err}"
        );
        let err = plan_transform(
            &meta(),
            &opts()
                .with(OptionKey::Height, 100u32)
                .with(OptionKey::Scale, 1e9),
        )
        .unwrap_err();
        assert!(matches!(err, BackendError::InvalidOption { key: "scale", .. }));
        // Derived side overflows: tall request on a very wide source
        let wide = SourceMeta::new(20000.0, 1.0, "png");
        assert!(matches!(
            plan_transform(&wide, &opts().with(OptionKey::Height, 10u32)),
            Err(BackendError::InvalidOption { key: "height", .. })
        ));
    }

    #[test]
    fn largest_box_is_accepted() {
        let plan = plan_transform(
            &meta(),
            &opts()
                .with(OptionKey::Width, MAX_DIMENSION)
                .with(OptionKey::Height, MAX_DIMENSION),
        )
        .unwrap();
        assert_eq!(plan.resize, Some((MAX_DIMENSION, MAX_DIMENSION)));
    }

    #[test]
    fn unknown_mode_and_format_are_rejected() {
        assert!(matches!(
            plan_transform(&meta(), &opts().with(OptionKey::Mode, "squash")),
            Err(BackendError::InvalidOption { key: "mode", .. })
        ));
        assert!(matches!(
            plan_transform(&meta(), &opts().with(OptionKey::Format, "bmp")),
            Err(BackendError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            plan_transform(&meta(), &opts().with(OptionKey::Format, true)),
            Err(BackendError::InvalidOption { key: "format", .. })
        ));
    }

    #[test]
    fn unsupported_source_format_needs_explicit_format() {
        let gif = SourceMeta::new(10.0, 10.0, "gif");
        assert!(plan_transform(&gif, &opts()).is_err());
        assert!(plan_transform(&gif, &opts().with(OptionKey::Format, "png")).is_ok());
    }

    #[test]
    fn degenerate_source_cannot_resize() {
        let flat = SourceMeta::new(100.0, 0.0, "png");
        assert!(plan_transform(&flat, &opts().with(OptionKey::Width, 10u32)).is_err());
        assert!(plan_transform(&flat, &opts()).is_ok());
    }

    #[test]
    fn blur_sigma_carried() {
        let plan = plan_transform(&meta(), &opts().with(OptionKey::Blur, 2.5)).unwrap();
        assert_eq!(plan.blur, Some(2.5));
    }

    // =========================================================================
    // synthetic_info
    // =========================================================================

    #[test]
    fn synthetic_derives_missing_side_from_aspect() {
        let info = synthetic_info(&meta(), &opts().with(OptionKey::Height, 150u32)).unwrap();
        assert_eq!((info.width, info.height), (200, 150));
        assert_eq!(info.format, "png");
        assert_eq!(info.size, None);
    }

    #[test]
    fn synthetic_contain_fits_inside_box() {
        let info = synthetic_info(
            &meta(),
            &opts()
                .with(OptionKey::Width, 100u32)
                .with(OptionKey::Height, 100u32),
        )
        .unwrap();
        assert_eq!((info.width, info.height), (100, 75));
    }

    #[test]
    fn synthetic_cover_and_stretch_fill_box() {
        for mode in ["cover", "stretch"] {
            let info = synthetic_info(
                &meta(),
                &opts()
                    .with(OptionKey::Width, 100u32)
                    .with(OptionKey::Height, 100u32)
                    .with(OptionKey::Mode, mode),
            )
            .unwrap();
            assert_eq!((info.width, info.height), (100, 100), "{mode}");
        }
    }

    #[test]
    fn synthetic_without_resize_reports_natural_size() {
        let dense = SourceMeta {
            scale: Some(2.0),
            ..SourceMeta::new(400.0, 300.0, "jpeg")
        };
        let info = synthetic_info(&dense, &opts()).unwrap();
        assert_eq!((info.width, info.height), (800, 600));
        assert_eq!(info.format, "jpeg");
    }

    #[test]
    fn synthetic_rejects_bad_values_too() {
        assert!(synthetic_info(&meta(), &opts().with(OptionKey::Width, "x")).is_err());
        assert!(synthetic_info(&meta(), &opts().with(OptionKey::Width, 1e12)).is_err());
    }
}
