//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Largest output side, in pixels. WebP cannot encode anything wider.
pub const MAX_DIMENSION: u32 = 16383;

/// Round a dimension to whole pixels, never below one.
pub fn to_pixels(value: f64) -> u32 {
    value.round().max(1.0) as u32
}

/// Calculate the target box for a resize.
///
/// # Arguments
/// * `logical` - Source logical dimensions (width, height)
/// * `width`, `height` - Requested logical dimensions, if any
/// * `scale` - Pixel density multiplier, if any
///
/// # Returns
/// * `Some((width, height))` - Box in output pixels
/// * `None` - Nothing requested, keep the decoded size
///
/// # Examples
/// ```
/// # use imgplex::imaging::calculate_target_box;
/// // width only: height follows the aspect ratio
/// assert_eq!(calculate_target_box((800.0, 600.0), Some(400.0), None, None), Some((400, 300)));
///
/// // scale multiplies the requested size
/// assert_eq!(calculate_target_box((800.0, 600.0), Some(100.0), None, Some(2.0)), Some((200, 150)));
/// ```
pub fn calculate_target_box(
    logical: (f64, f64),
    width: Option<f64>,
    height: Option<f64>,
    scale: Option<f64>,
) -> Option<(u32, u32)> {
    target_extent(logical, width, height, scale).map(|(w, h)| (to_pixels(w), to_pixels(h)))
}

/// Unrounded target box, so callers can bound it before converting.
pub fn target_extent(
    logical: (f64, f64),
    width: Option<f64>,
    height: Option<f64>,
    scale: Option<f64>,
) -> Option<(f64, f64)> {
    let (src_w, src_h) = logical;
    let aspect = src_w / src_h;
    let factor = scale.unwrap_or(1.0);

    let (w, h) = match (width, height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, w / aspect),
        (None, Some(h)) => (h * aspect, h),
        // Scale alone resizes the logical size
        (None, None) if scale.is_some() => (src_w, src_h),
        (None, None) => return None,
    };
    Some((w * factor, h * factor))
}

/// Calculate dimensions that fit inside `bounds` while keeping `aspect`.
///
/// One dimension matches the bound exactly, the other is at most its bound.
pub fn calculate_fit_dimensions(aspect: f64, bounds: (u32, u32)) -> (u32, u32) {
    let (max_w, max_h) = bounds;
    let bounds_aspect = max_w as f64 / max_h as f64;

    if aspect > bounds_aspect {
        // Source is wider: width matches
        (max_w, to_pixels(max_w as f64 / aspect))
    } else {
        // Source is taller: height matches
        (to_pixels(max_h as f64 * aspect), max_h)
    }
}

/// Decoded pixel dimensions of a source whose logical size is `logical`.
pub fn natural_dimensions(logical: (f64, f64), density: Option<f64>) -> (u32, u32) {
    let factor = density.unwrap_or(1.0);
    (to_pixels(logical.0 * factor), to_pixels(logical.1 * factor))
}
