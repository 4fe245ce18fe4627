//! Source images and their per-source metadata.
//!
//! A [`SourceImage`] is the raw bytes of one input file plus the path it was
//! loaded from. The path doubles as the human-readable half of the cache
//! identity and carries the density convention:
//!
//! ```text
//! hero.png       → scale = None, natural size as decoded
//! hero@2x.png    → scale = Some(2.0), natural size halved
//! hero@3x.webp   → scale = Some(3.0), natural size divided by 3
//! ```
//!
//! Density-suffixed sources are authored for high-DPI screens, so their
//! *logical* size is the decoded size divided by the density. Option
//! functions and synthetic metadata see the logical size.
//!
//! [`collect_sources`] finds the inputs of a directory build.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions picked up when the input is a directory.
pub const SOURCE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "webp"];

/// Decoded-independent handle to a source image.
#[derive(Debug, Clone)]
pub struct SourceImage {
    path: PathBuf,
    bytes: Vec<u8>,
}

impl SourceImage {
    pub fn new(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            bytes,
        }
    }

    /// Read a source image from disk.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::new(path, bytes))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// File stem with any `@Nx` density suffix removed.
    ///
    /// `icons/close@2x.png` → `close`.
    pub fn base_name(&self) -> String {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        match split_density_suffix(&stem) {
            Some((base, _)) => base.to_string(),
            None => stem,
        }
    }
}

/// Metadata describing one source image.
///
/// `width` and `height` are logical dimensions: for density-suffixed sources
/// they have already been divided by `scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMeta {
    pub width: f64,
    pub height: f64,
    /// Detected source format, lowercase (`"png"`, `"jpeg"`, ...).
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
}

impl SourceMeta {
    pub fn new(width: f64, height: f64, format: impl Into<String>) -> Self {
        Self {
            width,
            height,
            format: format.into(),
            scale: None,
        }
    }

    /// Width divided by height. `None` for degenerate sources.
    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.height > 0.0 && self.width.is_finite() && self.height.is_finite() {
            Some(self.width / self.height)
        } else {
            None
        }
    }
}

/// Split `name@2x` into (`name`, 2). Only a trailing suffix counts.
fn split_density_suffix(stem: &str) -> Option<(&str, u32)> {
    let at = stem.rfind('@')?;
    let suffix = stem[at + 1..].strip_suffix('x')?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let density = suffix.parse::<u32>().ok()?;
    Some((&stem[..at], density))
}

/// Parse the density from a `name@<N>x.ext` file name.
///
/// Returns `None` when there is no suffix or the density is zero.
pub fn density_scale(path: &Path) -> Option<u32> {
    let stem = path.file_stem()?.to_str()?;
    split_density_suffix(stem)
        .map(|(_, density)| density)
        .filter(|&d| d > 0)
}

/// Merge the path-derived density into decoded metadata.
pub fn apply_density(mut meta: SourceMeta, path: &Path) -> SourceMeta {
    if let Some(density) = density_scale(path) {
        let scale = f64::from(density);
        meta.scale = Some(scale);
        meta.width /= scale;
        meta.height /= scale;
    }
    meta
}

fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// A file as-is, or every image under a directory in sorted order.
///
/// Hidden directories (such as `.cache`) are skipped, and so is `exclude`
/// when it lies below `input`, so a build's own output is never read back.
pub fn collect_sources(
    input: &Path,
    exclude: Option<&Path>,
) -> Result<Vec<PathBuf>, walkdir::Error> {
    if !input.is_dir() {
        return Ok(vec![input.to_path_buf()]);
    }
    let excluded = exclude.and_then(|p| fs::canonicalize(p).ok());
    let is_excluded = |path: &Path| {
        excluded
            .as_deref()
            .is_some_and(|ex| fs::canonicalize(path).is_ok_and(|p| p == ex))
    };

    let mut sources = Vec::new();
    let walker = WalkDir::new(input)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 {
                return true;
            }
            if e.file_name().to_string_lossy().starts_with('.') {
                return false;
            }
            !(e.file_type().is_dir() && is_excluded(e.path()))
        });
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() && has_source_extension(entry.path()) {
            sources.push(entry.into_path());
        }
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn density_from_suffix() {
        assert_eq!(density_scale(Path::new("img/hero@2x.png")), Some(2));
        assert_eq!(density_scale(Path::new("hero@3x.webp")), Some(3));
        assert_eq!(density_scale(Path::new("hero@12x.jpg")), Some(12));
    }

    #[test]
    fn no_density_without_suffix() {
        assert_eq!(density_scale(Path::new("hero.png")), None);
        assert_eq!(density_scale(Path::new("user@example.png")), None);
        assert_eq!(density_scale(Path::new("hero@x.png")), None);
        assert_eq!(density_scale(Path::new("hero@0x.png")), None);
    }

    #[test]
    fn apply_density_halves_dimensions() {
        let meta = apply_density(
            SourceMeta::new(400.0, 300.0, "png"),
            Path::new("hero@2x.png"),
        );
        assert_eq!(meta.scale, Some(2.0));
        assert_eq!(meta.width, 200.0);
        assert_eq!(meta.height, 150.0);
    }

    #[test]
    fn apply_density_leaves_plain_sources_alone() {
        let meta = apply_density(SourceMeta::new(400.0, 300.0, "png"), Path::new("hero.png"));
        assert_eq!(meta, SourceMeta::new(400.0, 300.0, "png"));
    }

    #[test]
    fn base_name_strips_density() {
        let src = SourceImage::new("icons/close@2x.png", vec![]);
        assert_eq!(src.base_name(), "close");
        let src = SourceImage::new("icons/close.png", vec![]);
        assert_eq!(src.base_name(), "close");
    }

    #[test]
    fn aspect_ratio_guards_zero_height() {
        assert_eq!(SourceMeta::new(10.0, 0.0, "png").aspect_ratio(), None);
        assert_eq!(SourceMeta::new(10.0, 5.0, "png").aspect_ratio(), Some(2.0));
    }

    // =========================================================================
    // collect_sources
    // =========================================================================

    fn touch(dir: &Path, rel: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn relative(root: &Path, paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn collect_sources_sorted_by_extension() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "b.PNG");
        touch(tmp.path(), "a.jpg");
        touch(tmp.path(), "notes.txt");
        touch(tmp.path(), "sub/c.webp");
        touch(tmp.path(), ".cache/imgplex/d.png");

        let found = collect_sources(tmp.path(), None).unwrap();
        assert_eq!(relative(tmp.path(), &found), vec!["a.jpg", "b.PNG", "sub/c.webp"]);
    }

    #[test]
    fn collect_sources_skips_output_dir() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.png");
        touch(tmp.path(), "dist/a-1234.webp");
        touch(tmp.path(), "dist/nested/a-5678.png");

        let found = collect_sources(tmp.path(), Some(&tmp.path().join("dist"))).unwrap();
        assert_eq!(relative(tmp.path(), &found), vec!["a.png"]);
    }

    #[test]
    fn collect_sources_output_dir_compared_canonically() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.png");
        touch(tmp.path(), "dist/a-1.png");

        // Same directory spelled through a `..` detour
        let detour = tmp.path().join("dist").join("..").join("dist");
        let found = collect_sources(tmp.path(), Some(&detour)).unwrap();
        assert_eq!(relative(tmp.path(), &found), vec!["a.png"]);
    }

    #[test]
    fn collect_sources_missing_output_dir_excludes_nothing() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.png");
        let found = collect_sources(tmp.path(), Some(&tmp.path().join("dist"))).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn collect_sources_single_file() {
        let found = collect_sources(Path::new("photo.png"), None).unwrap();
        assert_eq!(found, vec![PathBuf::from("photo.png")]);
    }
}
