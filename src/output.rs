//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! photos/dawn.jpg (4 variants)
//!     001 dawn-3f2a9c1e.webp: transformed
//!     002 dawn-77b0d412.webp: cached
//!     003 dawn-a1c2e3f4.jpg: cached
//!     004 dawn-0b9d8e7f.jpg: cached
//! ```
//!
//! ## Plan
//!
//! ```text
//! photos/icon@2x.png (32x32 png @2x)
//!     001 [thumb] width=16 format=webp
//!     002 [thumb] width=32 format=webp
//!     003 (as-is)
//! ```
//!
//! # Architecture
//!
//! Each format function returns `Vec<String>` for testability; callers print
//! the lines. Format functions do no I/O.

use crate::assemble::VariantResult;
use crate::options::ImageOptions;
use crate::pipeline::{ProcessEvent, VariantStatus};
use crate::source::SourceMeta;
use serde::Serialize;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn status_str(status: VariantStatus) -> &'static str {
    match status {
        VariantStatus::Cached => "cached",
        VariantStatus::Transformed => "transformed",
        VariantStatus::Synthetic => "synthetic",
    }
}

/// One option record as `key=value` pairs, preset label first.
fn options_line(options: &ImageOptions) -> String {
    let mut parts = Vec::new();
    if let Some(preset) = &options.preset {
        parts.push(format!("[{preset}]"));
    }
    parts.extend(
        options
            .values
            .iter()
            .map(|(key, value)| format!("{}={}", key.as_str(), value)),
    );
    if options.values.is_empty() {
        parts.push("(as-is)".to_string());
    }
    parts.join(" ")
}

/// Lines for one pipeline progress event.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::SourceStarted {
            source,
            variant_count,
        } => {
            let noun = if *variant_count == 1 {
                "variant"
            } else {
                "variants"
            };
            vec![format!("{} ({} {})", source, variant_count, noun)]
        }
        ProcessEvent::SourceProcessed { variants, .. } => variants
            .iter()
            .enumerate()
            .map(|(i, variant)| {
                format!(
                    "{}{} {}: {}",
                    indent(1),
                    format_index(i + 1),
                    variant.name,
                    status_str(variant.status)
                )
            })
            .collect(),
    }
}

/// Lines describing the records a source would produce.
pub fn format_plan(source: &str, meta: &SourceMeta, records: &[ImageOptions]) -> Vec<String> {
    let density = meta
        .scale
        .map(|s| format!(" @{}x", s))
        .unwrap_or_default();
    let mut lines = vec![format!(
        "{} ({}x{} {}{})",
        source, meta.width, meta.height, meta.format, density
    )];
    if records.is_empty() {
        lines.push(format!("{}(no variants)", indent(1)));
    }
    lines.extend(records.iter().enumerate().map(|(i, options)| {
        format!(
            "{}{} {}",
            indent(1),
            format_index(i + 1),
            options_line(options)
        )
    }));
    lines
}

/// Results for one source, as written to the results file.
#[derive(Debug, Serialize)]
pub struct SourceResults<'a> {
    pub source: &'a str,
    pub variants: &'a [VariantResult],
}

/// Pretty JSON for a list of per-source results.
pub fn results_json(sources: &[SourceResults<'_>]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStats;
    use crate::imaging::TransformInfo;
    use crate::options::OptionKey;
    use crate::pipeline::VariantReport;

    #[test]
    fn source_started_header() {
        let lines = format_process_event(&ProcessEvent::SourceStarted {
            source: "photos/dawn.jpg".into(),
            variant_count: 4,
        });
        assert_eq!(lines, vec!["photos/dawn.jpg (4 variants)"]);

        let single = format_process_event(&ProcessEvent::SourceStarted {
            source: "a.png".into(),
            variant_count: 1,
        });
        assert_eq!(single, vec!["a.png (1 variant)"]);
    }

    #[test]
    fn source_processed_lists_variants() {
        let lines = format_process_event(&ProcessEvent::SourceProcessed {
            source: "a.png".into(),
            variants: vec![
                VariantReport {
                    name: "a-1.webp".into(),
                    status: VariantStatus::Transformed,
                },
                VariantReport {
                    name: "a-2.webp".into(),
                    status: VariantStatus::Cached,
                },
                VariantReport {
                    name: "a-3.webp".into(),
                    status: VariantStatus::Synthetic,
                },
            ],
            stats: CacheStats::default(),
        });
        assert_eq!(
            lines,
            vec![
                "    001 a-1.webp: transformed",
                "    002 a-2.webp: cached",
                "    003 a-3.webp: synthetic",
            ]
        );
    }

    #[test]
    fn plan_lists_records_in_order() {
        let mut first = ImageOptions::default()
            .with(OptionKey::Width, 16u32)
            .with(OptionKey::Format, "webp");
        first.preset = Some("thumb".into());
        let meta = SourceMeta {
            scale: Some(2.0),
            ..SourceMeta::new(32.0, 32.0, "png")
        };
        let lines = format_plan("icon@2x.png", &meta, &[first, ImageOptions::default()]);
        assert_eq!(
            lines,
            vec![
                "icon@2x.png (32x32 png @2x)",
                "    001 [thumb] width=16 format=webp",
                "    002 (as-is)",
            ]
        );
    }

    #[test]
    fn plan_without_records() {
        let lines = format_plan("a.png", &SourceMeta::new(1.0, 1.0, "png"), &[]);
        assert_eq!(lines[1], "    (no variants)");
    }

    #[test]
    fn results_json_is_a_list_of_sources() {
        let variant = VariantResult {
            name: "a.webp".into(),
            path: "/a.webp".into(),
            inline: false,
            data: None,
            preset: None,
            options: ImageOptions::default(),
            info: TransformInfo {
                width: 1,
                height: 1,
                format: "webp".into(),
                size: Some(10),
            },
        };
        let variants = [variant];
        let json = results_json(&[SourceResults {
            source: "a.png",
            variants: &variants,
        }])
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["source"], "a.png");
        assert_eq!(value[0]["variants"][0]["path"], "/a.webp");
    }
}
