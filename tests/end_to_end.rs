//! End-to-end runs through the public API with the real image backend.

use image::{DynamicImage, ImageFormat, RgbImage};
use imgplex::assemble::{DirEmitter, VariantResult};
use imgplex::cache::VariantCache;
use imgplex::config::{EmitMode, PipelineConfig, resolve_config, stock_defaults_value};
use imgplex::imaging::RustBackend;
use imgplex::options::{OptionKey, OptionValue, OutputSpec, parse_outputs};
use imgplex::output::{SourceResults, results_json};
use imgplex::pipeline::Pipeline;
use imgplex::source::SourceImage;
use std::io::Cursor;
use std::path::Path;
use tempfile::TempDir;

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 4 % 256) as u8, (y * 4 % 256) as u8, 90])
    });
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn write_source(dir: &Path, name: &str, width: u32, height: u32) -> SourceImage {
    let path = dir.join(name);
    std::fs::write(&path, png_bytes(width, height)).unwrap();
    SourceImage::open(&path).unwrap()
}

fn config_from_toml(toml_src: &str) -> PipelineConfig {
    let overlay: toml::Value = toml::from_str(toml_src).unwrap();
    resolve_config(stock_defaults_value().unwrap(), Some(overlay)).unwrap()
}

fn dims(result: &VariantResult) -> (u32, u32) {
    (result.info.width, result.info.height)
}

#[test]
fn presets_from_toml_produce_files() {
    let tmp = TempDir::new().unwrap();
    let out_dir = tmp.path().join("dist");
    let source = write_source(tmp.path(), "photo.png", 120, 80);

    let config = config_from_toml(
        r#"
        name = "[name]-[width].[ext]"

        [presets.thumb]
        width = [30, 60]
        format = "webp"

        [presets.poster]
        width = 12
        mode = "cover"
        height = 12
        format = "jpeg"
        "#,
    );
    let backend = RustBackend::new();
    let emitter = DirEmitter::new(&out_dir);
    let out = Pipeline::new(&config, &backend)
        .with_emitter(&emitter)
        .run(&source, None, None)
        .unwrap();

    let names: Vec<&str> = out.results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["photo-30.webp", "photo-60.webp", "photo-12.jpg"]);
    assert_eq!(dims(&out.results[0]), (30, 20));
    assert_eq!(dims(&out.results[1]), (60, 40));
    assert_eq!(dims(&out.results[2]), (12, 12));

    for name in names {
        let written = std::fs::read(out_dir.join(name)).unwrap();
        let decoded = image::load_from_memory(&written).unwrap();
        assert!(decoded.width() > 0);
    }
}

#[test]
fn cached_second_run_matches_first() {
    let tmp = TempDir::new().unwrap();
    let cache_dir = tmp.path().join("cache");
    let source = write_source(tmp.path(), "a.png", 64, 64);
    let config = PipelineConfig::default();
    let outputs = parse_outputs(r#"{"width": [16, 32], "format": ["png", "webp"]}"#).unwrap();

    let backend = RustBackend::new();
    let pipeline = Pipeline::new(&config, &backend).with_cache(VariantCache::at(&cache_dir));
    let first = pipeline.run(&source, Some(&outputs), None).unwrap();
    let second = pipeline.run(&source, Some(&outputs), None).unwrap();

    assert_eq!(first.results.len(), 4);
    assert_eq!(first.stats.transformed, 4);
    assert_eq!(second.stats.cached, 4);
    assert_eq!(first.results, second.results);
    assert!(cache_dir.join("buffer").is_dir());
    assert!(cache_dir.join("meta").is_dir());
}

#[test]
fn density_source_scales_from_logical_size() {
    let tmp = TempDir::new().unwrap();
    let source = write_source(tmp.path(), "icon@2x.png", 64, 32);
    let config = PipelineConfig::default();
    let spec = OutputSpec::new().with(
        OptionKey::Scale,
        OptionValue::computed(|meta| {
            let max = meta.scale.unwrap_or(1.0) as u32;
            Some(OptionValue::list(1..=max))
        }),
    );

    let backend = RustBackend::new();
    let out = Pipeline::new(&config, &backend)
        .run(&source, Some(&[spec.into()]), None)
        .unwrap();

    assert_eq!(out.results.len(), 2);
    assert_eq!(dims(&out.results[0]), (32, 16));
    assert_eq!(dims(&out.results[1]), (64, 32));
}

#[test]
fn synthetic_run_describes_without_writing() {
    let tmp = TempDir::new().unwrap();
    let out_dir = tmp.path().join("dist");
    let source = write_source(tmp.path(), "b.png", 100, 50);
    let config = PipelineConfig {
        emit: EmitMode::Synthetic,
        ..PipelineConfig::default()
    };
    let outputs = parse_outputs(r#"[{"height": 10, "format": "webp"}]"#).unwrap();

    let backend = RustBackend::new();
    let emitter = DirEmitter::new(&out_dir);
    let out = Pipeline::new(&config, &backend)
        .with_emitter(&emitter)
        .run(&source, Some(&outputs), None)
        .unwrap();

    assert_eq!(dims(&out.results[0]), (20, 10));
    assert_eq!(out.results[0].info.format, "webp");
    assert!(!out_dir.exists());
}

#[test]
fn inline_variant_is_a_data_uri() {
    let tmp = TempDir::new().unwrap();
    let out_dir = tmp.path().join("dist");
    let source = write_source(tmp.path(), "c.png", 40, 40);
    let config = PipelineConfig::default();
    let outputs = parse_outputs(r#"{"width": 4, "format": "png", "inline": true}"#).unwrap();

    let backend = RustBackend::new();
    let emitter = DirEmitter::new(&out_dir);
    let out = Pipeline::new(&config, &backend)
        .with_emitter(&emitter)
        .run(&source, Some(&outputs), None)
        .unwrap();

    let data = out.results[0].data.as_deref().unwrap();
    assert!(data.starts_with("data:image/png;base64,"));
    assert!(!out_dir.exists());
}

#[test]
fn invalid_value_fails_the_run() {
    let tmp = TempDir::new().unwrap();
    let source = write_source(tmp.path(), "d.png", 10, 10);
    let config = PipelineConfig::default();
    let outputs = parse_outputs(r#"{"width": ["8", "wide"]}"#).unwrap();

    let backend = RustBackend::new();
    let err = Pipeline::new(&config, &backend)
        .run(&source, Some(&outputs), None)
        .unwrap_err();
    assert!(err.to_string().contains("width"), "{err}");
}

#[test]
fn results_serialize_per_source() {
    let tmp = TempDir::new().unwrap();
    let source = write_source(tmp.path(), "e.png", 10, 10);
    let config = PipelineConfig {
        public_path: "/assets/".into(),
        ..PipelineConfig::default()
    };
    let outputs = parse_outputs(r#""missing""#).unwrap();
    let backend = RustBackend::new();
    let out = Pipeline::new(&config, &backend)
        .run(&source, Some(&outputs), None)
        .unwrap();
    assert!(out.results.is_empty());

    let spec = parse_outputs(r#"{"format": "png"}"#).unwrap();
    let out = Pipeline::new(&config, &backend)
        .run(&source, Some(&spec), None)
        .unwrap();
    let json = results_json(&[SourceResults {
        source: "e.png",
        variants: &out.results,
    }])
    .unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let path = value[0]["variants"][0]["path"].as_str().unwrap();
    assert!(path.starts_with("/assets/e-"));
    assert!(path.ends_with(".png"));
}
