//! Preset resolution and output expansion.
//!
//! Each entry of an output list becomes zero or more [`ImageOptions`]:
//!
//! ```text
//! "thumb"                          → base ⊕ presets.thumb       (+ preset = "thumb")
//! { preset: "thumb", width: 50 }   → base ⊕ presets.thumb ⊕ inline
//! { width: [100, 200] }            → inline as-is
//! "missing"                        → nothing (logged, not an error)
//! ```
//!
//! `base` is the global `name` template and `meta` function from
//! [`PipelineConfig`]. It only applies when a preset is actually found.
//!
//! A missing preset is deliberately a no-op: sibling outputs still expand.
//! This is a softer policy than a bad numeric value, which only fails later
//! when the transform uses it.

use crate::config::PipelineConfig;
use crate::multiplex::multiplex;
use crate::options::{ImageOptions, OptionValue, OutputRef, OutputSpec, normalize};
use crate::source::SourceMeta;
use tracing::{debug, warn};

pub use crate::config::PresetTable;

/// The global fields every preset inherits.
fn preset_base(config: &PipelineConfig) -> OutputSpec {
    OutputSpec {
        name: config.name.clone().map(OptionValue::from),
        meta: config.meta.clone(),
        ..OutputSpec::default()
    }
}

/// Look up a preset and layer it over the global base.
pub fn require_preset(name: &str, config: &PipelineConfig) -> Option<OutputSpec> {
    let preset = config.presets.get(name)?;
    Some(
        preset_base(config)
            .overlay(preset.clone())
            .with_preset(name),
    )
}

/// Turn one output reference into the spec to normalize.
///
/// Returns `None` only for a bare preset name that doesn't exist.
pub fn resolve_output(output: &OutputRef, config: &PipelineConfig) -> Option<OutputSpec> {
    match output {
        OutputRef::Preset(name) => {
            let spec = require_preset(name, config);
            if spec.is_none() {
                warn!(preset = %name, "unknown preset, no variants produced");
            }
            spec
        }
        OutputRef::Spec(inline) => {
            let base = inline.preset.as_deref().and_then(|name| {
                let spec = require_preset(name, config);
                if spec.is_none() {
                    debug!(preset = %name, "inline output names unknown preset, using inline fields");
                }
                spec
            });
            Some(base.unwrap_or_default().overlay(inline.clone()))
        }
    }
}

/// Normalize and multiplex one resolved spec.
///
/// The spec's `meta` function (if any) remaps `meta` first. The preset name is
/// copied onto every produced record.
pub fn create_image_options(meta: &SourceMeta, spec: &OutputSpec) -> Vec<ImageOptions> {
    let meta = match &spec.meta {
        Some(remap) => remap.apply(meta),
        None => meta.clone(),
    };
    let mut records = multiplex(&normalize(spec, &meta));
    if let Some(preset) = &spec.preset {
        for record in &mut records {
            record.preset = Some(preset.clone());
        }
    }
    records
}

/// Expand a whole output list, preserving declaration order.
pub fn expand_outputs(
    outputs: &[OutputRef],
    config: &PipelineConfig,
    meta: &SourceMeta,
) -> Vec<ImageOptions> {
    outputs
        .iter()
        .filter_map(|output| resolve_output(output, config))
        .flat_map(|spec| create_image_options(meta, &spec))
        .collect()
}

/// The outputs to produce for one source.
///
/// Falls back to `default_outputs`, then to every preset in table order.
pub fn requested_outputs(local: Option<&[OutputRef]>, config: &PipelineConfig) -> Vec<OutputRef> {
    if let Some(local) = local {
        return local.to_vec();
    }
    if let Some(defaults) = &config.default_outputs {
        return defaults.clone();
    }
    config.presets.names().map(OutputRef::from).collect()
}
