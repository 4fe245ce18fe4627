//! Pipeline configuration.
//!
//! Handles loading, validating, and merging `imgplex.toml`. Stock defaults are
//! serialized to a TOML value, the user file is merged on top, and the result
//! is deserialized and validated. A missing file means "all defaults".
//!
//! ## Configuration Options
//!
//! ```toml
//! emit = "normal"                  # normal | synthetic | disabled
//! cache = false                    # false, true (<context>/.cache/imgplex), or a directory
//! context = "."                    # Base path for [path] in name templates
//! name = "[name]-[hash:8].[ext]"   # Default file name template
//! public_path = "/"                # Prefix for emitted file paths
//! default_outputs = ["thumb"]      # Outputs when a source requests none
//!
//! [presets.thumb]
//! width = [100, 200]
//! format = "webp"
//!
//! [processing]
//! max_processes = 4                # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Presets keep the order they are written in. When neither the source nor
//! `default_outputs` names any output, every preset is produced in that order.
//!
//! Unknown top-level keys are rejected to catch typos early. Unknown keys
//! *inside* a preset are ignored, matching inline output specs.

use crate::options::{MetaFn, OutputRef, OutputSpec, one_or_many};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file name.
pub const CONFIG_FILENAME: &str = "imgplex.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// What happens to variant payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EmitMode {
    /// Transform, cache, and emit files.
    #[default]
    Normal,
    /// Skip transforms for non-inline variants; describe them from options only.
    Synthetic,
    /// Transform and cache, but never emit files.
    Disabled,
}

/// Where transform results are cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CacheSetting {
    /// `true` uses `<context>/.cache/imgplex`; `false` disables caching.
    Enabled(bool),
    Dir(PathBuf),
}

impl Default for CacheSetting {
    fn default() -> Self {
        CacheSetting::Enabled(false)
    }
}

impl CacheSetting {
    /// Resolve to a concrete directory, or `None` when caching is off.
    pub fn resolve(&self, context: &Path) -> Option<PathBuf> {
        match self {
            CacheSetting::Enabled(false) => None,
            CacheSetting::Enabled(true) => Some(context.join(".cache").join("imgplex")),
            CacheSetting::Dir(dir) if dir.is_relative() => Some(context.join(dir)),
            CacheSetting::Dir(dir) => Some(dir.clone()),
        }
    }
}

/// Named presets in declaration order.
#[derive(Debug, Clone, Default)]
pub struct PresetTable(Vec<(String, OutputSpec)>);

impl PresetTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a preset. Replacing keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, spec: OutputSpec) {
        let name = name.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = spec,
            None => self.0.push((name, spec)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, spec: OutputSpec) -> Self {
        self.insert(name, spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&OutputSpec> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, spec)| spec)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for PresetTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, spec) in &self.0 {
            map.serialize_entry(name, spec)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PresetTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PresetVisitor;

        impl<'de> Visitor<'de> for PresetVisitor {
            type Value = PresetTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a table of named output presets")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<PresetTable, A::Error> {
                let mut table = PresetTable::new();
                while let Some((name, spec)) = access.next_entry::<String, OutputSpec>()? {
                    table.insert(name, spec);
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(PresetVisitor)
    }
}

/// Global configuration for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub emit: EmitMode,
    pub cache: CacheSetting,
    /// Base directory: resolves relative cache dirs and `[path]` in names.
    pub context: PathBuf,
    /// Name template merged into every preset as its base `name`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Prefix joined with a variant's name to form its public path.
    pub public_path: String,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "one_or_many"
    )]
    pub default_outputs: Option<Vec<OutputRef>>,
    pub presets: PresetTable,
    pub processing: ProcessingConfig,
    /// Metadata remapping merged into every preset. Programmatic only.
    #[serde(skip)]
    pub meta: Option<MetaFn>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            emit: EmitMode::default(),
            cache: CacheSetting::default(),
            context: PathBuf::from("."),
            name: None,
            public_path: "/".to_string(),
            default_outputs: None,
            presets: PresetTable::new(),
            processing: ProcessingConfig::default(),
            meta: None,
        }
    }
}

impl PipelineConfig {
    /// Resolved cache directory, if caching is enabled.
    pub fn cache_dir(&self) -> Option<PathBuf> {
        self.cache.resolve(&self.context)
    }

    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ConfigError::Validation("name must not be empty".into()));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        if let Some(empty) = self.presets.names().find(|n| n.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "preset names must not be empty (got {empty:?})"
            )));
        }
        Ok(())
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel variant workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

/// Worker count for variant processing: `max_processes` capped at the
/// machine's cores, or every core when unset.
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
    config.max_processes.map_or(cores, |n| n.min(cores))
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Stock defaults as a `toml::Value::Table`, the base layer for merging.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(PipelineConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Layer an `imgplex.toml` value over the stock defaults.
///
/// Tables merge per key, so `[processing]` can set one field and keep the
/// rest. A key already in `base` keeps its position, which keeps preset
/// order stable; new keys are appended in `overlay` order.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(slot) => {
                        let base_val = std::mem::replace(slot, toml::Value::Boolean(false));
                        *slot = merge_toml(base_val, overlay_val);
                    }
                    None => {
                        base_table.insert(key, overlay_val);
                    }
                }
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value. `Ok(None)` if it doesn't exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<PipelineConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a file, layered over stock defaults.
///
/// A relative `context` in the file is taken relative to the file's directory.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let overlay = load_raw_config(path)?;
    let mut config = resolve_config(stock_defaults_value()?, overlay)?;
    if config.context.is_relative()
        && let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty())
    {
        config.context = dir.join(&config.context);
    }
    Ok(config)
}

/// A fully-commented stock `imgplex.toml`. Used by the `gen-config` command.
pub fn stock_config_toml() -> &'static str {
    r##"# imgplex configuration
# =====================
# All settings are optional. Values shown below are the defaults.
# Unknown top-level keys will cause an error.

# What to do with variant payloads:
#   normal    - transform, cache, and write files
#   synthetic - skip transforms for non-inline variants (fast dry runs)
#   disabled  - transform and cache, but write no files
emit = "normal"

# Transform cache. false disables it, true uses <context>/.cache/imgplex,
# a string names a directory (relative paths resolve against context).
cache = false

# Base directory. Relative cache dirs and the [path] name placeholder
# resolve against it.
context = "."

# Prefix for the public path of every emitted file.
public_path = "/"

# File name template. Placeholders: [name] [path] [ext] [hash] [hash:N]
# [width] [height] [scale] [preset]
# name = "[name]-[hash:8].[ext]"

# Outputs produced when a source requests none. Defaults to every preset,
# in the order they appear below.
# default_outputs = ["thumb", "full"]

# ---------------------------------------------------------------------------
# Presets
# ---------------------------------------------------------------------------
# Each property may be a single value or a list; lists multiply variants.
# Properties: name, scale, blur, width, height, mode, format, inline
#
# [presets.thumb]
# width = [100, 200]
# format = "webp"
#
# [presets.full]
# mode = "contain"
# format = ["webp", "jpeg"]
[presets]

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
