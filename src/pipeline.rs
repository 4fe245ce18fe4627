//! Per-source variant processing.
//!
//! A [`Pipeline`] turns one source image into an ordered list of
//! [`VariantResult`]s:
//!
//! ```text
//! identify ─► density suffix ─► outputs ─► presets ─► multiplex
//!                                                       │
//!                        ┌──────────── per variant (rayon) ────────────┐
//!                        │ synthetic? ─► describe from options          │
//!                        │ else cache hit? ─► reuse bytes + info        │
//!                        │ else transform ─► store both cache entries   │
//!                        │ assemble ─► emit (unless inline / disabled)  │
//!                        └──────────────────────────────────────────────┘
//! ```
//!
//! ## Emit modes
//!
//! - **normal**: every variant is produced; non-inline payloads are emitted.
//! - **synthetic**: non-inline variants skip the backend and the cache
//!   entirely and are described from their options. Inline variants still
//!   need bytes, so they go through the normal path.
//! - **disabled**: like normal, but nothing is emitted.
//!
//! ## Failures
//!
//! Variants run independently and all run to completion. The first failure
//! in variant order is returned; results of other variants are discarded.
//! A missing preset is not a failure (see [`crate::preset`]).
//!
//! ## Parallel Processing
//!
//! Variants of a source are processed in parallel using
//! [rayon](https://docs.rs/rayon); the result list keeps multiplex order.

use crate::assemble::{FileEmitter, NullEmitter, ResultAssembler, StandardAssembler, VariantResult};
use crate::cache::{CacheError, CacheStats, VariantCache};
use crate::config::{EmitMode, PipelineConfig};
use crate::fingerprint::{cache_key, source_identity};
use crate::imaging::{BackendError, ImageBackend, synthetic_info};
use crate::options::{ImageOptions, OutputRef};
use crate::preset::{expand_outputs, requested_outputs};
use crate::source::{SourceImage, SourceMeta, apply_density};
use rayon::prelude::*;
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image processing failed: {0}")]
    Imaging(#[from] BackendError),
    #[error("Cache write failed: {0}")]
    Cache(#[from] CacheError),
    #[error("Failed to emit {name}: {source}")]
    Emit {
        name: String,
        source: std::io::Error,
    },
}

/// How a variant's bytes were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantStatus {
    /// Served from the cache.
    Cached,
    /// Produced by the backend.
    Transformed,
    /// Described from options, no bytes.
    Synthetic,
}

/// Per-variant line in a progress report.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantReport {
    pub name: String,
    pub status: VariantStatus,
}

/// Progress events emitted while processing sources.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessEvent {
    SourceStarted {
        source: String,
        variant_count: usize,
    },
    SourceProcessed {
        source: String,
        variants: Vec<VariantReport>,
        stats: CacheStats,
    },
}

/// Everything a run produced for one source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceOutput {
    pub results: Vec<VariantResult>,
    pub stats: CacheStats,
}

/// Variant processing for one configuration.
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    backend: &'a dyn ImageBackend,
    cache: VariantCache,
    assembler: &'a dyn ResultAssembler,
    emitter: &'a dyn FileEmitter,
}

impl<'a> Pipeline<'a> {
    /// A pipeline using the config's cache, the standard assembler and no
    /// emitter.
    pub fn new(config: &'a PipelineConfig, backend: &'a dyn ImageBackend) -> Self {
        Self {
            config,
            backend,
            cache: VariantCache::new(config.cache_dir()),
            assembler: &StandardAssembler,
            emitter: &NullEmitter,
        }
    }

    pub fn with_cache(mut self, cache: VariantCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_assembler(mut self, assembler: &'a dyn ResultAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_emitter(mut self, emitter: &'a dyn FileEmitter) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn cache(&self) -> &VariantCache {
        &self.cache
    }

    /// Identify a source and expand its outputs without producing anything.
    pub fn plan(
        &self,
        source: &SourceImage,
        outputs: Option<&[OutputRef]>,
    ) -> Result<(SourceMeta, Vec<ImageOptions>), PipelineError> {
        let meta = apply_density(self.backend.identify(source)?, source.path());
        let requested = requested_outputs(outputs, self.config);
        let records = expand_outputs(&requested, self.config, &meta);
        Ok((meta, records))
    }

    /// Produce every variant of one source.
    ///
    /// `outputs` overrides the configured defaults for this source.
    pub fn run(
        &self,
        source: &SourceImage,
        outputs: Option<&[OutputRef]>,
        events: Option<&Sender<ProcessEvent>>,
    ) -> Result<SourceOutput, PipelineError> {
        let (meta, records) = self.plan(source, outputs)?;
        let source_name = source.path().display().to_string();
        debug!(source = %source_name, variants = records.len(), "expanded outputs");

        if let Some(tx) = events {
            tx.send(ProcessEvent::SourceStarted {
                source: source_name.clone(),
                variant_count: records.len(),
            })
            .ok();
        }

        let identity = source_identity(source);
        let outcomes: Vec<Result<(VariantResult, VariantStatus), PipelineError>> = records
            .par_iter()
            .map(|options| self.process_variant(source, &meta, &identity, options))
            .collect();

        let mut results = Vec::with_capacity(outcomes.len());
        let mut reports = Vec::with_capacity(outcomes.len());
        let mut stats = CacheStats::default();
        for outcome in outcomes {
            let (result, status) = outcome?;
            match status {
                VariantStatus::Cached => stats.hit(),
                VariantStatus::Transformed => stats.miss(),
                VariantStatus::Synthetic => stats.synthesized(),
            }
            reports.push(VariantReport {
                name: result.name.clone(),
                status,
            });
            results.push(result);
        }

        info!(source = %source_name, %stats, "processed source");
        if let Some(tx) = events {
            tx.send(ProcessEvent::SourceProcessed {
                source: source_name,
                variants: reports,
                stats,
            })
            .ok();
        }
        Ok(SourceOutput { results, stats })
    }

    fn process_variant(
        &self,
        source: &SourceImage,
        meta: &SourceMeta,
        identity: &str,
        options: &ImageOptions,
    ) -> Result<(VariantResult, VariantStatus), PipelineError> {
        if self.config.emit == EmitMode::Synthetic && !options.is_inline() {
            let info = synthetic_info(meta, options)?;
            let result = self
                .assembler
                .assemble(source, None, &info, options, self.config);
            return Ok((result, VariantStatus::Synthetic));
        }

        let key = cache_key(identity, options);
        let (variant, status) = match self.cache.get_variant(&key) {
            Some(hit) => {
                debug!(digest = %key.options_digest(), "cache hit");
                (hit, VariantStatus::Cached)
            }
            None => {
                debug!(digest = %key.options_digest(), "cache miss, transforming");
                let produced = self.backend.transform(source, meta, options)?;
                self.cache.put_variant(&key, &produced)?;
                (produced, VariantStatus::Transformed)
            }
        };

        let result = self.assembler.assemble(
            source,
            Some(&variant.bytes),
            &variant.info,
            options,
            self.config,
        );
        if !result.inline && self.config.emit != EmitMode::Disabled {
            self.emitter
                .emit(&result.name, &variant.bytes)
                .map_err(|e| PipelineError::Emit {
                    name: result.name.clone(),
                    source: e,
                })?;
        }
        Ok((result, status))
    }
}
