//! Result assembly and file emission.
//!
//! After a variant's bytes and [`TransformInfo`] are known (or synthesized),
//! two host-facing seams decide what the caller sees:
//!
//! - [`ResultAssembler`] builds the [`VariantResult`] descriptor: output name,
//!   public path, and for inline variants a `data:` URI.
//! - [`FileEmitter`] receives the payload of every emitted variant under the
//!   result's name.
//!
//! ## Name templates
//!
//! [`StandardAssembler`] names outputs from a template. The template is the
//! variant's `name` option, else the config's `name`, else
//! [`DEFAULT_NAME_TEMPLATE`]. Placeholders:
//!
//! | Placeholder | Value |
//! |---|---|
//! | `[name]` | source file stem, density suffix removed |
//! | `[path]` | source directory relative to `context`, with trailing `/` |
//! | `[ext]` | output extension (`jpg`, `webp`, ...) |
//! | `[hash]`, `[hash:N]` | SHA-256 of the payload (of the cache key when synthetic) |
//! | `[width]`, `[height]` | output dimensions |
//! | `[scale]` | the variant's `scale` option, `1` when absent |
//! | `[preset]` | preset name, empty when none |
//!
//! Unknown placeholders are kept literally.

use crate::config::PipelineConfig;
use crate::fingerprint::{cache_key, hash_bytes, source_identity};
use crate::imaging::{OutputFormat, TransformInfo};
use crate::options::{ImageOptions, OptionKey};
use crate::source::SourceImage;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Template used when neither the variant nor the config names outputs.
pub const DEFAULT_NAME_TEMPLATE: &str = "[name]-[hash:8].[ext]";

/// Descriptor of one produced variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantResult {
    /// Output name, relative to the emit root.
    pub name: String,
    /// `public_path` + `name`.
    pub path: String,
    pub inline: bool,
    /// `data:` URI for inline variants.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    pub options: ImageOptions,
    pub info: TransformInfo,
}

/// Builds the descriptor for one variant.
///
/// `payload` is `None` for synthetic variants.
pub trait ResultAssembler: Sync {
    fn assemble(
        &self,
        source: &SourceImage,
        payload: Option<&[u8]>,
        info: &TransformInfo,
        options: &ImageOptions,
        config: &PipelineConfig,
    ) -> VariantResult;
}

/// Receives payloads of emitted variants.
pub trait FileEmitter: Sync {
    fn emit(&self, name: &str, bytes: &[u8]) -> io::Result<()>;
}

/// Values available to a name template.
#[derive(Debug, Clone, Default)]
pub struct NameContext {
    pub name: String,
    pub path: String,
    pub ext: String,
    pub hash: String,
    pub width: u32,
    pub height: u32,
    pub scale: String,
    pub preset: String,
}

impl NameContext {
    fn lookup(&self, token: &str) -> Option<String> {
        match token {
            "name" => Some(self.name.clone()),
            "path" => Some(self.path.clone()),
            "ext" => Some(self.ext.clone()),
            "hash" => Some(self.hash.clone()),
            "width" => Some(self.width.to_string()),
            "height" => Some(self.height.to_string()),
            "scale" => Some(self.scale.clone()),
            "preset" => Some(self.preset.clone()),
            _ => {
                let len: usize = token.strip_prefix("hash:")?.parse().ok()?;
                Some(self.hash.chars().take(len).collect())
            }
        }
    }
}

/// Replace `[placeholder]`s in a template.
pub fn interpolate_name(template: &str, ctx: &NameContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find(']') {
            Some(close) => {
                let token = &after[..close];
                match ctx.lookup(token) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('[');
                        out.push_str(token);
                        out.push(']');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Source directory relative to `context`, `/`-separated with a trailing `/`.
fn relative_dir(source: &Path, context: &Path) -> String {
    let Some(parent) = source.parent() else {
        return String::new();
    };
    let relative = parent.strip_prefix(context).unwrap_or(parent);
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!("{}/", parts.join("/"))
    }
}

fn extension_for(format: &str) -> String {
    OutputFormat::from_name(format)
        .map(|f| f.extension().to_string())
        .unwrap_or_else(|_| format.to_string())
}

fn mime_for(format: &str) -> String {
    OutputFormat::from_name(format)
        .map(|f| f.mime_type().to_string())
        .unwrap_or_else(|_| format!("image/{format}"))
}

/// The default assembler: template naming, public paths, inline data URIs.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardAssembler;

impl ResultAssembler for StandardAssembler {
    fn assemble(
        &self,
        source: &SourceImage,
        payload: Option<&[u8]>,
        info: &TransformInfo,
        options: &ImageOptions,
        config: &PipelineConfig,
    ) -> VariantResult {
        let template = options
            .get(OptionKey::Name)
            .map(ToString::to_string)
            .or_else(|| config.name.clone())
            .unwrap_or_else(|| DEFAULT_NAME_TEMPLATE.to_string());

        let ctx = NameContext {
            name: source.base_name(),
            path: relative_dir(source.path(), &config.context),
            ext: extension_for(&info.format),
            hash: match payload {
                Some(bytes) => hash_bytes(bytes),
                None => hash_bytes(cache_key(&source_identity(source), options).base.as_bytes()),
            },
            width: info.width,
            height: info.height,
            scale: options
                .get(OptionKey::Scale)
                .map(ToString::to_string)
                .unwrap_or_else(|| "1".to_string()),
            preset: options.preset.clone().unwrap_or_default(),
        };
        let name = interpolate_name(&template, &ctx);
        let inline = options.is_inline();
        let data = payload.filter(|_| inline).map(|bytes| {
            format!("data:{};base64,{}", mime_for(&info.format), STANDARD.encode(bytes))
        });

        VariantResult {
            path: format!("{}{}", config.public_path, name),
            name,
            inline,
            data,
            preset: options.preset.clone(),
            options: options.clone(),
            info: info.clone(),
        }
    }
}

/// Writes payloads under a root directory.
#[derive(Debug, Clone)]
pub struct DirEmitter {
    root: PathBuf,
}

impl DirEmitter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileEmitter for DirEmitter {
    fn emit(&self, name: &str, bytes: &[u8]) -> io::Result<()> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || name.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("output name escapes the output directory: {name}"),
            ));
        }
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)
    }
}

/// Discards every payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEmitter;

impl FileEmitter for NullEmitter {
    fn emit(&self, _name: &str, _bytes: &[u8]) -> io::Result<()> {
        Ok(())
    }
}
