//! Output specifications and their normalized form.
//!
//! An [`OutputSpec`] is what a user writes: each controllable property may be
//! absent, a scalar, a list of scalars, or a function of the source's
//! [`SourceMeta`]. [`normalize`] turns that into [`NormalizedOptions`], where
//! every present property is a non-empty list of plain scalars. The
//! [`multiplex`](crate::multiplex) stage then expands the lists into concrete
//! [`ImageOptions`], one per variant.
//!
//! ```text
//! { width: [100, 200], format: "webp" }
//!     → normalize  → { width: [100.0, 200.0], format: ["webp"] }
//!     → multiplex  → { width: 100.0, format: "webp" }
//!                    { width: 200.0, format: "webp" }
//! ```
//!
//! ## Numeric coercion
//!
//! `scale`, `blur`, `width` and `height` are parsed the way a browser parses
//! `parseFloat`: the longest leading decimal prefix wins (`"120px"` → 120).
//! Anything unparsable becomes `NaN`. A `NaN` is never dropped here; it is
//! rejected by the transform plan, which is where a bad value is actually used.

use crate::source::SourceMeta;
use serde::de::Deserializer;
use serde::ser::{Error as _, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A single option value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Scalar {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::Number(n)
    }
}

impl From<u32> for Scalar {
    fn from(n: u32) -> Self {
        Scalar::Number(f64::from(n))
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

/// A value computed from source metadata. May yield "absent".
pub type ComputedFn = Arc<dyn Fn(&SourceMeta) -> Option<OptionValue> + Send + Sync>;

/// Raw value of one property in an [`OutputSpec`].
#[derive(Clone)]
pub enum OptionValue {
    Scalar(Scalar),
    /// Absent elements are skipped during normalization.
    List(Vec<Option<Scalar>>),
    Computed(ComputedFn),
}

impl OptionValue {
    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scalar>,
    {
        OptionValue::List(items.into_iter().map(|s| Some(s.into())).collect())
    }

    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&SourceMeta) -> Option<OptionValue> + Send + Sync + 'static,
    {
        OptionValue::Computed(Arc::new(f))
    }
}

impl From<Scalar> for OptionValue {
    fn from(value: Scalar) -> Self {
        OptionValue::Scalar(value)
    }
}

impl From<f64> for OptionValue {
    fn from(n: f64) -> Self {
        OptionValue::Scalar(n.into())
    }
}

impl From<u32> for OptionValue {
    fn from(n: u32) -> Self {
        OptionValue::Scalar(n.into())
    }
}

impl From<bool> for OptionValue {
    fn from(b: bool) -> Self {
        OptionValue::Scalar(b.into())
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        OptionValue::Scalar(s.into())
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        OptionValue::Scalar(s.into())
    }
}

impl fmt::Debug for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Scalar(s) => f.debug_tuple("Scalar").field(s).finish(),
            OptionValue::List(items) => f.debug_tuple("List").field(items).finish(),
            OptionValue::Computed(_) => f.write_str("Computed(<fn>)"),
        }
    }
}

impl Serialize for OptionValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            OptionValue::Scalar(s) => s.serialize(serializer),
            OptionValue::List(items) => items.serialize(serializer),
            OptionValue::Computed(_) => Err(S::Error::custom(
                "computed option values cannot be serialized",
            )),
        }
    }
}

impl<'de> Deserialize<'de> for OptionValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            List(Vec<Option<Scalar>>),
            Scalar(Scalar),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::List(items) => OptionValue::List(items),
            Raw::Scalar(s) => OptionValue::Scalar(s),
        })
    }
}

/// Remaps source metadata before a spec's computed values see it.
#[derive(Clone)]
pub struct MetaFn(Arc<dyn Fn(&SourceMeta) -> SourceMeta + Send + Sync>);

impl MetaFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&SourceMeta) -> SourceMeta + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn apply(&self, meta: &SourceMeta) -> SourceMeta {
        (self.0)(meta)
    }
}

impl fmt::Debug for MetaFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MetaFn(<fn>)")
    }
}

/// The properties that survive normalization, in multiplex order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKey {
    Name,
    Scale,
    Blur,
    Width,
    Height,
    Mode,
    Format,
    Inline,
}

impl OptionKey {
    pub const ALL: [OptionKey; 8] = [
        OptionKey::Name,
        OptionKey::Scale,
        OptionKey::Blur,
        OptionKey::Width,
        OptionKey::Height,
        OptionKey::Mode,
        OptionKey::Format,
        OptionKey::Inline,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OptionKey::Name => "name",
            OptionKey::Scale => "scale",
            OptionKey::Blur => "blur",
            OptionKey::Width => "width",
            OptionKey::Height => "height",
            OptionKey::Mode => "mode",
            OptionKey::Format => "format",
            OptionKey::Inline => "inline",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            OptionKey::Scale | OptionKey::Blur | OptionKey::Width | OptionKey::Height
        )
    }
}

/// A request for one or more variants.
///
/// Unknown keys in a deserialized spec are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(skip)]
    pub meta: Option<MetaFn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<OptionValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<OptionValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blur: Option<OptionValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<OptionValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<OptionValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<OptionValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<OptionValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline: Option<OptionValue>,
}

impl OutputSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(&self, key: OptionKey) -> Option<&OptionValue> {
        match key {
            OptionKey::Name => self.name.as_ref(),
            OptionKey::Scale => self.scale.as_ref(),
            OptionKey::Blur => self.blur.as_ref(),
            OptionKey::Width => self.width.as_ref(),
            OptionKey::Height => self.height.as_ref(),
            OptionKey::Mode => self.mode.as_ref(),
            OptionKey::Format => self.format.as_ref(),
            OptionKey::Inline => self.inline.as_ref(),
        }
    }

    fn field_mut(&mut self, key: OptionKey) -> &mut Option<OptionValue> {
        match key {
            OptionKey::Name => &mut self.name,
            OptionKey::Scale => &mut self.scale,
            OptionKey::Blur => &mut self.blur,
            OptionKey::Width => &mut self.width,
            OptionKey::Height => &mut self.height,
            OptionKey::Mode => &mut self.mode,
            OptionKey::Format => &mut self.format,
            OptionKey::Inline => &mut self.inline,
        }
    }

    /// Builder-style setter.
    pub fn with(mut self, key: OptionKey, value: impl Into<OptionValue>) -> Self {
        *self.field_mut(key) = Some(value.into());
        self
    }

    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = Some(preset.into());
        self
    }

    pub fn with_meta(mut self, meta: MetaFn) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Layer `top` over `self`: every field present in `top` wins.
    pub fn overlay(mut self, mut top: OutputSpec) -> Self {
        if let Some(preset) = top.preset.take() {
            self.preset = Some(preset);
        }
        if let Some(meta) = top.meta.take() {
            self.meta = Some(meta);
        }
        for key in OptionKey::ALL {
            if let Some(value) = top.field_mut(key).take() {
                *self.field_mut(key) = Some(value);
            }
        }
        self
    }
}

/// One entry of an output list: a preset name or an inline spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputRef {
    Preset(String),
    Spec(OutputSpec),
}

impl From<&str> for OutputRef {
    fn from(name: &str) -> Self {
        OutputRef::Preset(name.to_string())
    }
}

impl From<OutputSpec> for OutputRef {
    fn from(spec: OutputSpec) -> Self {
        OutputRef::Spec(spec)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<OutputRef>),
    One(OutputRef),
}

impl From<OneOrMany> for Vec<OutputRef> {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::Many(refs) => refs,
            OneOrMany::One(r) => vec![r],
        }
    }
}

/// Serde helper: an output list may be written as a single entry.
pub fn one_or_many<'de, D>(deserializer: D) -> Result<Option<Vec<OutputRef>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<OneOrMany>::deserialize(deserializer).map(|v| v.map(Vec::from))
}

/// Parse an output list from JSON: one reference or an array of them.
pub fn parse_outputs(json: &str) -> Result<Vec<OutputRef>, serde_json::Error> {
    serde_json::from_str::<OneOrMany>(json).map(Vec::from)
}

/// Canonical list-valued options. No field is ever mapped to an empty list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedOptions(BTreeMap<OptionKey, Vec<Scalar>>);

impl NormalizedOptions {
    /// Build from raw lists, dropping empty ones.
    pub fn from_lists<I>(lists: I) -> Self
    where
        I: IntoIterator<Item = (OptionKey, Vec<Scalar>)>,
    {
        Self(
            lists
                .into_iter()
                .filter(|(_, values)| !values.is_empty())
                .collect(),
        )
    }

    pub fn get(&self, key: OptionKey) -> Option<&[Scalar]> {
        self.0.get(&key).map(Vec::as_slice)
    }

    /// Fields in multiplex order.
    pub fn iter(&self) -> impl Iterator<Item = (OptionKey, &[Scalar])> {
        self.0.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One concrete variant: a single scalar per present property.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImageOptions {
    #[serde(flatten)]
    pub values: BTreeMap<OptionKey, Scalar>,
    /// Preset this record came from. Carried through, never multiplexed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
}

impl ImageOptions {
    pub fn with(mut self, key: OptionKey, value: impl Into<Scalar>) -> Self {
        self.values.insert(key, coerce(key, &value.into()));
        self
    }

    pub fn get(&self, key: OptionKey) -> Option<&Scalar> {
        self.values.get(&key)
    }

    /// Numeric value of a property. Non-numeric scalars read as `NaN`.
    pub fn number(&self, key: OptionKey) -> Option<f64> {
        self.get(key).map(|s| s.as_f64().unwrap_or(f64::NAN))
    }

    pub fn text(&self, key: OptionKey) -> Option<&str> {
        self.get(key).and_then(Scalar::as_str)
    }

    /// Only a literal `true` marks a variant inline.
    pub fn is_inline(&self) -> bool {
        matches!(self.get(OptionKey::Inline), Some(Scalar::Bool(true)))
    }
}

/// JavaScript-style `parseFloat`: longest leading decimal prefix, else `NaN`.
pub fn parse_float(input: &str) -> f64 {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let sign_len = end;

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }

    if digits == 0 {
        let rest = &s[sign_len..];
        if rest.starts_with("Infinity") {
            return if s.starts_with('-') {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            };
        }
        return f64::NAN;
    }

    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().unwrap_or(f64::NAN)
}

/// Coerce one scalar for `key`. Numeric keys become numbers; others pass through.
pub fn coerce(key: OptionKey, value: &Scalar) -> Scalar {
    if !key.is_numeric() {
        return value.clone();
    }
    Scalar::Number(match value {
        Scalar::Number(n) => *n,
        Scalar::Text(s) => parse_float(s),
        Scalar::Bool(_) => f64::NAN,
    })
}

fn resolve(key: OptionKey, value: &OptionValue, meta: &SourceMeta) -> Option<Vec<Scalar>> {
    match value {
        OptionValue::Computed(f) => f(meta).and_then(|v| resolve(key, &v, meta)),
        OptionValue::List(items) => {
            let values: Vec<Scalar> = items.iter().flatten().map(|s| coerce(key, s)).collect();
            (!values.is_empty()).then_some(values)
        }
        OptionValue::Scalar(s) => Some(vec![coerce(key, s)]),
    }
}

/// Normalize a spec against the metadata its computed values should see.
pub fn normalize(spec: &OutputSpec, meta: &SourceMeta) -> NormalizedOptions {
    NormalizedOptions::from_lists(OptionKey::ALL.into_iter().filter_map(|key| {
        spec.field(key)
            .and_then(|value| resolve(key, value, meta))
            .map(|values| (key, values))
    }))
}
