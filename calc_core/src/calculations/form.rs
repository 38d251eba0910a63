//! # Form Input
//!
//! Turns raw form fields (strings, repeated keys allowed) into a typed
//! [`LineItemInput`]. An empty field is a valid zero. A non-numeric field is
//! either rejected or coerced to zero depending on the caller's
//! [`NumericPolicy`]; coerced fields are always reported back.
//!
//! ## Example
//!
//! ```rust
//! use calc_core::calculations::form::{parse_line_item, FormData, NumericPolicy};
//!
//! let form = FormData::from_pairs([
//!     ("pipe_type", "Pipe"),
//!     ("material", "4010130"),
//!     ("length", "12,5"),
//!     ("dimension", "abc"),
//! ]);
//!
//! assert!(parse_line_item(&form, NumericPolicy::Reject).is_err());
//!
//! let parsed = parse_line_item(&form, NumericPolicy::CoerceToZero).unwrap();
//! assert_eq!(parsed.input.length_m, 12.5);
//! assert_eq!(parsed.coerced, vec!["dimension".to_string()]);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::line_item::{AccessoryCounts, ExtraLayer, LineItemInput, PipeType, Spacers};
use crate::errors::{CalcError, CalcResult};

/// Prefix of per-group price override fields
pub const PRICE_OVERRIDE_PREFIX: &str = "adjusted_price_";

/// Ordered form fields; keys may repeat
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormData {
    pairs: Vec<(String, String)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        FormData {
            pairs: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// First value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// All values for `key`, in order
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.pairs.iter().filter(|(k, _)| k == key).map(|(_, v)| v.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// What to do with a field that is not a number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NumericPolicy {
    /// Fail with `InvalidNumericField`
    #[default]
    Reject,
    /// Use zero and report the field in `ParsedLineItem::coerced`
    CoerceToZero,
}

/// Parsed form with the list of fields that were coerced to zero
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedLineItem {
    pub input: LineItemInput,
    pub coerced: Vec<String>,
}

/// Parse a decimal number, accepting a comma as decimal separator.
///
/// Returns `Ok(None)` for blank input.
pub fn parse_number(field: &str, raw: &str) -> CalcResult<Option<f64>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let normalized = trimmed.replace(' ', "").replace(',', ".");
    match normalized.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(CalcError::invalid_numeric(field, raw, "Not a number")),
    }
}

struct NumberReader<'a> {
    form: &'a FormData,
    policy: NumericPolicy,
    coerced: Vec<String>,
}

impl<'a> NumberReader<'a> {
    fn value(&mut self, field: &str, raw: Option<&str>) -> CalcResult<f64> {
        match parse_number(field, raw.unwrap_or("")) {
            Ok(value) => Ok(value.unwrap_or(0.0)),
            Err(e) => match self.policy {
                NumericPolicy::Reject => Err(e),
                NumericPolicy::CoerceToZero => {
                    tracing::warn!(field, value = raw.unwrap_or(""), "non-numeric field coerced to zero");
                    self.coerced.push(field.to_string());
                    Ok(0.0)
                }
            },
        }
    }

    fn field(&mut self, field: &str) -> CalcResult<f64> {
        let raw = self.form.get(field);
        self.value(field, raw)
    }
}

fn text(form: &FormData, key: &str) -> Option<String> {
    form.get(key).map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Parse one line item from form fields.
///
/// Recognized keys: `pipe_type`, `material`, `length`, `dimension`, `height`,
/// `width`, `height_surcharge`, `material_layer` (repeated) with parallel
/// `material_layer_allowance`, `cladding`, `foil`, `banding`, `bends`,
/// `branches`, `valve_caps`, `flange_caps`, `supports`, `object`, `section`,
/// `spacer_material`, `spacer_percent`, `spacer_ring`.
pub fn parse_line_item(form: &FormData, policy: NumericPolicy) -> CalcResult<ParsedLineItem> {
    let pipe_type = match form.get("pipe_type").map(str::trim).filter(|v| !v.is_empty()) {
        None => PipeType::Pipe,
        Some(raw) => PipeType::from_str_flexible(raw)
            .ok_or_else(|| CalcError::invalid_numeric("pipe_type", raw, "Expected Pipe or Duct"))?,
    };

    let mut reader = NumberReader { form, policy, coerced: Vec::new() };

    let length_m = reader.field("length")?;
    let dimension_mm = reader.field("dimension")?;
    let height_mm = reader.field("height")?;
    let width_mm = reader.field("width")?;
    let height_surcharge_percent = reader.field("height_surcharge")?;

    let accessories = AccessoryCounts {
        bends: reader.field("bends")?,
        branches: reader.field("branches")?,
        valve_caps: reader.field("valve_caps")?,
        flange_caps: reader.field("flange_caps")?,
        supports: reader.field("supports")?,
    };

    let layer_keys = form.get_all("material_layer");
    let allowances = form.get_all("material_layer_allowance");
    let mut layers = Vec::new();
    for (i, key) in layer_keys.iter().enumerate() {
        if key.trim().is_empty() {
            continue;
        }
        let allowance = reader.value("material_layer_allowance", allowances.get(i).copied())?;
        layers.push(ExtraLayer {
            material_key: key.trim().to_string(),
            accessory_allowance_mm: allowance,
            price_override: None,
        });
    }

    let input = LineItemInput {
        pipe_type,
        material_key: text(form, "material"),
        layers,
        cladding_key: text(form, "cladding"),
        length_m,
        dimension_mm,
        height_mm,
        width_mm,
        height_surcharge_percent,
        foil: form.get("foil") == Some("yes"),
        banding: form.get("banding") == Some("yes"),
        accessories,
        base_price_override: None,
        object: text(form, "object"),
        section: text(form, "section"),
        spacers: Spacers {
            material: text(form, "spacer_material"),
            percent: text(form, "spacer_percent"),
            ring: text(form, "spacer_ring"),
        },
    };

    Ok(ParsedLineItem { input, coerced: reader.coerced })
}

/// Collect `adjusted_price_<group_key>` fields as `group_key → price`.
///
/// Blank values are skipped so a previously saved override is kept.
pub fn parse_price_overrides(form: &FormData) -> CalcResult<BTreeMap<String, f64>> {
    let mut overrides = BTreeMap::new();
    for (key, raw) in form.iter() {
        if let Some(group_key) = key.strip_prefix(PRICE_OVERRIDE_PREFIX) {
            if let Some(price) = parse_number(key, raw)? {
                overrides.insert(group_key.to_string(), price);
            }
        }
    }
    Ok(overrides)
}
