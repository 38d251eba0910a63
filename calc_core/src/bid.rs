//! # Bid Data Structures
//!
//! The `Bid` struct is the root container for one insulation bid: customer
//! and project metadata, bid-level parameters, free-text notes and the list of
//! line item inputs. Bids serialize to `.tkb` files as human-readable JSON.
//!
//! Derived values are never stored. Every view recomputes the line items,
//! the material specification and the price breakdown from the inputs and
//! the current catalog snapshot.
//!
//! ## Structure
//!
//! ```text
//! Bid
//! ├── meta: BidMeta (schema version, timestamps)
//! ├── info: BidInfo (name, number, customer, ...)
//! ├── parameters: BidParameters (multiplier, wage, coverage, ...)
//! ├── notes: BidNotes (free text per summary block)
//! └── line_items: Vec<LineItemInput>
//! ```
//!
//! ## Example
//!
//! ```rust
//! use calc_core::bid::{Bid, BidInfo};
//! use calc_core::calculations::LineItemInput;
//! use calc_core::materials::default_catalog;
//!
//! let catalog = default_catalog().unwrap();
//! let mut bid = Bid::new(BidInfo::new("Kv. Linden", "24-117", "Byggbolaget AB"));
//!
//! let input = LineItemInput {
//!     material_key: Some("4010130".to_string()),
//!     length_m: 12.0,
//!     dimension_mm: 60.0,
//!     ..Default::default()
//! };
//! bid.add_line_item(input, catalog).unwrap();
//!
//! let breakdown = bid.price_breakdown(catalog).unwrap();
//! assert!(breakdown.final_price > 0.0);
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calculations::line_item::{calculate, DerivedLineItem, LineItemInput};
use crate::calculations::material_spec::{self, SummaryRow};
use crate::calculations::totals::{roll_up, PriceBreakdown};
use crate::errors::{CalcError, CalcResult};
use crate::materials::MaterialCatalog;

/// Current schema version for .tkb files
pub const SCHEMA_VERSION: &str = "0.1.0";

/// Root bid container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub meta: BidMeta,

    pub info: BidInfo,

    #[serde(default)]
    pub parameters: BidParameters,

    #[serde(default)]
    pub notes: BidNotes,

    /// Line item inputs in entry order
    #[serde(default)]
    pub line_items: Vec<LineItemInput>,
}

impl Bid {
    pub fn new(info: BidInfo) -> Self {
        let now = Utc::now();
        Bid {
            meta: BidMeta {
                version: SCHEMA_VERSION.to_string(),
                created: now,
                modified: now,
            },
            info,
            parameters: BidParameters::default(),
            notes: BidNotes::default(),
            line_items: Vec::new(),
        }
    }

    /// Update the modified timestamp.
    pub fn touch(&mut self) {
        self.meta.modified = Utc::now();
    }

    pub fn item_count(&self) -> usize {
        self.line_items.len()
    }

    /// Validate `input` by computing it, then append it.
    ///
    /// Nothing is added when the calculation fails.
    pub fn add_line_item(&mut self, input: LineItemInput, catalog: &MaterialCatalog) -> CalcResult<DerivedLineItem> {
        let derived = calculate(&input, catalog)?;
        self.line_items.push(input);
        self.touch();
        Ok(derived)
    }

    /// Replace the line item at `index` with a recomputed input.
    pub fn replace_line_item(
        &mut self,
        index: usize,
        input: LineItemInput,
        catalog: &MaterialCatalog,
    ) -> CalcResult<DerivedLineItem> {
        self.check_index(index)?;
        let derived = calculate(&input, catalog)?;
        self.line_items[index] = input;
        self.touch();
        Ok(derived)
    }

    pub fn remove_line_item(&mut self, index: usize) -> CalcResult<LineItemInput> {
        self.check_index(index)?;
        let removed = self.line_items.remove(index);
        self.touch();
        Ok(removed)
    }

    /// Append a copy of the last line item.
    ///
    /// Returns the index of the copy, or `None` when the bid is empty.
    pub fn copy_last_line_item(&mut self) -> Option<usize> {
        let last = self.line_items.last()?.clone();
        self.line_items.push(last);
        self.touch();
        Some(self.line_items.len() - 1)
    }

    /// Set the object and section labels of one line item.
    ///
    /// Blank labels are stored as `None`.
    pub fn set_labels(&mut self, index: usize, object: Option<String>, section: Option<String>) -> CalcResult<()> {
        self.check_index(index)?;
        let item = &mut self.line_items[index];
        item.object = object.filter(|s| !s.trim().is_empty());
        item.section = section.filter(|s| !s.trim().is_empty());
        self.touch();
        Ok(())
    }

    /// Apply `base_<key>` / `layer_<key>` price overrides to every matching item.
    pub fn apply_price_overrides(&mut self, overrides: &BTreeMap<String, f64>) {
        if overrides.is_empty() {
            return;
        }
        self.line_items = material_spec::apply_price_overrides(&self.line_items, overrides);
        self.touch();
    }

    /// Recompute every line item from its input.
    pub fn derive_all(&self, catalog: &MaterialCatalog) -> CalcResult<Vec<DerivedLineItem>> {
        self.line_items.iter().map(|input| calculate(input, catalog)).collect()
    }

    pub fn material_specification(&self, catalog: &MaterialCatalog) -> CalcResult<Vec<SummaryRow>> {
        let items = self.derive_all(catalog)?;
        Ok(material_spec::aggregate(&items, catalog))
    }

    pub fn price_breakdown(&self, catalog: &MaterialCatalog) -> CalcResult<PriceBreakdown> {
        let items = self.derive_all(catalog)?;
        let rows = material_spec::aggregate(&items, catalog);
        Ok(roll_up(&rows, &items, &self.parameters, catalog))
    }

    /// Id of the bid, assigned on first call.
    pub fn ensure_id(&mut self) -> Uuid {
        *self.info.id.get_or_insert_with(Uuid::new_v4)
    }

    /// Persisted record of the bid, assigning an id if needed.
    pub fn to_record(&mut self) -> CalcResult<BidRecord> {
        let id = self.ensure_id();
        let document = BidDocument {
            info: self.info.clone(),
            parameters: self.parameters.clone(),
            notes: self.notes.clone(),
            line_items: self.line_items.clone(),
        };
        Ok(BidRecord {
            id,
            saved_at: Utc::now(),
            data: serde_json::to_string(&document)?,
        })
    }

    fn check_index(&self, index: usize) -> CalcResult<()> {
        if index < self.line_items.len() {
            Ok(())
        } else {
            Err(CalcError::InvalidIndex {
                index,
                len: self.line_items.len(),
            })
        }
    }
}

impl Default for Bid {
    fn default() -> Self {
        Bid::new(BidInfo::default())
    }
}

/// Bid metadata stored in the file header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidMeta {
    /// Schema version (for migration compatibility)
    pub version: String,

    pub created: DateTime<Utc>,

    pub modified: DateTime<Utc>,
}

/// Customer and project information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BidInfo {
    /// Assigned when the bid is first saved
    pub id: Option<Uuid>,
    pub name: String,
    pub number: String,
    pub customer: String,
    pub department: String,
    pub project_manager: String,
    pub calculator_name: String,
    pub project_type: String,
}

impl BidInfo {
    pub fn new(name: impl Into<String>, number: impl Into<String>, customer: impl Into<String>) -> Self {
        BidInfo {
            name: name.into(),
            number: number.into(),
            customer: customer.into(),
            ..Default::default()
        }
    }
}

/// Bid-level options used by the roll-up.
///
/// Missing fields take their defaults when deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BidParameters {
    /// Work time multiplier
    pub multiplier: f64,
    /// Labor uplift for work at elevation (%)
    pub height_surcharge_percent: f64,
    pub extra_hours: f64,
    /// Hourly wage before overhead
    pub hourly_wage: f64,
    /// Margin as a share of the final price (%)
    pub coverage_percent: f64,
    pub subcontractor_material: f64,
    pub subcontractor_hours: f64,
    pub subcontractor_mounting: f64,
    pub subcontractor_fabrication: f64,
    pub vehicle_days: f64,
}

impl Default for BidParameters {
    fn default() -> Self {
        BidParameters {
            multiplier: 1.0,
            height_surcharge_percent: 0.0,
            extra_hours: 0.0,
            hourly_wage: 252.0,
            coverage_percent: 0.0,
            subcontractor_material: 0.0,
            subcontractor_hours: 0.0,
            subcontractor_mounting: 0.0,
            subcontractor_fabrication: 0.0,
            vehicle_days: 0.0,
        }
    }
}

impl BidParameters {
    /// Coverage as a fraction (20 % → 0.2)
    pub fn coverage_rate(&self) -> f64 {
        self.coverage_percent / 100.0
    }

    pub fn subcontractor_total(&self) -> f64 {
        self.subcontractor_material
            + self.subcontractor_hours
            + self.subcontractor_mounting
            + self.subcontractor_fabrication
    }
}

/// Free-text notes shown under each summary block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BidNotes {
    pub insulation: String,
    pub cladding: String,
    pub accessories: String,
    pub total: String,
}

/// Stored bid: id, save time and the bid document as JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidRecord {
    pub id: Uuid,
    pub saved_at: DateTime<Utc>,
    pub data: String,
}

impl BidRecord {
    /// Rebuild a bid from the stored document.
    ///
    /// Timestamps of the returned bid are set to the save time.
    pub fn to_bid(&self) -> CalcResult<Bid> {
        let document: BidDocument = serde_json::from_str(&self.data)?;
        let mut info = document.info;
        info.id = Some(self.id);
        Ok(Bid {
            meta: BidMeta {
                version: SCHEMA_VERSION.to_string(),
                created: self.saved_at,
                modified: self.saved_at,
            },
            info,
            parameters: document.parameters,
            notes: document.notes,
            line_items: document.line_items,
        })
    }
}

/// Record blob. Line items are stored as inputs; derived values are
/// recomputed against the current catalog when the bid is priced.
#[derive(Debug, Serialize, Deserialize)]
struct BidDocument {
    #[serde(rename = "bid_metadata", alias = "bid_info")]
    info: BidInfo,
    #[serde(default)]
    parameters: BidParameters,
    #[serde(default)]
    notes: BidNotes,
    #[serde(default)]
    line_items: Vec<LineItemInput>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculations::line_item::ExtraLayer;
    use crate::materials::{MaterialCategory, MaterialRecord};

    fn test_catalog() -> MaterialCatalog {
        MaterialCatalog::new(vec![
            MaterialRecord::new("R30", "Rörskål 30 mm", MaterialCategory::Insulation)
                .with_cost(85.0)
                .with_thickness(30.0)
                .with_labor(0.12, 0.05),
            MaterialRecord::new("N20", "Nätmatta 20 mm", MaterialCategory::Insulation)
                .with_cost(2.0)
                .with_thickness(20.0),
            MaterialRecord::new("ALU", "Aluminiumplåt", MaterialCategory::AluminumCladding).with_cost(165.0),
        ])
    }

    fn pipe(length_m: f64) -> LineItemInput {
        LineItemInput {
            material_key: Some("R30".to_string()),
            length_m,
            dimension_mm: 100.0,
            ..Default::default()
        }
    }

    fn sample_bid() -> Bid {
        let catalog = test_catalog();
        let mut bid = Bid::new(BidInfo::new("Kv. Linden", "24-117", "Byggbolaget AB"));
        bid.add_line_item(pipe(10.0), &catalog).unwrap();
        bid.add_line_item(pipe(20.0), &catalog).unwrap();
        bid
    }

    #[test]
    fn test_bid_creation() {
        let bid = Bid::new(BidInfo::new("Kv. Linden", "24-117", "Byggbolaget AB"));
        assert_eq!(bid.meta.version, SCHEMA_VERSION);
        assert_eq!(bid.info.customer, "Byggbolaget AB");
        assert_eq!(bid.info.id, None);
        assert_eq!(bid.parameters, BidParameters::default());
        assert_eq!(bid.item_count(), 0);
    }

    #[test]
    fn test_parameter_defaults() {
        let params = BidParameters::default();
        assert_eq!(params.multiplier, 1.0);
        assert_eq!(params.hourly_wage, 252.0);
        assert_eq!(params.coverage_rate(), 0.0);
        assert_eq!(params.subcontractor_total(), 0.0);

        // Partial documents fill in defaults
        let params: BidParameters = serde_json::from_str(r#"{ "coverage_percent": 25.0 }"#).unwrap();
        assert_eq!(params.coverage_rate(), 0.25);
        assert_eq!(params.hourly_wage, 252.0);
    }

    #[test]
    fn test_add_rejects_invalid_item() {
        let catalog = test_catalog();
        let mut bid = sample_bid();

        let missing = LineItemInput::default();
        assert_eq!(bid.add_line_item(missing, &catalog).unwrap_err().error_code(), "MISSING_SELECTION");

        let mut unknown = pipe(5.0);
        unknown.material_key = Some("nope".to_string());
        assert!(bid.add_line_item(unknown, &catalog).is_err());
        assert_eq!(bid.item_count(), 2);
    }

    #[test]
    fn test_replace_and_remove() {
        let catalog = test_catalog();
        let mut bid = sample_bid();

        let derived = bid.replace_line_item(1, pipe(30.0), &catalog).unwrap();
        assert_eq!(derived.length_m(), 30.0);
        assert_eq!(bid.line_items[1].length_m, 30.0);

        assert_eq!(
            bid.replace_line_item(5, pipe(1.0), &catalog).unwrap_err(),
            CalcError::InvalidIndex { index: 5, len: 2 }
        );

        let removed = bid.remove_line_item(0).unwrap();
        assert_eq!(removed.length_m, 10.0);
        assert_eq!(bid.item_count(), 1);
        assert!(bid.remove_line_item(1).is_err());
    }

    #[test]
    fn test_copy_last() {
        let mut bid = Bid::default();
        assert_eq!(bid.copy_last_line_item(), None);

        let mut bid = sample_bid();
        assert_eq!(bid.copy_last_line_item(), Some(2));
        assert_eq!(bid.line_items[2], bid.line_items[1]);
    }

    #[test]
    fn test_set_labels() {
        let mut bid = sample_bid();
        bid.set_labels(0, Some("Pannrum".to_string()), Some("  ".to_string())).unwrap();
        assert_eq!(bid.line_items[0].object.as_deref(), Some("Pannrum"));
        assert_eq!(bid.line_items[0].section, None);
        assert!(bid.set_labels(9, None, None).is_err());
    }

    #[test]
    fn test_price_overrides_flow_into_specification() {
        let catalog = test_catalog();
        let mut bid = sample_bid();
        let mut layered = pipe(5.0);
        layered.layers = vec![ExtraLayer::new("N20")];
        bid.add_line_item(layered, &catalog).unwrap();

        let mut overrides = BTreeMap::new();
        overrides.insert("base_R30".to_string(), 100.0);
        overrides.insert("layer_N20".to_string(), 4.0);
        bid.apply_price_overrides(&overrides);

        let rows = bid.material_specification(&catalog).unwrap();
        let base = rows.iter().find(|r| r.group_key == "base_R30").unwrap();
        assert_eq!(base.unit_price, 100.0);
        let layer = rows.iter().find(|r| r.group_key == "layer_N20").unwrap();
        assert_eq!(layer.total_cost, 20.0 * 4.0);
    }

    #[test]
    fn test_derive_all_recomputes_with_catalog() {
        let catalog = test_catalog();
        let bid = sample_bid();
        let before = bid.price_breakdown(&catalog).unwrap();

        let cheaper = catalog.with_material(
            MaterialRecord::new("R30", "Rörskål 30 mm", MaterialCategory::Insulation)
                .with_cost(40.0)
                .with_thickness(30.0)
                .with_labor(0.12, 0.05),
        );
        let after = bid.price_breakdown(&cheaper).unwrap();
        assert!(after.total_material_cost < before.total_material_cost);

        // Items whose material left the catalog fail to derive
        let empty = MaterialCatalog::default();
        assert_eq!(bid.derive_all(&empty).unwrap_err().error_code(), "UNKNOWN_MATERIAL");
    }

    #[test]
    fn test_record_roundtrip() {
        let mut bid = sample_bid();
        bid.parameters.coverage_percent = 15.0;
        bid.notes.total = "Exkl. ställning".to_string();

        let record = bid.to_record().unwrap();
        assert_eq!(Some(record.id), bid.info.id);
        assert!(record.data.contains("\"bid_metadata\""));
        assert!(!record.data.contains("\"material_cost\""));

        // Id is stable across saves
        let again = bid.to_record().unwrap();
        assert_eq!(again.id, record.id);

        let restored = record.to_bid().unwrap();
        assert_eq!(restored.info, bid.info);
        assert_eq!(restored.parameters, bid.parameters);
        assert_eq!(restored.notes, bid.notes);
        assert_eq!(restored.line_items, bid.line_items);
        assert_eq!(restored.meta.modified, record.saved_at);
    }

    #[test]
    fn test_record_accepts_bid_info_key() {
        let record = BidRecord {
            id: Uuid::new_v4(),
            saved_at: Utc::now(),
            data: r#"{ "bid_info": { "name": "Gamla skolan" }, "line_items": [] }"#.to_string(),
        };
        let bid = record.to_bid().unwrap();
        assert_eq!(bid.info.name, "Gamla skolan");
        assert_eq!(bid.parameters, BidParameters::default());
    }

    #[test]
    fn test_bid_serialization() {
        let bid = sample_bid();
        let json = serde_json::to_string_pretty(&bid).unwrap();
        assert!(json.contains("Byggbolaget AB"));

        let roundtrip: Bid = serde_json::from_str(&json).unwrap();
        assert_eq!(roundtrip.line_items, bid.line_items);
        assert_eq!(roundtrip.info, bid.info);
    }
}
