//! # Material Catalog
//!
//! Material records for insulation, cladding, accessories and consumables,
//! held in an immutable [`MaterialCatalog`] snapshot that is passed explicitly
//! into every calculation.
//!
//! ## Categories
//!
//! Every record carries an explicit [`MaterialCategory`] set when the catalog
//! is authored. Calculations branch on the category, never on the display name.
//!
//! - **Insulation**: pipe sections, duct mats, extra layers
//! - **LamellaMat / FireMat**: mats tied with spool wire and sealed with tape
//! - **AluminumCladding**: aluminum sheet, riveted, with its own labor table
//! - **SheetCladding**: other sheet cladding (galvanized steel etc.)
//! - **Accessory / Consumable**: rivets, tape, foil, banding, spool wire
//!
//! ## Example
//!
//! ```rust
//! use calc_core::materials::{MaterialCatalog, MaterialCategory, MaterialRecord};
//!
//! let catalog = MaterialCatalog::new(vec![
//!     MaterialRecord::new("R30", "Pipe section 30 mm", MaterialCategory::Insulation)
//!         .with_cost(85.0)
//!         .with_thickness(30.0),
//! ]);
//!
//! let record = catalog.require("R30").unwrap();
//! assert_eq!(record.insulation_thickness_mm, 30.0);
//! ```

pub mod loader;
pub mod reference;

pub use loader::default_catalog;
pub use reference::{ReferenceItem, ReferencePrice};

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{CalcError, CalcResult};

/// Explicit material category, set at catalog-authoring time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialCategory {
    /// Pipe sections, duct mats and other plain insulation
    Insulation,
    /// Lamella mat (needs spool wire and lamella tape)
    LamellaMat,
    /// Fire mat (needs spool wire and fire-mat tape)
    FireMat,
    /// Aluminum sheet cladding
    AluminumCladding,
    /// Other sheet cladding
    SheetCladding,
    /// Accessories such as rivets
    Accessory,
    /// Consumables such as tape, foil, banding and spool wire
    Consumable,
}

/// Broad role of a material in a line item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialRole {
    BaseInsulation,
    Cladding,
    Accessory,
    Consumable,
}

impl MaterialCategory {
    /// All categories for selection lists
    pub const ALL: [MaterialCategory; 7] = [
        MaterialCategory::Insulation,
        MaterialCategory::LamellaMat,
        MaterialCategory::FireMat,
        MaterialCategory::AluminumCladding,
        MaterialCategory::SheetCladding,
        MaterialCategory::Accessory,
        MaterialCategory::Consumable,
    ];

    pub fn role(&self) -> MaterialRole {
        match self {
            MaterialCategory::Insulation | MaterialCategory::LamellaMat | MaterialCategory::FireMat => {
                MaterialRole::BaseInsulation
            }
            MaterialCategory::AluminumCladding | MaterialCategory::SheetCladding => MaterialRole::Cladding,
            MaterialCategory::Accessory => MaterialRole::Accessory,
            MaterialCategory::Consumable => MaterialRole::Consumable,
        }
    }

    pub fn is_aluminum_cladding(&self) -> bool {
        matches!(self, MaterialCategory::AluminumCladding)
    }

    /// Mats that are tied with spool wire on pipes
    pub fn needs_spool_wire(&self) -> bool {
        matches!(self, MaterialCategory::LamellaMat | MaterialCategory::FireMat)
    }

    /// Mats whose seams are taped under cladding
    pub fn needs_seam_tape(&self) -> bool {
        matches!(self, MaterialCategory::LamellaMat | MaterialCategory::FireMat)
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            MaterialCategory::Insulation => "Insulation",
            MaterialCategory::LamellaMat => "Lamella mat",
            MaterialCategory::FireMat => "Fire mat",
            MaterialCategory::AluminumCladding => "Aluminum cladding",
            MaterialCategory::SheetCladding => "Sheet cladding",
            MaterialCategory::Accessory => "Accessory",
            MaterialCategory::Consumable => "Consumable",
        }
    }
}

impl std::fmt::Display for MaterialCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// One catalog entry.
///
/// ## JSON Example
///
/// ```json
/// {
///   "key": "4010101",
///   "article_number": "4010101",
///   "name": "Rörskål 30 mm",
///   "category": "insulation",
///   "unit": "m²",
///   "unit_cost": 85.0,
///   "insulation_thickness_mm": 30.0,
///   "run_length_factor": 0.12,
///   "area_factor": 0.05,
///   "last_updated": "2025-03-05"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRecord {
    /// Lookup key (defaults to the article number)
    #[serde(default)]
    pub key: String,

    pub article_number: String,

    pub name: String,

    pub category: MaterialCategory,

    #[serde(default)]
    pub supplier: Option<String>,

    /// Display unit for purchasing (m², kg, roll, ...)
    #[serde(default)]
    pub unit: String,

    /// Price per unit
    #[serde(default)]
    pub unit_cost: f64,

    /// Insulation thickness in mm (0 for non-insulation)
    #[serde(default, alias = "thickness_mm")]
    pub insulation_thickness_mm: f64,

    /// Labor hours per meter of run
    #[serde(default)]
    pub run_length_factor: f64,

    /// Labor hours per square meter
    #[serde(default)]
    pub area_factor: f64,

    #[serde(default)]
    pub last_updated: Option<NaiveDate>,
}

impl MaterialRecord {
    /// Create a record with zero cost and factors.
    pub fn new(key: impl Into<String>, name: impl Into<String>, category: MaterialCategory) -> Self {
        let key = key.into();
        MaterialRecord {
            article_number: key.clone(),
            key,
            name: name.into(),
            category,
            supplier: None,
            unit: String::new(),
            unit_cost: 0.0,
            insulation_thickness_mm: 0.0,
            run_length_factor: 0.0,
            area_factor: 0.0,
            last_updated: None,
        }
    }

    pub fn with_cost(mut self, unit_cost: f64) -> Self {
        self.unit_cost = unit_cost;
        self
    }

    pub fn with_thickness(mut self, thickness_mm: f64) -> Self {
        self.insulation_thickness_mm = thickness_mm;
        self
    }

    /// Set run-length (h/m) and area (h/m²) labor factors
    pub fn with_labor(mut self, run_length_factor: f64, area_factor: f64) -> Self {
        self.run_length_factor = run_length_factor;
        self.area_factor = area_factor;
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_updated(mut self, date: NaiveDate) -> Self {
        self.last_updated = Some(date);
        self
    }

    /// Selection label, e.g. "4010101 - Rörskål 30 mm"
    pub fn option_label(&self) -> String {
        format!("{} - {}", self.article_number, self.name)
    }
}

/// Immutable catalog snapshot keyed by material key.
///
/// Administrative updates (`with_material`, `with_category`, `with_updated`)
/// return a new snapshot and leave the original untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialCatalog {
    records: BTreeMap<String, MaterialRecord>,
}

impl MaterialCatalog {
    /// Build a catalog from records. Later duplicates replace earlier ones.
    pub fn new(records: impl IntoIterator<Item = MaterialRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|mut record| {
                if record.key.is_empty() {
                    record.key = record.article_number.clone();
                }
                (record.key.clone(), record)
            })
            .collect();
        MaterialCatalog { records }
    }

    pub fn get(&self, key: &str) -> Option<&MaterialRecord> {
        self.records.get(key)
    }

    /// Look up a record, failing with `UnknownMaterial`
    pub fn require(&self, key: &str) -> CalcResult<&MaterialRecord> {
        self.get(key).ok_or_else(|| CalcError::unknown_material(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MaterialRecord> {
        self.records.values()
    }

    /// Resolve a fixed reference entry (rivets, tape, foil, ...)
    pub fn reference(&self, item: ReferenceItem) -> ReferencePrice {
        ReferencePrice::resolve(self, item)
    }

    /// New snapshot with `record` added or replaced.
    ///
    /// Records without a last-updated date are stamped with today's date.
    pub fn with_material(&self, mut record: MaterialRecord) -> Self {
        if record.key.is_empty() {
            record.key = record.article_number.clone();
        }
        if record.last_updated.is_none() {
            record.last_updated = Some(Utc::now().date_naive());
        }
        let mut records = self.records.clone();
        records.insert(record.key.clone(), record);
        MaterialCatalog { records }
    }

    /// New snapshot with the category of `key` replaced
    pub fn with_category(&self, key: &str, category: MaterialCategory) -> CalcResult<Self> {
        self.with_patched(key, |record| record.category = category)
    }

    /// New snapshot with the last-updated date of `key` replaced
    pub fn with_updated(&self, key: &str, date: NaiveDate) -> CalcResult<Self> {
        self.with_patched(key, |record| record.last_updated = Some(date))
    }

    fn with_patched(&self, key: &str, patch: impl FnOnce(&mut MaterialRecord)) -> CalcResult<Self> {
        let mut records = self.records.clone();
        let record = records
            .get_mut(key)
            .ok_or_else(|| CalcError::unknown_material(key))?;
        patch(record);
        Ok(MaterialCatalog { records })
    }

    /// Base material choices as `(key, "article - name")`
    pub fn base_material_options(&self) -> Vec<(String, String)> {
        self.iter()
            .filter(|r| r.category.role() == MaterialRole::BaseInsulation)
            .map(|r| (r.key.clone(), r.option_label()))
            .collect()
    }

    /// Cladding choices as `(key, name)`. Only aluminum cladding is offered.
    pub fn cladding_options(&self) -> Vec<(String, String)> {
        self.iter()
            .filter(|r| r.category.is_aluminum_cladding())
            .map(|r| (r.key.clone(), r.name.clone()))
            .collect()
    }

    /// Distinct categories in use, excluding cladding and accessories
    pub fn material_types(&self) -> Vec<MaterialCategory> {
        self.iter()
            .map(|r| r.category)
            .filter(|c| {
                !matches!(
                    c,
                    MaterialCategory::Accessory
                        | MaterialCategory::AluminumCladding
                        | MaterialCategory::SheetCladding
                )
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
