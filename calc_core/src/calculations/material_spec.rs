//! # Material Specification
//!
//! Groups the materials of many derived line items into one specification
//! row per material role and key.
//!
//! Every line item is first broken into [`Contribution`]s (one per group it
//! touches). Aggregation is a pure fold of those contributions into rows keyed
//! by [`GroupKey`], so the sum of all row costs always equals the sum of all
//! per-item contribution costs, and aggregating the same items twice yields
//! identical rows. Every row cost is its quantity times its unit price.
//!
//! | Group        | Key            | Quantity                         | Unit |
//! |--------------|----------------|----------------------------------|------|
//! | Base         | `base_<key>`   | area (pipe) or length (duct)     | m² / m |
//! | Extra layer  | `layer_<key>`  | layer thickness + allowance      | mm   |
//! | Cladding     | `yt_<key>`     | cladding area                    | m²   |
//! | Rivets       | `popnit`       | cladding area / 100 (aluminum)   | box  |
//! | Spool wire   | `spool`        | spool wire weight                | kg   |
//! | Tape         | `tejp`         | tape rolls                       | roll |
//! | Foil         | `folie`        | foil area                        | m²   |
//! | Banding      | `band`         | band length                      | m    |
//!
//! ## Example
//!
//! ```rust
//! use calc_core::calculations::line_item::{calculate, LineItemInput};
//! use calc_core::calculations::material_spec::{aggregate, total_cost};
//! use calc_core::materials::default_catalog;
//!
//! let catalog = default_catalog().unwrap();
//! let input = LineItemInput {
//!     material_key: Some("4010130".to_string()),
//!     length_m: 10.0,
//!     dimension_mm: 100.0,
//!     ..Default::default()
//! };
//! let item = calculate(&input, catalog).unwrap();
//!
//! let rows = aggregate(&[item.clone(), item], catalog);
//! assert_eq!(rows.len(), 1);
//! assert_eq!(rows[0].group_key, "base_4010130");
//! assert!(total_cost(&rows) > 0.0);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::line_item::{DerivedLineItem, LineItemInput, PipeType};
use crate::materials::{MaterialCatalog, ReferenceItem, ReferencePrice};

/// Rivet boxes per m² of aluminum cladding
pub const RIVET_BOXES_PER_M2: f64 = 1.0 / 100.0;

/// Structured group key: material role plus material key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GroupKey {
    Base(String),
    Layer(String),
    Cladding(String),
    Rivets,
    Spool,
    Tape,
    Foil,
    Band,
}

impl GroupKey {
    /// Parse a legacy string key (`base_<key>`, `yt_<key>`, `tejp`, ...)
    pub fn parse(s: &str) -> Option<Self> {
        if let Some(key) = s.strip_prefix("base_") {
            return Some(GroupKey::Base(key.to_string()));
        }
        if let Some(key) = s.strip_prefix("layer_") {
            return Some(GroupKey::Layer(key.to_string()));
        }
        if let Some(key) = s.strip_prefix("yt_") {
            return Some(GroupKey::Cladding(key.to_string()));
        }
        match s {
            "popnit" => Some(GroupKey::Rivets),
            "spool" => Some(GroupKey::Spool),
            "tejp" => Some(GroupKey::Tape),
            "folie" => Some(GroupKey::Foil),
            "band" => Some(GroupKey::Band),
            _ => None,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Base(key) => write!(f, "base_{}", key),
            GroupKey::Layer(key) => write!(f, "layer_{}", key),
            GroupKey::Cladding(key) => write!(f, "yt_{}", key),
            GroupKey::Rivets => write!(f, "popnit"),
            GroupKey::Spool => write!(f, "spool"),
            GroupKey::Tape => write!(f, "tejp"),
            GroupKey::Foil => write!(f, "folie"),
            GroupKey::Band => write!(f, "band"),
        }
    }
}

/// What one line item adds to one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub key: GroupKey,
    pub name: String,
    pub article_number: String,
    pub last_updated: Option<NaiveDate>,
    pub quantity: f64,
    pub unit: String,
    /// Resolved price: override if present, else catalog default
    pub unit_price: f64,
    /// quantity × unit_price
    pub cost: f64,
}

impl Contribution {
    fn from_reference(key: GroupKey, reference: ReferencePrice, quantity: f64) -> Self {
        Contribution {
            key,
            name: reference.name,
            article_number: reference.article_number,
            last_updated: reference.last_updated,
            quantity,
            unit: reference.item.unit().to_string(),
            unit_price: reference.unit_price,
            cost: quantity * reference.unit_price,
        }
    }
}

/// One row of the material specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    /// Legacy string form of the group key, e.g. `base_4010130`
    pub group_key: String,
    pub name: String,
    pub article_number: String,
    pub last_updated: Option<NaiveDate>,
    pub quantity: f64,
    pub unit: String,
    /// Price of the first contribution to this group
    pub unit_price: f64,
    pub total_cost: f64,
}

/// Per-item cost split. Material is the item's area-based base cost; the
/// rest are summed from the item's contributions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LineCosts {
    pub material: f64,
    pub layers: f64,
    pub cladding: f64,
    pub rivets: f64,
    pub tape: f64,
    pub spool: f64,
    pub band: f64,
    pub foil: f64,
}

impl LineCosts {
    pub fn total(&self) -> f64 {
        self.material + self.layers + self.cladding + self.rivets + self.tape + self.spool + self.band + self.foil
    }

    /// Base material and extra layers
    pub fn insulation(&self) -> f64 {
        self.material + self.layers
    }

    /// Cladding sheet and rivets
    pub fn cladding_total(&self) -> f64 {
        self.cladding + self.rivets
    }

    /// Tape, spool wire, banding and foil
    pub fn accessories(&self) -> f64 {
        self.tape + self.spool + self.band + self.foil
    }
}

/// Break one derived line item into its group contributions.
///
/// Missing catalog entries never fail: unknown materials price at 0.
pub fn contributions(item: &DerivedLineItem, catalog: &MaterialCatalog) -> Vec<Contribution> {
    let mut out = Vec::new();

    // Base material
    let base = catalog.get(&item.base_key);
    let (quantity, unit) = match item.pipe_type() {
        PipeType::Pipe => (item.quantity_m2, "m²"),
        PipeType::Duct => (item.length_m(), "m"),
    };
    let default_price = base.map_or(0.0, |r| r.unit_cost);
    let price = item.input.base_price_override.unwrap_or(default_price);
    out.push(Contribution {
        key: GroupKey::Base(item.base_key.clone()),
        name: base.map_or_else(|| item.display_name.clone(), |r| r.name.clone()),
        article_number: base.map_or_else(|| item.base_key.clone(), |r| r.article_number.clone()),
        last_updated: base.and_then(|r| r.last_updated),
        quantity,
        unit: unit.to_string(),
        unit_price: price,
        cost: quantity * price,
    });

    // Cladding and rivets. Ducts carry no cladding area.
    if let Some(cladding) = item.cladding.as_ref().filter(|c| c.area_m2 > 0.0) {
        let record = catalog.get(&cladding.material_key);
        let price = record.map_or(0.0, |r| r.unit_cost);
        out.push(Contribution {
            key: GroupKey::Cladding(cladding.material_key.clone()),
            name: record.map_or_else(|| cladding.name.clone(), |r| r.name.clone()),
            article_number: record.map_or_else(|| cladding.material_key.clone(), |r| r.article_number.clone()),
            last_updated: record.and_then(|r| r.last_updated),
            quantity: cladding.area_m2,
            unit: "m²".to_string(),
            unit_price: price,
            cost: cladding.area_m2 * price,
        });

        if cladding.category.is_aluminum_cladding() {
            out.push(Contribution::from_reference(
                GroupKey::Rivets,
                catalog.reference(ReferenceItem::Rivets),
                cladding.area_m2 * RIVET_BOXES_PER_M2,
            ));
        }
    }

    // Extra layers
    for layer in &item.layers {
        let record = catalog.get(&layer.material_key);
        let price = layer
            .price_override
            .unwrap_or_else(|| record.map_or(0.0, |r| r.unit_cost));
        let quantity = layer.insulation_mm + layer.accessory_allowance_mm;
        out.push(Contribution {
            key: GroupKey::Layer(layer.material_key.clone()),
            name: layer.name.clone(),
            article_number: record.map_or_else(|| layer.material_key.clone(), |r| r.article_number.clone()),
            last_updated: record.and_then(|r| r.last_updated),
            quantity,
            unit: "mm".to_string(),
            unit_price: price,
            cost: quantity * price,
        });
    }

    if item.spool_wire_kg > 0.0 {
        out.push(Contribution::from_reference(
            GroupKey::Spool,
            catalog.reference(ReferenceItem::SpoolWire),
            item.spool_wire_kg,
        ));
    }

    if charges_tape(item) {
        out.push(Contribution::from_reference(
            GroupKey::Tape,
            catalog.reference(ReferenceItem::Tape),
            f64::from(item.tape_rolls),
        ));
    }

    if item.foil_area_m2 > 0.0 {
        out.push(Contribution::from_reference(
            GroupKey::Foil,
            catalog.reference(ReferenceItem::Foil),
            item.foil_area_m2,
        ));
    }

    if item.input.banding && item.band_length_m > 0.0 {
        out.push(Contribution::from_reference(
            GroupKey::Band,
            catalog.reference(ReferenceItem::Banding),
            item.band_length_m,
        ));
    }

    out
}

/// Whether tape is charged for this item.
///
/// Tape rolls are computed for every pipe, but they are only charged for
/// clad pipes whose base material is a lamella mat or a fire mat. Every
/// charged roll is priced from the one fixed tape entry.
pub fn charges_tape(item: &DerivedLineItem) -> bool {
    item.pipe_type() == PipeType::Pipe
        && item.tape_rolls > 0
        && item.cladding.is_some()
        && item.base_category.needs_seam_tape()
}

/// Cost split for one item.
///
/// The base component is the item's own `material_cost`, which is billed by
/// area for pipes and ducts alike. For ducts this differs from the `base_`
/// row, which counts running meters.
pub fn line_costs(item: &DerivedLineItem, catalog: &MaterialCatalog) -> LineCosts {
    let base = LineCosts {
        material: item.material_cost,
        ..LineCosts::default()
    };
    contributions(item, catalog)
        .into_iter()
        .fold(base, |mut costs, c| {
            let slot = match c.key {
                GroupKey::Base(_) => return costs,
                GroupKey::Layer(_) => &mut costs.layers,
                GroupKey::Cladding(_) => &mut costs.cladding,
                GroupKey::Rivets => &mut costs.rivets,
                GroupKey::Spool => &mut costs.spool,
                GroupKey::Tape => &mut costs.tape,
                GroupKey::Foil => &mut costs.foil,
                GroupKey::Band => &mut costs.band,
            };
            *slot += c.cost;
            costs
        })
}

#[derive(Default)]
struct Accumulator {
    rows: Vec<SummaryRow>,
    index: HashMap<GroupKey, usize>,
}

impl Accumulator {
    fn merge(mut self, c: Contribution) -> Self {
        match self.index.get(&c.key) {
            Some(&i) => {
                let row = &mut self.rows[i];
                row.quantity += c.quantity;
                row.total_cost += c.cost;
            }
            None => {
                self.index.insert(c.key.clone(), self.rows.len());
                self.rows.push(SummaryRow {
                    group_key: c.key.to_string(),
                    name: c.name,
                    article_number: c.article_number,
                    last_updated: c.last_updated,
                    quantity: c.quantity,
                    unit: c.unit,
                    unit_price: c.unit_price,
                    total_cost: c.cost,
                });
            }
        }
        self
    }
}

/// Aggregate derived line items into material specification rows.
///
/// Rows appear in first-seen order. A group's unit price is taken from its
/// first contribution; later contributions add their own cost.
pub fn aggregate(items: &[DerivedLineItem], catalog: &MaterialCatalog) -> Vec<SummaryRow> {
    let rows = items
        .iter()
        .flat_map(|item| contributions(item, catalog))
        .fold(Accumulator::default(), Accumulator::merge)
        .rows;

    tracing::debug!(items = items.len(), rows = rows.len(), total = total_cost(&rows), "material specification aggregated");
    rows
}

/// Sum of all row costs
pub fn total_cost(rows: &[SummaryRow]) -> f64 {
    rows.iter().map(|r| r.total_cost).sum()
}

/// Apply `group_key → price` overrides to line item inputs.
///
/// `base_<key>` sets the base price of every item using that base material;
/// `layer_<key>` sets the price of every matching extra layer. Other group
/// keys have fixed reference prices and are ignored.
pub fn apply_price_overrides(items: &[LineItemInput], overrides: &BTreeMap<String, f64>) -> Vec<LineItemInput> {
    let parsed: Vec<(GroupKey, f64)> = overrides
        .iter()
        .filter_map(|(k, price)| GroupKey::parse(k).map(|key| (key, *price)))
        .collect();

    items
        .iter()
        .map(|item| {
            let mut item = item.clone();
            for (key, price) in &parsed {
                match key {
                    GroupKey::Base(material) if item.base_key() == Some(material.as_str()) => {
                        item.base_price_override = Some(*price);
                    }
                    GroupKey::Layer(material) => {
                        for layer in item.layers.iter_mut().filter(|l| &l.material_key == material) {
                            layer.price_override = Some(*price);
                        }
                    }
                    _ => {}
                }
            }
            item
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculations::line_item::{calculate, ExtraLayer};
    use crate::materials::{MaterialCategory, MaterialRecord};

    fn test_catalog() -> MaterialCatalog {
        MaterialCatalog::new(vec![
            MaterialRecord::new("R30", "Rörskål 30 mm", MaterialCategory::Insulation)
                .with_cost(85.0)
                .with_thickness(30.0)
                .with_labor(0.12, 0.05),
            MaterialRecord::new("LAM50", "Lamellmatta 50 mm", MaterialCategory::LamellaMat)
                .with_cost(96.0)
                .with_thickness(50.0),
            MaterialRecord::new("FM40", "Conlit brandmatta 40 mm", MaterialCategory::FireMat)
                .with_cost(110.0)
                .with_thickness(40.0),
            MaterialRecord::new("D25", "Kanalmatta 25 mm", MaterialCategory::Insulation)
                .with_cost(64.0)
                .with_thickness(25.0),
            MaterialRecord::new("N20", "Nätmatta 20 mm", MaterialCategory::Insulation)
                .with_cost(2.0)
                .with_thickness(20.0),
            MaterialRecord::new("ALU", "Aluminiumplåt", MaterialCategory::AluminumCladding).with_cost(165.0),
            MaterialRecord::new("ST", "Stålplåt", MaterialCategory::SheetCladding).with_cost(140.0),
            MaterialRecord::new("85329500", "Popnit", MaterialCategory::Accessory).with_cost(300.0),
            MaterialRecord::new("4023313", "Spoltråd", MaterialCategory::Consumable).with_cost(98.0),
            MaterialRecord::new("PTBCR07550", "Tejp Conlit", MaterialCategory::Consumable).with_cost(189.0),
            MaterialRecord::new("9556892", "Band", MaterialCategory::Consumable).with_cost(6.2),
        ])
    }

    fn pipe(key: &str) -> LineItemInput {
        LineItemInput {
            material_key: Some(key.to_string()),
            length_m: 10.0,
            dimension_mm: 100.0,
            ..Default::default()
        }
    }

    fn derive(inputs: &[LineItemInput], catalog: &MaterialCatalog) -> Vec<DerivedLineItem> {
        inputs.iter().map(|i| calculate(i, catalog).unwrap()).collect()
    }

    fn mixed_items(catalog: &MaterialCatalog) -> Vec<DerivedLineItem> {
        let mut clad = pipe("LAM50");
        clad.cladding_key = Some("ALU".to_string());
        clad.banding = true;
        clad.foil = true;
        clad.layers = vec![ExtraLayer { material_key: "N20".to_string(), accessory_allowance_mm: 5.0, price_override: None }];

        let mut steel = pipe("R30");
        steel.cladding_key = Some("ST".to_string());

        let duct = LineItemInput {
            pipe_type: PipeType::Duct,
            material_key: Some("D25".to_string()),
            length_m: 5.0,
            height_mm: 200.0,
            width_mm: 300.0,
            ..Default::default()
        };

        derive(&[clad, steel, pipe("R30"), duct, pipe("LAM50")], catalog)
    }

    fn row<'a>(rows: &'a [SummaryRow], key: &str) -> Option<&'a SummaryRow> {
        rows.iter().find(|r| r.group_key == key)
    }

    #[test]
    fn test_group_key_strings() {
        for key in [
            GroupKey::Base("R30".to_string()),
            GroupKey::Layer("N20".to_string()),
            GroupKey::Cladding("ALU".to_string()),
            GroupKey::Rivets,
            GroupKey::Spool,
            GroupKey::Tape,
            GroupKey::Foil,
            GroupKey::Band,
        ] {
            assert_eq!(GroupKey::parse(&key.to_string()), Some(key));
        }
        assert_eq!(GroupKey::Cladding("ALU".to_string()).to_string(), "yt_ALU");
        assert_eq!(GroupKey::parse("unknown"), None);
    }

    #[test]
    fn test_same_base_accumulates() {
        let catalog = test_catalog();
        let items = derive(&[pipe("R30"), pipe("R30")], &catalog);
        let rows = aggregate(&items, &catalog);

        assert_eq!(rows.len(), 1);
        let base = &rows[0];
        assert_eq!(base.group_key, "base_R30");
        assert_eq!(base.unit, "m²");
        assert!((base.quantity - 2.0 * items[0].quantity_m2).abs() < 1e-9);
        assert!((base.total_cost - base.quantity * 85.0).abs() < 1e-9);
    }

    #[test]
    fn test_duct_base_uses_length() {
        let catalog = test_catalog();
        let rows = aggregate(&mixed_items(&catalog), &catalog);
        let duct = row(&rows, "base_D25").unwrap();
        assert_eq!(duct.unit, "m");
        assert_eq!(duct.quantity, 5.0);
        assert_eq!(duct.total_cost, 5.0 * 64.0);
    }

    #[test]
    fn test_idempotent() {
        let catalog = test_catalog();
        let items = mixed_items(&catalog);
        let first = aggregate(&items, &catalog);
        let second = aggregate(&items, &catalog);
        assert_eq!(first, second);

        let mut keys: Vec<&str> = first.iter().map(|r| r.group_key.as_str()).collect();
        let before = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), before);
    }

    #[test]
    fn test_rows_match_derived_pipe_costs() {
        let catalog = test_catalog();
        let items: Vec<DerivedLineItem> = mixed_items(&catalog)
            .into_iter()
            .filter(|i| i.pipe_type() == PipeType::Pipe)
            .collect();
        let rows = aggregate(&items, &catalog);

        let expected: f64 = items
            .iter()
            .map(|i| {
                let rivets = i
                    .cladding
                    .as_ref()
                    .filter(|c| c.category.is_aluminum_cladding())
                    .map_or(0.0, |c| c.area_m2 / 100.0 * 300.0);
                let tape = if i.cladding.is_some() && i.base_category.needs_seam_tape() {
                    f64::from(i.tape_rolls) * 189.0
                } else {
                    0.0
                };
                let layers: f64 = i
                    .layers
                    .iter()
                    .map(|l| (l.insulation_mm + l.accessory_allowance_mm) * 2.0)
                    .sum();
                i.material_cost
                    + i.cladding_cost()
                    + rivets
                    + tape
                    + i.spool_wire_kg * 98.0
                    + i.band_length_m * 6.2
                    + i.foil_area_m2 * 50.0
                    + layers
            })
            .sum();

        assert!(expected > 0.0);
        assert!((total_cost(&rows) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_duct_line_cost_is_area_based() {
        let catalog = test_catalog();
        let duct = LineItemInput {
            pipe_type: PipeType::Duct,
            material_key: Some("D25".to_string()),
            length_m: 10.0,
            height_mm: 200.0,
            width_mm: 300.0,
            ..Default::default()
        };
        let items = derive(&[duct], &catalog);
        let rows = aggregate(&items, &catalog);

        // 2 × 10 m × (0.2 + 0.3 + 0.1) m = 12 m²
        let costs = line_costs(&items[0], &catalog);
        assert!((costs.material - 12.0 * 64.0).abs() < 1e-9);
        assert_eq!(costs.material, items[0].material_cost);

        let base = row(&rows, "base_D25").unwrap();
        assert_eq!(base.quantity, 10.0);
        assert_eq!(base.total_cost, 640.0);
    }

    #[test]
    fn test_rivets_only_for_aluminum() {
        let catalog = test_catalog();
        let rows = aggregate(&mixed_items(&catalog), &catalog);

        let rivets = row(&rows, "popnit").unwrap();
        let alu = row(&rows, "yt_ALU").unwrap();
        assert_eq!(rivets.unit, "box");
        assert!((rivets.quantity - alu.quantity / 100.0).abs() < 1e-12);
        assert!((rivets.total_cost - rivets.quantity * 300.0).abs() < 1e-9);

        let mut steel = pipe("R30");
        steel.cladding_key = Some("ST".to_string());
        let rows = aggregate(&derive(&[steel], &catalog), &catalog);
        assert!(row(&rows, "yt_ST").is_some());
        assert!(row(&rows, "popnit").is_none());
    }

    #[test]
    fn test_no_cladding_no_cladding_rows() {
        let catalog = test_catalog();
        let items = derive(&[pipe("R30"), pipe("LAM50")], &catalog);
        let rows = aggregate(&items, &catalog);

        assert!(rows.iter().all(|r| !r.group_key.starts_with("yt_")));
        assert!(row(&rows, "popnit").is_none());
        assert!(row(&rows, "tejp").is_none());
        // Spool wire still applies to the lamella mat
        assert!(row(&rows, "spool").is_some());
    }

    #[test]
    fn test_tape_charged_for_clad_mats() {
        let catalog = test_catalog();
        let mut clad = pipe("LAM50");
        clad.cladding_key = Some("ALU".to_string());
        let items = derive(&[clad], &catalog);
        let rows = aggregate(&items, &catalog);

        let tape = row(&rows, "tejp").unwrap();
        assert_eq!(tape.unit, "roll");
        assert_eq!(tape.quantity, f64::from(items[0].tape_rolls));
        assert_eq!(tape.unit_price, 189.0);
        assert_eq!(tape.article_number, "PTBCR07550");
    }

    #[test]
    fn test_lamella_and_fire_mat_tape_share_one_row() {
        let catalog = test_catalog();
        let mut lamella = pipe("LAM50");
        lamella.length_m = 100.0;
        lamella.cladding_key = Some("ALU".to_string());
        let mut fire = pipe("FM40");
        fire.length_m = 100.0;
        fire.cladding_key = Some("ALU".to_string());

        let items = derive(&[lamella, fire], &catalog);
        let rows = aggregate(&items, &catalog);

        let tape = row(&rows, "tejp").unwrap();
        let rolls: u32 = items.iter().map(|i| i.tape_rolls).sum();
        assert!(items.iter().all(|i| i.tape_rolls > 0));
        assert_eq!(tape.quantity, f64::from(rolls));
        assert_eq!(tape.unit_price, 189.0);
        assert!((tape.total_cost - tape.quantity * tape.unit_price).abs() < 1e-9);
    }

    #[test]
    fn test_duct_cladding_adds_no_rows() {
        let catalog = test_catalog();
        let duct = LineItemInput {
            pipe_type: PipeType::Duct,
            material_key: Some("D25".to_string()),
            cladding_key: Some("ALU".to_string()),
            length_m: 5.0,
            height_mm: 200.0,
            width_mm: 300.0,
            ..Default::default()
        };
        let rows = aggregate(&derive(&[duct], &catalog), &catalog);

        assert!(rows.iter().all(|r| !r.group_key.starts_with("yt_")));
        assert!(row(&rows, "popnit").is_none());
        assert!(rows.iter().all(|r| r.quantity > 0.0));
    }

    #[test]
    fn test_layer_rows() {
        let catalog = test_catalog();
        let rows = aggregate(&mixed_items(&catalog), &catalog);
        let layer = row(&rows, "layer_N20").unwrap();
        assert_eq!(layer.unit, "mm");
        assert_eq!(layer.quantity, 25.0);
        assert_eq!(layer.total_cost, 50.0);
    }

    #[test]
    fn test_foil_fallback_price() {
        let catalog = test_catalog();
        let mut input = pipe("R30");
        input.foil = true;
        let items = derive(&[input], &catalog);
        let rows = aggregate(&items, &catalog);

        let foil = row(&rows, "folie").unwrap();
        assert_eq!(foil.unit_price, 50.0);
        assert_eq!(foil.article_number, "4025571");
        assert!((foil.quantity - items[0].foil_area_m2).abs() < 1e-12);
    }

    #[test]
    fn test_price_overrides() {
        let catalog = test_catalog();
        let mut with_layer = pipe("R30");
        with_layer.layers = vec![ExtraLayer::new("N20")];
        let inputs = vec![with_layer, pipe("R30"), pipe("LAM50")];

        let mut overrides = BTreeMap::new();
        overrides.insert("base_R30".to_string(), 100.0);
        overrides.insert("layer_N20".to_string(), 3.0);
        overrides.insert("tejp".to_string(), 1.0);
        let adjusted = apply_price_overrides(&inputs, &overrides);

        assert_eq!(adjusted[0].base_price_override, Some(100.0));
        assert_eq!(adjusted[0].layers[0].price_override, Some(3.0));
        assert_eq!(adjusted[1].base_price_override, Some(100.0));
        assert_eq!(adjusted[2].base_price_override, None);
        // Inputs are not modified
        assert_eq!(inputs[0].base_price_override, None);

        let rows = aggregate(&derive(&adjusted, &catalog), &catalog);
        let base = row(&rows, "base_R30").unwrap();
        assert_eq!(base.unit_price, 100.0);
        assert!((base.total_cost - base.quantity * 100.0).abs() < 1e-9);
        assert_eq!(row(&rows, "layer_N20").unwrap().unit_price, 3.0);
    }

    #[test]
    fn test_first_price_wins() {
        let catalog = test_catalog();
        let mut first = pipe("R30");
        first.base_price_override = Some(90.0);
        let items = derive(&[first, pipe("R30")], &catalog);
        let rows = aggregate(&items, &catalog);

        let base = row(&rows, "base_R30").unwrap();
        assert_eq!(base.unit_price, 90.0);
        let expected = items[0].quantity_m2 * 90.0 + items[1].quantity_m2 * 85.0;
        assert!((base.total_cost - expected).abs() < 1e-9);
    }
}
