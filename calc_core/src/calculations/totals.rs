//! # Bid Totals
//!
//! Rolls the material specification, the derived line items and the bid
//! parameters up into the final price breakdown.
//!
//! ## Formulas
//!
//! ```text
//! material      = Σ per-item subtotals, each rounded to a whole unit
//! work time     = Σ item work time × multiplier × (1 + surcharge/100) + extra hours
//! labor rate    = hourly wage × 1.70
//! diverse       = material × 0.015
//! vehicle       = vehicle days × 400
//! work cost     = labor + subcontractors + diverse + vehicle
//! final price   = (material + work cost) / (1 − coverage)   when coverage < 1
//!               = 0                                          otherwise
//! ```

use serde::{Deserialize, Serialize};

use super::line_item::DerivedLineItem;
use super::material_spec::{line_costs, total_cost, LineCosts, SummaryRow};
use crate::bid::BidParameters;
use crate::materials::MaterialCatalog;

/// Social charges and overhead on top of the hourly wage
pub const LABOR_OVERHEAD_FACTOR: f64 = 1.70;

/// Miscellaneous cost as a share of material cost
pub const DIVERSE_COST_RATE: f64 = 0.015;

/// Vehicle cost per day
pub const VEHICLE_DAY_RATE: f64 = 400.0;

/// Cost and work time of one line item for the detailed breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineBreakdown {
    pub display_name: String,
    pub object: Option<String>,
    pub section: Option<String>,
    pub length_m: f64,
    pub quantity_m2: f64,
    pub costs: LineCosts,
    /// Sum of all cost components, rounded to a whole unit
    pub subtotal: f64,
    pub insulation_h: f64,
    pub cladding_h: f64,
    pub band_h: f64,
    pub foil_h: f64,
    pub work_time_h: f64,
}

impl LineBreakdown {
    pub fn from_item(item: &DerivedLineItem, catalog: &MaterialCatalog) -> Self {
        let costs = line_costs(item, catalog);
        LineBreakdown {
            display_name: item.display_name.clone(),
            object: item.input.object.clone(),
            section: item.input.section.clone(),
            length_m: item.length_m(),
            quantity_m2: item.quantity_m2,
            subtotal: costs.total().round(),
            costs,
            insulation_h: item.labor.insulation_h,
            cladding_h: item.labor.cladding_h,
            band_h: item.labor.band_h,
            foil_h: item.foil_labor_h(),
            work_time_h: item.work_time_h(),
        }
    }
}

/// Material cost split for the summary view
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MaterialSplit {
    /// Base materials and extra layers
    pub insulation: f64,
    /// Cladding sheet and rivets
    pub cladding: f64,
    /// Tape, spool wire, banding and foil
    pub accessories: f64,
}

/// Final price breakdown of a bid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    /// Parameters the breakdown was computed with
    pub parameters: BidParameters,

    pub material: MaterialSplit,
    /// Unrounded sum of the material specification rows
    pub specification_cost: f64,
    /// Sum of the rounded per-item subtotals
    pub total_material_cost: f64,

    pub work_time_raw_h: f64,
    pub total_work_time_h: f64,
    pub labor_cost_per_hour: f64,
    pub total_labor_cost: f64,

    pub total_subcontractor_cost: f64,
    pub diverse_cost: f64,
    pub vehicle_cost: f64,
    pub total_work_cost: f64,

    /// Material plus work cost, before coverage
    pub total_cost: f64,
    pub coverage_rate: f64,
    pub final_price: f64,

    pub total_length_m: f64,
    pub labor_cost_per_meter: f64,
    pub price_per_meter: f64,

    pub lines: Vec<LineBreakdown>,
}

/// Sale price that leaves `coverage_rate` of the price as margin.
///
/// Returns 0 when the rate is 1 or more.
pub fn final_price(total_cost: f64, coverage_rate: f64) -> f64 {
    if coverage_rate < 1.0 {
        total_cost / (1.0 - coverage_rate)
    } else {
        tracing::warn!(coverage_rate, total_cost, "coverage rate is 100 % or more, final price set to 0");
        0.0
    }
}

fn per_meter(value: f64, length_m: f64) -> f64 {
    if length_m > 0.0 {
        value / length_m
    } else {
        0.0
    }
}

/// Roll a bid up into its final price breakdown.
pub fn roll_up(
    rows: &[SummaryRow],
    items: &[DerivedLineItem],
    params: &BidParameters,
    catalog: &MaterialCatalog,
) -> PriceBreakdown {
    let lines: Vec<LineBreakdown> = items.iter().map(|item| LineBreakdown::from_item(item, catalog)).collect();
    let specification_cost = total_cost(rows);

    let material = lines.iter().fold(MaterialSplit::default(), |mut split, line| {
        split.insulation += line.costs.insulation();
        split.cladding += line.costs.cladding_total();
        split.accessories += line.costs.accessories();
        split
    });
    let total_material_cost: f64 = lines.iter().map(|l| l.subtotal).sum();

    let work_time_raw_h: f64 = lines.iter().map(|l| l.work_time_h).sum();
    let total_work_time_h = work_time_raw_h
        * params.multiplier
        * (1.0 + params.height_surcharge_percent / 100.0)
        + params.extra_hours;

    let labor_cost_per_hour = params.hourly_wage * LABOR_OVERHEAD_FACTOR;
    let total_labor_cost = total_work_time_h * labor_cost_per_hour;
    let total_subcontractor_cost = params.subcontractor_total();
    let diverse_cost = total_material_cost * DIVERSE_COST_RATE;
    let vehicle_cost = params.vehicle_days * VEHICLE_DAY_RATE;
    let total_work_cost = total_labor_cost + total_subcontractor_cost + diverse_cost + vehicle_cost;

    let total_cost = total_material_cost + total_work_cost;
    let coverage_rate = params.coverage_rate();
    let final_price = final_price(total_cost, coverage_rate);

    let total_length_m: f64 = items.iter().map(|i| i.length_m()).sum();

    tracing::debug!(
        items = items.len(),
        total_material_cost,
        total_work_time_h,
        final_price,
        "bid rolled up"
    );

    PriceBreakdown {
        parameters: params.clone(),
        material,
        specification_cost,
        total_material_cost,
        work_time_raw_h,
        total_work_time_h,
        labor_cost_per_hour,
        total_labor_cost,
        total_subcontractor_cost,
        diverse_cost,
        vehicle_cost,
        total_work_cost,
        total_cost,
        coverage_rate,
        final_price,
        total_length_m,
        labor_cost_per_meter: per_meter(total_labor_cost, total_length_m),
        price_per_meter: per_meter(final_price, total_length_m),
        lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculations::line_item::{calculate, LineItemInput, PipeType};
    use crate::calculations::material_spec::aggregate;
    use crate::materials::{MaterialCategory, MaterialRecord};

    fn test_catalog() -> MaterialCatalog {
        MaterialCatalog::new(vec![
            MaterialRecord::new("R30", "Rörskål 30 mm", MaterialCategory::Insulation)
                .with_cost(85.0)
                .with_thickness(30.0)
                .with_labor(0.12, 0.05),
            MaterialRecord::new("D25", "Kanalmatta 25 mm", MaterialCategory::Insulation)
                .with_cost(64.0)
                .with_thickness(25.0),
            MaterialRecord::new("ALU", "Aluminiumplåt", MaterialCategory::AluminumCladding).with_cost(165.0),
            MaterialRecord::new("85329500", "Popnit", MaterialCategory::Accessory).with_cost(300.0),
            MaterialRecord::new("9556892", "Band", MaterialCategory::Consumable).with_cost(6.2),
        ])
    }

    fn items(catalog: &MaterialCatalog) -> Vec<DerivedLineItem> {
        let plain = LineItemInput {
            material_key: Some("R30".to_string()),
            length_m: 10.0,
            dimension_mm: 100.0,
            ..Default::default()
        };
        let clad = LineItemInput {
            cladding_key: Some("ALU".to_string()),
            banding: true,
            foil: true,
            length_m: 20.0,
            ..plain.clone()
        };
        vec![calculate(&plain, catalog).unwrap(), calculate(&clad, catalog).unwrap()]
    }

    fn breakdown(params: &BidParameters) -> PriceBreakdown {
        let catalog = test_catalog();
        let items = items(&catalog);
        let rows = aggregate(&items, &catalog);
        roll_up(&rows, &items, params, &catalog)
    }

    #[test]
    fn test_final_price_with_coverage() {
        // 1000 material + 500 work at 20 % coverage
        assert!((final_price(1500.0, 0.20) - 1875.0).abs() < 1e-9);
        assert_eq!(final_price(1500.0, 0.0), 1500.0);
    }

    #[test]
    fn test_coverage_at_or_above_one_is_zero() {
        assert_eq!(final_price(1500.0, 1.0), 0.0);
        assert_eq!(final_price(1500.0, 1.5), 0.0);

        let params = BidParameters { coverage_percent: 100.0, ..Default::default() };
        let result = breakdown(&params);
        assert!(result.total_cost > 0.0);
        assert_eq!(result.final_price, 0.0);
        assert_eq!(result.price_per_meter, 0.0);
    }

    #[test]
    fn test_material_is_sum_of_rounded_subtotals() {
        let result = breakdown(&BidParameters::default());
        let expected: f64 = result.lines.iter().map(|l| l.costs.total().round()).sum();
        assert_eq!(result.total_material_cost, expected);
        assert!(result.lines.iter().all(|l| l.subtotal.fract() == 0.0));

        // Rounding is per item, so the gap to the row sum is at most 0.5 per item
        let gap = (result.total_material_cost - result.specification_cost).abs();
        assert!(gap <= 0.5 * result.lines.len() as f64);

        let split = result.material;
        assert!((split.insulation + split.cladding + split.accessories - result.specification_cost).abs() < 1e-6);
        assert!(split.cladding > 0.0);
    }

    #[test]
    fn test_duct_material_billed_by_area() {
        let catalog = test_catalog();
        let duct = LineItemInput {
            pipe_type: PipeType::Duct,
            material_key: Some("D25".to_string()),
            length_m: 10.0,
            height_mm: 200.0,
            width_mm: 300.0,
            ..Default::default()
        };
        let items = vec![calculate(&duct, &catalog).unwrap()];
        let rows = aggregate(&items, &catalog);
        let result = roll_up(&rows, &items, &BidParameters::default(), &catalog);

        // 12 m² at 64, while the base row counts 10 running meters
        assert_eq!(result.total_material_cost, 768.0);
        assert_eq!(result.total_material_cost, items[0].material_cost.round());
        assert_eq!(result.specification_cost, 640.0);
        assert!((result.material.insulation - 768.0).abs() < 1e-9);
    }

    #[test]
    fn test_default_parameters() {
        let result = breakdown(&BidParameters::default());

        assert!((result.labor_cost_per_hour - 252.0 * 1.70).abs() < 1e-9);
        assert!((result.total_work_time_h - result.work_time_raw_h).abs() < 1e-12);
        assert!((result.total_labor_cost - result.total_work_time_h * 428.4).abs() < 1e-6);
        assert_eq!(result.vehicle_cost, 0.0);
        assert_eq!(result.total_subcontractor_cost, 0.0);
        assert!((result.diverse_cost - result.total_material_cost * 0.015).abs() < 1e-9);
        assert!((result.final_price - result.total_cost).abs() < 1e-9);
        assert_eq!(result.total_length_m, 30.0);
    }

    #[test]
    fn test_work_time_scaling() {
        let params = BidParameters {
            multiplier: 1.5,
            height_surcharge_percent: 10.0,
            extra_hours: 8.0,
            ..Default::default()
        };
        let result = breakdown(&params);
        let expected = result.work_time_raw_h * 1.5 * 1.1 + 8.0;
        assert!((result.total_work_time_h - expected).abs() < 1e-9);

        let raw: f64 = result.lines.iter().map(|l| l.insulation_h + l.cladding_h + l.band_h + l.foil_h).sum();
        assert!((result.work_time_raw_h - raw).abs() < 1e-12);
    }

    #[test]
    fn test_work_cost_components() {
        let params = BidParameters {
            hourly_wage: 300.0,
            vehicle_days: 3.0,
            subcontractor_material: 1000.0,
            subcontractor_hours: 200.0,
            subcontractor_mounting: 50.0,
            subcontractor_fabrication: 25.0,
            coverage_percent: 20.0,
            ..Default::default()
        };
        let result = breakdown(&params);

        assert_eq!(result.vehicle_cost, 1200.0);
        assert_eq!(result.total_subcontractor_cost, 1275.0);
        assert!((result.labor_cost_per_hour - 510.0).abs() < 1e-9);
        let work = result.total_labor_cost + 1275.0 + result.diverse_cost + 1200.0;
        assert!((result.total_work_cost - work).abs() < 1e-9);
        assert!((result.final_price - (result.total_material_cost + work) / 0.8).abs() < 1e-6);
        assert!((result.price_per_meter - result.final_price / 30.0).abs() < 1e-9);
        assert!((result.labor_cost_per_meter - result.total_labor_cost / 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_bid() {
        let catalog = test_catalog();
        let result = roll_up(&[], &[], &BidParameters::default(), &catalog);
        assert_eq!(result.total_material_cost, 0.0);
        assert_eq!(result.total_length_m, 0.0);
        assert_eq!(result.labor_cost_per_meter, 0.0);
        assert_eq!(result.price_per_meter, 0.0);
        assert!(result.lines.is_empty());
    }
}
