//! # Line Item Calculation
//!
//! Derives quantities, material cost, consumables and labor time for one
//! insulated pipe or duct segment.
//!
//! ## Geometry
//!
//! - **Pipe**: outer diameter `D = (dimension + 2 × total insulation) / 1000`,
//!   insulated area `π × D × L`
//! - **Duct**: `2 × L × (height + width + 4 × base insulation) / 1000`
//!
//! ## Consumables (pipes only)
//!
//! - Tape: one 50 m roll per started 50 m of `L × π × D`
//! - Banding: three turns per meter, `3 × π × D × L`
//! - Foil: insulated area plus 10 %
//! - Spool wire: five turns per meter for lamella and fire mats, 350 m/kg
//!
//! ## Example
//!
//! ```rust
//! use calc_core::calculations::line_item::{calculate, LineItemInput, PipeType};
//! use calc_core::materials::{MaterialCatalog, MaterialCategory, MaterialRecord};
//!
//! let catalog = MaterialCatalog::new(vec![
//!     MaterialRecord::new("R30", "Pipe section 30 mm", MaterialCategory::Insulation)
//!         .with_cost(85.0)
//!         .with_thickness(30.0)
//!         .with_labor(0.12, 0.05),
//! ]);
//!
//! let input = LineItemInput {
//!     pipe_type: PipeType::Pipe,
//!     material_key: Some("R30".to_string()),
//!     length_m: 10.0,
//!     dimension_mm: 100.0,
//!     ..Default::default()
//! };
//!
//! let item = calculate(&input, &catalog).unwrap();
//! assert!((item.outer_diameter_m.unwrap() - 0.16).abs() < 1e-9);
//! assert!((item.quantity_m2 - 5.0265).abs() < 1e-4);
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{CalcError, CalcResult};
use crate::materials::{MaterialCatalog, MaterialCategory, MaterialRecord};
use crate::units::{cylinder_surface, Meters, Millimeters};

/// Tape roll length (m)
pub const TAPE_ROLL_LENGTH_M: f64 = 50.0;

/// Spool wire turns per meter of pipe
pub const SPOOL_WIRE_TURNS: f64 = 5.0;

/// Spool wire yield (m per kg)
pub const SPOOL_WIRE_M_PER_KG: f64 = 350.0;

/// Foil area including 10 % overlap
pub const FOIL_OVERAGE: f64 = 1.1;

/// Band turns per meter of pipe
pub const BAND_TURNS: f64 = 3.0;

/// Banding labor (h per m of band)
pub const BAND_RATE_H_PER_M: f64 = 0.018;

/// Foil labor per meter of run (h/m)
pub const FOIL_RUN_RATE_H_PER_M: f64 = 0.03;

/// Foil labor per square meter (h/m²)
pub const FOIL_AREA_RATE_H_PER_M2: f64 = 0.049;

/// Segment geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PipeType {
    /// Circular cross-section
    #[default]
    #[serde(alias = "Rör")]
    Pipe,
    /// Rectangular cross-section
    #[serde(alias = "Kanal")]
    Duct,
}

impl PipeType {
    /// Parse form values ("Pipe", "Duct", "Rör", "Kanal"), case-insensitive
    pub fn from_str_flexible(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pipe" | "rör" | "ror" => Some(PipeType::Pipe),
            "duct" | "kanal" => Some(PipeType::Duct),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PipeType::Pipe => "Pipe",
            PipeType::Duct => "Duct",
        }
    }
}

/// Extra insulation layer on top of the base material
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtraLayer {
    pub material_key: String,

    /// Extra allowance added to the layer quantity (mm)
    #[serde(default)]
    pub accessory_allowance_mm: f64,

    #[serde(default)]
    pub price_override: Option<f64>,
}

impl ExtraLayer {
    pub fn new(material_key: impl Into<String>) -> Self {
        ExtraLayer {
            material_key: material_key.into(),
            ..Default::default()
        }
    }
}

/// Accessory counts. Quantities only, no formula applies.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessoryCounts {
    pub bends: f64,
    pub branches: f64,
    pub valve_caps: f64,
    pub flange_caps: f64,
    pub supports: f64,
}

/// Spacer choices, carried through unchanged
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Spacers {
    pub material: Option<String>,
    pub percent: Option<String>,
    pub ring: Option<String>,
}

/// User-entered line item.
///
/// ## JSON Example
///
/// ```json
/// {
///   "pipe_type": "Pipe",
///   "material_key": "4010130",
///   "length_m": 10.0,
///   "dimension_mm": 100.0,
///   "layers": [{ "material_key": "4030050", "accessory_allowance_mm": 5.0 }],
///   "cladding_key": "7100070",
///   "banding": true
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineItemInput {
    pub pipe_type: PipeType,

    /// Base material key (required)
    pub material_key: Option<String>,

    pub layers: Vec<ExtraLayer>,

    pub cladding_key: Option<String>,

    /// Run length in meters
    pub length_m: f64,

    /// Pipe outside dimension in mm (Pipe only)
    pub dimension_mm: f64,

    /// Duct height in mm (Duct only)
    pub height_mm: f64,

    /// Duct width in mm (Duct only)
    pub width_mm: f64,

    /// Labor uplift for work at height (%)
    pub height_surcharge_percent: f64,

    pub foil: bool,

    pub banding: bool,

    pub accessories: AccessoryCounts,

    /// Price override for the `base_<key>` group
    pub base_price_override: Option<f64>,

    /// Free-text object label
    pub object: Option<String>,

    /// Free-text section label
    pub section: Option<String>,

    pub spacers: Spacers,
}

impl Default for LineItemInput {
    fn default() -> Self {
        LineItemInput {
            pipe_type: PipeType::Pipe,
            material_key: None,
            layers: Vec::new(),
            cladding_key: None,
            length_m: 0.0,
            dimension_mm: 0.0,
            height_mm: 0.0,
            width_mm: 0.0,
            height_surcharge_percent: 0.0,
            foil: false,
            banding: false,
            accessories: AccessoryCounts::default(),
            base_price_override: None,
            object: None,
            section: None,
            spacers: Spacers::default(),
        }
    }
}

fn check_non_negative(field: &str, value: f64) -> CalcResult<()> {
    if !value.is_finite() {
        return Err(CalcError::invalid_numeric(field, value.to_string(), "Value must be a finite number"));
    }
    if value < 0.0 {
        return Err(CalcError::invalid_numeric(field, value.to_string(), "Value cannot be negative"));
    }
    Ok(())
}

impl LineItemInput {
    /// Validate numeric fields.
    pub fn validate(&self) -> CalcResult<()> {
        check_non_negative("length", self.length_m)?;
        check_non_negative("dimension", self.dimension_mm)?;
        check_non_negative("height", self.height_mm)?;
        check_non_negative("width", self.width_mm)?;
        check_non_negative("height_surcharge", self.height_surcharge_percent)?;
        check_non_negative("bends", self.accessories.bends)?;
        check_non_negative("branches", self.accessories.branches)?;
        check_non_negative("valve_caps", self.accessories.valve_caps)?;
        check_non_negative("flange_caps", self.accessories.flange_caps)?;
        check_non_negative("supports", self.accessories.supports)?;
        if let Some(price) = self.base_price_override {
            check_non_negative("base_price_override", price)?;
        }
        for layer in &self.layers {
            check_non_negative("material_layer_allowance", layer.accessory_allowance_mm)?;
            if let Some(price) = layer.price_override {
                check_non_negative("layer_price_override", price)?;
            }
        }
        Ok(())
    }

    /// Base material key, treating a blank string as no selection
    pub fn base_key(&self) -> Option<&str> {
        self.material_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    /// Cladding key, treating a blank string as no cladding
    pub fn cladding(&self) -> Option<&str> {
        self.cladding_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }
}

/// Extra layer resolved against the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLayer {
    pub material_key: String,
    pub name: String,
    pub insulation_mm: f64,
    pub accessory_allowance_mm: f64,
    pub price_override: Option<f64>,
}

/// Cladding labor coefficients
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CladdingLaborFactors {
    /// Mounting (h/m)
    pub mount: f64,
    /// Fabrication (h/m²)
    pub fabrication: f64,
    /// Surcharge addition (h/m²)
    pub surcharge: f64,
}

/// Aluminum cladding labor by outer diameter bucket
pub fn aluminum_labor_factors(outer_diameter_mm: f64) -> CladdingLaborFactors {
    if outer_diameter_mm <= 250.0 {
        CladdingLaborFactors { mount: 0.110, fabrication: 0.04, surcharge: 0.068 }
    } else if outer_diameter_mm <= 640.0 {
        CladdingLaborFactors { mount: 0.07, fabrication: 0.02, surcharge: 0.068 }
    } else {
        CladdingLaborFactors { mount: 0.144, fabrication: 0.08, surcharge: 0.068 }
    }
}

/// Cladding results for one line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CladdingResult {
    pub material_key: String,
    pub name: String,
    pub category: MaterialCategory,
    /// Cladding area (m², 0 for ducts)
    pub area_m2: f64,
    pub cost: f64,
    pub factors: CladdingLaborFactors,
    /// Cladding labor (h)
    pub labor_h: f64,
}

/// Labor figures with the factors behind them
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LaborBreakdown {
    /// Insulation labor including height surcharge (h)
    pub insulation_h: f64,
    /// Base run-length factor, not multiplied by length (h/m)
    pub base_mount_factor: f64,
    /// Base area factor, not multiplied by area (h/m²)
    pub base_fabrication_factor: f64,
    /// Surcharge-only mounting term: run-length factor × surcharge %
    pub surcharge_mount_factor: f64,
    /// Cladding labor (h)
    pub cladding_h: f64,
    /// Banding labor (h)
    pub band_h: f64,
    /// Banding rate applied (h/m), 0 without banding
    pub band_rate: f64,
}

/// Fully derived line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedLineItem {
    /// The input this item was derived from
    pub input: LineItemInput,

    /// Base name, or "base (+ layer1, layer2)"
    pub display_name: String,

    pub base_key: String,
    pub base_category: MaterialCategory,
    pub base_insulation_mm: f64,
    pub layers: Vec<ResolvedLayer>,

    /// Base plus all resolved layers (mm)
    pub total_insulation_mm: f64,

    /// Outer diameter (m), pipes only
    pub outer_diameter_m: Option<f64>,

    /// Insulated area (m²)
    pub quantity_m2: f64,

    /// Quantity × base unit price (override or catalog)
    pub material_cost: f64,

    pub labor: LaborBreakdown,

    pub cladding: Option<CladdingResult>,

    /// Tape rolls (pipes only)
    pub tape_rolls: u32,

    pub spool_wire_m: f64,
    pub spool_wire_kg: f64,
    pub foil_area_m2: f64,
    pub band_length_m: f64,
}

impl DerivedLineItem {
    pub fn pipe_type(&self) -> PipeType {
        self.input.pipe_type
    }

    pub fn length_m(&self) -> f64 {
        self.input.length_m
    }

    pub fn cladding_area_m2(&self) -> f64 {
        self.cladding.as_ref().map_or(0.0, |c| c.area_m2)
    }

    pub fn cladding_cost(&self) -> f64 {
        self.cladding.as_ref().map_or(0.0, |c| c.cost)
    }

    /// Foil labor: 0.03 h/m plus 0.049 h/m² when foil is selected
    pub fn foil_labor_h(&self) -> f64 {
        if self.input.foil {
            FOIL_RUN_RATE_H_PER_M * self.input.length_m + FOIL_AREA_RATE_H_PER_M2 * self.quantity_m2
        } else {
            0.0
        }
    }

    /// Insulation + cladding + banding + foil labor (h)
    pub fn work_time_h(&self) -> f64 {
        self.labor.insulation_h + self.labor.cladding_h + self.labor.band_h + self.foil_labor_h()
    }
}

/// Derive all quantities, costs and labor for one line item.
///
/// # Errors
///
/// * `MissingSelection` - no base material selected
/// * `UnknownMaterial` - base or cladding key not in the catalog
/// * `InvalidNumericField` - negative or non-finite numeric input
///
/// Extra layers whose key is not in the catalog are skipped.
pub fn calculate(input: &LineItemInput, catalog: &MaterialCatalog) -> CalcResult<DerivedLineItem> {
    let base_key = input.base_key().ok_or_else(|| CalcError::missing_selection("material"))?;
    let base = catalog.require(base_key)?;
    input.validate()?;

    let layers = resolve_layers(input, catalog);
    let base_insulation_mm = base.insulation_thickness_mm;
    let total_insulation_mm =
        base_insulation_mm + layers.iter().map(|l| l.insulation_mm).sum::<f64>();

    let length = Meters(input.length_m);
    let is_pipe = input.pipe_type == PipeType::Pipe;

    // Geometry
    let (outer_diameter_m, quantity_m2) = match input.pipe_type {
        PipeType::Pipe => {
            let diameter: Meters = Millimeters(input.dimension_mm + 2.0 * total_insulation_mm).into();
            (Some(diameter.0), cylinder_surface(diameter, length).0)
        }
        PipeType::Duct => {
            let perimeter: Meters =
                Millimeters(input.height_mm + input.width_mm + 4.0 * base_insulation_mm).into();
            (None, 2.0 * input.length_m * perimeter.0)
        }
    };
    let diameter = Meters(outer_diameter_m.unwrap_or(0.0));
    let circumference = diameter.circumference().0;

    let material_cost = quantity_m2 * input.base_price_override.unwrap_or(base.unit_cost);

    // Insulation labor
    let surcharge = input.height_surcharge_percent / 100.0;
    let mut insulation_h = base.run_length_factor * input.length_m + base.area_factor * quantity_m2;
    if input.height_surcharge_percent > 0.0 {
        insulation_h *= 1.0 + surcharge;
    }

    let foil_area_m2 = if input.foil && is_pipe { quantity_m2 * FOIL_OVERAGE } else { 0.0 };

    let band_length_m = if input.banding && is_pipe {
        BAND_TURNS * circumference * input.length_m
    } else {
        0.0
    };
    let (band_rate, band_h) = if input.banding && band_length_m > 0.0 {
        (BAND_RATE_H_PER_M, band_length_m * BAND_RATE_H_PER_M)
    } else {
        (0.0, 0.0)
    };

    let cladding = match input.cladding() {
        Some(key) => Some(derive_cladding(catalog.require(key)?, base, input, outer_diameter_m)),
        None => None,
    };

    let tape_rolls = if is_pipe {
        (input.length_m * circumference / TAPE_ROLL_LENGTH_M).ceil() as u32
    } else {
        0
    };

    let (spool_wire_m, spool_wire_kg) = if is_pipe && base.category.needs_spool_wire() {
        let meters = SPOOL_WIRE_TURNS * circumference * input.length_m;
        (meters, meters / SPOOL_WIRE_M_PER_KG)
    } else {
        (0.0, 0.0)
    };

    let display_name = if layers.is_empty() {
        base.name.clone()
    } else {
        let extra: Vec<&str> = layers.iter().map(|l| l.name.as_str()).collect();
        format!("{} (+ {})", base.name, extra.join(", "))
    };

    let labor = LaborBreakdown {
        insulation_h,
        base_mount_factor: base.run_length_factor,
        base_fabrication_factor: base.area_factor,
        surcharge_mount_factor: base.run_length_factor * surcharge,
        cladding_h: cladding.as_ref().map_or(0.0, |c| c.labor_h),
        band_h,
        band_rate,
    };

    tracing::debug!(
        material = base_key,
        pipe_type = input.pipe_type.display_name(),
        quantity_m2,
        material_cost,
        work_time_h = labor.insulation_h + labor.cladding_h + labor.band_h,
        "line item derived"
    );

    Ok(DerivedLineItem {
        input: input.clone(),
        display_name,
        base_key: base_key.to_string(),
        base_category: base.category,
        base_insulation_mm,
        layers,
        total_insulation_mm,
        outer_diameter_m,
        quantity_m2,
        material_cost,
        labor,
        cladding,
        tape_rolls,
        spool_wire_m,
        spool_wire_kg,
        foil_area_m2,
        band_length_m,
    })
}

fn resolve_layers(input: &LineItemInput, catalog: &MaterialCatalog) -> Vec<ResolvedLayer> {
    input
        .layers
        .iter()
        .filter_map(|layer| {
            let record = catalog.get(layer.material_key.trim())?;
            Some(ResolvedLayer {
                material_key: record.key.clone(),
                name: record.name.clone(),
                insulation_mm: record.insulation_thickness_mm,
                accessory_allowance_mm: layer.accessory_allowance_mm,
                price_override: layer.price_override,
            })
        })
        .collect()
}

fn derive_cladding(
    record: &MaterialRecord,
    base: &MaterialRecord,
    input: &LineItemInput,
    outer_diameter_m: Option<f64>,
) -> CladdingResult {
    let (area_m2, factors) = match outer_diameter_m {
        Some(d) => {
            let area = cylinder_surface(Meters(d), Meters(input.length_m)).0;
            let factors = if record.category.is_aluminum_cladding() {
                aluminum_labor_factors(d * 1000.0)
            } else {
                CladdingLaborFactors {
                    mount: base.run_length_factor,
                    fabrication: base.area_factor,
                    surcharge: 0.0,
                }
            };
            (area, factors)
        }
        // Ducts carry the cladding selection but no cladding area or labor
        None => (0.0, CladdingLaborFactors::default()),
    };

    let labor_h = factors.mount * input.length_m
        + factors.fabrication * area_m2
        + factors.surcharge * area_m2;

    CladdingResult {
        material_key: record.key.clone(),
        name: record.name.clone(),
        category: record.category,
        area_m2,
        cost: area_m2 * record.unit_cost,
        factors,
        labor_h,
    }
}
