//! Catalog loading from TOML.
//!
//! A catalog file is a list of `[[material]]` tables:
//!
//! ```toml
//! [[material]]
//! article_number = "4010101"
//! name = "Rörskål 30 mm"
//! category = "insulation"
//! unit = "m²"
//! unit_cost = 85.0
//! insulation_thickness_mm = 30.0
//! run_length_factor = 0.12
//! area_factor = 0.05
//! last_updated = "2025-03-05"
//! ```

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use serde::Deserialize;

use super::{MaterialCatalog, MaterialRecord};
use crate::errors::{CalcError, CalcResult};

static DEFAULT_CATALOG_TOML: &str = include_str!("../../data/catalog.toml");

static DEFAULT_CATALOG: Lazy<CalcResult<MaterialCatalog>> =
    Lazy::new(|| MaterialCatalog::from_toml_str(DEFAULT_CATALOG_TOML));

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    material: Vec<MaterialRecord>,
}

impl MaterialCatalog {
    /// Parse a catalog from TOML text.
    pub fn from_toml_str(source: &str) -> CalcResult<Self> {
        let file: CatalogFile =
            toml::from_str(source).map_err(|e| CalcError::catalog(e.to_string()))?;

        for record in &file.material {
            if record.article_number.trim().is_empty() && record.key.trim().is_empty() {
                return Err(CalcError::catalog(format!(
                    "material '{}' has neither key nor article_number",
                    record.name
                )));
            }
        }

        let catalog = MaterialCatalog::new(file.material);
        tracing::debug!(materials = catalog.len(), "catalog parsed");
        Ok(catalog)
    }

    /// Read and parse a catalog file.
    pub fn load(path: &Path) -> CalcResult<Self> {
        let source = fs::read_to_string(path).map_err(|e| {
            CalcError::file_error("read catalog", path.display().to_string(), e.to_string())
        })?;
        Self::from_toml_str(&source)
    }
}

/// The catalog embedded in the crate, parsed once on first use.
pub fn default_catalog() -> CalcResult<&'static MaterialCatalog> {
    DEFAULT_CATALOG.as_ref().map_err(Clone::clone)
}
