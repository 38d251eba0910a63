//! Fixed reference entries.
//!
//! Consumables are priced from catalog entries at well-known keys. When an
//! entry is missing the price is 0, except foil which falls back to a literal
//! price so a foil row is never free.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::MaterialCatalog;

/// Fallback foil price per m² when the foil entry is missing
pub const FOIL_FALLBACK_PRICE: f64 = 50.0;

/// Well-known catalog entries used for consumables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceItem {
    Rivets,
    SpoolWire,
    /// Seam tape for lamella and fire mats
    Tape,
    Foil,
    Banding,
}

impl ReferenceItem {
    /// Catalog key of the entry
    pub fn key(&self) -> &'static str {
        match self {
            ReferenceItem::Rivets => "85329500",
            ReferenceItem::SpoolWire => "4023313",
            ReferenceItem::Tape => "PTBCR07550",
            ReferenceItem::Foil => "4025571",
            ReferenceItem::Banding => "9556892",
        }
    }

    /// Name shown when the entry is missing from the catalog
    pub fn fallback_name(&self) -> &'static str {
        match self {
            ReferenceItem::Rivets => "Popnit",
            ReferenceItem::SpoolWire => "Spoltråd 0,70",
            ReferenceItem::Tape => "Tejp",
            ReferenceItem::Foil => "Folie",
            ReferenceItem::Banding => "Band",
        }
    }

    /// Unit of the aggregated quantity
    pub fn unit(&self) -> &'static str {
        match self {
            ReferenceItem::Rivets => "box",
            ReferenceItem::SpoolWire => "kg",
            ReferenceItem::Tape => "roll",
            ReferenceItem::Foil => "m²",
            ReferenceItem::Banding => "m",
        }
    }
}

/// Resolved price and identity of a reference entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePrice {
    pub item: ReferenceItem,
    pub name: String,
    pub article_number: String,
    pub last_updated: Option<NaiveDate>,
    pub unit_price: f64,
    /// False when the catalog has no entry at the well-known key
    pub found: bool,
}

impl ReferencePrice {
    pub fn resolve(catalog: &MaterialCatalog, item: ReferenceItem) -> Self {
        match catalog.get(item.key()) {
            Some(record) => ReferencePrice {
                item,
                name: record.name.clone(),
                article_number: record.article_number.clone(),
                last_updated: record.last_updated,
                unit_price: record.unit_cost,
                found: true,
            },
            None if item == ReferenceItem::Foil => ReferencePrice {
                item,
                name: item.fallback_name().to_string(),
                article_number: item.key().to_string(),
                last_updated: NaiveDate::from_ymd_opt(2025, 3, 5),
                unit_price: FOIL_FALLBACK_PRICE,
                found: false,
            },
            None => ReferencePrice {
                item,
                name: item.fallback_name().to_string(),
                article_number: item.key().to_string(),
                last_updated: None,
                unit_price: 0.0,
                found: false,
            },
        }
    }
}
