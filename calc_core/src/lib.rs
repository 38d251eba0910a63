//! # calc_core - Insulation Takeoff and Bid Engine
//!
//! `calc_core` is the computational heart of Thermkalk. It derives areas,
//! material costs, consumables and labor time for insulated pipes and ducts,
//! groups them into a material specification and rolls a whole bid up into
//! a final price. All inputs and outputs are JSON-serializable.
//!
//! ## Design Philosophy
//!
//! - **Stateless**: Pure functions that take input and return results
//! - **Explicit catalog**: An immutable catalog snapshot is passed into every call
//! - **Rich Errors**: Structured error types, not just strings
//!
//! ## Quick Start
//!
//! ```rust
//! use calc_core::bid::{Bid, BidInfo};
//! use calc_core::calculations::LineItemInput;
//! use calc_core::materials::default_catalog;
//!
//! let catalog = default_catalog().unwrap();
//! let mut bid = Bid::new(BidInfo::new("Kv. Linden", "24-117", "Byggbolaget AB"));
//! bid.add_line_item(
//!     LineItemInput {
//!         material_key: Some("4010150".to_string()),
//!         cladding_key: Some("7100070".to_string()),
//!         length_m: 25.0,
//!         dimension_mm: 89.0,
//!         ..Default::default()
//!     },
//!     catalog,
//! )
//! .unwrap();
//!
//! let rows = bid.material_specification(catalog).unwrap();
//! assert!(rows.iter().any(|r| r.group_key == "popnit"));
//! ```
//!
//! ## Modules
//!
//! - [`bid`] - Bid container, parameters, notes and stored records
//! - [`calculations`] - Line item calculation, material specification, bid totals
//! - [`materials`] - Material catalog and fixed reference entries
//! - [`units`] - Type-safe unit wrappers
//! - [`errors`] - Structured error types
//! - [`file_io`] - File operations with atomic saves and locking
//! - [`format`] - Number formatting for reports

pub mod bid;
pub mod calculations;
pub mod errors;
pub mod file_io;
pub mod format;
pub mod materials;
pub mod units;

// Re-export commonly used types at crate root for convenience
pub use bid::{Bid, BidInfo, BidParameters, BidRecord};
pub use errors::{CalcError, CalcResult};
pub use file_io::{load_bid, save_bid, FileLock};
pub use materials::{default_catalog, MaterialCatalog, MaterialCategory, MaterialRecord};
