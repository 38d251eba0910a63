//! # Bid Calculations
//!
//! The calculation pipeline runs strictly forward:
//!
//! ```text
//! MaterialCatalog ─┐
//! LineItemInput ───┴─> line_item::calculate ─> material_spec::aggregate ─> totals::roll_up
//! ```
//!
//! Every stage is a pure function over immutable inputs and returns a fresh
//! result. All inputs and results are JSON-serializable.
//!
//! ## Modules
//!
//! - [`line_item`] - Geometry, material cost, consumables and labor per pipe or duct
//! - [`form`] - Parsing of submitted form fields into line item inputs
//! - [`material_spec`] - Grouping of many line items into a material specification
//! - [`totals`] - Labor cost, markup and coverage-rate pricing for the whole bid

pub mod form;
pub mod line_item;
pub mod material_spec;
pub mod totals;

// Re-export commonly used types
pub use form::{parse_line_item, parse_price_overrides, FormData, NumericPolicy, ParsedLineItem};
pub use line_item::{calculate, DerivedLineItem, ExtraLayer, LineItemInput, PipeType};
pub use material_spec::{aggregate, GroupKey, LineCosts, SummaryRow};
pub use totals::{roll_up, LineBreakdown, PriceBreakdown};
