//! # Costing Module
//!
//! Pure cost engines. Everything here takes typed records by reference and
//! returns integer cents.
//!
//! - [`rollup`] - cost sheet → batch total, per-unit cost, price, margin, tax
//! - [`bom`] - nested bill of materials → total and per-output-unit cost

pub mod bom;
pub mod rollup;

pub use bom::{check_acyclic, normalize_sort_order, BomCost, BomCostResolver, IntegrityWarning};
pub use rollup::{compute_totals, CostBreakdown};
