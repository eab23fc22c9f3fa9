//! # costbook-core: Pure Business Logic for Costbook
//!
//! This crate is the **heart** of Costbook, a product-costing application
//! for small makers. It contains all business logic as pure functions with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Costbook Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    UI (out of scope)                            │   │
//! │  │   Paste sheet ──► Materials ──► BOMs ──► Cost sheet totals     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ costbook-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────────┐   │   │
//! │  │   │  import  │  │ costing  │  │  money   │  │  normalize   │   │   │
//! │  │   │ CSV/TSV  │  │ roll-up  │  │  cents   │  │  validation  │   │   │
//! │  │   │ headers  │  │   BOM    │  │ rounding │  │    types     │   │   │
//! │  │   └──────────┘  └──────────┘  └──────────┘  └──────────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                costbook-db (Persistence Layer)                  │   │
//! │  │        SQLite repositories, local guest store, coalescing       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (CostSheet, MaterialRecord, BomRecord, ...)
//! - [`money`] - Money type and integer-cent rounding primitives
//! - [`import`] - Pasted CSV/TSV → canonical TSV pipeline, header schemas
//! - [`costing`] - Cost roll-up engine and BOM cost resolver
//! - [`normalize`] - Loosely-typed input → typed records
//! - [`validation`] - Field validation before writes
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input = same output, safe to call concurrently
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64)
//! 4. **Explicit Errors**: All errors are typed return values, never panics
//!
//! ## Example Usage
//!
//! ```rust
//! use costbook_core::import::validate_and_normalize;
//!
//! let pasted = "Name,Qty,Cost\nWidget,10,5.00\n";
//! let import = validate_and_normalize(pasted).unwrap();
//!
//! assert!(import.converted_from_csv);
//! assert_eq!(import.tsv, "Name\tQty\tCost\nWidget\t10\t5.00");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod costing;
pub mod error;
pub mod import;
pub mod money;
pub mod normalize;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use costing::bom::{BomCost, BomCostResolver, IntegrityWarning};
pub use costing::rollup::{compute_totals, CostBreakdown};
pub use error::{BomError, CoreError, CoreResult, HeaderError, ImportError, ValidationError};
pub use import::{validate_and_normalize, ImportMode, NormalizedImport};
pub use money::{Money, RoundingMode};
pub use normalize::Record;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Upper clamp for a cost sheet's waste percentage.
pub const WASTE_PCT_MAX: f64 = 1000.0;

/// Upper clamp for a cost sheet's markup percentage.
pub const MARKUP_PCT_MAX: f64 = 10000.0;

/// Upper clamp for a cost sheet's tax percentage.
pub const TAX_PCT_MAX: f64 = 1000.0;

/// Upper clamp for a single percent-kind overhead item.
pub const OVERHEAD_PCT_MAX: f64 = 1000.0;
