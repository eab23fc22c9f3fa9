//! # Import Module
//!
//! Turns arbitrary pasted spreadsheet text into canonical TSV, then into
//! typed records.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Import Pipeline                                  │
//! │                                                                         │
//! │  raw text                                                               │
//! │     │  parser::normalize_input     BOM strip, \r\n → \n, trim          │
//! │     │  parser::detect_delimiter    tab, else comma, else error         │
//! │     ▼  parser::parse_delimited     quote-aware scan                     │
//! │  rows                                                                   │
//! │     │  sanitize::sanitize_rows     clean cells, pad (lenient), trim    │
//! │     │  header::looks_like_header   gate                                 │
//! │     ▼  uniformity::validate_uniformity  gate                            │
//! │  canonical TSV (pipeline::NormalizedImport)                             │
//! │     │  schema::HeaderSchema::validate   domain header gate             │
//! │     ▼  rows::parse_purchase_rows        typed rows                      │
//! │  PurchaseRecord                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every stage is a pure function returning `Result`; the first failure
//! stops the pipeline and no partial output is produced.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

pub mod header;
pub mod parser;
pub mod pipeline;
pub mod rows;
pub mod sanitize;
pub mod schema;
pub mod uniformity;

pub use header::looks_like_header;
pub use parser::{detect_delimiter, normalize_input, parse_delimited, Delimiter};
pub use pipeline::{validate_and_normalize, ImportPipeline, NormalizedImport};
pub use rows::{parse_purchase_rows, PurchaseImportRow};
pub use schema::{validate_purchase_headers, HeaderSchema, MATERIAL_HEADERS, PURCHASE_HEADERS};

/// How strictly row shapes are enforced.
///
/// | Mode      | Short rows          | Uniformity checks        |
/// |-----------|---------------------|--------------------------|
/// | `Strict`  | kept, then rejected | all five                 |
/// | `Lenient` | right-padded        | columns, data rows, width|
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    #[default]
    Strict,
    Lenient,
}

impl ImportMode {
    #[inline]
    pub fn is_strict(&self) -> bool {
        matches!(self, ImportMode::Strict)
    }
}
