//! # Import Validation Pipeline
//!
//! Single entry point from pasted text to canonical TSV.
//!
//! ## Usage
//! ```rust
//! use costbook_core::import::{ImportMode, ImportPipeline};
//!
//! let import = ImportPipeline::new(ImportMode::Lenient)
//!     .run("Item\tQty\tNote\nWax\t2\nWick\t10\tcotton")
//!     .unwrap();
//!
//! assert_eq!(import.row_count, 3);
//! assert_eq!(import.tsv, "Item\tQty\tNote\nWax\t2\t\nWick\t10\tcotton");
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::header::looks_like_header;
use super::parser::{detect_delimiter, normalize_input, parse_delimited, Delimiter};
use super::sanitize::sanitize_rows;
use super::uniformity::validate_uniformity;
use super::ImportMode;
use crate::error::ImportError;

/// Successful pipeline output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedImport {
    /// Header-first, tab-separated, uniform width, `\n` line endings.
    pub tsv: String,
    /// The input was comma-separated.
    pub converted_from_csv: bool,
    /// Human-readable summary for the UI.
    pub message: String,
    /// Rows including the header.
    pub row_count: usize,
    pub column_count: usize,
}

/// Configured import pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportPipeline {
    mode: ImportMode,
}

impl ImportPipeline {
    pub fn new(mode: ImportMode) -> Self {
        ImportPipeline { mode }
    }

    /// Runs every stage; the first failure is returned as-is.
    pub fn run(&self, raw: &str) -> Result<NormalizedImport, ImportError> {
        let text = normalize_input(raw);
        let delimiter = detect_delimiter(&text)?;
        let rows = parse_delimited(&text, delimiter)?;
        let rows = sanitize_rows(rows, self.mode);

        let header = rows.first().ok_or(ImportError::NoRows)?;
        if !looks_like_header(header) {
            return Err(ImportError::HeaderNotDetected);
        }

        validate_uniformity(&rows, self.mode)?;

        let tsv = rows
            .iter()
            .map(|row| row.join("\t"))
            .collect::<Vec<_>>()
            .join("\n");

        verify_tab_counts(&tsv)?;

        let converted_from_csv = delimiter == Delimiter::Comma;
        let row_count = rows.len();
        let column_count = header.len();
        let message = if converted_from_csv {
            format!("Converted CSV to TSV: {row_count} rows, {column_count} columns")
        } else {
            format!("TSV validated: {row_count} rows, {column_count} columns")
        };

        Ok(NormalizedImport {
            tsv,
            converted_from_csv,
            message,
            row_count,
            column_count,
        })
    }
}

/// Runs the default (strict) pipeline.
pub fn validate_and_normalize(raw: &str) -> Result<NormalizedImport, ImportError> {
    ImportPipeline::default().run(raw)
}

/// Every line of the produced TSV must carry as many tabs as line 1.
fn verify_tab_counts(tsv: &str) -> Result<(), ImportError> {
    let mut lines = tsv.split('\n');
    let expected = lines.next().map(count_tabs).unwrap_or(0);

    for (idx, line) in lines.enumerate() {
        if count_tabs(line) != expected {
            return Err(ImportError::InconsistentOutput { line: idx + 2 });
        }
    }

    Ok(())
}

fn count_tabs(line: &str) -> usize {
    line.matches('\t').count()
}
