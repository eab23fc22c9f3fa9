//! # Row Uniformity Validator
//!
//! Checks, in order, stopping at the first failure:
//!
//! 1. the header row has at least 2 columns
//! 2. at least one data row follows the header
//! 3. every row has the header's column count
//! 4. (strict) no row has an empty cell
//!
//! Once check 4 passes every row is filled in every column, so each row
//! already has the header's filled-cell shape and no separate shape pass
//! runs. A row whose shape differs from the header's reports its first
//! empty cell instead.
//!
//! Row numbers are 1-based with the header as row 1.

use super::ImportMode;
use crate::error::ImportError;

/// Minimum useful width of an import.
pub const MIN_COLUMNS: usize = 2;

pub fn validate_uniformity(rows: &[Vec<String>], mode: ImportMode) -> Result<(), ImportError> {
    let header = rows.first().ok_or(ImportError::NoRows)?;
    let expected = header.len();

    if expected < MIN_COLUMNS {
        return Err(ImportError::TooFewColumns { found: expected });
    }

    if rows.len() < 2 {
        return Err(ImportError::NoDataRows);
    }

    for (idx, row) in rows.iter().enumerate() {
        if row.len() != expected {
            return Err(ImportError::ColumnCountMismatch {
                row: idx + 1,
                expected,
                found: row.len(),
            });
        }
    }

    if !mode.is_strict() {
        return Ok(());
    }

    for (idx, row) in rows.iter().enumerate() {
        if let Some(col) = row.iter().position(|cell| cell.is_empty()) {
            return Err(ImportError::EmptyCell {
                row: idx + 1,
                column: col + 1,
            });
        }
    }

    Ok(())
}
