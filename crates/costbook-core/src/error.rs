//! # Error Types
//!
//! Domain-specific error types for costbook-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  costbook-core errors (this file)                                       │
//! │  ├── ImportError      - Pasted text could not become canonical TSV     │
//! │  ├── HeaderError      - Canonical TSV has the wrong header set         │
//! │  ├── BomError         - Bill of materials is structurally broken       │
//! │  ├── ValidationError  - Field-level input validation failures          │
//! │  └── CoreError        - Wraps all of the above                         │
//! │                                                                         │
//! │  costbook-db errors (separate crate)                                    │
//! │  └── DbError          - Persistence failures (wraps CoreError)          │
//! │                                                                         │
//! │  Flow: ImportError → CoreError → DbError → UI message                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Every error is a value; nothing in this crate panics on bad input
//! 2. `Display` output is the human-readable reason shown to the user
//! 3. Row numbers and column positions are 1-based, matching spreadsheets

use thiserror::Error;

// =============================================================================
// Import Error
// =============================================================================

/// Reasons pasted spreadsheet text was rejected by the import pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    /// Neither a tab nor a comma appears anywhere in the input.
    #[error("could not detect delimiters: paste tab- or comma-separated text")]
    NoDelimiter,

    /// A quoted value was opened and never closed.
    #[error("unclosed quoted value")]
    UnclosedQuote,

    /// Every row was empty after parsing.
    #[error("no rows detected")]
    NoRows,

    /// The first row does not look like a header row.
    #[error("the first row does not look like a header; include a descriptive header row")]
    HeaderNotDetected,

    /// The header row has fewer than two columns.
    #[error("the header row must have at least 2 columns (found {found})")]
    TooFewColumns { found: usize },

    /// Nothing below the header.
    #[error("no data rows found below the header row")]
    NoDataRows,

    /// A row's width differs from the header's.
    #[error("row {row} has {found} columns, expected {expected}")]
    ColumnCountMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// Strict mode: a cell is empty.
    #[error("row {row} has an empty value in column {column}")]
    EmptyCell { row: usize, column: usize },

    /// The produced TSV failed the final structural re-check.
    #[error("normalized output is inconsistent at line {line}")]
    InconsistentOutput { line: usize },

    /// A typed value could not be read from a cell.
    #[error("row {row}, column '{column}': cannot read '{value}' as {expected}")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
        expected: &'static str,
    },
}

// =============================================================================
// Header Error
// =============================================================================

/// Domain header violations for a canonical TSV.
///
/// Each variant lists every offender, not just the first, so the user can
/// fix the spreadsheet in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    /// No header row at all.
    #[error("the header row is empty")]
    EmptyHeaderRow,

    /// Blank column names at the given 1-based positions.
    #[error("empty column name(s) at position(s): {}", join_positions(.positions))]
    EmptyColumnNames { positions: Vec<usize> },

    /// The same column name appears more than once.
    #[error("duplicate header(s): {}", .names.join(", "))]
    DuplicateHeaders { names: Vec<String> },

    /// Names outside the allowed set.
    #[error("unknown header(s): {}. Allowed headers: {}", .names.join(", "), .allowed.join(", "))]
    UnknownHeaders {
        names: Vec<String>,
        allowed: Vec<String>,
    },

    /// Required names that are absent.
    #[error("missing required header(s): {}", .names.join(", "))]
    MissingHeaders { names: Vec<String> },
}

fn join_positions(positions: &[usize]) -> String {
    positions
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// BOM Error
// =============================================================================

/// Structural bill-of-materials errors.
///
/// A dangling reference is NOT an error: it is reported as an
/// [`IntegrityWarning`](crate::costing::bom::IntegrityWarning) instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BomError {
    /// A BOM (transitively) includes itself.
    #[error("cycle detected in bill of materials: {}", .path.join(" -> "))]
    CycleDetected { path: Vec<String> },

    /// The BOM being resolved does not exist.
    #[error("bill of materials not found: {0}")]
    NotFound(String),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation before records are written.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: f64, max: f64 },

    /// Invalid format (e.g., invalid UUID, invalid currency code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Core Error
// =============================================================================

/// Any error produced by costbook-core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Header(#[from] HeaderError),

    #[error(transparent)]
    Bom(#[from] BomError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_error_messages() {
        assert_eq!(ImportError::UnclosedQuote.to_string(), "unclosed quoted value");
        assert_eq!(ImportError::NoRows.to_string(), "no rows detected");

        let err = ImportError::ColumnCountMismatch {
            row: 3,
            expected: 4,
            found: 2,
        };
        assert_eq!(err.to_string(), "row 3 has 2 columns, expected 4");
    }

    #[test]
    fn test_header_error_lists_offenders() {
        let err = HeaderError::EmptyColumnNames {
            positions: vec![2, 5],
        };
        assert_eq!(err.to_string(), "empty column name(s) at position(s): 2, 5");

        let err = HeaderError::UnknownHeaders {
            names: vec!["Colour".to_string()],
            allowed: vec!["Description".to_string(), "Cost".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "unknown header(s): Colour. Allowed headers: Description, Cost"
        );
    }

    #[test]
    fn test_cycle_message_shows_path() {
        let err = BomError::CycleDetected {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(
            err.to_string(),
            "cycle detected in bill of materials: a -> b -> a"
        );
    }

    #[test]
    fn test_errors_convert_to_core_error() {
        let core: CoreError = ImportError::NoRows.into();
        assert!(matches!(core, CoreError::Import(_)));
        assert_eq!(core.to_string(), "no rows detected");

        let core: CoreError = ValidationError::Required {
            field: "name".to_string(),
        }
        .into();
        assert!(matches!(core, CoreError::Validation(_)));
    }
}
