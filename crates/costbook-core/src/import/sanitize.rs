//! # Import Sanitizer
//!
//! Cell cleanup and row-width reconciliation between parsing and validation.

use super::ImportMode;

/// Collapses every run of embedded `\r`, `\n` or `\t` into one space and
/// trims the result.
///
/// ## Example
/// ```rust
/// use costbook_core::import::sanitize::sanitize_cell;
///
/// assert_eq!(sanitize_cell("  two\r\nlines\t "), "two lines");
/// ```
pub fn sanitize_cell(cell: &str) -> String {
    let mut out = String::with_capacity(cell.len());
    let mut in_break = false;

    for c in cell.chars() {
        if matches!(c, '\r' | '\n' | '\t') {
            if !in_break {
                out.push(' ');
                in_break = true;
            }
        } else {
            out.push(c);
            in_break = false;
        }
    }

    out.trim().to_string()
}

/// Cleans every cell, then reconciles widths according to `mode`.
///
/// `Lenient` right-pads short rows to the widest row before trimming;
/// `Strict` leaves widths alone so the uniformity check can report them.
pub fn sanitize_rows(rows: Vec<Vec<String>>, mode: ImportMode) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = rows
        .into_iter()
        .map(|row| row.iter().map(|cell| sanitize_cell(cell)).collect())
        .collect();

    if mode == ImportMode::Lenient {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, String::new());
        }
    }

    trim_trailing_empty_columns(rows)
}

/// Drops columns to the right of the last non-empty cell seen in any row.
///
/// The resulting width is at least 1. Rows already narrower than that width
/// are left as they are.
pub fn trim_trailing_empty_columns(mut rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let width = rows
        .iter()
        .filter_map(|row| row.iter().rposition(|cell| !cell.is_empty()))
        .map(|last| last + 1)
        .max()
        .unwrap_or(0)
        .max(1);

    for row in &mut rows {
        row.truncate(width);
    }

    rows
}
