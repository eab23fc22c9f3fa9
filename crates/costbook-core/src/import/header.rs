//! # Header Classifier
//!
//! Best-effort guess at whether the first row of a paste is a header.
//!
//! ## Heuristic
//! ```text
//! non-empty cells < 2                         → not a header
//! no cell contains a letter                   → not a header
//! every cell data-like AND some cell letterless → not a header
//! letter cells ≥ ceil(non-empty / 2)          → header
//! otherwise                                   → not a header
//! ```
//!
//! "Data-like" tokens are numbers (optionally with thousands separators),
//! `YYYY-M-D` / `YYYY/M/D` dates, `true`/`false`/`yes`/`no`, and numbers
//! prefixed by a currency symbol. Short rows of number-like column names
//! can be misclassified.

use std::sync::LazyLock;

use regex::Regex;

/// ASCII digits, plain or `1,234,567`, with an optional `.digits` fraction, or a
/// bare `.5`.
const NUMBER_BODY: &str = r"(?:(?:[0-9]+|[0-9]{1,3}(?:,[0-9]{3})+)(?:\.[0-9]+)?|\.[0-9]+)";

const CURRENCY_SYMBOL: &str = "[$€£¥₹₩₽₺₦₱¢]";

static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^[+-]?{NUMBER_BODY}$")).expect("Invalid number regex")
});

/// One separator style throughout.
static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}(?:-[0-9]{1,2}-[0-9]{1,2}|/[0-9]{1,2}/[0-9]{1,2})$").expect("Invalid date regex")
});

static BOOLEAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:true|false|yes|no)$").expect("Invalid boolean regex"));

/// `$-5` is fine, `-$-5` is not.
static CURRENCY_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^(?:[+-]{CURRENCY_SYMBOL}\s*|{CURRENCY_SYMBOL}\s*[+-]?){NUMBER_BODY}$"
    ))
    .expect("Invalid currency regex")
});

/// Everything `strip_amount` drops: symbols, separators, spaces and `+`.
static AMOUNT_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"{CURRENCY_SYMBOL}|[,+\s]")).expect("Invalid amount regex")
});

/// Decides whether `row` reads like a header row.
///
/// ## Example
/// ```rust
/// use costbook_core::import::header::looks_like_header;
///
/// assert!(looks_like_header(&["Name", "Qty", "Cost"]));
/// assert!(!looks_like_header(&["1", "2", "3"]));
/// ```
pub fn looks_like_header<S: AsRef<str>>(row: &[S]) -> bool {
    let cells: Vec<&str> = row
        .iter()
        .map(|c| c.as_ref().trim())
        .filter(|c| !c.is_empty())
        .collect();

    let total = cells.len();
    if total < 2 {
        return false;
    }

    let alpha = cells.iter().filter(|c| has_alpha(c)).count();
    if alpha == 0 {
        return false;
    }

    let all_data_like = cells.iter().all(|c| is_data_like(c));
    if all_data_like && alpha < total {
        return false;
    }

    alpha >= total.div_ceil(2)
}

/// True when the cell reads as a literal value rather than a label.
pub fn is_data_like(cell: &str) -> bool {
    let cell = cell.trim();
    is_number(cell) || is_iso_date(cell) || is_boolean(cell) || is_currency_amount(cell)
}

fn has_alpha(cell: &str) -> bool {
    cell.chars().any(char::is_alphabetic)
}

pub(crate) fn is_number(cell: &str) -> bool {
    NUMBER.is_match(cell)
}

/// `YYYY-M-D` or `YYYY/M/D`.
pub(crate) fn is_iso_date(cell: &str) -> bool {
    ISO_DATE.is_match(cell)
}

fn is_boolean(cell: &str) -> bool {
    BOOLEAN.is_match(cell)
}

/// A currency symbol followed by a number, e.g. `$5.00`, `-€1,200`, `£ 3`.
pub(crate) fn is_currency_amount(cell: &str) -> bool {
    CURRENCY_AMOUNT.is_match(cell)
}

/// Strips currency symbols and thousands separators so a cell that passed
/// [`is_number`] or [`is_currency_amount`] can be parsed as `f64`.
pub(crate) fn strip_amount(cell: &str) -> String {
    AMOUNT_NOISE.replace_all(cell.trim(), "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_tokens() {
        for ok in ["0", "42", "-3", "+3.5", "1,234", "12,345,678.90", ".5"] {
            assert!(is_number(ok), "{ok} should be a number");
        }
        for bad in ["", "1,23", "12,3456", "1.2.3", "abc", "1e5", ",123", "5.", "٣"] {
            assert!(!is_number(bad), "{bad} should not be a number");
        }
    }

    #[test]
    fn test_date_tokens() {
        assert!(is_iso_date("2024-1-9"));
        assert!(is_iso_date("2024/12/31"));
        assert!(!is_iso_date("2024-01/09"));
        assert!(!is_iso_date("24-01-09"));
        assert!(!is_iso_date("2024-001-09"));
    }

    #[test]
    fn test_currency_tokens() {
        assert!(is_currency_amount("$5.00"));
        assert!(is_currency_amount("-€1,200"));
        assert!(is_currency_amount("£ 3"));
        assert!(!is_currency_amount("5$"));
        assert!(!is_currency_amount("$abc"));
        assert!(is_currency_amount("$-5"));
        assert!(!is_currency_amount("-$-5"));
    }

    #[test]
    fn test_data_like() {
        assert!(is_data_like("YES"));
        assert!(is_data_like(" 10 "));
        assert!(!is_data_like("Quantity"));
    }

    #[test]
    fn test_descriptive_header_accepted() {
        assert!(looks_like_header(&["Name", "Qty", "Cost"]));
        assert!(looks_like_header(&["Description", "", "Unit Cost"]));
    }

    #[test]
    fn test_numeric_row_rejected() {
        assert!(!looks_like_header(&["1", "2", "3"]));
        assert!(!looks_like_header(&["$5.00", "2024-01-01", "7"]));
    }

    #[test]
    fn test_data_row_with_some_text_rejected() {
        // Two of three cells are letterless data, one label-ish word
        assert!(!looks_like_header(&["Widget", "10", "5.00"]));
    }

    #[test]
    fn test_needs_two_cells() {
        assert!(!looks_like_header(&["Name"]));
        assert!(!looks_like_header(&["Name", "  "]));
    }

    #[test]
    fn test_boolean_header_is_accepted_at_the_margin() {
        // Every cell is data-like but every cell also has letters, so the
        // heuristic lets it through
        assert!(looks_like_header(&["yes", "no"]));
    }

    #[test]
    fn test_numeric_looking_column_names_rejected_at_the_margin() {
        assert!(!looks_like_header(&["2023", "2024"]));
    }

    #[test]
    fn test_strip_amount() {
        assert_eq!(strip_amount("$1,250.50"), "1250.50");
        assert_eq!(strip_amount("-€ 3"), "-3");
        assert_eq!(strip_amount("7"), "7");
        assert_eq!(strip_amount("+$5"), "5");
        assert_eq!(strip_amount("$-5"), "-5");
    }
}
