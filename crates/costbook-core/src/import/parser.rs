//! # Delimited Text Parser
//!
//! Quote-aware tokenizer shared by CSV and TSV input.
//!
//! ## Quoting Rules
//! - Inside quotes, `""` is a literal `"` and a lone `"` closes the field
//! - Outside quotes, `"` opens quoting only at the start of a field;
//!   anywhere else it is an ordinary character
//! - Delimiters and newlines inside quotes are kept as cell content
//! - Input that ends inside quotes is rejected

use crate::error::ImportError;

/// Column separator of pasted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Tab,
    Comma,
}

impl Delimiter {
    #[inline]
    pub fn as_char(&self) -> char {
        match self {
            Delimiter::Tab => '\t',
            Delimiter::Comma => ',',
        }
    }
}

/// Strips a leading byte-order mark, unifies line endings to `\n` and trims
/// surrounding whitespace.
pub fn normalize_input(text: &str) -> String {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    text.replace("\r\n", "\n").replace('\r', "\n").trim().to_string()
}

/// Picks the delimiter for normalized text: any tab means TSV, otherwise
/// any comma means CSV.
///
/// ## Example
/// ```rust
/// use costbook_core::import::parser::{detect_delimiter, Delimiter};
///
/// assert_eq!(detect_delimiter("a\tb,c").unwrap(), Delimiter::Tab);
/// assert_eq!(detect_delimiter("a,b").unwrap(), Delimiter::Comma);
/// assert!(detect_delimiter("just words").is_err());
/// ```
pub fn detect_delimiter(text: &str) -> Result<Delimiter, ImportError> {
    if text.contains('\t') {
        Ok(Delimiter::Tab)
    } else if text.contains(',') {
        Ok(Delimiter::Comma)
    } else {
        Err(ImportError::NoDelimiter)
    }
}

/// Splits text into a grid of raw cells.
///
/// Rows whose cells are all blank are dropped. Cells are returned exactly
/// as scanned; cleaning is the sanitizer's job.
///
/// ## Errors
/// - [`ImportError::UnclosedQuote`] when input ends inside a quoted value
/// - [`ImportError::NoRows`] when nothing but blank rows remain
pub fn parse_delimited(text: &str, delimiter: Delimiter) -> Result<Vec<Vec<String>>, ImportError> {
    let delim = delimiter.as_char();
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            c if c == delim => row.push(std::mem::take(&mut field)),
            '\n' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            c => field.push(c),
        }
    }

    if in_quotes {
        return Err(ImportError::UnclosedQuote);
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows.retain(|r| r.iter().any(|cell| !cell.trim().is_empty()));

    if rows.is_empty() {
        return Err(ImportError::NoRows);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_normalize_input() {
        assert_eq!(normalize_input("\u{feff}a,b\r\nc,d\re,f\n\n"), "a,b\nc,d\ne,f");
        assert_eq!(normalize_input("  \n a \n "), "a");
    }

    #[test]
    fn test_detect_prefers_tab() {
        assert_eq!(detect_delimiter("x,y\tz").unwrap(), Delimiter::Tab);
        assert_eq!(detect_delimiter("plain").unwrap_err(), ImportError::NoDelimiter);
    }

    #[test]
    fn test_parse_simple_csv() {
        let rows = parse_delimited("Name,Qty\nWidget,10", Delimiter::Comma).unwrap();
        assert_eq!(rows, grid(&[&["Name", "Qty"], &["Widget", "10"]]));
    }

    #[test]
    fn test_parse_quoted_fields() {
        let rows = parse_delimited(
            "Name,Note\n\"Smith, J\",\"said \"\"hi\"\"\"\n\"multi\nline\",x",
            Delimiter::Comma,
        )
        .unwrap();
        assert_eq!(rows[1], vec!["Smith, J", "said \"hi\""]);
        assert_eq!(rows[2], vec!["multi\nline", "x"]);
    }

    #[test]
    fn test_stray_quote_mid_field_is_literal() {
        let rows = parse_delimited("a,b\n5\" pipe,x", Delimiter::Comma).unwrap();
        assert_eq!(rows[1], vec!["5\" pipe", "x"]);
    }

    #[test]
    fn test_empty_quoted_field() {
        let rows = parse_delimited("a,\"\",c", Delimiter::Comma).unwrap();
        assert_eq!(rows[0], vec!["a", "", "c"]);
    }

    #[test]
    fn test_unclosed_quote() {
        let err = parse_delimited("a,\"open\nb,c", Delimiter::Comma).unwrap_err();
        assert_eq!(err, ImportError::UnclosedQuote);
    }

    #[test]
    fn test_blank_rows_dropped() {
        let rows = parse_delimited("a\tb\n\t\n \t \nc\td", Delimiter::Tab).unwrap();
        assert_eq!(rows, grid(&[&["a", "b"], &["c", "d"]]));
    }

    #[test]
    fn test_no_rows() {
        assert_eq!(parse_delimited(",,\n,", Delimiter::Comma).unwrap_err(), ImportError::NoRows);
        assert_eq!(parse_delimited("", Delimiter::Comma).unwrap_err(), ImportError::NoRows);
    }

    #[test]
    fn test_trailing_delimiter_yields_empty_cell() {
        let rows = parse_delimited("a,b,", Delimiter::Comma).unwrap();
        assert_eq!(rows[0], vec!["a", "b", ""]);
    }
}
