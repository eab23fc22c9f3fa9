//! # Domain Header Schemas
//!
//! Checks the header row of a canonical TSV against a fixed set of
//! required and optional column names.
//!
//! Names are compared exactly after trimming surrounding whitespace.

use std::collections::{HashMap, HashSet};

use crate::error::HeaderError;

/// Required and optional column names for one kind of import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderSchema {
    pub name: &'static str,
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
}

/// Purchase history import.
pub const PURCHASE_HEADERS: HeaderSchema = HeaderSchema {
    name: "purchases",
    required: &[
        "Description",
        "Quantity",
        "Cost",
        "Usable Quantity",
        "Purchase Date",
    ],
    optional: &["Material", "Variation", "Marketplace", "Store"],
};

/// Material catalog import.
pub const MATERIAL_HEADERS: HeaderSchema = HeaderSchema {
    name: "materials",
    required: &["Name", "Unit", "Unit Cost"],
    optional: &["Code", "Category", "Supplier"],
};

/// Column positions of a validated header row, keyed by schema name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderIndex {
    columns: HashMap<&'static str, usize>,
}

impl HeaderIndex {
    /// 0-based column of `name`, if the header has it.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.get(name).copied()
    }
}

impl HeaderSchema {
    /// Union of required and optional names, required first.
    pub fn allowed(&self) -> impl Iterator<Item = &'static str> {
        self.required.iter().chain(self.optional.iter()).copied()
    }

    /// Validates the first non-blank line of `tsv`.
    pub fn validate(&self, tsv: &str) -> Result<HeaderIndex, HeaderError> {
        let line = tsv
            .lines()
            .find(|line| !line.trim().is_empty())
            .ok_or(HeaderError::EmptyHeaderRow)?;

        let names: Vec<&str> = line.split('\t').map(str::trim).collect();
        self.validate_names(&names)
    }

    /// Validates an already split header row.
    ///
    /// ## Check Order
    /// 1. non-empty row
    /// 2. no blank names (1-based positions)
    /// 3. no duplicates
    /// 4. nothing outside the allowed set
    /// 5. every required name present
    pub fn validate_names(&self, names: &[&str]) -> Result<HeaderIndex, HeaderError> {
        if names.iter().all(|n| n.trim().is_empty()) {
            return Err(HeaderError::EmptyHeaderRow);
        }

        let positions: Vec<usize> = names
            .iter()
            .enumerate()
            .filter(|(_, n)| n.trim().is_empty())
            .map(|(i, _)| i + 1)
            .collect();
        if !positions.is_empty() {
            return Err(HeaderError::EmptyColumnNames { positions });
        }

        let mut seen = HashSet::new();
        let mut duplicates: Vec<String> = Vec::new();
        for name in names.iter().map(|n| n.trim()) {
            if !seen.insert(name) && !duplicates.iter().any(|d| d == name) {
                duplicates.push(name.to_string());
            }
        }
        if !duplicates.is_empty() {
            return Err(HeaderError::DuplicateHeaders { names: duplicates });
        }

        let unknown: Vec<String> = names
            .iter()
            .map(|n| n.trim())
            .filter(|n| !self.allowed().any(|a| a == *n))
            .map(str::to_string)
            .collect();
        if !unknown.is_empty() {
            return Err(HeaderError::UnknownHeaders {
                names: unknown,
                allowed: self.allowed().map(str::to_string).collect(),
            });
        }

        let missing: Vec<String> = self
            .required
            .iter()
            .filter(|r| !seen.contains(**r))
            .map(|r| r.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(HeaderError::MissingHeaders { names: missing });
        }

        let columns = self
            .allowed()
            .filter_map(|canonical| {
                names
                    .iter()
                    .position(|n| n.trim() == canonical)
                    .map(|idx| (canonical, idx))
            })
            .collect();

        Ok(HeaderIndex { columns })
    }
}

/// Validates a purchase import's header row.
///
/// ## Example
/// ```rust
/// use costbook_core::import::schema::validate_purchase_headers;
///
/// let tsv = "Description\tQuantity\tCost\tUsable Quantity\tPurchase Date\tStore\n";
/// assert!(validate_purchase_headers(tsv).is_ok());
/// assert!(validate_purchase_headers("Description\tCost").is_err());
/// ```
pub fn validate_purchase_headers(tsv: &str) -> Result<HeaderIndex, HeaderError> {
    PURCHASE_HEADERS.validate(tsv)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "Description\tQuantity\tCost\tUsable Quantity\tPurchase Date";

    #[test]
    fn test_required_only_is_valid() {
        let index = validate_purchase_headers(FULL).unwrap();
        assert_eq!(index.column("Cost"), Some(2));
        assert_eq!(index.column("Store"), None);
        assert_eq!(index.column("Purchase Date"), Some(4));
    }

    #[test]
    fn test_first_non_blank_line_is_header() {
        let tsv = format!("\n  \n{FULL}\tMaterial\nWax\t1\t2\t1\t2024-01-01\tSoy");
        let index = validate_purchase_headers(&tsv).unwrap();
        assert_eq!(index.column("Material"), Some(5));
    }

    #[test]
    fn test_empty_header_row() {
        assert_eq!(
            validate_purchase_headers("\n \n"),
            Err(HeaderError::EmptyHeaderRow)
        );
    }

    #[test]
    fn test_blank_names_reported_by_position() {
        let err = validate_purchase_headers("Description\t\tCost\t ").unwrap_err();
        assert_eq!(
            err,
            HeaderError::EmptyColumnNames {
                positions: vec![2, 4]
            }
        );
    }

    #[test]
    fn test_duplicates_reported_once() {
        let err = validate_purchase_headers("Cost\tCost\tStore\tCost\tStore").unwrap_err();
        assert_eq!(
            err,
            HeaderError::DuplicateHeaders {
                names: vec!["Cost".to_string(), "Store".to_string()]
            }
        );
    }

    #[test]
    fn test_unknown_headers_list_allowed_set() {
        let err = validate_purchase_headers(&format!("{FULL}\tColour")).unwrap_err();
        match &err {
            HeaderError::UnknownHeaders { names, allowed } => {
                assert_eq!(names, &vec!["Colour".to_string()]);
                assert_eq!(allowed.len(), 9);
                assert_eq!(allowed[0], "Description");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("Allowed headers: Description, Quantity"));
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let err = validate_purchase_headers(
            "description\tQuantity\tCost\tUsable Quantity\tPurchase Date",
        )
        .unwrap_err();
        assert!(matches!(err, HeaderError::UnknownHeaders { .. }));
    }

    #[test]
    fn test_missing_required() {
        let err = validate_purchase_headers("Description\tCost\tStore").unwrap_err();
        assert_eq!(
            err,
            HeaderError::MissingHeaders {
                names: vec![
                    "Quantity".to_string(),
                    "Usable Quantity".to_string(),
                    "Purchase Date".to_string()
                ]
            }
        );
    }

    #[test]
    fn test_material_schema() {
        assert!(MATERIAL_HEADERS.validate("Name\tUnit Cost\tUnit\tSupplier").is_ok());
        assert!(MATERIAL_HEADERS.validate("Name\tUnit").is_err());
    }
}
