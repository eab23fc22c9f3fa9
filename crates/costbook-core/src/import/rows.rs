//! # Typed Purchase Rows
//!
//! Reads the data lines of a canonical purchase TSV into typed rows and
//! turns them into [`PurchaseRecord`]s.
//!
//! ## Cell Formats
//! - Quantities: `12`, `1,200.5`
//! - Cost (total paid for the line): `15`, `$1,200.00`, `€ 3.50`
//! - Purchase date: `2024-3-9`, `2024/03/09`
//! - Optional columns: blank reads as ""

use chrono::NaiveDate;

use super::header::{is_currency_amount, is_iso_date, is_number, strip_amount};
use super::schema::{HeaderIndex, PURCHASE_HEADERS};
use crate::error::{CoreResult, ImportError};
use crate::money::round_cents;
use crate::types::{MaterialRecord, PurchaseRecord};

/// One data line of a purchase import.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseImportRow {
    /// 1-based row number, header = 1.
    pub row: usize,
    pub description: String,
    pub quantity: f64,
    /// Total paid for the line.
    pub cost_cents: i64,
    /// Quantity that ends up usable after trimming/spoilage.
    pub usable_quantity: f64,
    pub purchase_date: NaiveDate,
    pub material: String,
    pub variation: String,
    pub marketplace: String,
    pub store: String,
}

impl PurchaseImportRow {
    /// Cost of one usable unit, falling back to the purchased quantity when
    /// nothing usable was recorded.
    pub fn unit_cost_cents(&self) -> i64 {
        let divisor = if self.usable_quantity > 0.0 {
            self.usable_quantity
        } else {
            self.quantity
        };

        if divisor > 0.0 {
            round_cents(self.cost_cents as f64 / divisor)
        } else {
            self.cost_cents
        }
    }

    /// Builds a purchase, linking the catalog material whose name matches
    /// the `Material` column (case-insensitive).
    pub fn into_record(self, materials: &[MaterialRecord]) -> PurchaseRecord {
        let wanted = self.material.trim();
        let material_id = (!wanted.is_empty())
            .then(|| {
                materials
                    .iter()
                    .find(|m| m.name.trim().eq_ignore_ascii_case(wanted))
                    .map(|m| m.id.clone())
            })
            .flatten();

        let quantity = if self.usable_quantity > 0.0 {
            self.usable_quantity
        } else {
            self.quantity
        };

        let mut record = PurchaseRecord::new(material_id, quantity, self.unit_cost_cents());
        record.supplier = if self.store.is_empty() {
            self.marketplace.clone()
        } else {
            self.store.clone()
        };
        record.notes = if self.variation.is_empty() {
            self.description
        } else {
            format!("{} ({})", self.description, self.variation)
        };
        record.purchase_date = Some(self.purchase_date);
        record
    }
}

/// Validates the header of `tsv` and reads every data line.
pub fn parse_purchase_rows(tsv: &str) -> CoreResult<Vec<PurchaseImportRow>> {
    let index = PURCHASE_HEADERS.validate(tsv)?;

    let rows = tsv
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .skip(1)
        .map(|(idx, line)| {
            let cells: Vec<&str> = line.split('\t').map(str::trim).collect();
            read_row(&index, &cells, idx + 1)
        })
        .collect::<Result<Vec<_>, ImportError>>()?;

    Ok(rows)
}

fn read_row(index: &HeaderIndex, cells: &[&str], row: usize) -> Result<PurchaseImportRow, ImportError> {
    let cell = |name: &str| cell_at(index, cells, name);

    Ok(PurchaseImportRow {
        row,
        description: cell("Description").to_string(),
        quantity: read_quantity(cell("Quantity"), row, "Quantity")?,
        cost_cents: read_cost(cell("Cost"), row)?,
        usable_quantity: read_quantity(cell("Usable Quantity"), row, "Usable Quantity")?,
        purchase_date: read_date(cell("Purchase Date"), row)?,
        material: cell("Material").to_string(),
        variation: cell("Variation").to_string(),
        marketplace: cell("Marketplace").to_string(),
        store: cell("Store").to_string(),
    })
}

fn cell_at<'a>(index: &HeaderIndex, cells: &[&'a str], name: &str) -> &'a str {
    index
        .column(name)
        .and_then(|col| cells.get(col).copied())
        .unwrap_or("")
}

fn invalid(row: usize, column: &str, value: &str, expected: &'static str) -> ImportError {
    ImportError::InvalidValue {
        row,
        column: column.to_string(),
        value: value.to_string(),
        expected,
    }
}

fn read_quantity(value: &str, row: usize, column: &str) -> Result<f64, ImportError> {
    if !is_number(value) {
        return Err(invalid(row, column, value, "a non-negative number"));
    }

    value
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|q| q.is_finite() && *q >= 0.0)
        .ok_or_else(|| invalid(row, column, value, "a non-negative number"))
}

fn read_cost(value: &str, row: usize) -> Result<i64, ImportError> {
    if !is_number(value) && !is_currency_amount(value) {
        return Err(invalid(row, "Cost", value, "a money amount"));
    }

    strip_amount(value)
        .parse::<f64>()
        .ok()
        .filter(|c| c.is_finite() && *c >= 0.0)
        .map(|major| round_cents(major * 100.0))
        .ok_or_else(|| invalid(row, "Cost", value, "a money amount"))
}

fn read_date(value: &str, row: usize) -> Result<NaiveDate, ImportError> {
    if !is_iso_date(value) {
        return Err(invalid(row, "Purchase Date", value, "a YYYY-MM-DD date"));
    }

    NaiveDate::parse_from_str(&value.replace('/', "-"), "%Y-%m-%d")
        .map_err(|_| invalid(row, "Purchase Date", value, "a YYYY-MM-DD date"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CoreError, HeaderError};

    const HEADER: &str = "Description\tQuantity\tCost\tUsable Quantity\tPurchase Date\tMaterial\tStore";

    #[test]
    fn test_rows_are_read() {
        let tsv = format!(
            "{HEADER}\nSoy wax flakes\t2\t$24.00\t2\t2024-3-9\tsoy wax\tCandleCo\nWick pack\t1,000\t15\t950\t2024/03/10\t\t"
        );
        let rows = parse_purchase_rows(&tsv).unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].row, 2);
        assert_eq!(rows[0].cost_cents, 2400);
        assert_eq!(rows[0].purchase_date, NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());

        assert_eq!(rows[1].quantity, 1000.0);
        assert_eq!(rows[1].usable_quantity, 950.0);
        assert_eq!(rows[1].material, "");
    }

    #[test]
    fn test_bad_value_names_row_and_column() {
        let tsv = format!("{HEADER}\nWax\t2\t24\t2\t2024-01-01\t\t\nWick\tlots\t15\t1\t2024-01-01\t\t");
        let err = parse_purchase_rows(&tsv).unwrap_err();
        match err {
            CoreError::Import(ImportError::InvalidValue { row, column, value, .. }) => {
                assert_eq!(row, 3);
                assert_eq!(column, "Quantity");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_header_errors_pass_through() {
        let err = parse_purchase_rows("Description\tCost\nWax\t1").unwrap_err();
        assert!(matches!(err, CoreError::Header(HeaderError::MissingHeaders { .. })));
    }

    #[test]
    fn test_negative_cost_rejected() {
        let tsv = format!("{HEADER}\nWax\t2\t-$5\t2\t2024-01-01\t\t");
        assert!(parse_purchase_rows(&tsv).is_err());
    }

    #[test]
    fn test_unit_cost_uses_usable_quantity() {
        let tsv = format!("{HEADER}\nLeather hide\t10\t100.00\t8\t2024-05-01\t\t");
        let row = parse_purchase_rows(&tsv).unwrap().remove(0);
        assert_eq!(row.unit_cost_cents(), 1250);

        let no_usable = PurchaseImportRow {
            usable_quantity: 0.0,
            ..row.clone()
        };
        assert_eq!(no_usable.unit_cost_cents(), 1000);

        let nothing = PurchaseImportRow {
            usable_quantity: 0.0,
            quantity: 0.0,
            ..row
        };
        assert_eq!(nothing.unit_cost_cents(), 10000);
    }

    #[test]
    fn test_into_record_links_material_by_name() {
        let wax = MaterialRecord::new("Soy Wax", "kg", 900);
        let tsv = format!("{HEADER}\nSoy wax flakes\t2\t$24.00\t2\t2024-3-9\tsoy wax\tCandleCo");
        let row = parse_purchase_rows(&tsv).unwrap().remove(0);

        let record = row.into_record(std::slice::from_ref(&wax));
        assert_eq!(record.material_id.as_deref(), Some(wax.id.as_str()));
        assert_eq!(record.unit_cost_cents, 1200);
        assert_eq!(record.total_cost_cents, 2400);
        assert_eq!(record.supplier, "CandleCo");
        assert_eq!(record.purchase_date, NaiveDate::from_ymd_opt(2024, 3, 9));
    }

    #[test]
    fn test_into_record_without_match() {
        let tsv = format!("{HEADER}\nMystery\t1\t5\t1\t2024-01-01\tunobtainium\t");
        let row = parse_purchase_rows(&tsv).unwrap().remove(0);
        assert_eq!(row.into_record(&[]).material_id, None);
    }
}
