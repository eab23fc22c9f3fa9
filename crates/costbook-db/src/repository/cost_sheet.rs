//! # Cost Sheet Repository
//!
//! Database operations for cost sheets.
//!
//! Line items (materials, labor, overhead) are stored as JSON arrays in
//! their own columns. They are read back through the record normalizers,
//! so rows written by older builds still load.

use chrono::Utc;
use serde_json::Value;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::store::RecordStore;
use costbook_core::normalize::{normalize_labor_item, normalize_material_item, normalize_overhead_item};
use costbook_core::validation::validate_cost_sheet;
use costbook_core::{compute_totals, CostBreakdown, CostSheet};

const SELECT_SHEET: &str = r#"
    SELECT
        id, name, sku, currency, unit_name, batch_size, waste_pct, markup_pct, tax_pct,
        materials, labor, overhead, notes, created_at, updated_at
    FROM cost_sheets
"#;

#[derive(Debug, FromRow)]
struct CostSheetRow {
    id: String,
    name: String,
    sku: String,
    currency: String,
    unit_name: String,
    batch_size: f64,
    waste_pct: f64,
    markup_pct: f64,
    tax_pct: f64,
    materials: String,
    labor: String,
    overhead: String,
    notes: String,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

/// Parses a JSON array column, mapping each element through `normalize`.
fn items<T>(column: &str, normalize: fn(&Value) -> T) -> DbResult<Vec<T>> {
    let value: Value = serde_json::from_str(column)?;
    Ok(value
        .as_array()
        .map(|items| items.iter().map(normalize).collect())
        .unwrap_or_default())
}

impl TryFrom<CostSheetRow> for CostSheet {
    type Error = DbError;

    fn try_from(row: CostSheetRow) -> Result<Self, Self::Error> {
        Ok(CostSheet {
            id: row.id,
            name: row.name,
            sku: row.sku,
            currency: row.currency,
            unit_name: row.unit_name,
            batch_size: row.batch_size,
            waste_pct: row.waste_pct,
            markup_pct: row.markup_pct,
            tax_pct: row.tax_pct,
            materials: items(&row.materials, normalize_material_item)?,
            labor: items(&row.labor, normalize_labor_item)?,
            overhead: items(&row.overhead, normalize_overhead_item)?,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for cost sheets.
#[derive(Debug, Clone)]
pub struct CostSheetRepository {
    pool: SqlitePool,
}

impl CostSheetRepository {
    /// Creates a new CostSheetRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CostSheetRepository { pool }
    }

    /// Loads a sheet and rolls up its totals.
    pub async fn totals(&self, owner_id: &str, id: &str) -> DbResult<CostBreakdown> {
        let sheet = self
            .get(owner_id, id)
            .await?
            .ok_or_else(|| DbError::not_found("Cost sheet", id))?;

        let breakdown = compute_totals(&sheet);
        debug!(
            id = %id,
            batch_total_cents = breakdown.batch_total_cents,
            cost_per_unit_cents = ?breakdown.cost_per_unit_cents,
            "Computed cost sheet totals"
        );

        Ok(breakdown)
    }

    /// Finds sheets whose name or SKU contains `query`, ignoring ASCII case.
    pub async fn search(&self, owner_id: &str, query: &str, limit: i64) -> DbResult<Vec<CostSheet>> {
        let sql = format!(
            "{SELECT_SHEET} WHERE owner_id = ?1 AND (name LIKE ?2 OR sku LIKE ?2) ORDER BY name LIMIT ?3"
        );
        let pattern = format!("%{}%", query.trim());

        let rows = sqlx::query_as::<_, CostSheetRow>(&sql)
            .bind(owner_id)
            .bind(pattern)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(CostSheet::try_from).collect()
    }
}

impl RecordStore<CostSheet> for CostSheetRepository {
    async fn get(&self, owner_id: &str, id: &str) -> DbResult<Option<CostSheet>> {
        let sql = format!("{SELECT_SHEET} WHERE id = ?1 AND owner_id = ?2");

        let row = sqlx::query_as::<_, CostSheetRow>(&sql)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(CostSheet::try_from).transpose()
    }

    async fn list(&self, owner_id: &str) -> DbResult<Vec<CostSheet>> {
        let sql = format!("{SELECT_SHEET} WHERE owner_id = ?1 ORDER BY name");

        let rows = sqlx::query_as::<_, CostSheetRow>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(CostSheet::try_from).collect()
    }

    async fn insert(&self, owner_id: &str, sheet: &CostSheet) -> DbResult<CostSheet> {
        debug!(name = %sheet.name, "Inserting cost sheet");
        validate_cost_sheet(sheet)?;

        sqlx::query(
            r#"
            INSERT INTO cost_sheets (
                id, owner_id, name, sku, currency, unit_name, batch_size,
                waste_pct, markup_pct, tax_pct, materials, labor, overhead,
                notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
        )
        .bind(&sheet.id)
        .bind(owner_id)
        .bind(sheet.name.trim())
        .bind(sheet.sku.trim())
        .bind(&sheet.currency)
        .bind(&sheet.unit_name)
        .bind(sheet.batch_size)
        .bind(sheet.waste_pct)
        .bind(sheet.markup_pct)
        .bind(sheet.tax_pct)
        .bind(serde_json::to_string(&sheet.materials)?)
        .bind(serde_json::to_string(&sheet.labor)?)
        .bind(serde_json::to_string(&sheet.overhead)?)
        .bind(&sheet.notes)
        .bind(sheet.created_at)
        .bind(sheet.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(sheet.clone())
    }

    async fn update(&self, owner_id: &str, sheet: &CostSheet) -> DbResult<CostSheet> {
        debug!(id = %sheet.id, "Updating cost sheet");
        validate_cost_sheet(sheet)?;

        let mut updated = sheet.clone();
        updated.updated_at = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE cost_sheets SET
                name = ?3,
                sku = ?4,
                currency = ?5,
                unit_name = ?6,
                batch_size = ?7,
                waste_pct = ?8,
                markup_pct = ?9,
                tax_pct = ?10,
                materials = ?11,
                labor = ?12,
                overhead = ?13,
                notes = ?14,
                updated_at = ?15
            WHERE id = ?1 AND owner_id = ?2
            "#,
        )
        .bind(&updated.id)
        .bind(owner_id)
        .bind(updated.name.trim())
        .bind(updated.sku.trim())
        .bind(&updated.currency)
        .bind(&updated.unit_name)
        .bind(updated.batch_size)
        .bind(updated.waste_pct)
        .bind(updated.markup_pct)
        .bind(updated.tax_pct)
        .bind(serde_json::to_string(&updated.materials)?)
        .bind(serde_json::to_string(&updated.labor)?)
        .bind(serde_json::to_string(&updated.overhead)?)
        .bind(&updated.notes)
        .bind(updated.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Cost sheet", &sheet.id));
        }

        Ok(updated)
    }

    async fn delete(&self, owner_id: &str, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting cost sheet");

        let result = sqlx::query("DELETE FROM cost_sheets WHERE id = ?1 AND owner_id = ?2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Cost sheet", id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use costbook_core::{AppSettings, LaborItem, MaterialItem, OverheadItem};

    const OWNER: &str = "owner-1";

    fn soap_batch() -> CostSheet {
        let mut sheet = CostSheet::with_defaults("Lavender soap", &AppSettings::default());
        sheet.sku = "SOAP-LAV".into();
        sheet.batch_size = 10.0;
        sheet.waste_pct = 0.0;
        sheet.markup_pct = 50.0;
        sheet.tax_pct = 0.0;
        sheet.materials.push(MaterialItem {
            id: "m1".into(),
            name: "Oil blend".into(),
            quantity: 2.0,
            unit: "kg".into(),
            unit_cost_cents: 300,
        });
        sheet.labor.push(LaborItem {
            id: "l1".into(),
            role: "Pour".into(),
            hours: 0.5,
            rate_cents: 1200,
        });
        sheet.overhead.push(OverheadItem::Flat {
            id: "o1".into(),
            name: "Packaging".into(),
            amount_cents: 200,
        });
        sheet.overhead.push(OverheadItem::Percent {
            id: "o2".into(),
            name: "Utilities".into(),
            percent: 10.0,
        });
        sheet
    }

    #[tokio::test]
    async fn test_insert_and_get_keeps_line_items() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let sheet = soap_batch();
        db.cost_sheets().insert(OWNER, &sheet).await.unwrap();

        let loaded = db.cost_sheets().get(OWNER, &sheet.id).await.unwrap().unwrap();
        assert_eq!(loaded.materials, sheet.materials);
        assert_eq!(loaded.labor, sheet.labor);
        assert_eq!(loaded.overhead, sheet.overhead);
    }

    #[tokio::test]
    async fn test_totals() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let sheet = soap_batch();
        db.cost_sheets().insert(OWNER, &sheet).await.unwrap();

        // materials 600 + labor 600 = 1200 base; +200 flat +120 percent
        let totals = db.cost_sheets().totals(OWNER, &sheet.id).await.unwrap();
        assert_eq!(totals.base_cents, 1200);
        assert_eq!(totals.overhead_total_cents, 320);
        assert_eq!(totals.batch_total_cents, 1520);
        assert_eq!(totals.cost_per_unit_cents, Some(152));
        assert_eq!(totals.price_per_unit_cents, Some(228));
    }

    #[tokio::test]
    async fn test_totals_for_missing_sheet() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(matches!(
            db.cost_sheets().totals(OWNER, "nope").await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_search_and_update() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut sheet = soap_batch();
        db.cost_sheets().insert(OWNER, &sheet).await.unwrap();

        assert_eq!(db.cost_sheets().search(OWNER, "soap-lav", 10).await.unwrap().len(), 1);
        assert!(db.cost_sheets().search(OWNER, "candle", 10).await.unwrap().is_empty());

        sheet.markup_pct = 100.0;
        db.cost_sheets().update(OWNER, &sheet).await.unwrap();
        let totals = db.cost_sheets().totals(OWNER, &sheet.id).await.unwrap();
        assert_eq!(totals.price_per_unit_cents, Some(304));
    }

    #[tokio::test]
    async fn test_invalid_sheet_is_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut sheet = soap_batch();
        sheet.currency = "dollars".into();
        assert!(matches!(
            db.cost_sheets().insert(OWNER, &sheet).await,
            Err(DbError::Validation(_))
        ));
    }
}
