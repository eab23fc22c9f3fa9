//! # Purchase Repository
//!
//! Database operations for purchases.
//!
//! ## Purchase Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Recording a Purchase                                 │
//! │                                                                         │
//! │  insert(owner, purchase)                                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN TRANSACTION                                                     │
//! │       │                                                                 │
//! │       ├── INSERT INTO purchases (total re-derived from qty × unit)     │
//! │       │                                                                 │
//! │       ├── material_id set?                                             │
//! │       │     └── UPDATE materials SET unit_cost, last_purchase_*        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT (or ROLLBACK on any failure)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::material::MaterialRepository;
use crate::store::RecordStore;
use costbook_core::import::{parse_purchase_rows, PurchaseImportRow};
use costbook_core::validation::validate_purchase_record;
use costbook_core::{MaterialRecord, PurchaseRecord};

const SELECT_PURCHASE: &str = r#"
    SELECT
        id, material_id, quantity, unit_cost_cents, total_cost_cents,
        supplier, reference_number, notes, purchase_date,
        created_at, updated_at
    FROM purchases
"#;

#[derive(Debug, FromRow)]
struct PurchaseRow {
    id: String,
    material_id: Option<String>,
    quantity: f64,
    unit_cost_cents: i64,
    total_cost_cents: i64,
    supplier: String,
    reference_number: String,
    notes: String,
    purchase_date: Option<NaiveDate>,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl From<PurchaseRow> for PurchaseRecord {
    fn from(row: PurchaseRow) -> Self {
        PurchaseRecord {
            id: row.id,
            material_id: row.material_id,
            quantity: row.quantity,
            unit_cost_cents: row.unit_cost_cents,
            total_cost_cents: row.total_cost_cents,
            supplier: row.supplier,
            reference_number: row.reference_number,
            notes: row.notes,
            purchase_date: row.purchase_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for purchases.
#[derive(Debug, Clone)]
pub struct PurchaseRepository {
    pool: SqlitePool,
}

impl PurchaseRepository {
    /// Creates a new PurchaseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseRepository { pool }
    }

    /// Lists the purchases of one material, newest first.
    pub async fn list_for_material(&self, owner_id: &str, material_id: &str) -> DbResult<Vec<PurchaseRecord>> {
        let sql = format!(
            "{SELECT_PURCHASE} WHERE owner_id = ?1 AND material_id = ?2 ORDER BY purchase_date DESC, created_at DESC"
        );

        let rows = sqlx::query_as::<_, PurchaseRow>(&sql)
            .bind(owner_id)
            .bind(material_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(PurchaseRecord::from).collect())
    }

    /// Imports a canonical purchase TSV in one transaction.
    ///
    /// Rows are linked to catalog materials by name; every linked material
    /// has its cost refreshed. Any bad row aborts the whole import.
    ///
    /// ## Returns
    /// The inserted purchases, in file order.
    pub async fn import_tsv(&self, owner_id: &str, tsv: &str) -> DbResult<Vec<PurchaseRecord>> {
        let rows: Vec<PurchaseImportRow> = parse_purchase_rows(tsv)?;
        let materials = self.catalog(owner_id).await?;

        let records: Vec<PurchaseRecord> = rows
            .into_iter()
            .map(|row| row.into_record(&materials))
            .collect();
        for record in &records {
            validate_purchase_record(record)?;
        }

        let mut tx = self.pool.begin().await?;
        for record in &records {
            Self::insert_in(&mut tx, owner_id, record).await?;
        }
        tx.commit().await?;

        let linked = records.iter().filter(|r| r.material_id.is_some()).count();
        info!(count = records.len(), linked, "Imported purchases");
        Ok(records)
    }

    async fn catalog(&self, owner_id: &str) -> DbResult<Vec<MaterialRecord>> {
        MaterialRepository::new(self.pool.clone()).list_active(owner_id).await
    }

    /// Inserts one purchase and refreshes its material on `tx`.
    async fn insert_in(
        tx: &mut Transaction<'_, Sqlite>,
        owner_id: &str,
        purchase: &PurchaseRecord,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO purchases (
                id, owner_id, material_id, quantity, unit_cost_cents, total_cost_cents,
                supplier, reference_number, notes, purchase_date, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&purchase.id)
        .bind(owner_id)
        .bind(&purchase.material_id)
        .bind(purchase.quantity)
        .bind(purchase.unit_cost_cents)
        .bind(purchase.total_cost_cents)
        .bind(&purchase.supplier)
        .bind(&purchase.reference_number)
        .bind(&purchase.notes)
        .bind(purchase.purchase_date)
        .bind(purchase.created_at)
        .bind(purchase.updated_at)
        .execute(&mut **tx)
        .await?;

        if let Some(material_id) = &purchase.material_id {
            MaterialRepository::apply_purchase(
                tx,
                owner_id,
                material_id,
                purchase.unit_cost_cents,
                purchase.purchase_date,
            )
            .await?;
        }

        Ok(())
    }
}

impl RecordStore<PurchaseRecord> for PurchaseRepository {
    async fn get(&self, owner_id: &str, id: &str) -> DbResult<Option<PurchaseRecord>> {
        let sql = format!("{SELECT_PURCHASE} WHERE id = ?1 AND owner_id = ?2");

        let row = sqlx::query_as::<_, PurchaseRow>(&sql)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(PurchaseRecord::from))
    }

    async fn list(&self, owner_id: &str) -> DbResult<Vec<PurchaseRecord>> {
        let sql = format!("{SELECT_PURCHASE} WHERE owner_id = ?1 ORDER BY purchase_date DESC, created_at DESC");

        let rows = sqlx::query_as::<_, PurchaseRow>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(PurchaseRecord::from).collect())
    }

    /// Inserts a purchase; the total is re-derived and a linked material
    /// has its cost refreshed in the same transaction.
    async fn insert(&self, owner_id: &str, purchase: &PurchaseRecord) -> DbResult<PurchaseRecord> {
        debug!(material_id = ?purchase.material_id, "Inserting purchase");

        let mut purchase = purchase.clone();
        purchase.recompute_total();
        validate_purchase_record(&purchase)?;

        let mut tx = self.pool.begin().await?;
        Self::insert_in(&mut tx, owner_id, &purchase).await?;
        tx.commit().await?;

        Ok(purchase)
    }

    /// Updates a purchase. The catalog is not touched: only new purchases
    /// move a material's current cost.
    async fn update(&self, owner_id: &str, purchase: &PurchaseRecord) -> DbResult<PurchaseRecord> {
        debug!(id = %purchase.id, "Updating purchase");

        let mut updated = purchase.clone();
        updated.recompute_total();
        updated.updated_at = Utc::now();
        validate_purchase_record(&updated)?;

        let result = sqlx::query(
            r#"
            UPDATE purchases SET
                material_id = ?3,
                quantity = ?4,
                unit_cost_cents = ?5,
                total_cost_cents = ?6,
                supplier = ?7,
                reference_number = ?8,
                notes = ?9,
                purchase_date = ?10,
                updated_at = ?11
            WHERE id = ?1 AND owner_id = ?2
            "#,
        )
        .bind(&updated.id)
        .bind(owner_id)
        .bind(&updated.material_id)
        .bind(updated.quantity)
        .bind(updated.unit_cost_cents)
        .bind(updated.total_cost_cents)
        .bind(&updated.supplier)
        .bind(&updated.reference_number)
        .bind(&updated.notes)
        .bind(updated.purchase_date)
        .bind(updated.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Purchase", &purchase.id));
        }

        Ok(updated)
    }

    async fn delete(&self, owner_id: &str, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting purchase");

        let result = sqlx::query("DELETE FROM purchases WHERE id = ?1 AND owner_id = ?2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Purchase", id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use costbook_core::{CoreError, ImportError};

    const OWNER: &str = "owner-1";

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_purchase_refreshes_material() {
        let db = db().await;
        let wax = MaterialRecord::new("Soy wax", "kg", 800);
        db.materials().insert(OWNER, &wax).await.unwrap();

        let mut purchase = PurchaseRecord::new(Some(wax.id.clone()), 3.0, 925);
        purchase.purchase_date = NaiveDate::from_ymd_opt(2024, 6, 1);
        purchase.total_cost_cents = 1;
        let stored = db.purchases().insert(OWNER, &purchase).await.unwrap();
        assert_eq!(stored.total_cost_cents, 2775);

        let wax = db.materials().get(OWNER, &wax.id).await.unwrap().unwrap();
        assert_eq!(wax.unit_cost_cents, 925);
        assert_eq!(wax.last_purchase_cost_cents, Some(925));
        assert_eq!(wax.last_purchase_date, NaiveDate::from_ymd_opt(2024, 6, 1));
    }

    #[tokio::test]
    async fn test_purchase_for_foreign_material_rolls_back() {
        let db = db().await;
        let wax = MaterialRecord::new("Soy wax", "kg", 800);
        db.materials().insert("other-owner", &wax).await.unwrap();

        let purchase = PurchaseRecord::new(Some(wax.id.clone()), 1.0, 100);
        assert!(db.purchases().insert(OWNER, &purchase).await.is_err());
        assert!(db.purchases().list(OWNER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unlinked_purchase() {
        let db = db().await;
        let purchase = PurchaseRecord::new(None, 2.0, 150);
        db.purchases().insert(OWNER, &purchase).await.unwrap();

        let loaded = db.purchases().get(OWNER, &purchase.id).await.unwrap().unwrap();
        assert_eq!(loaded.material_id, None);
        assert_eq!(loaded.total_cost_cents, 300);
    }

    #[tokio::test]
    async fn test_import_tsv() {
        let db = db().await;
        let wax = MaterialRecord::new("Soy Wax", "kg", 800);
        db.materials().insert(OWNER, &wax).await.unwrap();

        let tsv = "Description\tQuantity\tCost\tUsable Quantity\tPurchase Date\tMaterial\n\
                   Wax flakes\t2\t$20.00\t2\t2024-02-01\tsoy wax\n\
                   Jars\t12\t30\t12\t2024-02-02\t";
        let imported = db.purchases().import_tsv(OWNER, tsv).await.unwrap();
        assert_eq!(imported.len(), 2);
        assert_eq!(imported[0].material_id.as_deref(), Some(wax.id.as_str()));

        let wax = db.materials().get(OWNER, &wax.id).await.unwrap().unwrap();
        assert_eq!(wax.unit_cost_cents, 1000);
        assert_eq!(db.purchases().list(OWNER).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_import_tsv_is_all_or_nothing() {
        let db = db().await;
        let tsv = "Description\tQuantity\tCost\tUsable Quantity\tPurchase Date\n\
                   Jars\t12\t30\t12\t2024-02-02\n\
                   Lids\tmany\t5\t1\t2024-02-02";

        let err = db.purchases().import_tsv(OWNER, tsv).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::Import(ImportError::InvalidValue { row: 3, .. }))
        ));
        assert!(db.purchases().list(OWNER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_for_material() {
        let db = db().await;
        let wax = MaterialRecord::new("Soy wax", "kg", 800);
        db.materials().insert(OWNER, &wax).await.unwrap();

        db.purchases()
            .insert(OWNER, &PurchaseRecord::new(Some(wax.id.clone()), 1.0, 100))
            .await
            .unwrap();
        db.purchases()
            .insert(OWNER, &PurchaseRecord::new(None, 1.0, 100))
            .await
            .unwrap();

        let history = db.purchases().list_for_material(OWNER, &wax.id).await.unwrap();
        assert_eq!(history.len(), 1);
    }
}
