//! # Material Repository
//!
//! Database operations for the material catalog.
//!
//! ## Key Operations
//! - Owner-scoped CRUD
//! - Case-insensitive lookup by name (purchase imports)
//! - Catalog refresh from a purchase (inside the purchase transaction)

use chrono::{NaiveDate, Utc};
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::store::RecordStore;
use costbook_core::validation::validate_material_record;
use costbook_core::MaterialRecord;

const SELECT_MATERIAL: &str = r#"
    SELECT
        id, name, code, category, unit, unit_cost_cents, supplier,
        last_purchase_cost_cents, last_purchase_date, is_active,
        created_at, updated_at
    FROM materials
"#;

/// Row shape of the `materials` table (without `owner_id`).
#[derive(Debug, FromRow)]
struct MaterialRow {
    id: String,
    name: String,
    code: String,
    category: String,
    unit: String,
    unit_cost_cents: i64,
    supplier: String,
    last_purchase_cost_cents: Option<i64>,
    last_purchase_date: Option<NaiveDate>,
    is_active: bool,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl From<MaterialRow> for MaterialRecord {
    fn from(row: MaterialRow) -> Self {
        MaterialRecord {
            id: row.id,
            name: row.name,
            code: row.code,
            category: row.category,
            unit: row.unit,
            unit_cost_cents: row.unit_cost_cents,
            supplier: row.supplier,
            last_purchase_cost_cents: row.last_purchase_cost_cents,
            last_purchase_date: row.last_purchase_date,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for catalog materials.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.materials();
/// let wax = repo.insert(owner, &MaterialRecord::new("Soy wax", "kg", 850)).await?;
/// let all = repo.list(owner).await?;
/// ```
#[derive(Debug, Clone)]
pub struct MaterialRepository {
    pool: SqlitePool,
}

impl MaterialRepository {
    /// Creates a new MaterialRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MaterialRepository { pool }
    }

    /// Finds an active material by name, ignoring ASCII case.
    pub async fn find_by_name(&self, owner_id: &str, name: &str) -> DbResult<Option<MaterialRecord>> {
        let sql = format!(
            "{SELECT_MATERIAL} WHERE owner_id = ?1 AND name = ?2 COLLATE NOCASE AND is_active = 1 LIMIT 1"
        );

        let row = sqlx::query_as::<_, MaterialRow>(&sql)
            .bind(owner_id)
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(MaterialRecord::from))
    }

    /// Lists active materials only, sorted by name.
    pub async fn list_active(&self, owner_id: &str) -> DbResult<Vec<MaterialRecord>> {
        let sql = format!("{SELECT_MATERIAL} WHERE owner_id = ?1 AND is_active = 1 ORDER BY name");

        let rows = sqlx::query_as::<_, MaterialRow>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(MaterialRecord::from).collect())
    }

    /// Counts the owner's materials.
    pub async fn count(&self, owner_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM materials WHERE owner_id = ?1")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Records a purchase price as the material's latest and current cost.
    ///
    /// Runs on the caller's transaction so the purchase and the catalog
    /// change commit together.
    pub(crate) async fn apply_purchase(
        tx: &mut Transaction<'_, Sqlite>,
        owner_id: &str,
        material_id: &str,
        unit_cost_cents: i64,
        purchase_date: Option<NaiveDate>,
    ) -> DbResult<()> {
        debug!(material_id = %material_id, unit_cost_cents, "Refreshing material cost from purchase");

        let result = sqlx::query(
            r#"
            UPDATE materials SET
                unit_cost_cents = ?3,
                last_purchase_cost_cents = ?3,
                last_purchase_date = COALESCE(?4, last_purchase_date),
                updated_at = ?5
            WHERE id = ?1 AND owner_id = ?2
            "#,
        )
        .bind(material_id)
        .bind(owner_id)
        .bind(unit_cost_cents)
        .bind(purchase_date)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Material", material_id));
        }

        Ok(())
    }
}

impl RecordStore<MaterialRecord> for MaterialRepository {
    async fn get(&self, owner_id: &str, id: &str) -> DbResult<Option<MaterialRecord>> {
        let sql = format!("{SELECT_MATERIAL} WHERE id = ?1 AND owner_id = ?2");

        let row = sqlx::query_as::<_, MaterialRow>(&sql)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(MaterialRecord::from))
    }

    async fn list(&self, owner_id: &str) -> DbResult<Vec<MaterialRecord>> {
        let sql = format!("{SELECT_MATERIAL} WHERE owner_id = ?1 ORDER BY name");

        let rows = sqlx::query_as::<_, MaterialRow>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = rows.len(), "Listed materials");
        Ok(rows.into_iter().map(MaterialRecord::from).collect())
    }

    async fn insert(&self, owner_id: &str, material: &MaterialRecord) -> DbResult<MaterialRecord> {
        debug!(name = %material.name, "Inserting material");
        validate_material_record(material)?;

        sqlx::query(
            r#"
            INSERT INTO materials (
                id, owner_id, name, code, category, unit, unit_cost_cents,
                supplier, last_purchase_cost_cents, last_purchase_date,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&material.id)
        .bind(owner_id)
        .bind(material.name.trim())
        .bind(material.code.trim())
        .bind(&material.category)
        .bind(&material.unit)
        .bind(material.unit_cost_cents)
        .bind(&material.supplier)
        .bind(material.last_purchase_cost_cents)
        .bind(material.last_purchase_date)
        .bind(material.is_active)
        .bind(material.created_at)
        .bind(material.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(material.clone())
    }

    async fn update(&self, owner_id: &str, material: &MaterialRecord) -> DbResult<MaterialRecord> {
        debug!(id = %material.id, "Updating material");
        validate_material_record(material)?;

        let mut updated = material.clone();
        updated.updated_at = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE materials SET
                name = ?3,
                code = ?4,
                category = ?5,
                unit = ?6,
                unit_cost_cents = ?7,
                supplier = ?8,
                last_purchase_cost_cents = ?9,
                last_purchase_date = ?10,
                is_active = ?11,
                updated_at = ?12
            WHERE id = ?1 AND owner_id = ?2
            "#,
        )
        .bind(&updated.id)
        .bind(owner_id)
        .bind(updated.name.trim())
        .bind(updated.code.trim())
        .bind(&updated.category)
        .bind(&updated.unit)
        .bind(updated.unit_cost_cents)
        .bind(&updated.supplier)
        .bind(updated.last_purchase_cost_cents)
        .bind(updated.last_purchase_date)
        .bind(updated.is_active)
        .bind(updated.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Material", &material.id));
        }

        Ok(updated)
    }

    async fn delete(&self, owner_id: &str, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting material");

        let result = sqlx::query("DELETE FROM materials WHERE id = ?1 AND owner_id = ?2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Material", id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    const OWNER: &str = "owner-1";

    async fn repo() -> MaterialRepository {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.materials()
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let repo = repo().await;
        let mut wax = MaterialRecord::new("Soy wax", "kg", 850);
        wax.supplier = "CandleCo".into();
        repo.insert(OWNER, &wax).await.unwrap();

        let loaded = repo.get(OWNER, &wax.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Soy wax");
        assert_eq!(loaded.unit_cost_cents, 850);
        assert_eq!(loaded.supplier, "CandleCo");
        assert!(loaded.is_active);
    }

    #[tokio::test]
    async fn test_owner_scoping() {
        let repo = repo().await;
        let wax = MaterialRecord::new("Soy wax", "kg", 850);
        repo.insert(OWNER, &wax).await.unwrap();

        assert!(repo.get("someone-else", &wax.id).await.unwrap().is_none());
        assert!(repo.list("someone-else").await.unwrap().is_empty());
        assert!(matches!(
            repo.delete("someone-else", &wax.id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let repo = repo().await;
        let mut wick = MaterialRecord::new("Wick", "pcs", 12);
        repo.insert(OWNER, &wick).await.unwrap();

        wick.unit_cost_cents = 15;
        wick.is_active = false;
        let updated = repo.update(OWNER, &wick).await.unwrap();
        assert!(updated.updated_at >= wick.updated_at);

        assert!(repo.list_active(OWNER).await.unwrap().is_empty());
        assert_eq!(repo.count(OWNER).await.unwrap(), 1);

        repo.delete(OWNER, &wick.id).await.unwrap();
        assert!(repo.get(OWNER, &wick.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let repo = repo().await;
        let ghost = MaterialRecord::new("Ghost", "pcs", 1);
        assert!(matches!(
            repo.update(OWNER, &ghost).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_validation_runs_before_insert() {
        let repo = repo().await;
        let nameless = MaterialRecord::new("  ", "kg", 1);
        assert!(matches!(
            repo.insert(OWNER, &nameless).await,
            Err(DbError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_find_by_name_ignores_case() {
        let repo = repo().await;
        let wax = MaterialRecord::new("Soy Wax", "kg", 850);
        repo.insert(OWNER, &wax).await.unwrap();

        let found = repo.find_by_name(OWNER, "  soy wax ").await.unwrap();
        assert_eq!(found.map(|m| m.id), Some(wax.id));
    }
}
