//! # BOM Repository
//!
//! Database operations for bills of materials.
//!
//! A BOM is stored as one `boms` row plus its ordered `bom_lines`. Lines are
//! always written as a whole: saving a BOM deletes its old lines and inserts
//! the new ones in the same transaction.
//!
//! ## Write Rules
//! - Lines are renumbered `0..n` by `sort_order` before they are written
//! - A write that would let the BOM reach itself is rejected
//! - A BOM used as a sub-assembly elsewhere cannot be deleted

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use crate::repository::material::MaterialRepository;
use crate::store::RecordStore;
use costbook_core::costing::{check_acyclic, normalize_sort_order};
use costbook_core::validation::validate_bom_record;
use costbook_core::{BomComponent, BomCost, BomCostResolver, BomKind, BomLine, BomRecord};

const SELECT_BOM: &str = r#"
    SELECT id, name, kind, output_qty, output_unit, notes, created_at, updated_at
    FROM boms
"#;

const SELECT_LINE: &str = r#"
    SELECT
        l.id, l.bom_id, l.component_type, l.material_id, l.component_bom_id,
        l.quantity, l.unit, l.unit_cost_cents, l.sort_order
    FROM bom_lines l
    JOIN boms b ON b.id = l.bom_id
"#;

#[derive(Debug, FromRow)]
struct BomRow {
    id: String,
    name: String,
    kind: BomKind,
    output_qty: f64,
    output_unit: String,
    notes: String,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl BomRow {
    fn into_record(self, lines: Vec<BomLine>) -> BomRecord {
        BomRecord {
            id: self.id,
            name: self.name,
            kind: self.kind,
            output_qty: self.output_qty,
            output_unit: self.output_unit,
            lines,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct BomLineRow {
    id: String,
    bom_id: String,
    component_type: String,
    material_id: Option<String>,
    component_bom_id: Option<String>,
    quantity: f64,
    unit: String,
    unit_cost_cents: Option<i64>,
    sort_order: i64,
}

impl TryFrom<BomLineRow> for BomLine {
    type Error = DbError;

    fn try_from(row: BomLineRow) -> Result<Self, Self::Error> {
        let component = match (row.component_type.as_str(), row.material_id, row.component_bom_id) {
            ("material", Some(material_id), _) => BomComponent::Material { material_id },
            ("bom_item", _, Some(component_bom_id)) => BomComponent::BomItem { component_bom_id },
            (kind, _, _) => {
                return Err(DbError::Internal(format!(
                    "BOM line {} has no target for component type '{kind}'",
                    row.id
                )))
            }
        };

        Ok(BomLine {
            id: row.id,
            component,
            quantity: row.quantity,
            unit: row.unit,
            unit_cost_cents: row.unit_cost_cents,
            sort_order: row.sort_order,
        })
    }
}

/// Repository for bills of materials.
///
/// ## Usage
/// ```rust,ignore
/// let boms = db.boms();
/// let candle = boms.insert(owner, &candle).await?;
/// let cost = boms.resolve_cost(owner, &gift_set.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct BomRepository {
    pool: SqlitePool,
}

impl BomRepository {
    /// Creates a new BomRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BomRepository { pool }
    }

    /// Loads every BOM of the owner, keyed by id.
    pub async fn load_arena(&self, owner_id: &str) -> DbResult<HashMap<String, BomRecord>> {
        Ok(self
            .list(owner_id)
            .await?
            .into_iter()
            .map(|bom| (bom.id.clone(), bom))
            .collect())
    }

    /// Resolves the total and per-unit cost of a BOM against the owner's
    /// current catalog.
    ///
    /// Dangling references cost zero; each one is logged and returned in
    /// [`BomCost::warnings`].
    pub async fn resolve_cost(&self, owner_id: &str, bom_id: &str) -> DbResult<BomCost> {
        let boms = self.load_arena(owner_id).await?;
        let materials: HashMap<_, _> = MaterialRepository::new(self.pool.clone())
            .list(owner_id)
            .await?
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect();

        let cost = BomCostResolver::new(&boms, &materials).resolve(bom_id)?;

        for warning in &cost.warnings {
            warn!(%warning, "BOM integrity problem");
        }
        debug!(
            bom_id = %bom_id,
            total_cents = cost.total_cents,
            unit_cost_cents = cost.unit_cost_cents,
            "Resolved BOM cost"
        );

        Ok(cost)
    }

    /// Names of the owner's BOMs that use `bom_id` as a sub-assembly.
    pub async fn used_by(&self, owner_id: &str, bom_id: &str) -> DbResult<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT b.name
            FROM bom_lines l
            JOIN boms b ON b.id = l.bom_id
            WHERE l.component_bom_id = ?1 AND b.owner_id = ?2
            ORDER BY b.name
            "#,
        )
        .bind(bom_id)
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(names)
    }

    /// Renumbers lines, validates, and rejects cycles against the stored BOMs.
    async fn prepare(&self, owner_id: &str, bom: &BomRecord) -> DbResult<BomRecord> {
        let mut bom = bom.clone();
        normalize_sort_order(&mut bom.lines);
        validate_bom_record(&bom)?;

        let arena = self.load_arena(owner_id).await?;
        check_acyclic(&bom.id, &bom.lines, &arena)?;

        Ok(bom)
    }

    /// Writes `bom.lines` on `tx`, snapshotting the catalog cost of any
    /// material line that carries none.
    async fn write_lines(
        tx: &mut Transaction<'_, Sqlite>,
        owner_id: &str,
        bom: &mut BomRecord,
    ) -> DbResult<()> {
        for line in &mut bom.lines {
            if let (BomComponent::Material { material_id }, None) = (&line.component, line.unit_cost_cents) {
                line.unit_cost_cents = sqlx::query_scalar::<_, i64>(
                    "SELECT unit_cost_cents FROM materials WHERE id = ?1 AND owner_id = ?2",
                )
                .bind(material_id)
                .bind(owner_id)
                .fetch_optional(&mut **tx)
                .await?;
            }

            let (material_id, component_bom_id) = match &line.component {
                BomComponent::Material { material_id } => (Some(material_id.as_str()), None),
                BomComponent::BomItem { component_bom_id } => (None, Some(component_bom_id.as_str())),
            };

            sqlx::query(
                r#"
                INSERT INTO bom_lines (
                    id, bom_id, component_type, material_id, component_bom_id,
                    quantity, unit, unit_cost_cents, sort_order
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(&line.id)
            .bind(&bom.id)
            .bind(line.component.type_str())
            .bind(material_id)
            .bind(component_bom_id)
            .bind(line.quantity)
            .bind(&line.unit)
            .bind(line.unit_cost_cents)
            .bind(line.sort_order)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    async fn lines_where(&self, filter: &str, owner_id: &str, bom_id: Option<&str>) -> DbResult<Vec<BomLineRow>> {
        let sql = format!("{SELECT_LINE} {filter} ORDER BY l.bom_id, l.sort_order");

        let mut query = sqlx::query_as::<_, BomLineRow>(&sql).bind(owner_id);
        if let Some(bom_id) = bom_id {
            query = query.bind(bom_id);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }
}

impl RecordStore<BomRecord> for BomRepository {
    async fn get(&self, owner_id: &str, id: &str) -> DbResult<Option<BomRecord>> {
        let sql = format!("{SELECT_BOM} WHERE owner_id = ?1 AND id = ?2");

        let Some(row) = sqlx::query_as::<_, BomRow>(&sql)
            .bind(owner_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let lines = self
            .lines_where("WHERE b.owner_id = ?1 AND l.bom_id = ?2", owner_id, Some(id))
            .await?
            .into_iter()
            .map(BomLine::try_from)
            .collect::<DbResult<Vec<_>>>()?;

        Ok(Some(row.into_record(lines)))
    }

    async fn list(&self, owner_id: &str) -> DbResult<Vec<BomRecord>> {
        let sql = format!("{SELECT_BOM} WHERE owner_id = ?1 ORDER BY name");

        let rows = sqlx::query_as::<_, BomRow>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;

        let mut lines_by_bom: HashMap<String, Vec<BomLine>> = HashMap::new();
        for row in self.lines_where("WHERE b.owner_id = ?1", owner_id, None).await? {
            let bom_id = row.bom_id.clone();
            lines_by_bom.entry(bom_id).or_default().push(BomLine::try_from(row)?);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let lines = lines_by_bom.remove(&row.id).unwrap_or_default();
                row.into_record(lines)
            })
            .collect())
    }

    async fn insert(&self, owner_id: &str, bom: &BomRecord) -> DbResult<BomRecord> {
        debug!(name = %bom.name, lines = bom.lines.len(), "Inserting BOM");
        let mut bom = self.prepare(owner_id, bom).await?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO boms (
                id, owner_id, name, kind, output_qty, output_unit, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&bom.id)
        .bind(owner_id)
        .bind(bom.name.trim())
        .bind(bom.kind)
        .bind(bom.output_qty)
        .bind(&bom.output_unit)
        .bind(&bom.notes)
        .bind(bom.created_at)
        .bind(bom.updated_at)
        .execute(&mut *tx)
        .await?;

        Self::write_lines(&mut tx, owner_id, &mut bom).await?;
        tx.commit().await?;

        Ok(bom)
    }

    async fn update(&self, owner_id: &str, bom: &BomRecord) -> DbResult<BomRecord> {
        debug!(id = %bom.id, lines = bom.lines.len(), "Updating BOM");
        let mut bom = self.prepare(owner_id, bom).await?;
        bom.updated_at = Utc::now();

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE boms SET
                name = ?3,
                kind = ?4,
                output_qty = ?5,
                output_unit = ?6,
                notes = ?7,
                updated_at = ?8
            WHERE id = ?1 AND owner_id = ?2
            "#,
        )
        .bind(&bom.id)
        .bind(owner_id)
        .bind(bom.name.trim())
        .bind(bom.kind)
        .bind(bom.output_qty)
        .bind(&bom.output_unit)
        .bind(&bom.notes)
        .bind(bom.updated_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("BOM", &bom.id));
        }

        sqlx::query("DELETE FROM bom_lines WHERE bom_id = ?1")
            .bind(&bom.id)
            .execute(&mut *tx)
            .await?;

        Self::write_lines(&mut tx, owner_id, &mut bom).await?;
        tx.commit().await?;

        Ok(bom)
    }

    /// Deletes a BOM and its lines.
    ///
    /// Fails with [`DbError::InUse`] while another BOM still lists it.
    async fn delete(&self, owner_id: &str, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting BOM");

        if let Some(referenced_by) = self.used_by(owner_id, id).await?.into_iter().next() {
            return Err(DbError::InUse {
                entity: "BOM".to_string(),
                id: id.to_string(),
                referenced_by,
            });
        }

        let result = sqlx::query("DELETE FROM boms WHERE id = ?1 AND owner_id = ?2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("BOM", id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use costbook_core::{BomError, CoreError, MaterialRecord};

    const OWNER: &str = "owner-1";

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn candle_fixture(db: &Database) -> (BomRecord, BomRecord) {
        let ribbon = MaterialRecord::new("Ribbon", "pcs", 40);
        let wax = MaterialRecord::new("Wax", "kg", 350);
        let wick = MaterialRecord::new("Wick", "pcs", 25);
        for material in [&ribbon, &wax, &wick] {
            db.materials().insert(OWNER, material).await.unwrap();
        }

        let mut candle = BomRecord::new("Candle", BomKind::Part, 2.0, "pcs");
        candle.lines = vec![
            BomLine::material(wax.id.clone(), 1.0, "kg"),
            BomLine::material(wick.id.clone(), 2.0, "pcs"),
        ];
        let candle = db.boms().insert(OWNER, &candle).await.unwrap();

        let mut gift = BomRecord::new("Gift set", BomKind::Product, 1.0, "set");
        gift.lines = vec![
            BomLine::material(ribbon.id.clone(), 2.0, "pcs"),
            BomLine::sub_assembly(candle.id.clone(), 3.0, "pcs"),
        ];
        let gift = db.boms().insert(OWNER, &gift).await.unwrap();

        (candle, gift)
    }

    #[tokio::test]
    async fn test_insert_and_get_round_trips_lines() {
        let db = db().await;
        let (candle, _) = candle_fixture(&db).await;

        let loaded = db.boms().get(OWNER, &candle.id).await.unwrap().unwrap();
        assert_eq!(loaded.kind, BomKind::Part);
        assert_eq!(loaded.lines.len(), 2);
        assert_eq!(loaded.lines[0].unit_cost_cents, Some(350));
        assert_eq!(loaded.lines[1].sort_order, 1);
        assert_eq!(loaded.lines, candle.lines);
    }

    #[tokio::test]
    async fn test_resolve_cost() {
        let db = db().await;
        let (candle, gift) = candle_fixture(&db).await;

        let cost = db.boms().resolve_cost(OWNER, &gift.id).await.unwrap();
        assert_eq!(cost.total_cents, 680);
        assert!(cost.warnings.is_empty());

        let cost = db.boms().resolve_cost(OWNER, &candle.id).await.unwrap();
        assert_eq!(cost.unit_cost_cents, 200);
    }

    #[tokio::test]
    async fn test_update_rejects_cycle() {
        let db = db().await;
        let (candle, gift) = candle_fixture(&db).await;

        let mut candle = db.boms().get(OWNER, &candle.id).await.unwrap().unwrap();
        candle.lines.push(BomLine::sub_assembly(gift.id.clone(), 1.0, "set"));

        let err = db.boms().update(OWNER, &candle).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::Bom(BomError::CycleDetected { .. }))
        ));

        let stored = db.boms().get(OWNER, &candle.id).await.unwrap().unwrap();
        assert_eq!(stored.lines.len(), 2);
    }

    #[tokio::test]
    async fn test_insert_rejects_self_reference() {
        let db = db().await;
        let mut looped = BomRecord::new("Loop", BomKind::Part, 1.0, "pcs");
        looped.lines = vec![BomLine::sub_assembly(looped.id.clone(), 1.0, "pcs")];

        assert!(db.boms().insert(OWNER, &looped).await.is_err());
        assert!(db.boms().list(OWNER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_rewrites_lines_densely() {
        let db = db().await;
        let (candle, _) = candle_fixture(&db).await;

        let mut candle = db.boms().get(OWNER, &candle.id).await.unwrap().unwrap();
        candle.lines.reverse();
        candle.lines[0].sort_order = 10;
        candle.lines[1].sort_order = 20;
        candle.lines.pop();
        let updated = db.boms().update(OWNER, &candle).await.unwrap();
        assert_eq!(updated.lines.len(), 1);
        assert_eq!(updated.lines[0].sort_order, 0);

        let stored = db.boms().get(OWNER, &candle.id).await.unwrap().unwrap();
        assert_eq!(stored.lines, updated.lines);
    }

    #[tokio::test]
    async fn test_delete_referenced_bom_is_in_use() {
        let db = db().await;
        let (candle, gift) = candle_fixture(&db).await;

        match db.boms().delete(OWNER, &candle.id).await {
            Err(DbError::InUse { referenced_by, .. }) => assert_eq!(referenced_by, "Gift set"),
            other => panic!("expected InUse, got {other:?}"),
        }

        db.boms().delete(OWNER, &gift.id).await.unwrap();
        db.boms().delete(OWNER, &candle.id).await.unwrap();
        assert!(db.boms().list(OWNER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deleted_material_resolves_with_warning() {
        let db = db().await;
        let (candle, _) = candle_fixture(&db).await;
        let wick_id = match &candle.lines[1].component {
            BomComponent::Material { material_id } => material_id.clone(),
            BomComponent::BomItem { .. } => unreachable!(),
        };
        db.materials().delete(OWNER, &wick_id).await.unwrap();

        let cost = db.boms().resolve_cost(OWNER, &candle.id).await.unwrap();
        assert_eq!(cost.total_cents, 350);
        assert_eq!(cost.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_unknown_bom() {
        let db = db().await;
        assert!(matches!(
            db.boms().resolve_cost(OWNER, "missing").await,
            Err(DbError::Core(CoreError::Bom(BomError::NotFound(_))))
        ));
    }
}
