//! # Settings Repository
//!
//! One JSON settings document per owner.
//!
//! The payload is always read through `normalize_settings`, so unknown or
//! missing keys fall back to defaults instead of failing the load.

use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;
use costbook_core::normalize::normalize_settings;
use costbook_core::validation::{validate_currency_code, validate_percent};
use costbook_core::{AppSettings, MARKUP_PCT_MAX, TAX_PCT_MAX, WASTE_PCT_MAX};

/// Repository for per-owner application settings.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    /// Creates a new SettingsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    /// Returns the owner's settings, if any were ever saved.
    pub async fn get(&self, owner_id: &str) -> DbResult<Option<AppSettings>> {
        let payload: Option<String> =
            sqlx::query_scalar("SELECT payload FROM app_settings WHERE owner_id = ?1")
                .bind(owner_id)
                .fetch_optional(&self.pool)
                .await?;

        payload
            .map(|payload| {
                let value: Value = serde_json::from_str(&payload)?;
                Ok(normalize_settings(&value))
            })
            .transpose()
    }

    /// Returns the owner's settings, storing the defaults on first use.
    pub async fn get_or_create(&self, owner_id: &str) -> DbResult<AppSettings> {
        if let Some(settings) = self.get(owner_id).await? {
            return Ok(settings);
        }

        info!(owner_id = %owner_id, "Creating default settings");
        self.save(owner_id, &AppSettings::default()).await
    }

    /// Replaces the owner's settings.
    pub async fn save(&self, owner_id: &str, settings: &AppSettings) -> DbResult<AppSettings> {
        debug!(owner_id = %owner_id, "Saving settings");
        validate_currency_code(&settings.base_currency)?;
        validate_percent("default waste", settings.default_waste_pct, WASTE_PCT_MAX)?;
        validate_percent("default markup", settings.default_markup_pct, MARKUP_PCT_MAX)?;
        validate_percent("default tax", settings.default_tax_pct, TAX_PCT_MAX)?;

        let mut saved = settings.clone();
        saved.updated_at = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO app_settings (owner_id, payload, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(owner_id) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(owner_id)
        .bind(serde_json::to_string(&saved)?)
        .bind(saved.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use costbook_core::RoundingMode;

    #[tokio::test]
    async fn test_get_or_create_stores_defaults() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.settings().get("owner-1").await.unwrap().is_none());

        let settings = db.settings().get_or_create("owner-1").await.unwrap();
        assert_eq!(settings.base_currency, "USD");
        assert!(db.settings().get("owner-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_save_replaces() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut settings = db.settings().get_or_create("owner-1").await.unwrap();
        settings.base_currency = "EUR".into();
        settings.rounding_increment_cents = 5;
        settings.rounding_mode = RoundingMode::Up;
        db.settings().save("owner-1", &settings).await.unwrap();

        let loaded = db.settings().get("owner-1").await.unwrap().unwrap();
        assert_eq!(loaded.base_currency, "EUR");
        assert_eq!(loaded.rounding_increment_cents, 5);
        assert_eq!(loaded.rounding_mode, RoundingMode::Up);

        assert!(db.settings().get("owner-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let settings = AppSettings {
            default_markup_pct: -5.0,
            ..AppSettings::default()
        };
        assert!(matches!(
            db.settings().save("owner-1", &settings).await,
            Err(DbError::Validation(_))
        ));
    }
}
