//! # costbook-db: Record Stores for Costbook
//!
//! Persistence for materials, purchases, bills of materials, cost sheets and
//! settings. Signed-in owners use SQLite through sqlx; a signed-out guest
//! uses a single local JSON file. Both sit behind [`RecordStore`].
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Costbook Data Flow                               │
//! │                                                                         │
//! │  UI edit / CSV import                                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    costbook-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │ WriteCoalescer│───▶│  RecordStore  │    │    Config    │  │   │
//! │  │   │ (debounce)    │    │  (store.rs)   │    │ (config.rs)  │  │   │
//! │  │   └───────────────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │                                │                               │   │
//! │  │                  ┌─────────────┴─────────────┐                 │   │
//! │  │                  ▼                           ▼                 │   │
//! │  │   ┌───────────────────────────┐   ┌──────────────────────┐    │   │
//! │  │   │ Repositories (SQLite)     │   │ LocalStore (JSON)    │    │   │
//! │  │   │ owner-scoped, migrations  │   │ guest mode           │    │   │
//! │  │   └───────────────────────────┘   └──────────────────────┘    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and repository accessors
//! - [`migrations`] - Embedded database migrations
//! - [`repository`] - SQLite repositories
//! - [`local`] - Guest-mode JSON file store
//! - [`store`] - The [`RecordStore`] trait shared by both backends
//! - [`coalesce`] - Debounced writes
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Database error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use costbook_db::{Database, DbConfig, RecordStore};
//!
//! let db = Database::new(DbConfig::new("costbook.db")).await?;
//! let wax = db.materials().insert(owner, &MaterialRecord::new("Wax", "kg", 820)).await?;
//! let cost = db.boms().resolve_cost(owner, &bom_id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod coalesce;
pub mod config;
pub mod error;
pub mod local;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use coalesce::{CoalescerHandle, WriteCoalescer, DEFAULT_COALESCE_WINDOW_MS};
pub use config::{CostbookConfig, StorageMode};
pub use error::{DbError, DbResult};
pub use local::{LocalStore, GUEST_OWNER_ID};
pub use pool::{Database, DbConfig};
pub use store::RecordStore;

// Repository re-exports for convenience
pub use repository::{
    BomRepository, CostSheetRepository, MaterialRepository, PurchaseRepository,
    SettingsRepository,
};

use tracing_subscriber::EnvFilter;

/// Installs a formatting subscriber for binaries and tools.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=costbook_db=trace` - Trace the record stores only
/// - Default: INFO, with DEBUG for costbook crates
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,costbook=debug,sqlx=warn"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
