//! # Repository Module
//!
//! SQLite repositories for the authenticated (remote) store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Caller                                                                 │
//! │       │                                                                 │
//! │       │  db.boms().resolve_cost(owner, id)                             │
//! │       ▼                                                                 │
//! │  BomRepository                                                         │
//! │  ├── RecordStore: get / list / insert / update / delete / upsert       │
//! │  └── domain helpers: resolve_cost, used_by, load_arena                 │
//! │       │                                                                 │
//! │       │  SQL, scoped by owner_id                                        │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`MaterialRepository`] - Material catalog
//! - [`PurchaseRepository`] - Purchases and purchase imports
//! - [`BomRepository`] - Bills of materials and cost resolution
//! - [`CostSheetRepository`] - Cost sheets and roll-up totals
//! - [`SettingsRepository`] - Per-owner settings document

pub mod bom;
pub mod cost_sheet;
pub mod material;
pub mod purchase;
pub mod settings;

pub use bom::BomRepository;
pub use cost_sheet::CostSheetRepository;
pub use material::MaterialRepository;
pub use purchase::PurchaseRepository;
pub use settings::SettingsRepository;
