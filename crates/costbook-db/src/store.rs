//! # Record Store Abstraction
//!
//! The CRUD surface every backing store offers.
//!
//! ## Implementations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         RecordStore<T>                                  │
//! │        get · list · insert · update · delete · upsert                   │
//! │                                                                         │
//! │   ┌────────────────────────────┐      ┌──────────────────────────────┐  │
//! │   │  SQLite repositories       │      │  LocalStore (guest mode)     │  │
//! │   │  (authenticated, remote)   │      │  one JSON file, one owner    │  │
//! │   │  MaterialRepository        │      │  records re-normalized on    │  │
//! │   │  PurchaseRepository        │      │  load                        │  │
//! │   │  BomRepository             │      │                              │  │
//! │   │  CostSheetRepository       │      │                              │  │
//! │   └────────────────────────────┘      └──────────────────────────────┘  │
//! │                     ▲                                                   │
//! │                     │ upsert                                            │
//! │              WriteCoalescer                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every call is scoped to an owner id. A record owned by someone else is
//! indistinguishable from a missing one.

use std::future::Future;

use costbook_core::Record;

use crate::error::DbResult;

/// Owner-scoped CRUD over one record type.
pub trait RecordStore<T: Record>: Send + Sync {
    /// Fetches one record.
    fn get(&self, owner_id: &str, id: &str) -> impl Future<Output = DbResult<Option<T>>> + Send;

    /// Lists every record of the owner.
    fn list(&self, owner_id: &str) -> impl Future<Output = DbResult<Vec<T>>> + Send;

    /// Inserts a new record and returns it as stored.
    fn insert(&self, owner_id: &str, record: &T) -> impl Future<Output = DbResult<T>> + Send;

    /// Replaces an existing record, refreshing its update timestamp.
    ///
    /// Fails with `DbError::NotFound` if the owner has no such record.
    fn update(&self, owner_id: &str, record: &T) -> impl Future<Output = DbResult<T>> + Send;

    /// Deletes a record by id.
    fn delete(&self, owner_id: &str, id: &str) -> impl Future<Output = DbResult<()>> + Send;

    /// Updates the record if it exists, inserts it otherwise.
    fn upsert(&self, owner_id: &str, record: &T) -> impl Future<Output = DbResult<T>> + Send {
        async move {
            match self.get(owner_id, record.id()).await? {
                Some(_) => self.update(owner_id, record).await,
                None => self.insert(owner_id, record).await,
            }
        }
    }
}
