//! # Local Guest Store
//!
//! A [`RecordStore`] backed by one JSON file, used while nobody is signed in.
//!
//! ## File Layout
//! ```text
//! {
//!   "collections": {
//!     "materials":   { "<id>": { ...camelCase record... }, ... },
//!     "purchases":   { ... },
//!     "boms":        { ... },
//!     "cost_sheets": { ... }
//!   },
//!   "settings": { ...AppSettings... }
//! }
//! ```
//!
//! Records are kept as raw JSON and rebuilt through [`Record::from_value`]
//! on every read, so hand-edited or older files load with defaults filled
//! in. There is a single implicit owner; the `owner_id` argument of the
//! [`RecordStore`] methods is ignored.
//!
//! Writes run the same record checks as the SQLite repositories (BOM
//! cycles, referenced BOMs, field validation). Every write rewrites the
//! whole file (temp file + rename), and the in-memory copy only changes
//! once that file is on disk.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::store::RecordStore;
use costbook_core::normalize::normalize_settings;
use costbook_core::{AppSettings, Record};

/// Owner id used for records created without an account.
pub const GUEST_OWNER_ID: &str = "guest";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    collections: BTreeMap<String, BTreeMap<String, Value>>,
    #[serde(default)]
    settings: Option<Value>,
}

impl Snapshot {
    /// The collection for `T`, rebuilt into typed records.
    fn stored<T: Record>(&self) -> HashMap<String, T> {
        self.collections
            .get(T::COLLECTION)
            .map(|records| {
                records
                    .iter()
                    .map(|(key, value)| (key.clone(), rebuild(key, value)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn put<T: Record>(&mut self, record: &T) -> DbResult<()> {
        let value = serde_json::to_value(record)?;
        self.collections
            .entry(T::COLLECTION.to_string())
            .or_default()
            .insert(record.id().to_string(), value);
        Ok(())
    }
}

#[derive(Debug)]
struct Inner {
    path: Option<PathBuf>,
    snapshot: Mutex<Snapshot>,
}

/// JSON-file record store for guest mode.
///
/// ## Usage
/// ```rust,ignore
/// let store = LocalStore::open("costbook-local.json").await?;
/// store.insert(GUEST_OWNER_ID, &MaterialRecord::new("Wax", "kg", 350)).await?;
/// let materials: Vec<MaterialRecord> = store.list(GUEST_OWNER_ID).await?;
/// ```
#[derive(Debug, Clone)]
pub struct LocalStore {
    inner: Arc<Inner>,
}

impl LocalStore {
    /// Opens the store at `path`; a missing file starts empty.
    pub async fn open(path: impl Into<PathBuf>) -> DbResult<Self> {
        let path = path.into();

        let snapshot = match tokio::fs::read_to_string(&path).await {
            Ok(contents) if contents.trim().is_empty() => Snapshot::default(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(?path, "Local store file not found, starting empty");
                Snapshot::default()
            }
            Err(e) => return Err(e.into()),
        };

        info!(?path, collections = snapshot.collections.len(), "Opened local store");
        Ok(Self::with_snapshot(Some(path), snapshot))
    }

    /// A store that never touches the disk (for testing).
    pub fn in_memory() -> Self {
        Self::with_snapshot(None, Snapshot::default())
    }

    fn with_snapshot(path: Option<PathBuf>, snapshot: Snapshot) -> Self {
        LocalStore {
            inner: Arc::new(Inner {
                path,
                snapshot: Mutex::new(snapshot),
            }),
        }
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    /// Returns the guest's settings, storing the defaults on first use.
    pub async fn load_settings(&self) -> DbResult<AppSettings> {
        let mut snapshot = self.inner.snapshot.lock().await;

        if let Some(value) = &snapshot.settings {
            return Ok(normalize_settings(value));
        }

        let settings = AppSettings::default();
        let mut next = snapshot.clone();
        next.settings = Some(serde_json::to_value(&settings)?);
        self.commit(&mut snapshot, next).await?;
        Ok(settings)
    }

    /// Replaces the guest's settings.
    pub async fn save_settings(&self, settings: &AppSettings) -> DbResult<AppSettings> {
        let mut saved = settings.clone();
        saved.updated_at = Utc::now();

        let mut snapshot = self.inner.snapshot.lock().await;
        let mut next = snapshot.clone();
        next.settings = Some(serde_json::to_value(&saved)?);
        self.commit(&mut snapshot, next).await?;
        Ok(saved)
    }

    /// Writes `next` to disk, then makes it the current snapshot. On error
    /// `current` is left as it was.
    async fn commit(&self, current: &mut Snapshot, next: Snapshot) -> DbResult<()> {
        self.persist(&next).await?;
        *current = next;
        Ok(())
    }

    async fn persist(&self, snapshot: &Snapshot) -> DbResult<()> {
        let Some(path) = &self.inner.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_string_pretty(snapshot)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, path).await?;

        debug!(?path, "Local store written");
        Ok(())
    }
}

/// Rebuilds a record, keeping the id it is stored under.
fn rebuild<T: Record>(key: &str, value: &Value) -> T {
    let mut value = value.clone();
    if let Value::Object(obj) = &mut value {
        if !obj.get("id").is_some_and(Value::is_string) {
            obj.insert("id".to_string(), Value::String(key.to_string()));
        }
    }
    T::from_value(&value)
}

impl<T: Record> RecordStore<T> for LocalStore {
    async fn get(&self, _owner_id: &str, id: &str) -> DbResult<Option<T>> {
        let snapshot = self.inner.snapshot.lock().await;

        Ok(snapshot
            .collections
            .get(T::COLLECTION)
            .and_then(|records| records.get(id))
            .map(|value| rebuild(id, value)))
    }

    async fn list(&self, _owner_id: &str) -> DbResult<Vec<T>> {
        let snapshot = self.inner.snapshot.lock().await;

        Ok(snapshot
            .collections
            .get(T::COLLECTION)
            .map(|records| records.iter().map(|(key, value)| rebuild(key, value)).collect())
            .unwrap_or_default())
    }

    async fn insert(&self, _owner_id: &str, record: &T) -> DbResult<T> {
        debug!(collection = T::COLLECTION, id = %record.id(), "Inserting local record");

        let mut snapshot = self.inner.snapshot.lock().await;
        let stored = snapshot.stored::<T>();
        if stored.contains_key(record.id()) {
            return Err(DbError::duplicate(format!("{}.id", T::COLLECTION), record.id()));
        }
        let prepared = record.prepare_write(&stored).map_err(DbError::rejected)?;

        let mut next = snapshot.clone();
        next.put(&prepared)?;
        self.commit(&mut snapshot, next).await?;
        Ok(prepared)
    }

    async fn update(&self, _owner_id: &str, record: &T) -> DbResult<T> {
        debug!(collection = T::COLLECTION, id = %record.id(), "Updating local record");

        let mut snapshot = self.inner.snapshot.lock().await;
        let stored = snapshot.stored::<T>();
        if !stored.contains_key(record.id()) {
            return Err(DbError::not_found(T::COLLECTION, record.id()));
        }
        let mut updated = record.prepare_write(&stored).map_err(DbError::rejected)?;
        updated.touch(Utc::now());

        let mut next = snapshot.clone();
        next.put(&updated)?;
        self.commit(&mut snapshot, next).await?;
        Ok(updated)
    }

    /// Fails with [`DbError::InUse`] while another record still lists `id`.
    async fn delete(&self, _owner_id: &str, id: &str) -> DbResult<()> {
        debug!(collection = T::COLLECTION, id = %id, "Deleting local record");

        let mut snapshot = self.inner.snapshot.lock().await;
        let stored = snapshot.stored::<T>();
        if !stored.contains_key(id) {
            return Err(DbError::not_found(T::COLLECTION, id));
        }
        if let Some(referenced_by) = stored
            .iter()
            .filter(|(key, _)| key.as_str() != id)
            .find_map(|(_, other)| other.uses(id))
        {
            return Err(DbError::InUse {
                entity: T::COLLECTION.to_string(),
                id: id.to_string(),
                referenced_by: referenced_by.to_string(),
            });
        }

        let mut next = snapshot.clone();
        if let Some(records) = next.collections.get_mut(T::COLLECTION) {
            records.remove(id);
        }
        self.commit(&mut snapshot, next).await?;
        Ok(())
    }
}
