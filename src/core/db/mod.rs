//! SQLite-backed document collections.
//!
//! Collections are schemaless: each row holds one JSON document body plus
//! server-stamped metadata columns. Filtering is equality-based and applied
//! document-side, which keeps the query surface identical for every caller
//! (resource filters and ad-hoc `where` filters compose by map union).
//!
//! The store owns the insert-event bus: every committed insert batch is
//! published as one [`InsertEvent`].

pub mod document;
pub mod events;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;
use tracing::{debug, info};

pub use document::{Document, Filter};
pub use events::{EventBus, InsertEvent};

use document::{matches_filter, new_document_id, strip_metadata, timestamp_now, with_metadata};

/// Store schema version, mirrored to `PRAGMA user_version`.
const STORE_VERSION: u32 = 1;

const INIT_SQL: &str = "\
CREATE TABLE IF NOT EXISTS documents (
    id         TEXT PRIMARY KEY,
    collection TEXT NOT NULL,
    body       TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
";

/// Errors from the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite failure.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored document body failed to decode as a JSON object.
    #[error("stored document is not a JSON object: {0}")]
    Codec(#[from] serde_json::Error),

    /// The connection mutex was poisoned by a panicking holder.
    #[error("document store lock poisoned")]
    LockPoisoned,

    /// The database was initialized by a newer server version.
    #[error("store schema version {found} is newer than supported {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// A specialized Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// SQLite-backed store of named document collections.
///
/// Access serializes through a mutex around the connection; every operation
/// holds the lock only for the duration of its statements, never across an
/// await point.
pub struct DocumentStore {
    conn: Mutex<Connection>,
    events: EventBus,
}

impl DocumentStore {
    /// Open (or create) a file-backed store and apply schema bootstrap.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        info!("Opened document store at {}", path.as_ref().display());
        Self::bootstrap(conn)
    }

    /// Open an in-memory store, mainly for tests and ephemeral deployments.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        info!("Opened in-memory document store");
        Self::bootstrap(conn)
    }

    fn bootstrap(conn: Connection) -> StoreResult<Self> {
        let version: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version > STORE_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found: version,
                supported: STORE_VERSION,
            });
        }
        if version < STORE_VERSION {
            conn.execute_batch(INIT_SQL)?;
            conn.execute_batch(&format!("PRAGMA user_version = {STORE_VERSION};"))?;
            debug!("Store schema initialized at version {}", STORE_VERSION);
        }

        Ok(Self {
            conn: Mutex::new(conn),
            events: EventBus::default(),
        })
    }

    /// The insert-event bus fed by this store.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Insert a batch of documents into `collection`.
    ///
    /// Metadata stamps are reissued (caller-supplied `_id`/`_created`/
    /// `_updated` are discarded). One [`InsertEvent`] is published per
    /// committed batch, after the transaction commits.
    pub fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> StoreResult<Vec<Document>> {
        let mut stored = Vec::with_capacity(documents.len());
        {
            let mut conn = self.lock()?;
            let tx = conn.transaction()?;
            for body in documents {
                let body = strip_metadata(body);
                let id = new_document_id();
                let now = timestamp_now();
                tx.execute(
                    "INSERT INTO documents (id, collection, body, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        id,
                        collection,
                        serde_json::Value::Object(body.clone()).to_string(),
                        now,
                        now
                    ],
                )?;
                stored.push(with_metadata(body, &id, &now, &now));
            }
            tx.commit()?;
        }

        if !stored.is_empty() {
            self.events.publish(InsertEvent {
                collection: collection.to_string(),
                documents: stored.clone(),
            });
        }
        Ok(stored)
    }

    /// All documents of `collection` matching `filter`, in insertion order.
    pub fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        let conn = self.lock()?;
        collect_matching(&conn, collection, filter)
    }

    /// One page of matching documents plus the total match count.
    ///
    /// Pages are 1-based; a page past the end yields an empty item list with
    /// the true total.
    pub fn find_page(
        &self,
        collection: &str,
        filter: &Filter,
        page: u32,
        max_results: u32,
    ) -> StoreResult<(Vec<Document>, usize)> {
        let all = self.find(collection, filter)?;
        let total = all.len();
        let start = (page.saturating_sub(1) as usize).saturating_mul(max_results as usize);
        let items = all
            .into_iter()
            .skip(start)
            .take(max_results as usize)
            .collect();
        Ok((items, total))
    }

    /// A single document by id, visible only when it matches `filter`.
    pub fn find_by_id(
        &self,
        collection: &str,
        filter: &Filter,
        id: &str,
    ) -> StoreResult<Option<Document>> {
        let conn = self.lock()?;
        match fetch_raw(&conn, collection, id)? {
            Some((body, created, updated)) => {
                let document = with_metadata(body, id, &created, &updated);
                Ok(matches_filter(&document, filter).then_some(document))
            }
            None => Ok(None),
        }
    }

    /// Replace a document's body, preserving `_id` and `_created`.
    ///
    /// Returns `None` when the document does not exist or falls outside
    /// `filter`.
    pub fn replace(
        &self,
        collection: &str,
        filter: &Filter,
        id: &str,
        body: Document,
    ) -> StoreResult<Option<Document>> {
        let conn = self.lock()?;
        let Some((existing, created, updated)) = fetch_raw(&conn, collection, id)? else {
            return Ok(None);
        };
        if !matches_filter(&with_metadata(existing, id, &created, &updated), filter) {
            return Ok(None);
        }

        let body = strip_metadata(body);
        let now = timestamp_now();
        conn.execute(
            "UPDATE documents SET body = ?1, updated_at = ?2 WHERE collection = ?3 AND id = ?4",
            params![
                serde_json::Value::Object(body.clone()).to_string(),
                now,
                collection,
                id
            ],
        )?;
        Ok(Some(with_metadata(body, id, &created, &now)))
    }

    /// Delete a single document by id when it matches `filter`.
    ///
    /// Returns whether a document was deleted.
    pub fn delete_by_id(&self, collection: &str, filter: &Filter, id: &str) -> StoreResult<bool> {
        let conn = self.lock()?;
        let Some((body, created, updated)) = fetch_raw(&conn, collection, id)? else {
            return Ok(false);
        };
        if !matches_filter(&with_metadata(body, id, &created, &updated), filter) {
            return Ok(false);
        }

        conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;
        Ok(true)
    }

    /// Delete every document of `collection` matching `filter`.
    ///
    /// Returns the number of documents deleted. Documents outside the filter
    /// are untouched, so resources sharing a source collection do not erase
    /// each other.
    pub fn delete_matching(&self, collection: &str, filter: &Filter) -> StoreResult<usize> {
        let mut conn = self.lock()?;
        let ids: Vec<String> = collect_matching(&conn, collection, filter)?
            .into_iter()
            .filter_map(|document| {
                document
                    .get(document::ID_FIELD)
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string)
            })
            .collect();

        let tx = conn.transaction()?;
        for id in &ids {
            tx.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        }
        tx.commit()?;
        Ok(ids.len())
    }
}

fn collect_matching(
    conn: &Connection,
    collection: &str,
    filter: &Filter,
) -> StoreResult<Vec<Document>> {
    let mut stmt = conn.prepare(
        "SELECT id, body, created_at, updated_at FROM documents
         WHERE collection = ?1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map(params![collection], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut documents = Vec::new();
    for row in rows {
        let (id, body, created, updated) = row?;
        let body: Document = serde_json::from_str(&body)?;
        let document = with_metadata(body, &id, &created, &updated);
        if matches_filter(&document, filter) {
            documents.push(document);
        }
    }
    Ok(documents)
}

fn fetch_raw(
    conn: &Connection,
    collection: &str,
    id: &str,
) -> StoreResult<Option<(Document, String, String)>> {
    let row = conn
        .query_row(
            "SELECT body, created_at, updated_at FROM documents
             WHERE collection = ?1 AND id = ?2",
            params![collection, id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((body, created, updated)) => {
            let body: Document = serde_json::from_str(&body)?;
            Ok(Some((body, created, updated)))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().expect("test document").clone()
    }

    fn filter(value: serde_json::Value) -> Filter {
        value.as_object().expect("test filter").clone()
    }

    fn id_of(document: &Document) -> String {
        document
            .get(document::ID_FIELD)
            .and_then(serde_json::Value::as_str)
            .expect("stored id")
            .to_string()
    }

    #[test]
    fn test_insert_and_find_roundtrip() {
        let store = DocumentStore::open_in_memory().expect("store");
        store
            .insert_many(
                "facilities",
                vec![
                    doc(json!({"endpoint": "clinicA", "region": "north"})),
                    doc(json!({"endpoint": "clinicB", "region": "south"})),
                ],
            )
            .expect("insert");

        let found = store.find("facilities", &Filter::new()).expect("find");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].get("endpoint"), Some(&json!("clinicA")));
        assert_eq!(found[1].get("endpoint"), Some(&json!("clinicB")));
        assert!(found[0].contains_key(document::ID_FIELD));
        assert!(found[0].contains_key(document::CREATED_FIELD));
        assert!(found[0].contains_key(document::UPDATED_FIELD));
    }

    #[test]
    fn test_find_applies_filter() {
        let store = DocumentStore::open_in_memory().expect("store");
        store
            .insert_many(
                "facilities",
                vec![
                    doc(json!({"name": "a", "region": "north"})),
                    doc(json!({"name": "b", "region": "south"})),
                    doc(json!({"name": "c", "region": "north"})),
                ],
            )
            .expect("insert");

        let north = store
            .find("facilities", &filter(json!({"region": "north"})))
            .expect("find");
        assert_eq!(north.len(), 2);
        assert!(north.iter().all(|d| d.get("region") == Some(&json!("north"))));
    }

    #[test]
    fn test_find_by_id_respects_filter() {
        let store = DocumentStore::open_in_memory().expect("store");
        let stored = store
            .insert_many("facilities", vec![doc(json!({"region": "south"}))])
            .expect("insert");
        let id = id_of(&stored[0]);

        let through_matching = store
            .find_by_id("facilities", &filter(json!({"region": "south"})), &id)
            .expect("find");
        assert!(through_matching.is_some());

        let through_other = store
            .find_by_id("facilities", &filter(json!({"region": "north"})), &id)
            .expect("find");
        assert!(through_other.is_none());
    }

    #[test]
    fn test_insert_reissues_metadata() {
        let store = DocumentStore::open_in_memory().expect("store");
        let stored = store
            .insert_many(
                "services",
                vec![doc(json!({"_id": "spoofed", "name": "ambulance"}))],
            )
            .expect("insert");

        assert_ne!(stored[0].get(document::ID_FIELD), Some(&json!("spoofed")));
    }

    #[test]
    fn test_replace_preserves_identity_fields() {
        let store = DocumentStore::open_in_memory().expect("store");
        let stored = store
            .insert_many("services", vec![doc(json!({"name": "ambulance"}))])
            .expect("insert");
        let id = id_of(&stored[0]);
        let created = stored[0].get(document::CREATED_FIELD).cloned();

        let replaced = store
            .replace(
                "services",
                &Filter::new(),
                &id,
                doc(json!({"name": "fire brigade"})),
            )
            .expect("replace")
            .expect("document");

        assert_eq!(replaced.get("name"), Some(&json!("fire brigade")));
        assert_eq!(replaced.get(document::ID_FIELD), Some(&json!(id.as_str())));
        assert_eq!(replaced.get(document::CREATED_FIELD).cloned(), created);
    }

    #[test]
    fn test_replace_outside_filter_is_none() {
        let store = DocumentStore::open_in_memory().expect("store");
        let stored = store
            .insert_many("facilities", vec![doc(json!({"region": "south"}))])
            .expect("insert");
        let id = id_of(&stored[0]);

        let outcome = store
            .replace(
                "facilities",
                &filter(json!({"region": "north"})),
                &id,
                doc(json!({"region": "north"})),
            )
            .expect("replace");
        assert!(outcome.is_none());
    }

    #[test]
    fn test_delete_matching_respects_filter() {
        let store = DocumentStore::open_in_memory().expect("store");
        store
            .insert_many(
                "facilities",
                vec![
                    doc(json!({"region": "north"})),
                    doc(json!({"region": "north"})),
                    doc(json!({"region": "south"})),
                ],
            )
            .expect("insert");

        let deleted = store
            .delete_matching("facilities", &filter(json!({"region": "north"})))
            .expect("delete");
        assert_eq!(deleted, 2);

        let remaining = store.find("facilities", &Filter::new()).expect("find");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].get("region"), Some(&json!("south")));
    }

    #[test]
    fn test_delete_by_id_outside_filter_keeps_document() {
        let store = DocumentStore::open_in_memory().expect("store");
        let stored = store
            .insert_many("facilities", vec![doc(json!({"region": "south"}))])
            .expect("insert");
        let id = id_of(&stored[0]);

        let deleted = store
            .delete_by_id("facilities", &filter(json!({"region": "north"})), &id)
            .expect("delete");
        assert!(!deleted);
        assert_eq!(store.find("facilities", &Filter::new()).expect("find").len(), 1);
    }

    #[test]
    fn test_insert_publishes_one_event_per_batch() {
        let store = DocumentStore::open_in_memory().expect("store");
        let mut rx = store.events().subscribe();

        store
            .insert_many(
                "services",
                vec![
                    doc(json!({"endpoint": "ambulance"})),
                    doc(json!({"endpoint": "dispatch"})),
                ],
            )
            .expect("insert");

        let event = rx.try_recv().expect("event");
        assert_eq!(event.collection, "services");
        assert_eq!(event.documents.len(), 2);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_pagination_slices_and_reports_total() {
        let store = DocumentStore::open_in_memory().expect("store");
        let documents = (0..5).map(|i| doc(json!({"n": i}))).collect();
        store.insert_many("requests", documents).expect("insert");

        let (items, total) = store
            .find_page("requests", &Filter::new(), 2, 2)
            .expect("page");
        assert_eq!(total, 5);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].get("n"), Some(&json!(2)));

        let (past_end, total) = store
            .find_page("requests", &Filter::new(), 9, 2)
            .expect("page");
        assert_eq!(total, 5);
        assert!(past_end.is_empty());
    }

    #[test]
    fn test_file_backed_store_persists_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("directory.db");

        {
            let store = DocumentStore::open(&path).expect("store");
            store
                .insert_many("facilities", vec![doc(json!({"region": "north"}))])
                .expect("insert");
        }

        let reopened = DocumentStore::open(&path).expect("store");
        let found = reopened.find("facilities", &Filter::new()).expect("find");
        assert_eq!(found.len(), 1);
    }
}
