//! Schema-less document store on top of SQLite.
//!
//! Every document is a JSON object living in a named collection. Ids are assigned by the
//! store in insertion order, so "most recent" means "highest id".
use std::{path::Path, sync::Mutex};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to prepare store location: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("document serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("documents must be JSON objects")]
    NotAnObject,
    #[error("invalid filter field {0:?}")]
    InvalidField(String),
    #[error("store connection lock poisoned")]
    Poisoned,
}

/// Order in which `find_one` walks a collection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Sort {
    Newest,
    Oldest,
}

/// A stored document together with its store-assigned id.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub id: i64,
    pub body: Map<String, Value>,
}

impl Document {
    /// JSON view of the document with the id exposed as the string field `_id`.
    pub fn into_json(self) -> Value {
        let mut body = self.body;
        body.insert("_id".into(), Value::String(self.id.to_string()));
        Value::Object(body)
    }

    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(serde_json::from_value(Value::Object(self.body.clone()))?)
    }
}

pub struct DocumentStore {
    conn: Mutex<Connection>,
}

impl DocumentStore {
    /// Open a store at `url`, which is a file path or `:memory:`.
    pub fn open(url: &str) -> Result<Self, StoreError> {
        let conn = match url {
            ":memory:" => Connection::open_in_memory()?,
            path => {
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                Connection::open(path)?
            }
        };
        log::debug!("Opened document store at {url}");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                body TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection, id);
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Append a document and return its id.
    pub fn insert_one<T: Serialize>(&self, collection: &str, doc: &T) -> Result<i64, StoreError> {
        let body = to_object(doc)?;
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        insert(&conn, collection, &body)
    }

    /// Append a document unless one with the same string value at `field` already exists.
    ///
    /// Lookup and insert happen under the same lock. Returns `None` when a matching document
    /// was found and nothing was written.
    pub fn insert_if_absent<T: Serialize>(
        &self,
        collection: &str,
        field: &str,
        doc: &T,
    ) -> Result<Option<i64>, StoreError> {
        let body = to_object(doc)?;
        let value = match body.get(field) {
            Some(Value::String(value)) => value.clone(),
            _ => return Err(StoreError::InvalidField(field.to_owned())),
        };

        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        if select(&conn, collection, Some((field, &value)), Sort::Oldest)?.is_some() {
            log::debug!("{collection} already holds a document with {field} = {value:?}");
            return Ok(None);
        }
        insert(&conn, collection, &body).map(Some)
    }

    /// First document of `collection` in `sort` order, optionally restricted to documents
    /// whose top-level string `field` equals `value`.
    pub fn find_one(
        &self,
        collection: &str,
        filter: Option<(&str, &str)>,
        sort: Sort,
    ) -> Result<Option<Document>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        select(&conn, collection, filter, sort)
    }

    pub fn count(&self, collection: &str) -> Result<usize, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as usize)
    }
}

fn to_object<T: Serialize>(doc: &T) -> Result<Map<String, Value>, StoreError> {
    match serde_json::to_value(doc)? {
        Value::Object(body) => Ok(body),
        _ => Err(StoreError::NotAnObject),
    }
}

fn insert(conn: &Connection, collection: &str, body: &Map<String, Value>) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO documents(collection, body) VALUES(?1, ?2)",
        params![collection, serde_json::to_string(body)?],
    )?;
    Ok(conn.last_insert_rowid())
}

fn select(
    conn: &Connection,
    collection: &str,
    filter: Option<(&str, &str)>,
    sort: Sort,
) -> Result<Option<Document>, StoreError> {
    let order = match sort {
        Sort::Newest => "DESC",
        Sort::Oldest => "ASC",
    };

    let row = match filter {
        None => conn
            .query_row(
                &format!(
                    "SELECT id, body FROM documents WHERE collection = ?1 ORDER BY id {order} LIMIT 1"
                ),
                params![collection],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?,
        Some((field, value)) => {
            let path = json_path(field)?;
            conn.query_row(
                &format!(
                    "SELECT id, body FROM documents WHERE collection = ?1 AND json_extract(body, ?2) = ?3 ORDER BY id {order} LIMIT 1"
                ),
                params![collection, path, value],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?
        }
    };

    match row {
        Some((id, body)) => Ok(Some(Document {
            id,
            body: serde_json::from_str(&body)?,
        })),
        None => Ok(None),
    }
}

/// Only plain top-level field names are accepted as filters.
fn json_path(field: &str) -> Result<String, StoreError> {
    let valid = !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    match valid {
        true => Ok(format!("$.{field}")),
        false => Err(StoreError::InvalidField(field.to_owned())),
    }
}

#[cfg(test)]
mod test {

    use serde_json::json;

    use super::*;
    use crate::Error;

    #[test]
    fn test_find_one_on_empty_collection() -> Result<(), Error> {
        let store = DocumentStore::open_in_memory()?;

        assert_eq!(store.find_one("predictions", None, Sort::Newest)?, None);
        assert_eq!(store.count("predictions")?, 0);

        Ok(())
    }

    #[test]
    fn test_newest_and_oldest() -> Result<(), Error> {
        let store = DocumentStore::open_in_memory()?;
        let first = store.insert_one("predictions", &json!({"prediction": "A"}))?;
        let second = store.insert_one("predictions", &json!({"prediction": "B"}))?;
        store.insert_one("users", &json!({"username": "ada"}))?;

        let newest = store
            .find_one("predictions", None, Sort::Newest)?
            .ok_or("missing")?;
        assert_eq!(newest.id, second);
        assert_eq!(newest.body["prediction"], "B");

        let oldest = store
            .find_one("predictions", None, Sort::Oldest)?
            .ok_or("missing")?;
        assert_eq!(oldest.id, first);
        assert_eq!(store.count("predictions")?, 2);

        Ok(())
    }

    #[test]
    fn test_filter_by_field() -> Result<(), Error> {
        let store = DocumentStore::open_in_memory()?;
        store.insert_one("predictions", &json!({"prediction": "A", "user_id": "ada"}))?;
        store.insert_one("predictions", &json!({"prediction": "B", "user_id": "bob"}))?;
        store.insert_one("predictions", &json!({"prediction": "C"}))?;

        let ada = store
            .find_one("predictions", Some(("user_id", "ada")), Sort::Newest)?
            .ok_or("missing")?;
        assert_eq!(ada.body["prediction"], "A");

        assert!(store
            .find_one("predictions", Some(("user_id", "eve")), Sort::Newest)?
            .is_none());
        assert!(matches!(
            store.find_one("predictions", Some(("user_id') OR 1=1 --", "x")), Sort::Newest),
            Err(StoreError::InvalidField(_))
        ));

        Ok(())
    }

    #[test]
    fn test_insert_if_absent() -> Result<(), Error> {
        let store = DocumentStore::open_in_memory()?;
        let doc = json!({"username": "ada", "password_hash": "x"});

        assert!(store.insert_if_absent("users", "username", &doc)?.is_some());
        assert!(store.insert_if_absent("users", "username", &doc)?.is_none());
        assert_eq!(store.count("users")?, 1);

        Ok(())
    }

    #[test]
    fn test_id_is_exposed_as_string() -> Result<(), Error> {
        let store = DocumentStore::open_in_memory()?;
        let id = store.insert_one("predictions", &json!({"prediction": "A"}))?;

        let doc = store
            .find_one("predictions", None, Sort::Newest)?
            .ok_or("missing")?;
        assert_eq!(doc.into_json()["_id"], json!(id.to_string()));

        Ok(())
    }

    #[test]
    fn test_non_objects_are_rejected() -> Result<(), Error> {
        let store = DocumentStore::open_in_memory()?;
        assert!(matches!(
            store.insert_one("predictions", &json!([1, 2, 3])),
            Err(StoreError::NotAnObject)
        ));
        Ok(())
    }

    #[test]
    fn test_persists_across_reopen() -> Result<(), Error> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("db").join("signs.db");
        let url = path.to_str().ok_or("non utf-8 path")?;

        DocumentStore::open(url)?.insert_one("users", &json!({"username": "ada"}))?;
        assert_eq!(DocumentStore::open(url)?.count("users")?, 1);

        Ok(())
    }
}
