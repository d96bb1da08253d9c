//! Versioned object stores on top of SQLite.
//!
//! Each object store is its own SQLite table holding one JSON document per
//! row, keyed by the field named in the store's key path. The database
//! version lives in `PRAGMA user_version` and only moves forward inside an
//! upgrade transaction.

use std::{
    fmt,
    fs,
    path::{
        Path,
        PathBuf,
    },
};

use rusqlite::{
    params,
    types::{
        FromSql,
        FromSqlError,
        FromSqlResult,
        ToSqlOutput,
        Value as SqlValue,
        ValueRef,
    },
    Connection,
    OptionalExtension,
    ToSql,
};
use serde_json::{
    Map,
    Value,
};
use tracing::{
    debug,
    info,
};

use crate::core::ComboError;

/// Registry of object stores and the SQLite table backing each one.
const CATALOG_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS object_stores (
    name TEXT PRIMARY KEY,
    table_name TEXT NOT NULL UNIQUE,
    key_path TEXT NOT NULL,
    auto_increment INTEGER NOT NULL
);
"#;

/// Primary key of a row inside an object store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Int(u64),
    Text(String),
}

impl Key {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(Key::Int),
            Value::String(s) => Some(Key::Text(s.clone())),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Key::Int(n) => Value::from(*n),
            Key::Text(s) => Value::from(s.clone()),
        }
    }

    pub fn as_int(&self) -> Option<u64> {
        match self {
            Key::Int(n) => Some(*n),
            Key::Text(_) => None,
        }
    }
}

impl From<u64> for Key {
    fn from(value: u64) -> Self {
        Key::Int(value)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Text(value.to_string())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(n) => write!(f, "{}", n),
            Key::Text(s) => write!(f, "{}", s),
        }
    }
}

impl ToSql for Key {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Key::Int(n) => i64::try_from(*n)
                .map(|n| ToSqlOutput::Owned(SqlValue::Integer(n)))
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e))),
            Key::Text(s) => Ok(ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes()))),
        }
    }
}

impl FromSql for Key {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(n) => {
                u64::try_from(n).map(Key::Int).map_err(|_| FromSqlError::OutOfRange(n))
            }
            ValueRef::Text(_) => value.as_str().map(|s| Key::Text(s.to_string())),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

#[derive(Debug, Clone)]
struct StoreInfo {
    table: String,
    key_path: String,
    auto_increment: bool,
}

fn store_info(conn: &Connection, name: &str) -> Result<Option<StoreInfo>, ComboError> {
    let info = conn
        .query_row(
            "SELECT table_name, key_path, auto_increment FROM object_stores WHERE name = ?1",
            params![name],
            |row| {
                Ok(StoreInfo {
                    table: row.get(0)?,
                    key_path: row.get(1)?,
                    auto_increment: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(info)
}

fn store_names(conn: &Connection) -> Result<Vec<String>, ComboError> {
    let mut stmt = conn.prepare("SELECT name FROM object_stores ORDER BY name")?;
    let names = stmt.query_map([], |row| row.get::<_, String>(0))?.collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

fn open_store<'a>(conn: &'a Connection, name: &str) -> Result<ObjectStore<'a>, ComboError> {
    let info = store_info(conn, name)?
        .ok_or_else(|| ComboError::NotFound(format!("Table '{}'", name)))?;
    Ok(ObjectStore { conn, name: name.to_string(), info })
}

fn user_version(conn: &Connection) -> Result<u32, ComboError> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Handle on one object store, bound to the connection or transaction that opened it.
pub struct ObjectStore<'a> {
    conn: &'a Connection,
    name: String,
    info: StoreInfo,
}

impl ObjectStore<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_path(&self) -> &str {
        &self.info.key_path
    }

    /// Pulls the key out of `value`; the rest is what gets stored.
    fn split(&self, value: Value) -> Result<(Option<Key>, Map<String, Value>), ComboError> {
        let Value::Object(mut object) = value else {
            return Err(ComboError::Transaction("Only JSON objects can be stored".to_string()));
        };
        let key = object.remove(&self.info.key_path).as_ref().and_then(Key::from_value);
        if key.is_none() && !self.info.auto_increment {
            return Err(ComboError::Transaction(format!(
                "Value is missing its key field '{}'",
                self.info.key_path
            )));
        }
        Ok((key, object))
    }

    fn join(&self, key: Key, body: &str) -> Result<Value, ComboError> {
        let mut object: Map<String, Value> = serde_json::from_str(body)?;
        object.insert(self.info.key_path.clone(), key.to_value());
        Ok(Value::Object(object))
    }

    fn insert(
        &self,
        key: Option<Key>,
        body: &Map<String, Value>,
        replace: bool,
    ) -> Result<Key, ComboError> {
        let json = serde_json::to_string(body)?;
        let verb = if replace { "INSERT OR REPLACE" } else { "INSERT" };

        match key {
            Some(key) => {
                self.conn.execute(
                    &format!("{} INTO \"{}\" (key, value) VALUES (?1, ?2)", verb, self.info.table),
                    params![key, json],
                )?;
                Ok(key)
            }
            None => {
                self.conn.execute(
                    &format!("INSERT INTO \"{}\" (value) VALUES (?1)", self.info.table),
                    params![json],
                )?;
                let rowid = u64::try_from(self.conn.last_insert_rowid())
                    .map_err(|_| ComboError::Transaction("Negative row id".into()))?;
                Ok(Key::Int(rowid))
            }
        }
    }

    /// Inserts or replaces, assigning a key when the store generates them.
    pub fn put(&self, value: Value) -> Result<Key, ComboError> {
        let (key, body) = self.split(value)?;
        self.insert(key, &body, true)
    }

    /// Like `put` but fails when the key is already taken.
    pub fn add(&self, value: Value) -> Result<Key, ComboError> {
        let (key, body) = self.split(value)?;
        if let Some(key) = &key {
            if self.contains(key)? {
                return Err(ComboError::Transaction(format!("Key {} already exists", key)));
            }
        }
        self.insert(key, &body, false)
    }

    pub fn contains(&self, key: &Key) -> Result<bool, ComboError> {
        let found = self
            .conn
            .query_row(
                &format!("SELECT 1 FROM \"{}\" WHERE key = ?1", self.info.table),
                params![key],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn get(&self, key: &Key) -> Result<Option<Value>, ComboError> {
        let body: Option<String> = self
            .conn
            .query_row(
                &format!("SELECT value FROM \"{}\" WHERE key = ?1", self.info.table),
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|body| self.join(key.clone(), &body)).transpose()
    }

    /// Returns whether a row was removed.
    pub fn delete(&self, key: &Key) -> Result<bool, ComboError> {
        let removed = self
            .conn
            .execute(&format!("DELETE FROM \"{}\" WHERE key = ?1", self.info.table), params![key])?;
        Ok(removed > 0)
    }

    /// Every row in key order.
    pub fn values(&self) -> Result<Vec<Value>, ComboError> {
        let sql = format!("SELECT key, value FROM \"{}\" ORDER BY key", self.info.table);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, Key>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(|(key, body)| self.join(key, &body)).collect()
    }

    pub fn keys(&self) -> Result<Vec<Key>, ComboError> {
        let sql = format!("SELECT key FROM \"{}\" ORDER BY key", self.info.table);
        let mut stmt = self.conn.prepare(&sql)?;
        let keys = stmt.query_map([], |row| row.get::<_, Key>(0))?.collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    pub fn len(&self) -> Result<u64, ComboError> {
        let sql = format!("SELECT COUNT(*) FROM \"{}\"", self.info.table);
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    pub fn is_empty(&self) -> Result<bool, ComboError> {
        Ok(self.len()? == 0)
    }

    pub fn clear(&self) -> Result<(), ComboError> {
        self.conn.execute(&format!("DELETE FROM \"{}\"", self.info.table), [])?;
        Ok(())
    }
}

/// The only place object stores may be created or removed.
pub struct VersionChange<'a> {
    pub old_version: u32,
    pub new_version: u32,
    conn: &'a Connection,
}

impl<'a> VersionChange<'a> {
    pub fn create_object_store(
        &mut self,
        name: &str,
        key_path: &str,
        auto_increment: bool,
    ) -> Result<ObjectStore<'a>, ComboError> {
        if self.has_store(name)? {
            return Err(ComboError::DuplicateTable(name.to_string()));
        }
        debug!("[Store] Creating object store '{}'", name);

        let next: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(rowid), 0) + 1 FROM object_stores",
            [],
            |row| row.get(0),
        )?;
        let table = format!("store_{}", next);
        let key_column = if auto_increment {
            "key INTEGER PRIMARY KEY AUTOINCREMENT"
        } else {
            "key PRIMARY KEY NOT NULL"
        };

        self.conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS \"{table}\";
             CREATE TABLE \"{table}\" ({key_column}, value TEXT NOT NULL);"
        ))?;
        self.conn.execute(
            "INSERT INTO object_stores (name, table_name, key_path, auto_increment)
             VALUES (?1, ?2, ?3, ?4)",
            params![name, table, key_path, auto_increment],
        )?;

        open_store(self.conn, name)
    }

    pub fn delete_object_store(&mut self, name: &str) -> Result<(), ComboError> {
        debug!("[Store] Deleting object store '{}'", name);
        let info = store_info(self.conn, name)?
            .ok_or_else(|| ComboError::NotFound(format!("Object store '{}'", name)))?;

        self.conn.execute_batch(&format!("DROP TABLE \"{}\";", info.table))?;
        self.conn.execute("DELETE FROM object_stores WHERE name = ?1", params![name])?;
        Ok(())
    }

    pub fn has_store(&self, name: &str) -> Result<bool, ComboError> {
        Ok(store_info(self.conn, name)?.is_some())
    }

    pub fn store_names(&self) -> Result<Vec<String>, ComboError> {
        store_names(self.conn)
    }

    pub fn store_mut(&mut self, name: &str) -> Result<ObjectStore<'a>, ComboError> {
        open_store(self.conn, name)
            .map_err(|_| ComboError::NotFound(format!("Object store '{}'", name)))
    }
}

fn check_scope(scope: &[&str], name: &str) -> Result<(), ComboError> {
    if scope.contains(&name) {
        Ok(())
    } else {
        Err(ComboError::Transaction(format!("Store '{}' is not part of this transaction", name)))
    }
}

/// Read-only view over the stores named when the snapshot was taken.
pub struct Snapshot<'a> {
    scope: &'a [&'a str],
    conn: &'a Connection,
}

impl<'a> Snapshot<'a> {
    pub fn store(&self, name: &str) -> Result<ObjectStore<'a>, ComboError> {
        check_scope(self.scope, name)?;
        open_store(self.conn, name)
    }
}

/// Writes made through a transaction become visible together on commit.
pub struct Transaction<'a> {
    scope: &'a [&'a str],
    conn: &'a Connection,
}

impl<'a> Transaction<'a> {
    pub fn store(&self, name: &str) -> Result<ObjectStore<'a>, ComboError> {
        check_scope(self.scope, name)?;
        open_store(self.conn, name)
    }
}

/// A versioned SQLite database holding named object stores.
pub struct Engine {
    path: PathBuf,
    conn: Connection,
    version: u32,
}

impl Engine {
    /// Opens the database at `path`.
    ///
    /// Without a requested version a fresh database is created at version 1.
    /// When the target version is above the stored one, `upgrade` runs inside
    /// a transaction that also bumps `user_version`; an error rolls back both.
    pub fn open<F>(path: &Path, requested: Option<u32>, upgrade: F) -> Result<Self, ComboError>
    where
        F: FnOnce(&mut VersionChange<'_>) -> Result<(), ComboError>,
    {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut conn = Connection::open(path)?;
        let current = user_version(&conn)?;
        let target = requested.unwrap_or(current.max(1));

        if target < current {
            return Err(ComboError::VersionError { requested: target, current });
        }

        if target > current {
            info!("[Store] Upgrading database from version {} to {}", current, target);
            let tx = conn.transaction()?;
            tx.execute_batch(CATALOG_SQL)?;
            {
                let mut change =
                    VersionChange { old_version: current, new_version: target, conn: &tx };
                upgrade(&mut change)?;
            }
            tx.pragma_update(None, "user_version", target)?;
            tx.commit()?;
        }

        let engine = Self { path: path.to_path_buf(), conn, version: target };
        debug!("[Store] Opened {} at version {}", engine.path.display(), engine.version);
        Ok(engine)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn store_names(&self) -> Result<Vec<String>, ComboError> {
        store_names(&self.conn)
    }

    pub fn has_store(&self, name: &str) -> Result<bool, ComboError> {
        Ok(store_info(&self.conn, name)?.is_some())
    }

    /// Runs `f` against a consistent view of the scoped stores.
    pub fn read<T, F>(&self, scope: &[&str], f: F) -> Result<T, ComboError>
    where
        F: FnOnce(&Snapshot<'_>) -> Result<T, ComboError>,
    {
        let tx = self.conn.unchecked_transaction()?;
        let snapshot = Snapshot { scope, conn: &tx };
        f(&snapshot)
    }

    /// Runs `f` inside one SQLite transaction over the scoped stores.
    ///
    /// An error from `f` or from the commit leaves every store untouched.
    pub fn transaction<T, F>(&mut self, scope: &[&str], f: F) -> Result<T, ComboError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, ComboError>,
    {
        let tx = self.conn.transaction()?;
        for name in scope {
            if store_info(&tx, name)?.is_none() {
                return Err(ComboError::NotFound(format!("Table '{}'", name)));
            }
        }

        let value = f(&Transaction { scope, conn: &tx })?;
        tx.commit()?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn setup(change: &mut VersionChange<'_>) -> Result<(), ComboError> {
        change.create_object_store("rows", "id", true)?;
        change.create_object_store("meta", "name", false)?;
        Ok(())
    }

    fn open(dir: &tempfile::TempDir) -> Engine {
        Engine::open(&dir.path().join("db.sqlite3"), None, setup).unwrap()
    }

    #[test]
    fn test_open_creates_version_one_and_runs_upgrade() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.sqlite3");

        let engine = Engine::open(&path, None, setup).unwrap();
        assert_eq!(engine.version(), 1);
        assert!(engine.has_store("rows").unwrap());
        drop(engine);

        let reopened = Engine::open(&path, None, |_| panic!("no upgrade expected")).unwrap();
        assert_eq!(reopened.version(), 1);
        assert_eq!(reopened.store_names().unwrap(), vec!["meta".to_string(), "rows".to_string()]);
    }

    #[test]
    fn test_lower_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.sqlite3");
        Engine::open(&path, Some(3), setup).unwrap();

        let result = Engine::open(&path, Some(2), |_| Ok(()));
        assert!(matches!(result, Err(ComboError::VersionError { requested: 2, current: 3 })));
    }

    #[test]
    fn test_failed_upgrade_leaves_database_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.sqlite3");
        Engine::open(&path, None, setup).unwrap();

        let result = Engine::open(&path, Some(2), |change| {
            change.delete_object_store("rows")?;
            change.create_object_store("extra", "id", true)?;
            Err(ComboError::Custom("boom".into()))
        });
        assert!(result.is_err());

        let engine = Engine::open(&path, None, |_| Ok(())).unwrap();
        assert_eq!(engine.version(), 1);
        assert!(engine.has_store("rows").unwrap());
        assert!(!engine.has_store("extra").unwrap());
    }

    #[test]
    fn test_auto_increment_keys_and_explicit_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = open(&dir);

        let keys = engine
            .transaction(&["rows"], |tx| {
                let store = tx.store("rows")?;
                let first = store.put(json!({"name": "a"}))?;
                let explicit = store.put(json!({"id": 10, "name": "b"}))?;
                let next = store.put(json!({"name": "c"}))?;
                assert!(store.add(json!({"id": 10})).is_err());
                Ok(vec![first, explicit, next])
            })
            .unwrap();
        assert_eq!(keys, vec![Key::Int(1), Key::Int(10), Key::Int(11)]);

        let row = engine.read(&["rows"], |snap| snap.store("rows")?.get(&Key::Int(1))).unwrap();
        assert_eq!(row, Some(json!({"id": 1, "name": "a"})));
    }

    #[test]
    fn test_transaction_is_all_or_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = open(&dir);

        engine
            .transaction(&["rows", "meta"], |tx| {
                tx.store("rows")?.put(json!({"v": 1}))?;
                tx.store("meta")?.put(json!({"name": "count", "value": 1}))?;
                Ok(())
            })
            .unwrap();

        let failed: Result<(), ComboError> = engine.transaction(&["rows", "meta"], |tx| {
            tx.store("rows")?.put(json!({"v": 2}))?;
            tx.store("meta")?.put(json!({"value": 2}))?;
            Ok(())
        });
        assert!(failed.is_err());

        let (rows, meta) = engine
            .read(&["rows", "meta"], |snap| {
                Ok((snap.store("rows")?.len()?, snap.store("meta")?.len()?))
            })
            .unwrap();
        assert_eq!((rows, meta), (1, 1));
    }

    #[test]
    fn test_out_of_scope_store_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = open(&dir);

        let result = engine.transaction(&["rows"], |tx| tx.store("meta").map(|_| ()));
        assert!(matches!(result, Err(ComboError::Transaction(_))));
        assert!(engine.read(&["rows"], |snap| snap.store("meta").map(|_| ())).is_err());
        let missing = engine.transaction(&["missing"], |_| Ok(()));
        assert!(matches!(missing, Err(ComboError::NotFound(_))));
    }

    #[test]
    fn test_rows_and_counter_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.sqlite3");
        let mut engine = Engine::open(&path, None, setup).unwrap();
        engine.transaction(&["rows"], |tx| tx.store("rows")?.put(json!({"combo": "2P"}))).unwrap();
        engine
            .transaction(&["rows"], |tx| tx.store("rows")?.delete(&Key::Int(1)))
            .unwrap();
        drop(engine);

        let mut engine = Engine::open(&path, None, |_| Ok(())).unwrap();
        let key = engine
            .transaction(&["rows"], |tx| tx.store("rows")?.put(json!({"combo": "5K"})))
            .unwrap();
        assert_eq!(key, Key::Int(2));

        let combo = engine
            .read(&["rows"], |snap| {
                Ok(snap.store("rows")?.get(&Key::Int(2))?.map(|v| v["combo"].clone()))
            })
            .unwrap();
        assert_eq!(combo, Some(json!("5K")));
    }

    #[test]
    fn test_text_keys_and_odd_store_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.sqlite3");
        let mut engine = Engine::open(&path, None, |change| {
            change.create_object_store("Sol \"Badguy\"; DROP", "name", false)?;
            Ok(())
        })
        .unwrap();

        let scope = ["Sol \"Badguy\"; DROP"];
        engine
            .transaction(&scope, |tx| {
                let store = tx.store(scope[0])?;
                store.put(json!({"name": "b", "n": 2}))?;
                store.put(json!({"name": "a", "n": 1}))?;
                store.put(json!({"name": "a", "n": 3}))?;
                Ok(())
            })
            .unwrap();

        let keys = engine.read(&scope, |snap| snap.store(scope[0])?.keys()).unwrap();
        assert_eq!(keys, vec![Key::from("a"), Key::from("b")]);
        let a = engine.read(&scope, |snap| snap.store(scope[0])?.get(&Key::from("a"))).unwrap();
        assert_eq!(a, Some(json!({"name": "a", "n": 3})));
    }
}
