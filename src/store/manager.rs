use std::{
    collections::VecDeque,
    path::{
        Path,
        PathBuf,
    },
};

use chrono::{
    Local,
    Utc,
};
use serde_json::Value;
use tracing::{
    debug,
    error,
    info,
};

use super::{
    bundle::ExportBundle,
    engine::{
        Engine,
        Key,
        Transaction,
    },
    migration::Migration,
    schema::{
        numeric_cell,
        record_id,
        Record,
        TableSchema,
        CREATED_FORMAT,
        RECORD_KEY_PATH,
        SCHEMA_STORE,
    },
};
use crate::core::ComboError;

pub const DATABASE_FILE: &str = "combos.sqlite3";

/// Owns the single connection to the combo database.
///
/// Structural changes go through [`StoreManager::apply_migration`], which
/// queues them and runs each one in its own close/reopen cycle.
pub struct StoreManager {
    path: PathBuf,
    connection: Option<Engine>,
    queue: VecDeque<Migration>,
}

impl StoreManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), connection: None, queue: VecDeque::new() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// Returns the open connection, opening it (and bootstrapping a fresh
    /// database) on first use.
    pub fn open(&mut self) -> Result<&mut Engine, ComboError> {
        if self.connection.is_none() {
            let engine = Engine::open(&self.path, None, |change| {
                if change.old_version == 0 {
                    Migration::InitialSetup.apply(change)
                } else {
                    Ok(())
                }
            })
            .map_err(|e| {
                error!("[Store] Failed to open {}: {}", self.path.display(), e);
                e
            })?;
            self.connection = Some(engine);
        }

        self.connection
            .as_mut()
            .ok_or_else(|| ComboError::Custom("Database connection unavailable".into()))
    }

    pub fn close(&mut self) {
        if self.connection.take().is_some() {
            debug!("[Store] Connection closed");
        }
    }

    pub fn version(&mut self) -> Result<u32, ComboError> {
        Ok(self.open()?.version())
    }

    /// Queues a structural change and drains the queue in order.
    ///
    /// A failing migration stops the drain and discards whatever was queued behind it.
    pub fn apply_migration(&mut self, migration: Migration) -> Result<(), ComboError> {
        self.queue.push_back(migration);

        while let Some(next) = self.queue.pop_front() {
            if let Err(e) = self.run_migration(&next) {
                error!("[Store] {} migration failed: {}", next.label(), e);
                self.queue.clear();
                return Err(e);
            }
        }

        Ok(())
    }

    fn run_migration(&mut self, migration: &Migration) -> Result<(), ComboError> {
        let current = self.version()?;
        self.close();

        let engine = Engine::open(&self.path, Some(current + 1), |change| migration.apply(change))?;
        self.connection = Some(engine);

        if let Migration::Import(_) = migration {
            self.recompute_counters()?;
        }

        Ok(())
    }

    /// Brings every cached record count and unique-number counter in line with the rows.
    pub fn recompute_counters(&mut self) -> Result<(), ComboError> {
        let tables: Vec<String> =
            self.get_all_schemas()?.into_iter().map(|schema| schema.table_name).collect();

        for table in tables {
            let engine = self.open()?;
            engine.transaction(&[table.as_str(), SCHEMA_STORE], |tx| {
                let mut schema = load_schema(tx, &table)?;
                let rows = tx.store(&table)?;

                schema.record_count = rows.len()?;
                schema.unique_number_counter = match &schema.unique_number_column_id {
                    Some(column) => max_numeric(&rows.values()?, column),
                    None => 0,
                };
                schema.touch();
                save_schema(tx, &schema)
            })?;
        }

        Ok(())
    }

    pub fn add_record(&mut self, table: &str, record: Record) -> Result<u64, ComboError> {
        let engine = self.open()?;

        let id = engine.transaction(&[table, SCHEMA_STORE], |tx| {
            let mut schema = load_schema(tx, table)?;
            let mut record = record;
            record.remove(RECORD_KEY_PATH);
            stamp_new_record(&mut schema, &mut record);

            let key = tx.store(table)?.add(Value::Object(record))?;
            schema.record_count += 1;
            schema.touch();
            save_schema(tx, &schema)?;

            key.as_int().ok_or_else(|| ComboError::Transaction("Record key is not numeric".into()))
        })?;

        debug!("[Store] Added record {} to '{}'", id, table);
        Ok(id)
    }

    pub fn update_record(&mut self, table: &str, record: Record) -> Result<(), ComboError> {
        let id = record_id(&record)
            .ok_or_else(|| ComboError::Validation("Record has no id to update".into()))?;
        let engine = self.open()?;

        let written = record.clone();
        engine.transaction(&[table], |tx| {
            tx.store(table)?.put(Value::Object(written)).map(|_| ())
        })?;

        engine.transaction(&[SCHEMA_STORE], |tx| {
            let mut schema = load_schema(tx, table)?;
            if let Some(column) = &schema.unique_number_column_id {
                if let Some(number) = record.get(column).and_then(numeric_cell) {
                    schema.unique_number_counter = schema.unique_number_counter.max(number);
                }
            }
            schema.touch();
            save_schema(tx, &schema)
        })?;

        debug!("[Store] Updated record {} in '{}'", id, table);
        Ok(())
    }

    pub fn delete_record(&mut self, table: &str, id: u64) -> Result<(), ComboError> {
        let engine = self.open()?;

        let removed = engine.transaction(&[table], |tx| tx.store(table)?.delete(&Key::Int(id)))?;
        if !removed {
            return Err(ComboError::NotFound(format!("Record {} in '{}'", id, table)));
        }

        engine.transaction(&[SCHEMA_STORE], |tx| {
            let mut schema = load_schema(tx, table)?;
            schema.record_count = schema.record_count.saturating_sub(1);
            schema.touch();
            save_schema(tx, &schema)
        })?;

        debug!("[Store] Deleted record {} from '{}'", id, table);
        Ok(())
    }

    pub fn get_all_records(&mut self, table: &str) -> Result<Vec<Record>, ComboError> {
        let engine = self.open()?;
        engine.read(&[table], |snap| {
            Ok(snap
                .store(table)?
                .values()?
                .into_iter()
                .filter_map(|value| match value {
                    Value::Object(record) => Some(record),
                    _ => None,
                })
                .collect())
        })
    }

    pub fn get_record(&mut self, table: &str, id: u64) -> Result<Record, ComboError> {
        let engine = self.open()?;
        engine.read(&[table], |snap| {
            snap.store(table)?
                .get(&Key::Int(id))?
                .and_then(|value| value.as_object().cloned())
                .ok_or_else(|| ComboError::NotFound(format!("Record {} in '{}'", id, table)))
        })
    }

    pub fn get_schema(&mut self, table: &str) -> Result<TableSchema, ComboError> {
        let engine = self.open()?;
        engine.read(&[SCHEMA_STORE], |snap| {
            let value = snap
                .store(SCHEMA_STORE)?
                .get(&Key::from(table))?
                .ok_or_else(|| ComboError::NotFound(format!("Table '{}'", table)))?;
            TableSchema::from_value(&value)
        })
    }

    pub fn get_all_schemas(&mut self) -> Result<Vec<TableSchema>, ComboError> {
        let engine = self.open()?;
        engine.read(&[SCHEMA_STORE], |snap| {
            snap.store(SCHEMA_STORE)?.values()?.iter().map(TableSchema::from_value).collect()
        })
    }

    pub fn table_names(&mut self) -> Result<Vec<String>, ComboError> {
        Ok(self.get_all_schemas()?.into_iter().map(|schema| schema.table_name).collect())
    }

    /// Replaces a table's catalog entry. The table itself must already exist.
    ///
    /// Record count and unique-number counter are derived from the stored
    /// state, never taken from `schema`. Pointing the unique number at a
    /// different column rescans that column so the next number stays unused.
    pub fn update_schema(&mut self, schema: TableSchema) -> Result<TableSchema, ComboError> {
        schema.validate()?;
        let engine = self.open()?;
        let table = schema.table_name.clone();
        if !engine.has_store(&table)? {
            return Err(ComboError::NotFound(format!("Table '{}'", table)));
        }

        engine.transaction(&[table.as_str(), SCHEMA_STORE], |tx| {
            let existing = load_schema(tx, &table)?;
            let mut schema = schema;
            schema.record_count = existing.record_count;
            schema.unique_number_counter = match &schema.unique_number_column_id {
                Some(column) => {
                    let highest = max_numeric(&tx.store(&table)?.values()?, column);
                    if existing.unique_number_column_id.as_ref() == Some(column) {
                        highest.max(existing.unique_number_counter)
                    } else {
                        highest
                    }
                }
                None => 0,
            };
            schema.touch();
            save_schema(tx, &schema)?;
            Ok(schema)
        })
    }

    pub fn create_table(&mut self, schema: TableSchema) -> Result<(), ComboError> {
        let mut schema = schema;
        schema.table_name = schema.table_name.trim().to_string();
        schema.validate()?;

        if self.open()?.has_store(&schema.table_name)? {
            return Err(ComboError::DuplicateTable(schema.table_name));
        }

        let name = schema.table_name.clone();
        self.apply_migration(Migration::CreateTable(schema))?;
        info!("[Store] Created table '{}'", name);
        Ok(())
    }

    pub fn delete_table(&mut self, table: &str) -> Result<(), ComboError> {
        if table == SCHEMA_STORE || !self.open()?.has_store(table)? {
            return Err(ComboError::NotFound(format!("Table '{}'", table)));
        }

        self.apply_migration(Migration::DropTable(table.to_string()))?;
        info!("[Store] Deleted table '{}'", table);
        Ok(())
    }

    /// Rewrites the unique-number column as 1..n in id order.
    pub fn renumber_unique_numbers(&mut self, table: &str) -> Result<u64, ComboError> {
        let engine = self.open()?;

        engine.transaction(&[table, SCHEMA_STORE], |tx| {
            let mut schema = load_schema(tx, table)?;
            let column = schema.unique_number_column_id.clone().ok_or_else(|| {
                ComboError::Validation(format!("Table '{}' has no unique number column", table))
            })?;

            let store = tx.store(table)?;
            let mut number = 0;
            for mut row in store.values()? {
                number += 1;
                if let Some(object) = row.as_object_mut() {
                    object.insert(column.clone(), Value::from(number));
                }
                store.put(row)?;
            }

            schema.unique_number_counter = number;
            schema.touch();
            save_schema(tx, &schema)?;
            Ok(number)
        })
    }

    pub fn export_db(&mut self, settings: Option<Value>) -> Result<ExportBundle, ComboError> {
        let schemas = self.get_all_schemas()?;
        let mut bundle = ExportBundle {
            schemas: Vec::with_capacity(schemas.len()),
            settings,
            exported_at: Some(Utc::now()),
            ..Default::default()
        };

        for schema in schemas {
            let rows = self.get_all_records(&schema.table_name)?;
            bundle.data.insert(schema.table_name.clone(), rows);
            bundle.schemas.push(schema);
        }

        Ok(bundle)
    }

    pub fn export_to_dir(
        &mut self,
        dir: &Path,
        settings: Option<Value>,
    ) -> Result<PathBuf, ComboError> {
        self.export_db(settings)?.write_to_dir(dir)
    }

    pub fn import_db(&mut self, bundle: ExportBundle) -> Result<(), ComboError> {
        bundle.validate()?;
        let tables = bundle.schemas.len();
        self.apply_migration(Migration::Import(bundle))?;
        info!("[Store] Imported {} tables", tables);
        Ok(())
    }

    /// Imports a bundle file and hands back its settings snapshot, if any.
    pub fn import_from_file(&mut self, path: &Path) -> Result<Option<Value>, ComboError> {
        let mut bundle = ExportBundle::read_from_file(path)?;
        let settings = bundle.settings.take();
        self.import_db(bundle)?;
        Ok(settings)
    }
}

pub(super) fn load_schema(tx: &Transaction<'_>, table: &str) -> Result<TableSchema, ComboError> {
    let value = tx
        .store(SCHEMA_STORE)?
        .get(&Key::from(table))?
        .ok_or_else(|| ComboError::NotFound(format!("Table '{}'", table)))?;
    TableSchema::from_value(&value)
}

pub(super) fn save_schema(tx: &Transaction<'_>, schema: &TableSchema) -> Result<(), ComboError> {
    tx.store(SCHEMA_STORE)?.put(schema.to_value()?)?;
    Ok(())
}

fn max_numeric(rows: &[Value], column: &str) -> u64 {
    rows.iter().filter_map(|row| row.get(column).and_then(numeric_cell)).max().unwrap_or(0)
}

/// Fills the columns a schema maintains on insert: the next unique number
/// and, when empty, the creation date.
pub(super) fn stamp_new_record(schema: &mut TableSchema, record: &mut Record) {
    if let Some(column) = schema.unique_number_column_id.clone() {
        schema.unique_number_counter += 1;
        record.insert(column, Value::from(schema.unique_number_counter));
    }

    if let Some(column) = &schema.creation_date_column_id {
        let empty = match record.get(column) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        };
        if empty {
            record.insert(
                column.clone(),
                Value::from(Local::now().format(CREATED_FORMAT).to_string()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::schema::{
        Column,
        DEFAULT_TABLE,
    };

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn manager(dir: &tempfile::TempDir) -> StoreManager {
        StoreManager::new(dir.path().join(DATABASE_FILE))
    }

    fn simple_table(name: &str) -> TableSchema {
        TableSchema::new(
            name,
            vec![Column::new("name", "Name"), Column::new("combo", "Combo")],
            "combo",
        )
    }

    #[test]
    fn test_first_open_bootstraps_default_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = manager(&dir);

        let schemas = store.get_all_schemas().unwrap();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].table_name, DEFAULT_TABLE);
        assert_eq!(store.version().unwrap(), 1);

        // Opening twice is a no-op.
        store.open().unwrap();
        assert_eq!(store.version().unwrap(), 1);
    }

    #[test]
    fn test_unique_number_follows_highest_existing_value() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = manager(&dir);

        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(store.add_record(DEFAULT_TABLE, record(json!({"combo": "2P"}))).unwrap());
        }
        for (id, number) in ids.iter().zip([3, 7, 1]) {
            let mut row = store.get_record(DEFAULT_TABLE, *id).unwrap();
            row.insert("number".into(), json!(number));
            store.update_record(DEFAULT_TABLE, row).unwrap();
        }

        let id = store.add_record(DEFAULT_TABLE, record(json!({"combo": "5K"}))).unwrap();
        assert_eq!(store.get_record(DEFAULT_TABLE, id).unwrap()["number"], json!(8));
    }

    #[test]
    fn test_add_record_stamps_creation_date_and_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = manager(&dir);

        let id = store
            .add_record(DEFAULT_TABLE, record(json!({"id": 99, "combo": "2K > 236 + P"})))
            .unwrap();
        assert_eq!(id, 1);

        let row = store.get_record(DEFAULT_TABLE, id).unwrap();
        assert_eq!(row["number"], json!(1));
        assert!(!row["created"].as_str().unwrap().is_empty());
        assert_eq!(store.get_schema(DEFAULT_TABLE).unwrap().record_count, 1);
    }

    #[test]
    fn test_delete_decrements_and_update_only_touches_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = manager(&dir);
        let first = store.add_record(DEFAULT_TABLE, record(json!({"combo": "2P"}))).unwrap();
        store.add_record(DEFAULT_TABLE, record(json!({"combo": "5K"}))).unwrap();

        let before = store.get_schema(DEFAULT_TABLE).unwrap();
        assert_eq!(before.record_count, 2);

        std::thread::sleep(std::time::Duration::from_millis(5));
        let mut row = store.get_record(DEFAULT_TABLE, first).unwrap();
        row.insert("notes".into(), json!("corner only"));
        store.update_record(DEFAULT_TABLE, row).unwrap();

        let updated = store.get_schema(DEFAULT_TABLE).unwrap();
        assert_eq!(updated.record_count, 2);
        assert!(updated.last_updated > before.last_updated);

        store.delete_record(DEFAULT_TABLE, first).unwrap();
        assert_eq!(store.get_schema(DEFAULT_TABLE).unwrap().record_count, 1);
        assert!(matches!(store.delete_record(DEFAULT_TABLE, first), Err(ComboError::NotFound(_))));
        assert_eq!(store.get_schema(DEFAULT_TABLE).unwrap().record_count, 1);
    }

    #[test]
    fn test_create_and_delete_table_bump_version() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = manager(&dir);
        store.open().unwrap();

        store.create_table(simple_table("Ky")).unwrap();
        assert_eq!(store.version().unwrap(), 2);
        assert!(store.table_names().unwrap().contains(&"Ky".to_string()));

        assert!(matches!(
            store.create_table(simple_table("Ky")),
            Err(ComboError::DuplicateTable(_))
        ));
        assert!(matches!(
            store.create_table(simple_table("   ")),
            Err(ComboError::Validation(_))
        ));

        store.delete_table("Ky").unwrap();
        assert_eq!(store.version().unwrap(), 3);
        assert!(matches!(store.get_schema("Ky"), Err(ComboError::NotFound(_))));
        assert!(store.get_all_records("Ky").is_err());
    }

    #[test]
    fn test_export_import_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = manager(&dir);
        store.create_table(simple_table("Ky")).unwrap();
        store.add_record("Ky", record(json!({"name": "bnb", "combo": "2K > 6P"}))).unwrap();
        store.add_record("Ky", record(json!({"name": "corner", "combo": "5K"}))).unwrap();
        store.add_record(DEFAULT_TABLE, record(json!({"combo": "2P"}))).unwrap();

        let mut bundle = store.export_db(Some(json!({"darkMode": true}))).unwrap();
        for schema in bundle.schemas.iter_mut() {
            schema.record_count = 0;
        }

        let other_dir = tempfile::tempdir().unwrap();
        let mut other = manager(&other_dir);
        other.add_record(DEFAULT_TABLE, record(json!({"combo": "stale"}))).unwrap();
        other.import_db(bundle.clone()).unwrap();

        let mut names = other.table_names().unwrap();
        names.sort();
        assert_eq!(names, vec![DEFAULT_TABLE.to_string(), "Ky".to_string()]);
        assert_eq!(other.get_all_records("Ky").unwrap().len(), 2);
        assert_eq!(other.get_all_records(DEFAULT_TABLE).unwrap().len(), 1);
        assert_eq!(other.get_schema("Ky").unwrap().record_count, 2);
        assert_eq!(other.get_schema(DEFAULT_TABLE).unwrap().unique_number_counter, 1);
    }

    #[test]
    fn test_import_from_file_returns_settings() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = manager(&dir);
        store.add_record(DEFAULT_TABLE, record(json!({"combo": "2P"}))).unwrap();
        let path = store.export_to_dir(dir.path(), Some(json!({"theme": "dark"}))).unwrap();

        let settings = store.import_from_file(&path).unwrap();
        assert_eq!(settings, Some(json!({"theme": "dark"})));
        assert_eq!(store.get_all_records(DEFAULT_TABLE).unwrap().len(), 1);
    }

    #[test]
    fn test_update_schema_validates_and_requires_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = manager(&dir);

        let mut schema = store.get_schema(DEFAULT_TABLE).unwrap();
        schema.columns.push(Column::new("route", "Route"));
        schema.coloring_preset_name = Some("Strive".into());
        let saved = store.update_schema(schema.clone()).unwrap();
        assert!(saved.last_updated >= schema.last_updated);
        assert!(store.get_schema(DEFAULT_TABLE).unwrap().has_column("route"));

        let mut broken = schema.clone();
        broken.combo_column_id = "missing".into();
        assert!(store.update_schema(broken).is_err());

        let mut unknown = schema;
        unknown.table_name = "Nope".into();
        assert!(matches!(store.update_schema(unknown), Err(ComboError::NotFound(_))));
    }

    #[test]
    fn test_switching_unique_number_column_rescans_existing_values() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = manager(&dir);
        let mut table = simple_table("T");
        table.columns.push(Column::new("no", "No."));
        store.create_table(table).unwrap();
        for number in [3, 7, 1] {
            store.add_record("T", record(json!({"combo": "5P", "no": number}))).unwrap();
        }

        let mut schema = store.get_schema("T").unwrap();
        schema.unique_number_column_id = Some("no".into());
        let saved = store.update_schema(schema).unwrap();
        assert_eq!(saved.unique_number_counter, 7);
        assert_eq!(saved.record_count, 3);

        let id = store.add_record("T", record(json!({"combo": "2K"}))).unwrap();
        assert_eq!(store.get_record("T", id).unwrap()["no"], json!(8));

        // Stale counters in the submitted schema are ignored.
        let mut schema = store.get_schema("T").unwrap();
        schema.unique_number_counter = 0;
        schema.record_count = 99;
        let saved = store.update_schema(schema).unwrap();
        assert_eq!(saved.unique_number_counter, 8);
        assert_eq!(saved.record_count, 4);
    }

    #[test]
    fn test_renumber_unique_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = manager(&dir);
        let ids: Vec<u64> = (0..4)
            .map(|_| store.add_record(DEFAULT_TABLE, record(json!({"combo": "2P"}))).unwrap())
            .collect();
        store.delete_record(DEFAULT_TABLE, ids[1]).unwrap();

        assert_eq!(store.renumber_unique_numbers(DEFAULT_TABLE).unwrap(), 3);
        let numbers: Vec<_> = store
            .get_all_records(DEFAULT_TABLE)
            .unwrap()
            .iter()
            .map(|row| row["number"].clone())
            .collect();
        assert_eq!(numbers, vec![json!(1), json!(2), json!(3)]);

        let next = store.add_record(DEFAULT_TABLE, record(json!({"combo": "5K"}))).unwrap();
        assert_eq!(store.get_record(DEFAULT_TABLE, next).unwrap()["number"], json!(4));

        store.create_table(simple_table("Ky")).unwrap();
        assert!(matches!(store.renumber_unique_numbers("Ky"), Err(ComboError::Validation(_))));
    }

    #[test]
    fn test_reopen_after_close_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = manager(&dir);
        store.add_record(DEFAULT_TABLE, record(json!({"combo": "2P"}))).unwrap();
        store.close();
        assert!(!store.is_open());

        let mut again = manager(&dir);
        assert_eq!(again.get_all_records(DEFAULT_TABLE).unwrap().len(), 1);
    }
}
