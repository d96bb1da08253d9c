use serde_json::Value;
use tracing::{
    info,
    warn,
};

use super::{
    bundle::ExportBundle,
    engine::{
        Key,
        VersionChange,
    },
    schema::{
        TableSchema,
        RECORD_KEY_PATH,
        SCHEMA_KEY_PATH,
        SCHEMA_STORE,
    },
};
use crate::core::ComboError;

/// A structural change. Each one runs inside its own version bump.
#[derive(Debug, Clone)]
pub enum Migration {
    /// Schema catalog plus the default table.
    InitialSetup,
    CreateTable(TableSchema),
    DropTable(String),
    /// Wipes every store and rebuilds from the bundle.
    Import(ExportBundle),
}

impl Migration {
    pub fn label(&self) -> &'static str {
        match self {
            Migration::InitialSetup => "initial-setup",
            Migration::CreateTable(_) => "create-table",
            Migration::DropTable(_) => "drop-table",
            Migration::Import(_) => "import",
        }
    }

    pub(crate) fn apply(&self, change: &mut VersionChange<'_>) -> Result<(), ComboError> {
        info!(
            "[Store] Running {} migration (v{} -> v{})",
            self.label(),
            change.old_version,
            change.new_version
        );

        match self {
            Migration::InitialSetup => initial_setup(change),
            Migration::CreateTable(schema) => create_table(change, schema),
            Migration::DropTable(name) => drop_table(change, name),
            Migration::Import(bundle) => import(change, bundle),
        }
    }
}

fn ensure_catalog(change: &mut VersionChange<'_>) -> Result<(), ComboError> {
    if !change.has_store(SCHEMA_STORE)? {
        change.create_object_store(SCHEMA_STORE, SCHEMA_KEY_PATH, false)?;
    }
    Ok(())
}

fn initial_setup(change: &mut VersionChange<'_>) -> Result<(), ComboError> {
    ensure_catalog(change)?;

    let schema = TableSchema::default_table();
    if change.has_store(&schema.table_name)? {
        return Ok(());
    }

    change.create_object_store(&schema.table_name, RECORD_KEY_PATH, true)?;
    change.store_mut(SCHEMA_STORE)?.put(schema.to_value()?)?;
    Ok(())
}

fn create_table(change: &mut VersionChange<'_>, schema: &TableSchema) -> Result<(), ComboError> {
    ensure_catalog(change)?;

    let key = Key::from(schema.table_name.as_str());
    if change.has_store(&schema.table_name)? || change.store_mut(SCHEMA_STORE)?.contains(&key)? {
        return Err(ComboError::DuplicateTable(schema.table_name.clone()));
    }

    let mut schema = schema.clone();
    schema.record_count = 0;
    schema.unique_number_counter = 0;
    schema.touch();

    change.create_object_store(&schema.table_name, RECORD_KEY_PATH, true)?;
    change.store_mut(SCHEMA_STORE)?.put(schema.to_value()?)?;
    Ok(())
}

fn drop_table(change: &mut VersionChange<'_>, name: &str) -> Result<(), ComboError> {
    change.delete_object_store(name)?;
    if change.has_store(SCHEMA_STORE)? {
        change.store_mut(SCHEMA_STORE)?.delete(&Key::from(name))?;
    }
    Ok(())
}

fn import(change: &mut VersionChange<'_>, bundle: &ExportBundle) -> Result<(), ComboError> {
    for name in change.store_names()? {
        change.delete_object_store(&name)?;
    }
    ensure_catalog(change)?;

    for schema in &bundle.schemas {
        change.create_object_store(&schema.table_name, RECORD_KEY_PATH, true)?;
        change.store_mut(SCHEMA_STORE)?.put(schema.to_value()?)?;
    }

    for (table, rows) in &bundle.data {
        if !change.has_store(table)? {
            warn!(
                "[Store] Import data for unknown table '{}' skipped ({} rows)",
                table,
                rows.len()
            );
            continue;
        }
        let store = change.store_mut(table)?;
        for row in rows {
            store.put(Value::Object(row.clone()))?;
        }
    }

    Ok(())
}
