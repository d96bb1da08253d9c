use serde_json::Value;
use tracing::{
    info,
    warn,
};

use super::{
    engine::Key,
    manager::{
        load_schema,
        save_schema,
        stamp_new_record,
        StoreManager,
    },
    schema::{
        Record,
        TableSchema,
        SCHEMA_STORE,
    },
};
use crate::core::ComboError;

/// How source columns line up with destination columns, matched by display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    /// `(source column id, destination column id)`
    pub pairs: Vec<(String, String)>,
    /// Names of source columns with no counterpart; their values are lost.
    pub dropped: Vec<String>,
}

impl ColumnMapping {
    pub fn loses_data(&self) -> bool {
        !self.dropped.is_empty()
    }

    pub fn project(&self, row: &Record) -> Record {
        let mut projected = Record::new();
        for (source, destination) in &self.pairs {
            if let Some(value) = row.get(source) {
                projected.insert(destination.clone(), value.clone());
            }
        }
        projected
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Move,
    Copy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// `(source id, destination id)` for every row written.
    pub transferred: Vec<(u64, u64)>,
    /// Requested ids that did not exist in the source table.
    pub skipped: Vec<u64>,
}

pub fn plan_transfer(source: &TableSchema, destination: &TableSchema) -> ColumnMapping {
    let mut mapping = ColumnMapping::default();

    for column in &source.columns {
        match destination.column_by_name(&column.name) {
            Some(target) => mapping.pairs.push((column.id.clone(), target.id.clone())),
            None => mapping.dropped.push(column.name.clone()),
        }
    }

    mapping
}

impl StoreManager {
    /// Moves or copies rows between tables in a single transaction.
    ///
    /// Columns are carried over by name; unmatched columns are dropped. The
    /// destination assigns fresh ids and unique numbers.
    pub fn transfer_records(
        &mut self,
        source: &str,
        destination: &str,
        ids: &[u64],
        mode: TransferMode,
    ) -> Result<TransferReport, ComboError> {
        if source == destination {
            return Err(ComboError::Validation(
                "Source and destination tables must differ".into(),
            ));
        }

        let engine = self.open()?;
        let report = engine.transaction(&[source, destination, SCHEMA_STORE], |tx| {
            let mut source_schema = load_schema(tx, source)?;
            let mut destination_schema = load_schema(tx, destination)?;
            let mapping = plan_transfer(&source_schema, &destination_schema);

            let mut report = TransferReport::default();
            for &id in ids {
                let key = Key::Int(id);
                let row = match tx.store(source)?.get(&key)? {
                    Some(Value::Object(row)) => row,
                    _ => {
                        warn!("[Store] Record {} not found in '{}', skipping", id, source);
                        report.skipped.push(id);
                        continue;
                    }
                };

                let mut projected = mapping.project(&row);
                stamp_new_record(&mut destination_schema, &mut projected);
                let new_key = tx.store(destination)?.add(Value::Object(projected))?;
                destination_schema.record_count += 1;

                if mode == TransferMode::Move {
                    tx.store(source)?.delete(&key)?;
                    source_schema.record_count = source_schema.record_count.saturating_sub(1);
                }

                let new_id = new_key.as_int().ok_or_else(|| {
                    ComboError::Transaction("Record key is not numeric".into())
                })?;
                report.transferred.push((id, new_id));
            }

            if !report.transferred.is_empty() {
                destination_schema.touch();
                save_schema(tx, &destination_schema)?;
                if mode == TransferMode::Move {
                    source_schema.touch();
                    save_schema(tx, &source_schema)?;
                }
            }

            Ok(report)
        })?;

        info!(
            "[Store] {:?} {} records from '{}' to '{}' ({} skipped)",
            mode,
            report.transferred.len(),
            source,
            destination,
            report.skipped.len()
        );
        Ok(report)
    }
}
