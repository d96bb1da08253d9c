use std::collections::HashSet;

use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::{
    Map,
    Value,
};

use crate::core::ComboError;

/// Reserved store holding one row per user table.
pub const SCHEMA_STORE: &str = "__schemas";
pub const SCHEMA_KEY_PATH: &str = "tableName";
pub const RECORD_KEY_PATH: &str = "id";
pub const DEFAULT_TABLE: &str = "Combos";
/// chrono format of creation-date cells.
pub const CREATED_FORMAT: &str = "%Y-%m-%d %H:%M";

/// A stored row. The auto-increment id lives under [`RECORD_KEY_PATH`].
pub type Record = Map<String, Value>;

pub fn record_id(record: &Record) -> Option<u64> {
    record.get(RECORD_KEY_PATH).and_then(Value::as_u64)
}

/// Numeric reading of a cell, accepting numbers and numeric strings.
pub fn numeric_cell(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => {
            n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
        }
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub name: String,
}

impl Column {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }
}

const DEFAULT_COLUMNS: &[(&str, &str)] = &[
    ("number", "No."),
    ("character", "Character"),
    ("starter", "Starter"),
    ("combo", "Combo"),
    ("damage", "Damage"),
    ("meter", "Meter"),
    ("position", "Position"),
    ("video", "Video"),
    ("notes", "Notes"),
    ("tags", "Tags"),
    ("created", "Created"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<Column>,
    pub combo_column_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starter_column_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date_column_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_number_column_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coloring_preset_name: Option<String>,
    /// Cached row count, corrected on import.
    #[serde(default)]
    pub record_count: u64,
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
    /// Highest unique number handed out so far.
    #[serde(default)]
    pub unique_number_counter: u64,
}

impl TableSchema {
    pub fn new(
        table_name: impl Into<String>,
        columns: Vec<Column>,
        combo_column_id: impl Into<String>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            columns,
            combo_column_id: combo_column_id.into(),
            starter_column_id: None,
            creation_date_column_id: None,
            unique_number_column_id: None,
            coloring_preset_name: None,
            record_count: 0,
            last_updated: Utc::now(),
            unique_number_counter: 0,
        }
    }

    /// The table created on first run.
    pub fn default_table() -> Self {
        let columns = DEFAULT_COLUMNS.iter().map(|(id, name)| Column::new(*id, *name)).collect();
        Self {
            starter_column_id: Some("starter".into()),
            creation_date_column_id: Some("created".into()),
            unique_number_column_id: Some("number".into()),
            ..Self::new(DEFAULT_TABLE, columns, "combo")
        }
    }

    pub fn column(&self, id: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.id == id)
    }

    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn has_column(&self, id: &str) -> bool {
        self.column(id).is_some()
    }

    pub fn validate(&self) -> Result<(), ComboError> {
        let name = self.table_name.trim();
        if name.is_empty() {
            return Err(ComboError::Validation("Table name must not be empty".into()));
        }
        if name == SCHEMA_STORE {
            return Err(ComboError::Validation(format!("'{}' is a reserved table name", name)));
        }
        if self.columns.is_empty() {
            return Err(ComboError::Validation("A table needs at least one column".into()));
        }

        let mut ids = HashSet::new();
        for column in &self.columns {
            if column.id.trim().is_empty() || column.id == RECORD_KEY_PATH {
                return Err(ComboError::Validation(format!("Invalid column id '{}'", column.id)));
            }
            if !ids.insert(column.id.as_str()) {
                return Err(ComboError::Validation(format!("Duplicate column id '{}'", column.id)));
            }
        }

        if !self.has_column(&self.combo_column_id) {
            return Err(ComboError::Validation("A combo column must be selected".into()));
        }

        let optional = [
            ("starter", &self.starter_column_id),
            ("creation date", &self.creation_date_column_id),
            ("unique number", &self.unique_number_column_id),
        ];
        for (label, id) in optional {
            if let Some(id) = id {
                if !self.has_column(id) {
                    return Err(ComboError::Validation(format!(
                        "The {} column '{}' does not exist",
                        label, id
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }

    pub(crate) fn to_value(&self) -> Result<Value, ComboError> {
        Ok(serde_json::to_value(self)?)
    }

    pub(crate) fn from_value(value: &Value) -> Result<Self, ComboError> {
        Ok(serde_json::from_value(value.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_is_valid() {
        let schema = TableSchema::default_table();
        assert!(schema.validate().is_ok());
        assert_eq!(schema.columns.len(), 11);
        assert_eq!(schema.columns[0].name, "No.");
        assert_eq!(schema.columns[10].name, "Created");
    }

    #[test]
    fn test_validation_errors() {
        let columns = vec![Column::new("name", "Name"), Column::new("combo", "Combo")];

        let empty = TableSchema::new("  ", columns.clone(), "combo");
        assert!(matches!(empty.validate(), Err(ComboError::Validation(_))));

        let reserved = TableSchema::new(SCHEMA_STORE, columns.clone(), "combo");
        assert!(reserved.validate().is_err());

        let missing_combo = TableSchema::new("A", columns.clone(), "nope");
        assert!(missing_combo.validate().is_err());

        let mut bad_starter = TableSchema::new("A", columns.clone(), "combo");
        bad_starter.starter_column_id = Some("starter".into());
        assert!(bad_starter.validate().is_err());

        let dup = TableSchema::new(
            "A",
            vec![Column::new("combo", "Combo"), Column::new("combo", "Other")],
            "combo",
        );
        assert!(dup.validate().is_err());
    }

    #[test]
    fn test_schema_json_is_camel_case() {
        let value = TableSchema::default_table().to_value().unwrap();
        assert_eq!(value["tableName"], "Combos");
        assert_eq!(value["comboColumnId"], "combo");
        assert_eq!(value["uniqueNumberColumnId"], "number");
        assert!(value.get("coloringPresetName").is_none());
    }

    #[test]
    fn test_numeric_cell() {
        assert_eq!(numeric_cell(&Value::from(7)), Some(7));
        assert_eq!(numeric_cell(&Value::from(" 12 ")), Some(12));
        assert_eq!(numeric_cell(&Value::from("abc")), None);
        assert_eq!(numeric_cell(&Value::Null), None);
    }
}
