use std::{
    collections::BTreeMap,
    fs,
    path::{
        Path,
        PathBuf,
    },
};

use chrono::{
    DateTime,
    Local,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;
use tracing::info;

use super::schema::{
    Record,
    TableSchema,
};
use crate::core::ComboError;

pub const BACKUP_PREFIX: &str = "comboscribe_backup";

/// Everything needed to rebuild the database, plus an optional settings snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportBundle {
    pub schemas: Vec<TableSchema>,
    pub data: BTreeMap<String, Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
    #[serde(default, rename = "exportedAt", skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
}

impl ExportBundle {
    pub fn file_name(at: DateTime<Local>) -> String {
        format!("{}_{}.json", BACKUP_PREFIX, at.format("%Y%m%d_%H%M%S"))
    }

    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf, ComboError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(Self::file_name(Local::now()));
        self.write_to_file(&path)?;
        Ok(path)
    }

    pub fn write_to_file(&self, path: &Path) -> Result<(), ComboError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!("[Store] Exported {} tables to {}", self.schemas.len(), path.display());
        Ok(())
    }

    pub fn read_from_file(path: &Path) -> Result<Self, ComboError> {
        let json = fs::read_to_string(path)?;
        let bundle: ExportBundle = serde_json::from_str(&json)?;
        Ok(bundle)
    }

    pub fn validate(&self) -> Result<(), ComboError> {
        let mut names = std::collections::HashSet::new();
        for schema in &self.schemas {
            schema.validate()?;
            if !names.insert(schema.table_name.as_str()) {
                return Err(ComboError::DuplicateTable(schema.table_name.clone()));
            }
        }
        Ok(())
    }
}
