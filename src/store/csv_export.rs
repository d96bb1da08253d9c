use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
    sync::OnceLock,
};

use csv::{
    Terminator,
    WriterBuilder,
};
use regex::Regex;
use serde_json::Value;
use tracing::info;

use super::{
    manager::StoreManager,
    schema::{
        Record,
        TableSchema,
    },
};
use crate::core::ComboError;

const BOM: &str = "\u{feff}";

fn line_break_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<br\s*/?>").unwrap())
}

fn any_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").unwrap())
}

/// Strips markup from a cell and decodes the common entities.
pub fn plain_text(html: &str) -> String {
    let text = line_break_tag().replace_all(html, "\n");
    let text = any_tag().replace_all(&text, "");
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => plain_text(s),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

/// One table as CSV: BOM, header of column display names, CRLF rows.
pub fn table_to_csv(schema: &TableSchema, records: &[Record]) -> Result<String, ComboError> {
    let mut writer =
        WriterBuilder::new().terminator(Terminator::CRLF).from_writer(BOM.as_bytes().to_vec());

    writer.write_record(schema.columns.iter().map(|column| column.name.as_str()))?;
    for record in records {
        writer.write_record(schema.columns.iter().map(|column| cell_text(record.get(&column.id))))?;
    }

    let bytes = writer.into_inner().map_err(|e| ComboError::from(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| ComboError::Custom(e.to_string()))
}

fn file_stem(table: &str) -> String {
    let stem: String = table
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "table".to_string()
    } else {
        stem
    }
}

pub fn write_table_csv(
    dir: &Path,
    schema: &TableSchema,
    records: &[Record],
) -> Result<PathBuf, ComboError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.csv", file_stem(&schema.table_name)));
    fs::write(&path, table_to_csv(schema, records)?)?;
    Ok(path)
}

impl StoreManager {
    /// Writes one CSV file per table into `dir`.
    pub fn export_csv_to_dir(&mut self, dir: &Path) -> Result<Vec<PathBuf>, ComboError> {
        let mut written = Vec::new();
        for schema in self.get_all_schemas()? {
            let records = self.get_all_records(&schema.table_name)?;
            written.push(write_table_csv(dir, &schema, &records)?);
        }
        info!("[Store] Exported {} tables as CSV to {}", written.len(), dir.display());
        Ok(written)
    }
}
