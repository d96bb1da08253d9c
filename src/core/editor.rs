use chrono::Local;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;

use super::{
    models::{
        ActionId,
        ActionTable,
        CommittedCommand,
        Rgb,
    },
    notation::match_action,
};
use crate::store::schema::{
    Record,
    TableSchema,
    CREATED_FORMAT,
};

pub const DEFAULT_MERGE_SEPARATOR: &str = " > ";
pub const DEFAULT_CELL_COUNT: usize = 6;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub text: String,
    pub color: Option<Rgb>,
    pub action: Option<ActionId>,
}

impl Cell {
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Re-resolves the action and color. A known action id wins; otherwise the
    /// text is matched against the action outputs.
    fn resolve(&mut self, actions: &ActionTable) {
        let by_id = self.action.and_then(|id| actions.get(id));
        let action = by_id.or_else(|| match_action(&self.text, actions));

        self.action = action.map(|a| a.id);
        self.color = action.map(|a| a.color);
    }
}

/// The row being composed: one cell per move.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorGrid {
    cells: Vec<Cell>,
    separator: String,
}

impl Default for EditorGrid {
    fn default() -> Self {
        Self::new(DEFAULT_MERGE_SEPARATOR)
    }
}

impl EditorGrid {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            cells: vec![Cell::default(); DEFAULT_CELL_COUNT],
            separator: separator.into(),
        }
    }

    /// Splits merged combo text back into cells.
    pub fn from_text(text: &str, separator: &str, actions: &ActionTable) -> Self {
        let mut grid = Self { cells: Vec::new(), separator: separator.to_string() };
        let parts = if separator.trim().is_empty() {
            text.split_whitespace().map(str::to_string).collect::<Vec<_>>()
        } else {
            text.split(separator)
                .map(|part| part.trim().to_string())
                .filter(|part| !part.is_empty())
                .collect()
        };

        for part in parts {
            let mut cell = Cell { text: part, ..Default::default() };
            cell.resolve(actions);
            grid.cells.push(cell);
        }
        if grid.cells.len() < DEFAULT_CELL_COUNT {
            grid.cells.resize(DEFAULT_CELL_COUNT, Cell::default());
        }
        grid
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Cell::is_blank)
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn set_separator(&mut self, separator: impl Into<String>) {
        self.separator = separator.into();
    }

    fn ensure_len(&mut self, len: usize) {
        if self.cells.len() < len {
            self.cells.resize(len, Cell::default());
        }
    }

    pub fn insert_cell(&mut self, index: usize) {
        let index = index.min(self.cells.len());
        self.cells.insert(index, Cell::default());
    }

    pub fn remove_cell(&mut self, index: usize) -> Option<Cell> {
        if index < self.cells.len() {
            Some(self.cells.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.cells = vec![Cell::default(); DEFAULT_CELL_COUNT];
    }

    /// Hand edit of a single cell.
    pub fn set_text(&mut self, index: usize, text: impl Into<String>, actions: &ActionTable) {
        self.ensure_len(index + 1);
        let cell = &mut self.cells[index];
        cell.text = text.into();
        cell.action = None;
        cell.resolve(actions);
    }

    /// Writes recorded commands into successive cells starting at `start`,
    /// growing the grid as needed. Returns the index after the last written cell.
    pub fn write_commands(
        &mut self,
        start: usize,
        commands: &[CommittedCommand],
        actions: &ActionTable,
    ) -> usize {
        self.ensure_len(start + commands.len());
        for (offset, command) in commands.iter().enumerate() {
            let cell = &mut self.cells[start + offset];
            cell.text = command.text.clone();
            cell.action = command.action;
            cell.resolve(actions);
        }
        start + commands.len()
    }

    /// Refreshes every cell after the action table changed.
    pub fn recolor(&mut self, actions: &ActionTable) {
        for cell in &mut self.cells {
            cell.resolve(actions);
        }
    }

    pub fn merged_text(&self) -> String {
        self.cells
            .iter()
            .map(|cell| cell.text.trim())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(&self.separator)
    }

    /// Text of the first non-empty cell.
    pub fn starter(&self) -> Option<&str> {
        self.cells.iter().map(|cell| cell.text.trim()).find(|text| !text.is_empty())
    }

    /// Builds the row to insert into `schema`'s table.
    pub fn to_record(&self, schema: &TableSchema) -> Record {
        let mut record = Record::new();
        record.insert(schema.combo_column_id.clone(), Value::from(self.merged_text()));

        if let Some(column) = &schema.starter_column_id {
            record.insert(column.clone(), Value::from(self.starter().unwrap_or_default()));
        }
        if let Some(column) = &schema.creation_date_column_id {
            let created = Local::now().format(CREATED_FORMAT).to_string();
            record.insert(column.clone(), Value::from(created));
        }

        record
    }
}
