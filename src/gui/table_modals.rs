use eframe::egui;

use super::modal::{
    dialog_buttons,
    Modal,
    ModalResult,
};
use crate::{
    core::ComboError,
    store::{
        Column,
        TableSchema,
        TransferMode,
    },
};

/// Editable copy of a table definition.
#[derive(Debug, Clone, Default)]
pub struct TableForm {
    pub original: Option<TableSchema>,
    pub name: String,
    pub columns: Vec<Column>,
    pub combo: Option<String>,
    pub starter: Option<String>,
    pub created: Option<String>,
    pub number: Option<String>,
    pub new_column: String,
    pub error: Option<String>,
}

fn slug(name: &str) -> String {
    let slug: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .trim_matches('_')
        .to_string();
    if slug.is_empty() {
        "column".to_string()
    } else {
        slug
    }
}

impl TableForm {
    /// A new table starts from the default column layout.
    pub fn blank() -> Self {
        let template = TableSchema::default_table();
        Self {
            name: String::new(),
            original: None,
            ..Self::from_schema(&template)
        }
    }

    pub fn from_schema(schema: &TableSchema) -> Self {
        Self {
            original: Some(schema.clone()),
            name: schema.table_name.clone(),
            columns: schema.columns.clone(),
            combo: Some(schema.combo_column_id.clone()),
            starter: schema.starter_column_id.clone(),
            created: schema.creation_date_column_id.clone(),
            number: schema.unique_number_column_id.clone(),
            new_column: String::new(),
            error: None,
        }
    }

    pub fn is_edit(&self) -> bool {
        self.original.is_some()
    }

    pub fn add_column(&mut self, name: &str) -> Result<(), ComboError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ComboError::Validation("Column name must not be empty".into()));
        }
        if self.columns.iter().any(|c| c.name == name) {
            return Err(ComboError::Validation(format!("Column '{}' already exists", name)));
        }

        let base = slug(name);
        let mut id = base.clone();
        let mut n = 2;
        while self.columns.iter().any(|c| c.id == id) {
            id = format!("{}_{}", base, n);
            n += 1;
        }
        self.columns.push(Column::new(id, name));
        Ok(())
    }

    pub fn remove_column(&mut self, index: usize) {
        if index >= self.columns.len() {
            return;
        }
        let removed = self.columns.remove(index);
        for reference in [&mut self.combo, &mut self.starter, &mut self.created, &mut self.number] {
            if reference.as_deref() == Some(removed.id.as_str()) {
                *reference = None;
            }
        }
    }

    pub fn to_schema(&self) -> Result<TableSchema, ComboError> {
        let combo = self
            .combo
            .clone()
            .ok_or_else(|| ComboError::Validation("Select the column that stores combos".into()))?;

        let mut schema = match &self.original {
            Some(original) => TableSchema {
                columns: self.columns.clone(),
                combo_column_id: combo,
                ..original.clone()
            },
            None => TableSchema::new(self.name.trim(), self.columns.clone(), combo),
        };
        schema.starter_column_id = self.starter.clone();
        schema.creation_date_column_id = self.created.clone();
        schema.unique_number_column_id = self.number.clone();
        schema.validate()?;
        Ok(schema)
    }
}

fn column_picker(
    ui: &mut egui::Ui,
    label: &str,
    columns: &[Column],
    value: &mut Option<String>,
    optional: bool,
) {
    ui.horizontal(|ui| {
        ui.label(label);
        let selected = value
            .as_ref()
            .and_then(|id| columns.iter().find(|c| &c.id == id))
            .map(|c| c.name.clone())
            .unwrap_or_else(|| "None".to_string());
        egui::ComboBox::from_id_salt(label).selected_text(selected).show_ui(ui, |ui| {
            if optional {
                ui.selectable_value(value, None, "None");
            }
            for column in columns {
                ui.selectable_value(value, Some(column.id.clone()), &column.name);
            }
        });
    });
}

pub struct TableFormModal {
    modal: Modal<TableForm>,
}

impl Default for TableFormModal {
    fn default() -> Self {
        Self::new()
    }
}

impl TableFormModal {
    pub fn new() -> Self {
        Self { modal: Modal::new("Table").with_width(480.0) }
    }

    pub fn open_new(&mut self) {
        self.modal.set_title("New table");
        self.modal.open_with(TableForm::blank());
    }

    pub fn open_edit(&mut self, schema: &TableSchema) {
        self.modal.set_title(format!("Edit columns of {}", schema.table_name));
        self.modal.open_with(TableForm::from_schema(schema));
    }

    /// Hands back a validated schema and whether it replaces an existing table.
    pub fn show(&mut self, ctx: &egui::Context) -> Option<(TableSchema, bool)> {
        let result = self.modal.show(ctx, |ui, form| {
            if !form.is_edit() {
                ui.horizontal(|ui| {
                    ui.label("Name");
                    ui.text_edit_singleline(&mut form.name);
                });
            }

            ui.separator();
            let mut remove = None;
            egui::ScrollArea::vertical().max_height(220.0).show(ui, |ui| {
                for (index, column) in form.columns.iter_mut().enumerate() {
                    ui.horizontal(|ui| {
                        ui.add(egui::TextEdit::singleline(&mut column.name).desired_width(220.0));
                        ui.small(&column.id);
                        if ui.small_button("✖").clicked() {
                            remove = Some(index);
                        }
                    });
                }
            });
            if let Some(index) = remove {
                form.remove_column(index);
            }

            ui.horizontal(|ui| {
                ui.add(egui::TextEdit::singleline(&mut form.new_column).hint_text("New column"));
                if ui.button("Add").clicked() {
                    let name = std::mem::take(&mut form.new_column);
                    form.error = form.add_column(&name).err().map(|e| e.to_string());
                }
            });

            ui.separator();
            let columns = form.columns.clone();
            column_picker(ui, "Combo column", &columns, &mut form.combo, false);
            column_picker(ui, "Starter column", &columns, &mut form.starter, true);
            column_picker(ui, "Created column", &columns, &mut form.created, true);
            column_picker(ui, "Number column", &columns, &mut form.number, true);

            if let Some(error) = &form.error {
                ui.colored_label(ui.visuals().error_fg_color, error);
            }

            let confirm = if form.is_edit() { "Save" } else { "Create" };
            match dialog_buttons(ui, confirm, "Cancel", true)? {
                true => match form.to_schema() {
                    Ok(_) => Some(ModalResult::Confirmed(form.clone())),
                    Err(e) => {
                        form.error = Some(e.to_string());
                        None
                    }
                },
                false => Some(ModalResult::Cancelled),
            }
        })?;

        match result {
            ModalResult::Confirmed(form) => {
                let is_edit = form.is_edit();
                form.to_schema().ok().map(|schema| (schema, is_edit))
            }
            ModalResult::Cancelled => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransferRequest {
    pub ids: Vec<u64>,
    pub source: String,
    pub destination: String,
    pub copy: bool,
    pub dropped: Vec<String>,
}

impl TransferRequest {
    pub fn mode(&self) -> TransferMode {
        if self.copy {
            TransferMode::Copy
        } else {
            TransferMode::Move
        }
    }
}

/// Warns which columns will be lost before rows go to a table lacking them.
pub struct TransferModal {
    modal: Modal<TransferRequest>,
}

impl Default for TransferModal {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferModal {
    pub fn new() -> Self {
        Self { modal: Modal::new("Columns will be dropped") }
    }

    pub fn ask(&mut self, request: TransferRequest) {
        self.modal.open_with(request);
    }

    pub fn show(&mut self, ctx: &egui::Context) -> Option<TransferRequest> {
        match self.modal.show(ctx, |ui, request| {
            ui.label(format!(
                "{} {} rows from '{}' to '{}'. These columns have no match in the \
                 destination and their values will be lost:",
                if request.copy { "Copying" } else { "Moving" },
                request.ids.len(),
                request.source,
                request.destination
            ));
            ui.add_space(4.0);
            for name in &request.dropped {
                ui.label(format!("• {}", name));
            }
            match dialog_buttons(ui, "Continue", "Cancel", true)? {
                true => Some(ModalResult::Confirmed(request.clone())),
                false => Some(ModalResult::Cancelled),
            }
        })? {
            ModalResult::Confirmed(request) => Some(request),
            ModalResult::Cancelled => None,
        }
    }
}
