use std::collections::BTreeSet;

use eframe::egui;
use egui_extras::{
    Column,
    TableBuilder,
};
use serde_json::Value;

use super::theme::Theme;
use crate::store::{
    plain_text,
    schema::record_id,
    Record,
    TableSchema,
    TransferMode,
};

#[derive(Debug, Clone, PartialEq)]
pub enum RecordsAction {
    Edit(u64),
    Delete(Vec<u64>),
    Transfer { ids: Vec<u64>, destination: String, mode: TransferMode },
}

fn display(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => plain_text(s),
        Some(other) => other.to_string(),
    }
}

fn matches_filter(schema: &TableSchema, record: &Record, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    schema
        .columns
        .iter()
        .any(|column| display(record.get(&column.id)).to_lowercase().contains(needle))
}

#[derive(Default)]
pub struct RecordsTable {
    selected: BTreeSet<u64>,
    filter: String,
    destination: Option<String>,
}

impl RecordsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget selections after the table changes under us.
    pub fn reset(&mut self) {
        self.selected.clear();
        self.destination = None;
    }

    pub fn show(
        &mut self,
        ctx: &egui::Context,
        theme: &Theme,
        schema: &TableSchema,
        records: &[Record],
        other_tables: &[String],
    ) -> Option<RecordsAction> {
        let mut action = None;
        self.selected.retain(|id| records.iter().any(|r| record_id(r) == Some(*id)));
        if self.destination.as_ref().is_some_and(|d| !other_tables.contains(d)) {
            self.destination = None;
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(theme.heading(ctx, &schema.table_name));
                let count = format!("{} rows", records.len());
                ui.label(egui::RichText::new(count).color(theme.comment(ctx)));
                ui.separator();
                ui.add(
                    egui::TextEdit::singleline(&mut self.filter)
                        .hint_text("Filter…")
                        .desired_width(180.0),
                );
            });

            ui.horizontal(|ui| {
                let ids: Vec<u64> = self.selected.iter().copied().collect();
                let has_selection = !ids.is_empty();

                egui::ComboBox::from_id_salt("transfer_destination")
                    .selected_text(self.destination.as_deref().unwrap_or("Destination table"))
                    .show_ui(ui, |ui| {
                        for table in other_tables {
                            ui.selectable_value(&mut self.destination, Some(table.clone()), table);
                        }
                    });

                let can_transfer = has_selection && self.destination.is_some();
                for (label, mode) in [("Move", TransferMode::Move), ("Copy", TransferMode::Copy)] {
                    if ui.add_enabled(can_transfer, egui::Button::new(label)).clicked() {
                        if let Some(destination) = self.destination.clone() {
                            action = Some(RecordsAction::Transfer {
                                ids: ids.clone(),
                                destination,
                                mode,
                            });
                        }
                    }
                }

                if ui.add_enabled(has_selection, egui::Button::new("Delete selected")).clicked() {
                    action = Some(RecordsAction::Delete(ids.clone()));
                }
                if has_selection {
                    ui.label(format!("{} selected", ids.len()));
                }
            });
            ui.separator();

            let needle = self.filter.trim().to_lowercase();
            let visible: Vec<&Record> =
                records.iter().filter(|r| matches_filter(schema, r, &needle)).collect();

            let text_height = egui::TextStyle::Body
                .resolve(ui.style())
                .size
                .max(ui.spacing().interact_size.y);

            let mut table = TableBuilder::new(ui)
                .striped(true)
                .resizable(true)
                .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
                .column(Column::exact(24.0));
            for column in &schema.columns {
                table = if column.id == schema.combo_column_id {
                    table.column(Column::initial(320.0).at_least(120.0).clip(true))
                } else {
                    table.column(Column::initial(90.0).at_least(40.0).clip(true))
                };
            }

            table
                .column(Column::remainder().at_least(60.0))
                .header(24.0, |mut header| {
                    header.col(|ui| {
                        let all = !visible.is_empty()
                            && visible.iter().all(|r| {
                                record_id(r).is_some_and(|id| self.selected.contains(&id))
                            });
                        let mut checked = all;
                        if ui.checkbox(&mut checked, "").changed() {
                            for id in visible.iter().filter_map(|r| record_id(r)) {
                                if checked {
                                    self.selected.insert(id);
                                } else {
                                    self.selected.remove(&id);
                                }
                            }
                        }
                    });
                    for column in &schema.columns {
                        header.col(|ui| {
                            ui.strong(&column.name);
                        });
                    }
                    header.col(|_| {});
                })
                .body(|body| {
                    body.rows(text_height, visible.len(), |mut row| {
                        let record = visible[row.index()];
                        let Some(id) = record_id(record) else {
                            return;
                        };

                        row.col(|ui| {
                            let mut checked = self.selected.contains(&id);
                            if ui.checkbox(&mut checked, "").changed() {
                                if checked {
                                    self.selected.insert(id);
                                } else {
                                    self.selected.remove(&id);
                                }
                            }
                        });
                        for column in &schema.columns {
                            row.col(|ui| {
                                let text = display(record.get(&column.id));
                                ui.label(text.replace('\n', " ")).on_hover_text(text);
                            });
                        }
                        row.col(|ui| {
                            if ui.small_button("✏").on_hover_text("Edit in editor").clicked() {
                                action = Some(RecordsAction::Edit(id));
                            }
                            if ui.small_button("🗑").on_hover_text("Delete row").clicked() {
                                action = Some(RecordsAction::Delete(vec![id]));
                            }
                        });
                    });
                });
        });

        action
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_filter_matches_plain_text() {
        let schema = TableSchema::default_table();
        let record = json!({"id": 1, "combo": "<b>5P</b> > 2K", "character": "Sol"})
            .as_object()
            .cloned()
            .unwrap();

        assert!(matches_filter(&schema, &record, ""));
        assert!(matches_filter(&schema, &record, "sol"));
        assert!(matches_filter(&schema, &record, "5p > 2k"));
        assert!(!matches_filter(&schema, &record, "<b>"));
    }
}
