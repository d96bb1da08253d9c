use eframe::egui;

use super::theme::Theme;
use crate::core::EditorGrid;

#[derive(Debug, Clone, PartialEq)]
pub enum EditorAction {
    Record(usize),
    CellEdited(usize, String),
    InsertCell(usize),
    RemoveCell(usize),
    Save,
    Clear,
}

#[derive(Default)]
pub struct EditorPanel {
    pub selected: usize,
    /// Row being edited; saving updates it instead of adding a new one.
    pub editing_record: Option<u64>,
}

impl EditorPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(
        &mut self,
        ctx: &egui::Context,
        grid: &EditorGrid,
        theme: &Theme,
        active_table: &str,
    ) -> Option<EditorAction> {
        let mut action = None;
        self.selected = self.selected.min(grid.len().saturating_sub(1));

        egui::TopBottomPanel::bottom("editor_panel").resizable(false).show(ctx, |ui| {
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                let title = match self.editing_record {
                    Some(id) => format!("Editing row {}", id),
                    None => "New combo".to_string(),
                };
                ui.label(theme.heading(ctx, &title));
                let target = format!("→ {}", active_table);
                ui.label(egui::RichText::new(target).color(theme.comment(ctx)));
            });

            ui.horizontal_wrapped(|ui| {
                for (index, cell) in grid.cells().iter().enumerate() {
                    let selected = index == self.selected;
                    let stroke = if selected {
                        egui::Stroke::new(2.0, theme.cyan(ctx))
                    } else {
                        egui::Stroke::new(1.0, ui.visuals().widgets.noninteractive.bg_stroke.color)
                    };

                    egui::Frame::new()
                        .fill(theme.cell_fill(ctx, cell.color))
                        .stroke(stroke)
                        .corner_radius(4.0)
                        .inner_margin(4.0)
                        .show(ui, |ui| {
                            let mut text = cell.text.clone();
                            let response = ui.add(
                                egui::TextEdit::singleline(&mut text)
                                    .desired_width(96.0)
                                    .frame(false)
                                    .hint_text(format!("{}", index + 1)),
                            );
                            if response.gained_focus() || response.clicked() {
                                self.selected = index;
                            }
                            if response.changed() {
                                action = Some(EditorAction::CellEdited(index, text));
                            }
                            response.context_menu(|ui| {
                                if ui.button("Record here").clicked() {
                                    action = Some(EditorAction::Record(index));
                                }
                                if ui.button("Insert cell before").clicked() {
                                    action = Some(EditorAction::InsertCell(index));
                                }
                                if ui.button("Remove cell").clicked() {
                                    action = Some(EditorAction::RemoveCell(index));
                                }
                            });
                        });
                }

                if ui.button("+").on_hover_text("Add cell").clicked() {
                    action = Some(EditorAction::InsertCell(grid.len()));
                }
            });

            ui.add_space(4.0);
            ui.horizontal(|ui| {
                if ui
                    .button("⏺ Record")
                    .on_hover_text("Record inputs starting at the selected cell")
                    .clicked()
                {
                    action = Some(EditorAction::Record(self.selected));
                }

                let save_label =
                    if self.editing_record.is_some() { "Update row" } else { "Save row" };
                if ui.add_enabled(!grid.is_empty(), egui::Button::new(save_label)).clicked() {
                    action = Some(EditorAction::Save);
                }
                if ui.button("Clear").clicked() {
                    action = Some(EditorAction::Clear);
                }

                let merged = grid.merged_text();
                if !merged.is_empty() {
                    ui.label(egui::RichText::new(merged).color(theme.comment(ctx)));
                }
            });
            ui.add_space(6.0);
        });

        action
    }
}
