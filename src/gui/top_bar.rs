use eframe::egui::{
    self,
    containers,
};

use crate::{
    gui::theme::Theme,
    store::TableSchema,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopBarAction {
    SelectTable(String),
    NewTable,
    EditTable,
    DeleteTable,
    RenumberTable,
    ExportBundle,
    ImportBundle,
    ExportCsv,
    OpenSettings,
    ToggleMemo,
    LaunchPlayer,
}

pub struct TopBar;

impl TopBar {
    pub fn show(
        ctx: &egui::Context,
        theme: &Theme,
        schemas: &[TableSchema],
        active_table: &str,
        player_connected: bool,
        memo_open: bool,
    ) -> Option<TopBarAction> {
        let mut action = None;

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            containers::menu::Bar::new().ui(ui, |ui| {
                egui::widgets::global_theme_preference_switch(ui);

                ui.menu_button("File", |ui| {
                    if ui.button("Export backup (JSON)…").clicked() {
                        action = Some(TopBarAction::ExportBundle);
                    }
                    if ui.button("Import backup (JSON)…").clicked() {
                        action = Some(TopBarAction::ImportBundle);
                    }
                    if ui.button("Export tables (CSV)…").clicked() {
                        action = Some(TopBarAction::ExportCsv);
                    }
                    ui.separator();
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });

                ui.menu_button("Table", |ui| {
                    for schema in schemas {
                        let selected = schema.table_name == active_table;
                        let label = format!("{} ({})", schema.table_name, schema.record_count);
                        if ui.selectable_label(selected, label).clicked() {
                            action = Some(TopBarAction::SelectTable(schema.table_name.clone()));
                        }
                    }
                    ui.separator();
                    if ui.button("New table…").clicked() {
                        action = Some(TopBarAction::NewTable);
                    }
                    if ui.button("Edit columns…").clicked() {
                        action = Some(TopBarAction::EditTable);
                    }
                    if ui.button("Renumber rows").clicked() {
                        action = Some(TopBarAction::RenumberTable);
                    }
                    if ui.button("Delete table…").clicked() {
                        action = Some(TopBarAction::DeleteTable);
                    }
                });

                ui.menu_button("Settings", |ui| {
                    if ui.button("Actions & recorder…").clicked() {
                        action = Some(TopBarAction::OpenSettings);
                    }
                });

                if ui.selectable_label(memo_open, "Video memo").clicked() {
                    action = Some(TopBarAction::ToggleMemo);
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if Self::show_player_status(ui, theme, player_connected) {
                        action = Some(TopBarAction::LaunchPlayer);
                    }
                    ui.label(theme.heading(ui.ctx(), active_table));
                });
            });
        });

        action
    }

    /// Returns true when the user asks to start the player.
    fn show_player_status(ui: &mut egui::Ui, theme: &Theme, connected: bool) -> bool {
        let (color, tooltip) = if connected {
            (theme.green(ui.ctx()), "Connected to mpv")
        } else {
            (theme.red(ui.ctx()), "mpv not running. Click to start it.")
        };

        ui.horizontal(|ui| {
            ui.spacing_mut().item_spacing.x = 2.0;
            let dot = ui.add(
                egui::Label::new(egui::RichText::new("●").color(color).small())
                    .sense(egui::Sense::click()),
            );
            ui.small("mpv").on_hover_text(tooltip);
            !connected && dot.on_hover_text(tooltip).clicked()
        })
        .inner
    }
}
