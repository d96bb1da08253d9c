use eframe::egui;
use uuid::Uuid;

use super::theme::Theme;
use crate::memo::{
    format_timestamp,
    parse_timestamp,
    parse_video_id,
    MemoBook,
};

#[derive(Debug, Clone, PartialEq)]
pub enum MemoAction {
    Open(String),
    Seek { video_id: String, seconds: f64 },
    TogglePause,
    Add { video_id: String, seconds: f64, text: String },
    Update { video_id: String, id: Uuid, text: String },
    Remove { video_id: String, id: Uuid },
}

#[derive(Default)]
pub struct MemoPanel {
    pub open: bool,
    video_input: String,
    video_id: Option<String>,
    timestamp_input: String,
    text_input: String,
    editing: Option<(Uuid, String)>,
    pub error: Option<String>,
}

impl MemoPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn video_id(&self) -> Option<&str> {
        self.video_id.as_deref()
    }

    /// Resolves the typed URL or id. Empty input clears the selection.
    fn select_video(&mut self) -> Option<MemoAction> {
        let input = self.video_input.trim();
        if input.is_empty() {
            self.video_id = None;
            return None;
        }
        match parse_video_id(input) {
            Some(id) => {
                self.error = None;
                self.video_input = id.clone();
                self.video_id = Some(id.clone());
                Some(MemoAction::Open(id))
            }
            None => {
                self.error = Some(format!("'{}' is not a YouTube URL or video id", input));
                None
            }
        }
    }

    /// Timestamp for a new note: the typed one, else the player position.
    fn new_note_time(&mut self, position: Option<f64>) -> Option<f64> {
        let typed = self.timestamp_input.trim();
        if typed.is_empty() {
            if position.is_none() {
                self.error = Some("Enter a timestamp or start the player".into());
            }
            return position;
        }
        let parsed = parse_timestamp(typed);
        if parsed.is_none() {
            self.error = Some(format!("Invalid timestamp '{}'", typed));
        }
        parsed
    }

    pub fn show(
        &mut self,
        ctx: &egui::Context,
        theme: &Theme,
        book: &MemoBook,
        position: Option<f64>,
        player_connected: bool,
    ) -> Option<MemoAction> {
        if !self.open {
            return None;
        }
        let mut action = None;

        egui::SidePanel::right("memo_panel").default_width(320.0).show(ctx, |ui| {
            ui.label(theme.heading(ctx, "Video memo"));
            ui.horizontal(|ui| {
                let response = ui.add(
                    egui::TextEdit::singleline(&mut self.video_input)
                        .hint_text("YouTube URL or id")
                        .desired_width(220.0),
                );
                let submitted =
                    response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                if submitted || ui.button("Open").clicked() {
                    action = self.select_video();
                }
            });

            let Some(video_id) = self.video_id.clone() else {
                let known: Vec<&str> = book.video_ids().collect();
                if !known.is_empty() {
                    ui.separator();
                    ui.weak("Videos with notes");
                    for id in known {
                        if ui.link(id).clicked() {
                            self.video_input = id.to_string();
                            action = self.select_video();
                        }
                    }
                }
                if let Some(error) = &self.error {
                    ui.colored_label(theme.red(ctx), error);
                }
                return;
            };

            ui.horizontal(|ui| {
                ui.monospace(&video_id);
                match position {
                    Some(seconds) => {
                        let stamp = format_timestamp(seconds);
                        ui.label(egui::RichText::new(stamp).color(theme.cyan(ctx)));
                    }
                    None => {
                        ui.weak("not playing");
                    }
                }
                if ui.add_enabled(player_connected, egui::Button::new("⏯")).clicked() {
                    action = Some(MemoAction::TogglePause);
                }
            });
            ui.separator();

            let current =
                position.and_then(|seconds| book.current(&video_id, seconds)).map(|e| e.id);
            egui::ScrollArea::vertical().max_height(ui.available_height() - 90.0).show(ui, |ui| {
                for entry in book.entries(&video_id) {
                    ui.horizontal(|ui| {
                        let stamp =
                            egui::RichText::new(format_timestamp(entry.seconds)).monospace();
                        let stamp = if current == Some(entry.id) { stamp.strong() } else { stamp };
                        if ui.add_enabled(player_connected, egui::Button::new(stamp)).clicked() {
                            action = Some(MemoAction::Seek {
                                video_id: video_id.clone(),
                                seconds: entry.seconds,
                            });
                        }

                        match &mut self.editing {
                            Some((id, text)) if *id == entry.id => {
                                let response = ui.text_edit_singleline(text);
                                if response.lost_focus() {
                                    action = Some(MemoAction::Update {
                                        video_id: video_id.clone(),
                                        id: *id,
                                        text: text.clone(),
                                    });
                                    self.editing = None;
                                }
                            }
                            _ => {
                                let label = if current == Some(entry.id) {
                                    egui::RichText::new(&entry.text).color(theme.cyan(ctx))
                                } else {
                                    egui::RichText::new(&entry.text)
                                };
                                let label = egui::Label::new(label).sense(egui::Sense::click());
                                if ui.add(label).double_clicked() {
                                    self.editing = Some((entry.id, entry.text.clone()));
                                }
                            }
                        }

                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            if ui.small_button("🗑").clicked() {
                                action = Some(MemoAction::Remove {
                                    video_id: video_id.clone(),
                                    id: entry.id,
                                });
                            }
                        });
                    });
                }
            });

            ui.separator();
            ui.horizontal(|ui| {
                ui.add(
                    egui::TextEdit::singleline(&mut self.timestamp_input)
                        .hint_text("m:ss")
                        .desired_width(56.0),
                );
                ui.add(
                    egui::TextEdit::singleline(&mut self.text_input)
                        .hint_text("Note")
                        .desired_width(180.0),
                );
                if ui.button("Add").clicked() {
                    if let Some(seconds) = self.new_note_time(position) {
                        action = Some(MemoAction::Add {
                            video_id: video_id.clone(),
                            seconds,
                            text: std::mem::take(&mut self.text_input),
                        });
                        self.timestamp_input.clear();
                        self.error = None;
                    }
                }
            });

            if let Some(error) = &self.error {
                ui.colored_label(theme.red(ctx), error);
            }
        });

        action
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_video_normalizes_url() {
        let mut panel = MemoPanel::new();
        panel.video_input = "https://youtu.be/dQw4w9WgXcQ?t=42".into();

        assert_eq!(panel.select_video(), Some(MemoAction::Open("dQw4w9WgXcQ".into())));
        assert_eq!(panel.video_id(), Some("dQw4w9WgXcQ"));
        assert_eq!(panel.video_input, "dQw4w9WgXcQ");

        panel.video_input = "not a video".into();
        assert_eq!(panel.select_video(), None);
        assert!(panel.error.is_some());
        assert_eq!(panel.video_id(), Some("dQw4w9WgXcQ"));
    }

    #[test]
    fn test_typed_timestamp_beats_player_position() {
        let mut panel = MemoPanel::new();
        assert_eq!(panel.new_note_time(Some(12.5)), Some(12.5));

        panel.timestamp_input = "1:05".into();
        assert_eq!(panel.new_note_time(Some(12.5)), Some(65.0));

        panel.timestamp_input = "1:75".into();
        assert_eq!(panel.new_note_time(Some(12.5)), None);

        panel.timestamp_input.clear();
        assert_eq!(panel.new_note_time(None), None);
        assert!(panel.error.is_some());
    }
}
