use eframe::egui;
use tracing::error;

use crate::core::ComboError;

#[derive(Default, Clone)]
struct ErrorData {
    title: String,
    message: String,
    details: Option<String>,
}

/// Blocking alert for failed store, file and player operations. Errors that
/// arrive while one is showing are queued.
#[derive(Default)]
pub struct ErrorModal {
    queue: Vec<ErrorData>,
}

impl ErrorModal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show_error(&mut self, title: impl Into<String>, message: impl Into<String>) {
        self.queue.push(ErrorData { title: title.into(), message: message.into(), details: None });
    }

    pub fn report(&mut self, title: &str, err: &ComboError) {
        error!("{}: {}", title, err);
        let details = match err {
            ComboError::Io(e) => Some(format!("{:?}", e)),
            ComboError::Json(e) => Some(format!("line {}, column {}", e.line(), e.column())),
            _ => None,
        };
        self.queue.push(ErrorData { title: title.to_string(), message: err.to_string(), details });
    }

    pub fn is_open(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn show(&mut self, ctx: &egui::Context) {
        let Some(data) = self.queue.first() else {
            return;
        };

        let modal = egui::Modal::new(egui::Id::new("error_modal")).show(ctx, |ui| {
            ui.set_width(450.0);

            ui.horizontal(|ui| {
                ui.label(egui::RichText::new("⚠").size(24.0).color(ui.visuals().error_fg_color));
                ui.label(egui::RichText::new(&data.title).size(18.0).strong());
            });

            ui.add_space(10.0);
            ui.label(egui::RichText::new(&data.message).size(14.0));

            if let Some(details) = &data.details {
                ui.add_space(10.0);
                ui.collapsing("Technical Details", |ui| {
                    ui.add(
                        egui::TextEdit::multiline(&mut details.as_str())
                            .desired_width(f32::INFINITY)
                            .desired_rows(4)
                            .code_editor(),
                    );
                });
            }

            ui.add_space(15.0);
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("OK").clicked() {
                    ui.close();
                }
            });
        });

        if modal.should_close() {
            self.queue.remove(0);
        }
    }
}
