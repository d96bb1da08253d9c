use std::time::{
    Duration,
    Instant,
};

use eframe::egui;

use crate::gui::theme::Theme;

const MESSAGE_TTL: Duration = Duration::from_secs(4);

/// Short-lived status line shown in the bottom-right corner.
#[derive(Default)]
pub struct MessageOverlay {
    message: Option<(String, Instant)>,
}

impl MessageOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some((message.into(), Instant::now()));
    }

    pub fn clear_message(&mut self) {
        self.message = None;
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_ref().map(|(text, _)| text.as_str())
    }

    pub fn show(&mut self, ctx: &egui::Context, theme: &Theme) {
        let Some((text, since)) = &self.message else {
            return;
        };
        let elapsed = since.elapsed();
        if elapsed >= MESSAGE_TTL {
            self.message = None;
            return;
        }

        egui::Area::new(egui::Id::new("message_overlay"))
            .order(egui::Order::Foreground)
            .anchor(egui::Align2::RIGHT_BOTTOM, egui::vec2(-12.0, -12.0))
            .interactable(false)
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style())
                    .stroke(egui::Stroke::new(1.0, theme.green(ctx)))
                    .show(ui, |ui| {
                        ui.label(text.as_str());
                    });
            });

        ctx.request_repaint_after(MESSAGE_TTL - elapsed);
    }
}
