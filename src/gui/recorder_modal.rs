use eframe::egui;

use super::{
    settings::SettingsData,
    theme::{
        blend_colors,
        Theme,
    },
};
use crate::recorder::{
    resolve_control,
    FinalizedCommands,
    InputEvent,
    InputId,
    Recorder,
    RecorderOutcome,
    SpecialKey,
};

pub fn input_for_key(key: egui::Key) -> Option<InputId> {
    match key {
        egui::Key::Enter => Some(InputId::Special(SpecialKey::Enter)),
        egui::Key::Space => Some(InputId::Special(SpecialKey::Space)),
        egui::Key::Backspace => Some(InputId::Special(SpecialKey::Backspace)),
        egui::Key::Escape => Some(InputId::Special(SpecialKey::Escape)),
        other => {
            let mut chars = other.name().chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_graphic() => Some(InputId::key(c)),
                _ => None,
            }
        }
    }
}

/// Takes this frame's key events out of egui so no widget reacts to them.
fn take_key_events(ctx: &egui::Context) -> Vec<InputEvent> {
    ctx.input_mut(|input| {
        let mut taken = Vec::new();
        input.events.retain(|event| match event {
            egui::Event::Key { key, pressed, repeat, .. } => {
                if !repeat {
                    if let Some(id) = input_for_key(*key) {
                        taken.push(InputEvent { input: id, pressed: *pressed });
                    }
                }
                false
            }
            egui::Event::Text(_) => false,
            _ => true,
        });
        taken
    })
}

pub fn keys_down(ctx: &egui::Context) -> Vec<InputId> {
    ctx.input(|input| input.keys_down.iter().filter_map(|key| input_for_key(*key)).collect())
}

#[derive(Default)]
pub struct RecorderModal {
    last_message: Option<String>,
}

impl RecorderModal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds keyboard and gamepad events to the recorder and draws its state.
    /// Returns the commands once the session is finalized.
    pub fn show(
        &mut self,
        ctx: &egui::Context,
        recorder: &mut Recorder,
        settings: &SettingsData,
        theme: &Theme,
        gamepad_events: Vec<InputEvent>,
    ) -> Option<FinalizedCommands> {
        if !recorder.is_recording() {
            return None;
        }

        let mut events = take_key_events(ctx);
        events.extend(gamepad_events);

        let mut finalized = None;
        for event in events {
            let control = resolve_control(
                &event.input,
                &settings.keyboard,
                &settings.actions,
                &settings.gamepad,
            );
            match recorder.handle(event, control, &settings.actions) {
                RecorderOutcome::Rejected(reason) => self.last_message = Some(reason),
                RecorderOutcome::Committed(_) | RecorderOutcome::Cleared => {
                    self.last_message = None;
                }
                RecorderOutcome::Undone(command) => {
                    self.last_message = Some(format!("Removed {}", command.text));
                }
                RecorderOutcome::Finalized(done) => {
                    finalized = Some(done);
                    break;
                }
                RecorderOutcome::Cancelled => break,
                _ => {}
            }
        }

        if !recorder.is_recording() {
            self.last_message = None;
            return finalized;
        }

        egui::Modal::new(egui::Id::new("recorder_modal")).show(ctx, |ui| {
            ui.set_width(460.0);
            ui.heading(format!("Recording into cell {}", recorder.target_cell() + 1));
            ui.add_space(6.0);

            let committed: Vec<&str> =
                recorder.committed().iter().map(|c| c.text.as_str()).collect();
            ui.label(if committed.is_empty() {
                egui::RichText::new("Nothing committed yet").color(theme.comment(ctx))
            } else {
                egui::RichText::new(committed.join(&settings.merge_separator)).size(18.0).strong()
            });

            ui.add_space(6.0);
            let buffer_color = if recorder.is_flashing_invalid() {
                blend_colors(ui.visuals().text_color(), theme.red(ctx), 0.8)
            } else {
                theme.cyan(ctx)
            };
            let buffer = recorder.buffer_text();
            ui.label(
                egui::RichText::new(if buffer.is_empty() { "…".to_string() } else { buffer })
                    .monospace()
                    .size(16.0)
                    .color(buffer_color),
            );

            if let Some(message) = &self.last_message {
                ui.colored_label(theme.red(ctx), message);
            }

            ui.add_space(10.0);
            let layout = &settings.keyboard;
            ui.small(format!(
                "Directions {}{}{}{} · {} crouch · {} forward · Space commit · \
                 Backspace undo · Enter finish · Esc cancel",
                layout.up, layout.left, layout.down, layout.right, layout.crouch, layout.forward
            ));
        });

        ctx.request_repaint();
        None
    }
}
