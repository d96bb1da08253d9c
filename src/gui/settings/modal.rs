use eframe::egui;

use super::data::SettingsData;
use crate::{
    core::{
        models::{
            Action,
            ActionTable,
            Rgb,
        },
        notation::{
            Dir,
            PrefixModifier,
        },
        ComboError,
    },
    gui::{
        modal::{
            dialog_buttons,
            Modal,
            ModalResult,
        },
        theme::{
            from_color32,
            to_color32,
        },
    },
    recorder::{
        Control,
        InputEvent,
    },
};

/// Working copy of the settings while the dialog is open.
#[derive(Debug, Clone, Default)]
pub struct SettingsDraft {
    pub settings: SettingsData,
    pub actions: Vec<Action>,
    /// Control waiting for the next gamepad press.
    pub listening: Option<Control>,
    pub error: Option<String>,
}

impl SettingsDraft {
    pub fn from_settings(settings: &SettingsData) -> Self {
        Self {
            settings: settings.clone(),
            actions: settings.actions.as_slice().to_vec(),
            listening: None,
            error: None,
        }
    }

    /// Binds the listening control to the first gamepad press in `events`.
    pub fn capture(&mut self, events: &[InputEvent]) -> bool {
        let Some(control) = self.listening else {
            return false;
        };
        match events.iter().find(|event| event.pressed && event.input.is_gamepad()) {
            Some(event) => {
                self.settings.gamepad.assign(control, event.input);
                self.listening = None;
                true
            }
            None => false,
        }
    }

    pub fn apply(&self) -> Result<SettingsData, ComboError> {
        let mut settings = self.settings.clone();
        settings.actions = ActionTable::new(self.actions.clone())?;
        settings.sanitize();
        Ok(settings)
    }

    fn controls(&self) -> Vec<(Control, String)> {
        let mut controls: Vec<(Control, String)> = [Dir::Up, Dir::Down, Dir::Left, Dir::Right]
            .into_iter()
            .map(|dir| (Control::Direction(dir), dir.label().to_string()))
            .collect();
        controls.push((Control::Modifier(PrefixModifier::Crouch), "Crouch".into()));
        controls.push((Control::Modifier(PrefixModifier::Forward), "Forward".into()));
        controls.extend(self.actions.iter().map(|a| (Control::Attack(a.id), a.output.clone())));
        controls.extend([
            (Control::Commit, "Commit".to_string()),
            (Control::Reset, "Undo".to_string()),
            (Control::Finalize, "Finish".to_string()),
            (Control::Cancel, "Cancel".to_string()),
        ]);
        controls
    }
}

fn key_field(ui: &mut egui::Ui, key: &mut char) {
    let mut text = key.to_string();
    let response = ui.add(egui::TextEdit::singleline(&mut text).char_limit(1).desired_width(18.0));
    if response.changed() {
        if let Some(c) = text.chars().next().filter(|c| c.is_ascii_graphic()) {
            *key = c.to_ascii_lowercase();
        }
    }
}

fn actions_section(ui: &mut egui::Ui, draft: &mut SettingsDraft) {
    let mut remove = None;
    egui::Grid::new("actions_grid").striped(true).num_columns(6).show(ui, |ui| {
        ui.strong("Output");
        ui.strong("Key");
        ui.strong("Color");
        ui.strong("Neutral 5");
        ui.strong("System");
        ui.end_row();

        for (index, action) in draft.actions.iter_mut().enumerate() {
            ui.add(egui::TextEdit::singleline(&mut action.output).desired_width(60.0));
            key_field(ui, &mut action.key);

            let mut color = to_color32(action.color);
            if ui.color_edit_button_srgba(&mut color).changed() {
                action.color = from_color32(color);
            }
            ui.checkbox(&mut action.add_neutral_five, "")
                .on_hover_text("Prefix the steady direction when none was recorded");
            ui.checkbox(&mut action.system, "").on_hover_text("Never auto-commits");
            if ui.small_button("✖").clicked() {
                remove = Some(index);
            }
            ui.end_row();
        }
    });

    if let Some(index) = remove {
        draft.actions.remove(index);
    }
    if ui.button("Add action").clicked() {
        draft.actions.push(Action::new("", ' ', Rgb::default()));
    }
}

fn recorder_section(ui: &mut egui::Ui, draft: &mut SettingsDraft) {
    let options = &mut draft.settings.recorder;
    ui.checkbox(&mut options.auto_commit_on_attack, "Commit automatically after an attack");
    ui.checkbox(&mut options.enable_prefixes, "Crouch/forward prefixes");
    ui.horizontal(|ui| {
        ui.label("Hold after");
        ui.add(egui::DragValue::new(&mut options.hold_frames).range(0..=600).suffix(" frames"));
        ui.label("suffix");
        ui.add(egui::TextEdit::singleline(&mut options.hold_suffix).desired_width(80.0));
    });
    ui.horizontal(|ui| {
        ui.label("Merge separator");
        ui.add(egui::TextEdit::singleline(&mut draft.settings.merge_separator).desired_width(60.0));
    });
}

fn keyboard_section(ui: &mut egui::Ui, draft: &mut SettingsDraft) {
    let layout = &mut draft.settings.keyboard;
    ui.horizontal(|ui| {
        for (label, key) in [
            ("Up", &mut layout.up),
            ("Down", &mut layout.down),
            ("Left", &mut layout.left),
            ("Right", &mut layout.right),
            ("Crouch", &mut layout.crouch),
            ("Forward", &mut layout.forward),
        ] {
            ui.label(label);
            key_field(ui, key);
        }
    });

    let shadowed = draft.settings.shadowed_actions();
    if !shadowed.is_empty() {
        ui.colored_label(
            ui.visuals().warn_fg_color,
            format!(
                "These actions share a key with a direction or modifier: {}",
                shadowed.join(", ")
            ),
        );
    }
}

fn gamepad_section(ui: &mut egui::Ui, draft: &mut SettingsDraft) {
    egui::Grid::new("gamepad_grid").striped(true).num_columns(3).show(ui, |ui| {
        for (control, label) in draft.controls() {
            ui.label(label);
            if draft.listening == Some(control) {
                ui.label("Press a button…");
            } else {
                match draft.settings.gamepad.input_for(control) {
                    Some(input) => ui.monospace(input.to_string()),
                    None => ui.weak("unassigned"),
                };
            }
            ui.horizontal(|ui| {
                if ui.small_button("Assign").clicked() {
                    draft.listening = Some(control);
                }
                if ui.small_button("Clear").clicked() {
                    draft.settings.gamepad.unassign(control);
                }
            });
            ui.end_row();
        }
    });
}

pub struct SettingsModal {
    modal: Modal<SettingsDraft>,
}

impl Default for SettingsModal {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsModal {
    pub fn new() -> Self {
        Self { modal: Modal::new("Settings").with_width(560.0) }
    }

    pub fn open(&mut self, settings: &SettingsData) {
        self.modal.open_with(SettingsDraft::from_settings(settings));
    }

    pub fn is_open(&self) -> bool {
        self.modal.is_open()
    }

    pub fn show(
        &mut self,
        ctx: &egui::Context,
        gamepad_events: &[InputEvent],
    ) -> Option<SettingsData> {
        if self.modal.data.capture(gamepad_events) {
            ctx.request_repaint();
        }

        match self.modal.show(ctx, |ui, draft| {
            egui::ScrollArea::vertical().max_height(480.0).show(ui, |ui| {
                egui::CollapsingHeader::new("Actions").default_open(true).show(ui, |ui| {
                    actions_section(ui, draft);
                });
                egui::CollapsingHeader::new("Recorder").default_open(true).show(ui, |ui| {
                    recorder_section(ui, draft);
                });
                egui::CollapsingHeader::new("Keyboard").show(ui, |ui| {
                    keyboard_section(ui, draft);
                });
                egui::CollapsingHeader::new("Gamepad").show(ui, |ui| {
                    gamepad_section(ui, draft);
                });
            });

            if let Some(error) = &draft.error {
                ui.colored_label(ui.visuals().error_fg_color, error);
            }

            match dialog_buttons(ui, "Save", "Cancel", true)? {
                true => match draft.apply() {
                    Ok(_) => Some(ModalResult::Confirmed(draft.clone())),
                    Err(e) => {
                        draft.error = Some(e.to_string());
                        None
                    }
                },
                false => Some(ModalResult::Cancelled),
            }
        })? {
            ModalResult::Confirmed(draft) => draft.apply().ok(),
            ModalResult::Cancelled => None,
        }
    }
}
