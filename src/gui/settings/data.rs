use std::path::Path;

use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;
use tracing::warn;

use crate::{
    core::{
        editor::DEFAULT_MERGE_SEPARATOR,
        models::ActionTable,
        ComboError,
    },
    mpv::types::default_mpv_endpoint,
    persistence::{
        load_json_or_default_in,
        save_json_in,
    },
    recorder::{
        GamepadMapping,
        KeyboardLayout,
        RecorderOptions,
    },
};

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SettingsData {
    pub actions: ActionTable,
    pub recorder: RecorderOptions,
    pub keyboard: KeyboardLayout,
    pub gamepad: GamepadMapping,
    pub merge_separator: String,
    pub dark_mode: bool,
    pub last_table: Option<String>,
    pub mpv_endpoint: String,
}

impl Default for SettingsData {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsData {
    pub fn new() -> Self {
        Self {
            actions: ActionTable::default(),
            recorder: RecorderOptions::default(),
            keyboard: KeyboardLayout::default(),
            gamepad: GamepadMapping::default(),
            merge_separator: DEFAULT_MERGE_SEPARATOR.to_string(),
            dark_mode: true,
            last_table: None,
            mpv_endpoint: default_mpv_endpoint().to_string(),
        }
    }

    pub fn load_from(dir: &Path) -> Self {
        let mut settings: Self = load_json_or_default_in(dir, SETTINGS_FILE);
        settings.sanitize();
        settings
    }

    pub fn save_to(&self, dir: &Path) -> Result<(), ComboError> {
        save_json_in(dir, self, SETTINGS_FILE)
    }

    /// Repairs hand-edited or stale files: a broken action table falls back to
    /// the defaults and gamepad bindings to removed actions are dropped.
    pub fn sanitize(&mut self) {
        if let Err(e) = self.actions.validate() {
            warn!("Invalid action table in settings ({}), restoring defaults", e);
            self.actions = ActionTable::default();
        }
        self.gamepad.prune(&self.actions);
        if self.merge_separator.is_empty() {
            self.merge_separator = DEFAULT_MERGE_SEPARATOR.to_string();
        }
    }

    /// Action outputs whose key is shadowed by a direction or modifier key.
    pub fn shadowed_actions(&self) -> Vec<String> {
        let reserved = self.keyboard.reserved_keys().map(|k| k.to_ascii_lowercase());
        self.actions
            .iter()
            .filter(|action| reserved.contains(&action.key.to_ascii_lowercase()))
            .map(|action| action.output.clone())
            .collect()
    }

    /// Settings snapshot stored inside export bundles.
    pub fn to_snapshot(&self) -> Result<Value, ComboError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_snapshot(value: Value) -> Result<Self, ComboError> {
        let mut settings: Self = serde_json::from_value(value)?;
        settings.actions.validate()?;
        settings.sanitize();
        Ok(settings)
    }
}
