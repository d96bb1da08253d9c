use std::{
    collections::HashSet,
    fmt,
};

use serde::{
    Deserialize,
    Serialize,
};
use uuid::Uuid;

use super::ComboError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(pub Uuid);

impl ActionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        Some(Self { r: channel(0..2)?, g: channel(2..4)?, b: channel(4..6)? })
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::new(0xcc, 0xcc, 0xcc)
    }
}

fn default_true() -> bool {
    true
}

/// One attack token and how the recorder treats it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(default)]
    pub id: ActionId,
    pub output: String,
    pub key: char,
    #[serde(default)]
    pub color: Rgb,
    /// Substitute the steady-state direction when nothing directional was recorded.
    #[serde(default = "default_true")]
    pub add_neutral_five: bool,
    /// System actions never trigger auto-commit.
    #[serde(default)]
    pub system: bool,
}

impl Action {
    pub fn new(output: impl Into<String>, key: char, color: Rgb) -> Self {
        Self {
            id: ActionId::new(),
            output: output.into(),
            key,
            color,
            add_neutral_five: true,
            system: false,
        }
    }

    pub fn without_neutral_five(mut self) -> Self {
        self.add_neutral_five = false;
        self
    }

    pub fn as_system(mut self) -> Self {
        self.system = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionTable {
    actions: Vec<Action>,
}

impl Default for ActionTable {
    fn default() -> Self {
        Self {
            actions: vec![
                Action::new("P", 'j', Rgb::new(0xff, 0x79, 0xc6)),
                Action::new("K", 'k', Rgb::new(0x8b, 0xe9, 0xfd)),
                Action::new("S", 'l', Rgb::new(0x50, 0xfa, 0x7b)),
                Action::new("HS", 'u', Rgb::new(0xff, 0x55, 0x55)),
                Action::new("D", 'i', Rgb::new(0xff, 0xb8, 0x6c)),
                Action::new("jc", 'o', Rgb::new(0x62, 0x72, 0xa4))
                    .without_neutral_five()
                    .as_system(),
            ],
        }
    }
}

impl ActionTable {
    pub fn new(actions: Vec<Action>) -> Result<Self, ComboError> {
        let table = Self { actions };
        table.validate()?;
        Ok(table)
    }

    pub fn empty() -> Self {
        Self { actions: Vec::new() }
    }

    pub fn validate(&self) -> Result<(), ComboError> {
        let mut outputs = HashSet::new();
        let mut keys = HashSet::new();

        for action in &self.actions {
            if action.output.trim().is_empty() {
                return Err(ComboError::Validation("Action output must not be empty".into()));
            }
            if !outputs.insert(action.output.as_str()) {
                return Err(ComboError::Validation(format!(
                    "Duplicate action output: {}",
                    action.output
                )));
            }
            if !keys.insert(action.key.to_ascii_lowercase()) {
                return Err(ComboError::Validation(format!(
                    "Key '{}' is bound to more than one action",
                    action.key
                )));
            }
        }

        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn get(&self, id: ActionId) -> Option<&Action> {
        self.actions.iter().find(|action| action.id == id)
    }

    pub fn by_key(&self, key: char) -> Option<&Action> {
        let key = key.to_ascii_lowercase();
        self.actions.iter().find(|action| action.key.to_ascii_lowercase() == key)
    }

    pub fn by_output(&self, output: &str) -> Option<&Action> {
        self.actions.iter().find(|action| action.output == output)
    }

    pub fn push(&mut self, action: Action) -> Result<(), ComboError> {
        self.actions.push(action);
        if let Err(e) = self.validate() {
            self.actions.pop();
            return Err(e);
        }
        Ok(())
    }

    pub fn remove(&mut self, id: ActionId) -> Option<Action> {
        let pos = self.actions.iter().position(|action| action.id == id)?;
        Some(self.actions.remove(pos))
    }

    pub fn replace_all(&mut self, actions: Vec<Action>) -> Result<(), ComboError> {
        let candidate = Self { actions };
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }

    pub fn as_slice(&self) -> &[Action] {
        &self.actions
    }
}

/// A finished piece of notation and the action that produced it, when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedCommand {
    pub text: String,
    pub action: Option<ActionId>,
}

impl CommittedCommand {
    pub fn new(text: impl Into<String>, action: Option<ActionId>) -> Self {
        Self { text: text.into(), action }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip_and_rejects_garbage() {
        let color = Rgb::new(0xff, 0x79, 0xc6);
        assert_eq!(color.to_hex(), "#ff79c6");
        assert_eq!(Rgb::from_hex("#ff79c6"), Some(color));
        assert_eq!(Rgb::from_hex("ff79"), None);
        assert_eq!(Rgb::from_hex("#gg0000"), None);
    }

    #[test]
    fn test_action_table_validation() {
        let dup_output = vec![
            Action::new("P", 'j', Rgb::default()),
            Action::new("P", 'k', Rgb::default()),
        ];
        assert!(matches!(ActionTable::new(dup_output), Err(ComboError::Validation(_))));

        let dup_key = vec![
            Action::new("P", 'j', Rgb::default()),
            Action::new("K", 'J', Rgb::default()),
        ];
        assert!(ActionTable::new(dup_key).is_err());

        let mut table = ActionTable::empty();
        table.push(Action::new("P", 'j', Rgb::default())).unwrap();
        assert!(table.push(Action::new(" ", 'k', Rgb::default())).is_err());
        assert_eq!(table.len(), 1);
        assert_eq!(table.by_key('J').map(|a| a.output.as_str()), Some("P"));
    }

    #[test]
    fn test_action_deserializes_with_defaults() {
        let action: Action = serde_json::from_str(r#"{"output":"K","key":"k"}"#).unwrap();
        assert!(action.add_neutral_five);
        assert!(!action.system);
        assert_eq!(action.color, Rgb::default());
    }
}
