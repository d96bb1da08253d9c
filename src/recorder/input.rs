use std::{
    collections::{
        BTreeMap,
        BTreeSet,
    },
    fmt,
    str::FromStr,
};

use serde::{
    Deserialize,
    Serialize,
};

use crate::core::{
    models::{
        ActionId,
        ActionTable,
    },
    notation::{
        Dir,
        PrefixModifier,
    },
    ComboError,
};

pub const AXIS_DEADZONE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpecialKey {
    Enter,
    Space,
    Backspace,
    Escape,
}

impl SpecialKey {
    fn name(self) -> &'static str {
        match self {
            SpecialKey::Enter => "enter",
            SpecialKey::Space => "space",
            SpecialKey::Backspace => "backspace",
            SpecialKey::Escape => "escape",
        }
    }
}

/// A physical control: a keyboard key, a gamepad button or one half of an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum InputId {
    Key(char),
    Special(SpecialKey),
    Button(u8),
    Axis { axis: u8, positive: bool },
}

impl InputId {
    pub fn key(c: char) -> Self {
        InputId::Key(c.to_ascii_lowercase())
    }

    pub fn is_gamepad(&self) -> bool {
        matches!(self, InputId::Button(_) | InputId::Axis { .. })
    }
}

impl fmt::Display for InputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputId::Key(c) => write!(f, "key:{}", c),
            InputId::Special(key) => write!(f, "key:{}", key.name()),
            InputId::Button(b) => write!(f, "button:{}", b),
            InputId::Axis { axis, positive } => {
                write!(f, "axis:{}{}", axis, if *positive { '+' } else { '-' })
            }
        }
    }
}

impl FromStr for InputId {
    type Err = ComboError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ComboError::Validation(format!("Invalid input identifier '{}'", s));
        let (kind, rest) = s.split_once(':').ok_or_else(invalid)?;

        match kind {
            "key" => {
                let special = [
                    SpecialKey::Enter,
                    SpecialKey::Space,
                    SpecialKey::Backspace,
                    SpecialKey::Escape,
                ]
                .into_iter()
                .find(|key| key.name() == rest);
                if let Some(key) = special {
                    return Ok(InputId::Special(key));
                }
                let mut chars = rest.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(InputId::key(c)),
                    _ => Err(invalid()),
                }
            }
            "button" => rest.parse().map(InputId::Button).map_err(|_| invalid()),
            "axis" => {
                let positive = match rest.chars().last() {
                    Some('+') => true,
                    Some('-') => false,
                    _ => return Err(invalid()),
                };
                let axis = rest[..rest.len() - 1].parse().map_err(|_| invalid())?;
                Ok(InputId::Axis { axis, positive })
            }
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for InputId {
    type Error = ComboError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InputId> for String {
    fn from(value: InputId) -> Self {
        value.to_string()
    }
}

/// What an input does inside the recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Control {
    Direction(Dir),
    Attack(ActionId),
    Modifier(PrefixModifier),
    Reset,
    Commit,
    Finalize,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub input: InputId,
    pub pressed: bool,
}

impl InputEvent {
    pub fn press(input: InputId) -> Self {
        Self { input, pressed: true }
    }

    pub fn release(input: InputId) -> Self {
        Self { input, pressed: false }
    }
}

/// Gamepad controls, at most one control per physical input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GamepadMapping {
    bindings: BTreeMap<InputId, Control>,
}

impl GamepadMapping {
    /// Binds `input` to `control`, unmapping whatever owned `input` before and
    /// any input previously bound to `control`. Returns the displaced owner.
    pub fn assign(&mut self, control: Control, input: InputId) -> Option<Control> {
        self.bindings.retain(|_, bound| *bound != control);
        self.bindings.insert(input, control).filter(|previous| *previous != control)
    }

    pub fn unassign(&mut self, control: Control) {
        self.bindings.retain(|_, bound| *bound != control);
    }

    pub fn control_for(&self, input: &InputId) -> Option<Control> {
        self.bindings.get(input).copied()
    }

    pub fn input_for(&self, control: Control) -> Option<InputId> {
        self.bindings.iter().find(|(_, bound)| **bound == control).map(|(input, _)| *input)
    }

    /// Drops bindings to actions that no longer exist.
    pub fn prune(&mut self, actions: &ActionTable) {
        self.bindings.retain(|_, control| match control {
            Control::Attack(id) => actions.get(*id).is_some(),
            _ => true,
        });
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KeyboardLayout {
    pub up: char,
    pub down: char,
    pub left: char,
    pub right: char,
    pub crouch: char,
    pub forward: char,
}

impl Default for KeyboardLayout {
    fn default() -> Self {
        Self { up: 'w', down: 's', left: 'a', right: 'd', crouch: 'c', forward: 'f' }
    }
}

impl KeyboardLayout {
    fn control_for(&self, key: char) -> Option<Control> {
        let key = key.to_ascii_lowercase();
        let table = [
            (self.up, Control::Direction(Dir::Up)),
            (self.down, Control::Direction(Dir::Down)),
            (self.left, Control::Direction(Dir::Left)),
            (self.right, Control::Direction(Dir::Right)),
            (self.crouch, Control::Modifier(PrefixModifier::Crouch)),
            (self.forward, Control::Modifier(PrefixModifier::Forward)),
        ];
        table.into_iter().find(|(bound, _)| bound.to_ascii_lowercase() == key).map(|(_, c)| c)
    }

    pub fn reserved_keys(&self) -> [char; 6] {
        [self.up, self.down, self.left, self.right, self.crouch, self.forward]
    }
}

/// Resolves raw inputs to controls. Layout keys win over action keys.
pub fn resolve_control(
    input: &InputId,
    layout: &KeyboardLayout,
    actions: &ActionTable,
    gamepad: &GamepadMapping,
) -> Option<Control> {
    match input {
        InputId::Key(c) => layout
            .control_for(*c)
            .or_else(|| actions.by_key(*c).map(|action| Control::Attack(action.id))),
        InputId::Special(SpecialKey::Space) => Some(Control::Commit),
        InputId::Special(SpecialKey::Enter) => Some(Control::Finalize),
        InputId::Special(SpecialKey::Backspace) => Some(Control::Reset),
        InputId::Special(SpecialKey::Escape) => Some(Control::Cancel),
        InputId::Button(_) | InputId::Axis { .. } => gamepad.control_for(input),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerSnapshot {
    pub buttons: Vec<bool>,
    pub axes: Vec<f32>,
}

impl ControllerSnapshot {
    fn active_inputs(&self, deadzone: f32) -> BTreeSet<InputId> {
        let buttons = self
            .buttons
            .iter()
            .enumerate()
            .filter(|(_, pressed)| **pressed)
            .map(|(index, _)| InputId::Button(index as u8));

        let axes = self.axes.iter().enumerate().filter_map(|(index, value)| {
            if *value >= deadzone {
                Some(InputId::Axis { axis: index as u8, positive: true })
            } else if *value <= -deadzone {
                Some(InputId::Axis { axis: index as u8, positive: false })
            } else {
                None
            }
        });

        buttons.chain(axes).collect()
    }
}

/// Anything that can report the current state of one controller.
pub trait ControllerSource {
    /// `None` while no controller is connected.
    fn snapshot(&mut self) -> Option<ControllerSnapshot>;
}

/// Turns per-frame controller snapshots into press/release events.
#[derive(Debug)]
pub struct GamepadPoller {
    held: BTreeSet<InputId>,
    deadzone: f32,
}

impl Default for GamepadPoller {
    fn default() -> Self {
        Self::new(AXIS_DEADZONE)
    }
}

impl GamepadPoller {
    pub fn new(deadzone: f32) -> Self {
        Self { held: BTreeSet::new(), deadzone }
    }

    pub fn held(&self) -> impl Iterator<Item = &InputId> {
        self.held.iter()
    }

    pub fn poll(&mut self, source: &mut dyn ControllerSource) -> Vec<InputEvent> {
        let active = source
            .snapshot()
            .map(|snapshot| snapshot.active_inputs(self.deadzone))
            .unwrap_or_default();
        self.apply(active)
    }

    pub fn diff(&mut self, snapshot: &ControllerSnapshot) -> Vec<InputEvent> {
        let active = snapshot.active_inputs(self.deadzone);
        self.apply(active)
    }

    fn apply(&mut self, active: BTreeSet<InputId>) -> Vec<InputEvent> {
        let released = self.held.difference(&active).copied().map(InputEvent::release);
        let pressed = active.difference(&self.held).copied().map(InputEvent::press);
        let events: Vec<InputEvent> = released.chain(pressed).collect();

        self.held = active;
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{
        Action,
        Rgb,
    };

    #[test]
    fn test_input_id_string_form() {
        let cases = [
            (InputId::key('J'), "key:j"),
            (InputId::Special(SpecialKey::Backspace), "key:backspace"),
            (InputId::Button(3), "button:3"),
            (InputId::Axis { axis: 1, positive: false }, "axis:1-"),
        ];
        for (input, text) in cases {
            assert_eq!(input.to_string(), text);
            assert_eq!(text.parse::<InputId>().unwrap(), input);
        }
        assert!("axis:1".parse::<InputId>().is_err());
        assert!("key:jk".parse::<InputId>().is_err());
        assert!("pedal:1".parse::<InputId>().is_err());
    }

    #[test]
    fn test_gamepad_mapping_unmaps_previous_owner() {
        let punch = ActionId::new();
        let kick = ActionId::new();
        let mut mapping = GamepadMapping::default();

        assert_eq!(mapping.assign(Control::Attack(punch), InputId::Button(0)), None);
        let displaced = mapping.assign(Control::Attack(kick), InputId::Button(0));
        assert_eq!(displaced, Some(Control::Attack(punch)));
        assert_eq!(mapping.input_for(Control::Attack(punch)), None);
        assert_eq!(mapping.control_for(&InputId::Button(0)), Some(Control::Attack(kick)));

        mapping.assign(Control::Attack(kick), InputId::Button(2));
        assert_eq!(mapping.control_for(&InputId::Button(0)), None);
        assert_eq!(mapping.len(), 1);
    }

    #[test]
    fn test_gamepad_mapping_serializes_with_string_keys() {
        let mut mapping = GamepadMapping::default();
        mapping.assign(Control::Reset, InputId::Axis { axis: 2, positive: true });
        let json = serde_json::to_string(&mapping).unwrap();
        assert!(json.contains("axis:2+"));
        let back: GamepadMapping = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mapping);
    }

    #[test]
    fn test_resolve_control_prefers_layout() {
        let actions = ActionTable::new(vec![
            Action::new("P", 'j', Rgb::default()),
            Action::new("X", 'c', Rgb::default()),
        ])
        .unwrap();
        let layout = KeyboardLayout::default();
        let gamepad = GamepadMapping::default();

        let punch = actions.by_key('j').unwrap().id;
        assert_eq!(
            resolve_control(&InputId::key('J'), &layout, &actions, &gamepad),
            Some(Control::Attack(punch))
        );
        assert_eq!(
            resolve_control(&InputId::key('c'), &layout, &actions, &gamepad),
            Some(Control::Modifier(PrefixModifier::Crouch))
        );
        assert_eq!(
            resolve_control(&InputId::key('s'), &layout, &actions, &gamepad),
            Some(Control::Direction(Dir::Down))
        );
        assert_eq!(resolve_control(&InputId::Button(4), &layout, &actions, &gamepad), None);
    }

    struct Scripted(Vec<Option<ControllerSnapshot>>);

    impl ControllerSource for Scripted {
        fn snapshot(&mut self) -> Option<ControllerSnapshot> {
            if self.0.is_empty() {
                None
            } else {
                self.0.remove(0)
            }
        }
    }

    #[test]
    fn test_poller_emits_edges_only() {
        let mut source = Scripted(vec![
            Some(ControllerSnapshot { buttons: vec![true, false], axes: vec![0.2, -0.9] }),
            Some(ControllerSnapshot { buttons: vec![true, true], axes: vec![0.2, -0.9] }),
            Some(ControllerSnapshot { buttons: vec![false, true], axes: vec![0.0, 0.0] }),
            None,
        ]);
        let mut poller = GamepadPoller::default();

        let first = poller.poll(&mut source);
        assert_eq!(
            first,
            vec![
                InputEvent::press(InputId::Button(0)),
                InputEvent::press(InputId::Axis { axis: 1, positive: false })
            ]
        );

        assert_eq!(poller.poll(&mut source), vec![InputEvent::press(InputId::Button(1))]);

        let third = poller.poll(&mut source);
        assert_eq!(
            third,
            vec![
                InputEvent::release(InputId::Button(0)),
                InputEvent::release(InputId::Axis { axis: 1, positive: false })
            ]
        );

        // Disconnect releases everything still held.
        assert_eq!(poller.poll(&mut source), vec![InputEvent::release(InputId::Button(1))]);
        assert_eq!(poller.held().count(), 0);
    }
}
