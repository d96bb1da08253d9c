use std::{
    collections::{
        BTreeSet,
        HashMap,
        HashSet,
    },
    mem,
    time::Duration,
};

use serde::{
    Deserialize,
    Serialize,
};
use tracing::{
    debug,
    warn,
};

use super::input::{
    Control,
    InputEvent,
    InputId,
};
use crate::core::{
    models::{
        ActionId,
        ActionTable,
        CommittedCommand,
    },
    notation::{
        compose_direction,
        format_command,
        Dir,
        PrefixModifier,
        NEUTRAL,
    },
};

pub const FRAME: Duration = Duration::from_nanos(16_666_667);
pub const INVALID_FLASH: Duration = Duration::from_millis(800);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecorderOptions {
    pub auto_commit_on_attack: bool,
    pub enable_prefixes: bool,
    /// Frames an attack must stay held before the hold suffix is added. 0 disables it.
    pub hold_frames: u32,
    pub hold_suffix: String,
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            auto_commit_on_attack: true,
            enable_prefixes: true,
            hold_frames: 30,
            hold_suffix: "[hold]".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Direction(u8),
    Attack { action: ActionId, output: String },
}

impl Token {
    pub fn label(&self) -> String {
        match self {
            Token::Direction(digit) => digit.to_string(),
            Token::Attack { output, .. } => output.clone(),
        }
    }

    fn is_attack(&self) -> bool {
        matches!(self, Token::Attack { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedCommands {
    pub target_cell: usize,
    pub commands: Vec<CommittedCommand>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderOutcome {
    Ignored,
    /// Held state changed but nothing was appended.
    Updated,
    Appended(Token),
    Committed(CommittedCommand),
    Rejected(String),
    Cleared,
    Undone(CommittedCommand),
    Finalized(FinalizedCommands),
    Cancelled,
}

#[derive(Debug)]
struct HoldTimer {
    input: InputId,
    elapsed: Duration,
    committed_before: usize,
    expired: bool,
}

/// Turns press/release events into committed notation strings.
pub struct Recorder {
    state: RecorderState,
    options: RecorderOptions,
    target_cell: usize,
    buffer: Vec<Token>,
    committed: Vec<CommittedCommand>,
    held: HashMap<InputId, Control>,
    stale: HashSet<InputId>,
    held_dirs: Vec<Dir>,
    held_modifiers: BTreeSet<PrefixModifier>,
    last_emitted: Option<u8>,
    steady: u8,
    hold: Option<HoldTimer>,
    invalid_flash: Option<Duration>,
}

impl Recorder {
    pub fn new(options: RecorderOptions) -> Self {
        Self {
            state: RecorderState::Idle,
            options,
            target_cell: 0,
            buffer: Vec::new(),
            committed: Vec::new(),
            held: HashMap::new(),
            stale: HashSet::new(),
            held_dirs: Vec::new(),
            held_modifiers: BTreeSet::new(),
            last_emitted: None,
            steady: NEUTRAL,
            hold: None,
            invalid_flash: None,
        }
    }

    pub fn options(&self) -> &RecorderOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: RecorderOptions) {
        self.options = options;
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    pub fn target_cell(&self) -> usize {
        self.target_cell
    }

    pub fn buffer(&self) -> &[Token] {
        &self.buffer
    }

    pub fn buffer_text(&self) -> String {
        self.buffer.iter().map(Token::label).collect::<Vec<_>>().join(" ")
    }

    pub fn committed(&self) -> &[CommittedCommand] {
        &self.committed
    }

    pub fn steady_direction(&self) -> u8 {
        self.steady
    }

    pub fn is_flashing_invalid(&self) -> bool {
        self.invalid_flash.is_some()
    }

    /// Starts a session targeting `target_cell`. Inputs already down are
    /// ignored until they are released.
    pub fn open(&mut self, target_cell: usize, held_now: impl IntoIterator<Item = InputId>) {
        self.reset_session();
        self.state = RecorderState::Recording;
        self.target_cell = target_cell;
        self.stale = held_now.into_iter().collect();
        debug!("[Recorder] Opened for cell {} ({} stale inputs)", target_cell, self.stale.len());
    }

    fn reset_session(&mut self) {
        self.buffer.clear();
        self.committed.clear();
        self.held.clear();
        self.stale.clear();
        self.held_dirs.clear();
        self.held_modifiers.clear();
        self.last_emitted = None;
        self.steady = NEUTRAL;
        self.hold = None;
        self.invalid_flash = None;
    }

    /// Feeds one raw event. `control` is what the input is bound to, if anything.
    pub fn handle(
        &mut self,
        event: InputEvent,
        control: Option<Control>,
        actions: &ActionTable,
    ) -> RecorderOutcome {
        if !self.is_recording() {
            return RecorderOutcome::Ignored;
        }

        if event.pressed {
            if self.stale.contains(&event.input) || self.held.contains_key(&event.input) {
                return RecorderOutcome::Ignored;
            }
            match control {
                Some(control) => {
                    self.held.insert(event.input, control);
                    self.press(event.input, control, actions)
                }
                None => RecorderOutcome::Ignored,
            }
        } else {
            if self.stale.remove(&event.input) {
                return RecorderOutcome::Ignored;
            }
            match self.held.remove(&event.input) {
                Some(control) => self.release(event.input, control),
                None => RecorderOutcome::Ignored,
            }
        }
    }

    fn press(
        &mut self,
        input: InputId,
        control: Control,
        actions: &ActionTable,
    ) -> RecorderOutcome {
        match control {
            Control::Direction(dir) => {
                self.held_dirs.retain(|held| *held != dir);
                self.held_dirs.push(dir);
                self.emit_direction()
            }
            Control::Modifier(modifier) => {
                self.held_modifiers.insert(modifier);
                RecorderOutcome::Updated
            }
            Control::Attack(id) => self.press_attack(input, id, actions),
            Control::Reset => self.reset(),
            Control::Commit => self.commit(actions),
            Control::Finalize => self.finalize(actions),
            Control::Cancel => self.cancel(),
        }
    }

    fn release(&mut self, input: InputId, control: Control) -> RecorderOutcome {
        if let Some(timer) = &self.hold {
            if timer.input == input && !timer.expired {
                self.hold = None;
            }
        }

        match control {
            Control::Direction(dir) => {
                self.held_dirs.retain(|held| *held != dir);
                self.emit_direction()
            }
            Control::Modifier(modifier) => {
                self.held_modifiers.remove(&modifier);
                RecorderOutcome::Updated
            }
            _ => RecorderOutcome::Updated,
        }
    }

    fn emit_direction(&mut self) -> RecorderOutcome {
        let digit = compose_direction(&self.held_dirs);
        self.steady = digit;

        if digit == NEUTRAL || self.last_emitted == Some(digit) {
            return RecorderOutcome::Updated;
        }

        self.last_emitted = Some(digit);
        let token = Token::Direction(digit);
        self.buffer.push(token.clone());
        RecorderOutcome::Appended(token)
    }

    fn press_attack(
        &mut self,
        input: InputId,
        id: ActionId,
        actions: &ActionTable,
    ) -> RecorderOutcome {
        let Some(action) = actions.get(id) else {
            return RecorderOutcome::Ignored;
        };

        let token = Token::Attack { action: id, output: action.output.clone() };
        self.buffer.push(token.clone());

        if self.options.hold_frames > 0 {
            self.hold = Some(HoldTimer {
                input,
                elapsed: Duration::ZERO,
                committed_before: self.committed.len(),
                expired: false,
            });
        }

        if self.options.auto_commit_on_attack && !action.system {
            self.commit(actions)
        } else {
            RecorderOutcome::Appended(token)
        }
    }

    fn build_command(&self, actions: &ActionTable) -> Result<CommittedCommand, String> {
        let (action_id, _) = match self.buffer.last() {
            None => return Err("Nothing to commit".to_string()),
            Some(Token::Attack { action, output }) => (*action, output),
            Some(Token::Direction(_)) => return Err("Input must end with an attack".to_string()),
        };
        let action = actions
            .get(action_id)
            .ok_or_else(|| "Input must end with a known attack".to_string())?;

        if self.buffer.iter().filter(|token| token.is_attack()).count() > 1 {
            return Err("Only one attack can be committed at a time".to_string());
        }

        let mut prefix: String = self
            .buffer
            .iter()
            .filter_map(|token| match token {
                Token::Direction(digit) => Some(digit.to_string()),
                Token::Attack { .. } => None,
            })
            .collect();

        if prefix.is_empty() && action.add_neutral_five {
            prefix = self.steady.to_string();
        }

        let modifier = if self.options.enable_prefixes {
            self.held_modifiers.iter().next().copied()
        } else {
            None
        };

        let text = format_command(&prefix, &action.output, modifier);
        Ok(CommittedCommand::new(text, Some(action.id)))
    }

    /// Collapses the buffer into one committed command.
    ///
    /// A rejected buffer is cleared and raises the invalid-input flash.
    pub fn commit(&mut self, actions: &ActionTable) -> RecorderOutcome {
        match self.build_command(actions) {
            Ok(mut command) => {
                if self.hold.as_ref().is_some_and(|timer| timer.expired) {
                    command.text.push_str(&self.options.hold_suffix);
                    self.hold = None;
                }
                debug!("[Recorder] Committed '{}'", command.text);
                self.committed.push(command.clone());
                self.buffer.clear();
                self.steady = NEUTRAL;
                self.last_emitted = None;
                RecorderOutcome::Committed(command)
            }
            Err(reason) => {
                warn!("[Recorder] Rejected input '{}': {}", self.buffer_text(), reason);
                self.buffer.clear();
                self.hold = None;
                self.invalid_flash = Some(INVALID_FLASH);
                RecorderOutcome::Rejected(reason)
            }
        }
    }

    /// Clears the buffer, or undoes the last committed command when it is
    /// already empty. Either way a pending hold is dropped.
    pub fn reset(&mut self) -> RecorderOutcome {
        self.hold = None;
        if !self.buffer.is_empty() {
            self.buffer.clear();
            return RecorderOutcome::Cleared;
        }

        match self.committed.pop() {
            Some(command) => RecorderOutcome::Undone(command),
            None => RecorderOutcome::Ignored,
        }
    }

    pub fn finalize(&mut self, actions: &ActionTable) -> RecorderOutcome {
        if !self.is_recording() {
            return RecorderOutcome::Ignored;
        }

        if !self.buffer.is_empty() {
            if let RecorderOutcome::Rejected(reason) = self.commit(actions) {
                warn!("[Recorder] Pending input dropped on finalize: {}", reason);
            }
        }

        let finalized = FinalizedCommands {
            target_cell: self.target_cell,
            commands: mem::take(&mut self.committed),
        };
        self.reset_session();
        self.state = RecorderState::Idle;
        debug!("[Recorder] Finalized {} commands", finalized.commands.len());
        RecorderOutcome::Finalized(finalized)
    }

    pub fn cancel(&mut self) -> RecorderOutcome {
        if !self.is_recording() {
            return RecorderOutcome::Ignored;
        }
        self.reset_session();
        self.state = RecorderState::Idle;
        RecorderOutcome::Cancelled
    }

    /// Advances timers. Returns true when the hold suffix was applied.
    pub fn tick(&mut self, elapsed: Duration) -> bool {
        if let Some(remaining) = self.invalid_flash {
            let remaining = remaining.saturating_sub(elapsed);
            self.invalid_flash = if remaining.is_zero() { None } else { Some(remaining) };
        }

        let threshold = FRAME * self.options.hold_frames;
        let Some(timer) = self.hold.as_mut() else {
            return false;
        };
        if timer.expired {
            return false;
        }

        timer.elapsed += elapsed;
        if timer.elapsed < threshold {
            return false;
        }

        if self.committed.len() > timer.committed_before {
            self.hold = None;
            if let Some(last) = self.committed.last_mut() {
                last.text.push_str(&self.options.hold_suffix);
                return true;
            }
            false
        } else {
            // Not committed yet; the next commit carries the suffix.
            timer.expired = true;
            false
        }
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new(RecorderOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::models::{
            Action,
            Rgb,
        },
        recorder::input::{
            resolve_control,
            GamepadMapping,
            KeyboardLayout,
            SpecialKey,
        },
    };

    struct Harness {
        recorder: Recorder,
        actions: ActionTable,
        layout: KeyboardLayout,
        gamepad: GamepadMapping,
    }

    impl Harness {
        fn new(options: RecorderOptions) -> Self {
            let actions = ActionTable::new(vec![
                Action::new("P", 'j', Rgb::default()),
                Action::new("K", 'k', Rgb::default()),
                Action::new("jc", 'o', Rgb::default()).without_neutral_five().as_system(),
                Action::new("Dash", 'm', Rgb::default()).without_neutral_five(),
            ])
            .unwrap();
            let mut recorder = Recorder::new(options);
            recorder.open(0, []);
            Self {
                recorder,
                actions,
                layout: KeyboardLayout::default(),
                gamepad: GamepadMapping::default(),
            }
        }

        fn manual() -> Self {
            Self::new(RecorderOptions { auto_commit_on_attack: false, ..Default::default() })
        }

        fn send(&mut self, event: InputEvent) -> RecorderOutcome {
            let control = resolve_control(&event.input, &self.layout, &self.actions, &self.gamepad);
            self.recorder.handle(event, control, &self.actions)
        }

        fn press(&mut self, key: char) -> RecorderOutcome {
            self.send(InputEvent::press(InputId::key(key)))
        }

        fn release(&mut self, key: char) -> RecorderOutcome {
            self.send(InputEvent::release(InputId::key(key)))
        }

        fn tap(&mut self, key: char) -> RecorderOutcome {
            let outcome = self.press(key);
            self.release(key);
            outcome
        }

        fn special(&mut self, key: SpecialKey) -> RecorderOutcome {
            let outcome = self.send(InputEvent::press(InputId::Special(key)));
            self.send(InputEvent::release(InputId::Special(key)));
            outcome
        }

        fn committed_texts(&self) -> Vec<String> {
            self.recorder.committed().iter().map(|c| c.text.clone()).collect()
        }

        fn buffer_labels(&self) -> Vec<String> {
            self.recorder.buffer().iter().map(Token::label).collect()
        }
    }

    #[test]
    fn test_down_then_punch_commits_2p() {
        let mut h = Harness::manual();
        h.press('s');
        h.press('j');
        assert_eq!(h.buffer_labels(), vec!["2", "P"]);

        assert!(matches!(h.special(SpecialKey::Space), RecorderOutcome::Committed(_)));
        assert_eq!(h.committed_texts(), vec!["2P"]);
        assert!(h.recorder.buffer().is_empty());
    }

    #[test]
    fn test_crouch_modifier_prefixes_command() {
        let mut h = Harness::new(RecorderOptions::default());
        h.press('c');
        h.press('s');
        let outcome = h.press('j');
        assert!(matches!(outcome, RecorderOutcome::Committed(ref c) if c.text == "c.2P"));

        let mut plain = Harness::new(RecorderOptions {
            enable_prefixes: false,
            ..Default::default()
        });
        plain.press('c');
        plain.press('s');
        plain.press('j');
        assert_eq!(plain.committed_texts(), vec!["2P"]);
    }

    #[test]
    fn test_two_attacks_are_rejected() {
        let mut h = Harness::manual();
        h.tap('j');
        h.tap('k');
        assert_eq!(h.buffer_labels(), vec!["P", "K"]);

        assert!(matches!(h.special(SpecialKey::Space), RecorderOutcome::Rejected(_)));
        assert!(h.recorder.buffer().is_empty());
        assert!(h.recorder.committed().is_empty());
        assert!(h.recorder.is_flashing_invalid());

        h.recorder.tick(Duration::from_millis(500));
        assert!(h.recorder.is_flashing_invalid());
        h.recorder.tick(Duration::from_millis(300));
        assert!(!h.recorder.is_flashing_invalid());
    }

    #[test]
    fn test_empty_and_direction_only_buffers_are_rejected() {
        let mut h = Harness::manual();
        assert!(matches!(h.special(SpecialKey::Space), RecorderOutcome::Rejected(_)));

        h.press('s');
        assert!(matches!(h.special(SpecialKey::Space), RecorderOutcome::Rejected(_)));
        assert!(h.recorder.committed().is_empty());
    }

    #[test]
    fn test_neutral_five_substitution() {
        let mut h = Harness::new(RecorderOptions::default());
        h.tap('j');
        h.tap('m');
        assert_eq!(h.committed_texts(), vec!["5P", "Dash"]);
    }

    #[test]
    fn test_steady_direction_survives_reset() {
        let mut h = Harness::manual();
        h.press('s');
        assert_eq!(h.special(SpecialKey::Backspace), RecorderOutcome::Cleared);
        assert_eq!(h.recorder.steady_direction(), 2);

        h.press('j');
        h.special(SpecialKey::Space);
        assert_eq!(h.committed_texts(), vec!["2P"]);
        assert_eq!(h.recorder.steady_direction(), NEUTRAL);
    }

    #[test]
    fn test_quarter_circle_motion() {
        let mut h = Harness::new(RecorderOptions::default());
        h.press('s');
        h.press('d');
        h.release('s');
        h.press('j');
        assert_eq!(h.committed_texts(), vec!["236 + P"]);
    }

    #[test]
    fn test_direction_tokens_follow_held_set_without_repeats() {
        let mut h = Harness::manual();
        h.press('a');
        h.press('d');
        h.release('d');
        assert_eq!(h.buffer_labels(), vec!["4", "6", "4"]);

        // Releasing to neutral appends nothing and re-pressing the same
        // direction is not a new token.
        h.release('a');
        h.press('a');
        assert_eq!(h.buffer_labels(), vec!["4", "6", "4"]);

        h.press('w');
        assert_eq!(h.buffer_labels(), vec!["4", "6", "4", "7"]);

        let labels = h.buffer_labels();
        assert!(labels.windows(2).all(|pair| pair[0] != pair[1]));
        assert!(!labels.contains(&"5".to_string()));
    }

    #[test]
    fn test_reset_undoes_last_command_when_buffer_empty() {
        let mut h = Harness::new(RecorderOptions::default());
        h.tap('j');
        h.tap('k');
        assert_eq!(h.committed_texts(), vec!["5P", "5K"]);

        let outcome = h.special(SpecialKey::Backspace);
        assert!(matches!(outcome, RecorderOutcome::Undone(ref c) if c.text == "5K"));
        assert_eq!(h.committed_texts(), vec!["5P"]);
    }

    #[test]
    fn test_system_action_does_not_auto_commit() {
        let mut h = Harness::new(RecorderOptions::default());
        assert!(matches!(h.tap('o'), RecorderOutcome::Appended(_)));
        assert!(h.recorder.committed().is_empty());

        h.special(SpecialKey::Space);
        assert_eq!(h.committed_texts(), vec!["jc"]);
    }

    #[test]
    fn test_inputs_held_at_open_are_ignored_until_released() {
        let mut h = Harness::new(RecorderOptions::default());
        h.recorder.open(3, [InputId::key('j')]);

        assert_eq!(h.press('j'), RecorderOutcome::Ignored);
        assert_eq!(h.release('j'), RecorderOutcome::Ignored);
        assert!(matches!(h.press('j'), RecorderOutcome::Committed(_)));

        // Key repeat while held is ignored.
        assert_eq!(h.press('j'), RecorderOutcome::Ignored);
        assert_eq!(h.committed_texts(), vec!["5P"]);
    }

    #[test]
    fn test_hold_suffix_applied_once() {
        let mut h = Harness::new(RecorderOptions { hold_frames: 10, ..Default::default() });
        h.press('j');
        assert!(!h.recorder.tick(FRAME * 5));
        assert!(h.recorder.tick(FRAME * 5));
        assert!(!h.recorder.tick(FRAME * 30));
        h.release('j');
        assert_eq!(h.committed_texts(), vec!["5P[hold]"]);

        h.press('k');
        h.recorder.tick(FRAME * 3);
        h.release('k');
        h.recorder.tick(FRAME * 30);
        assert_eq!(h.committed_texts(), vec!["5P[hold]", "5K"]);
    }

    #[test]
    fn test_undo_drops_pending_hold() {
        let mut h = Harness::new(RecorderOptions { hold_frames: 4, ..Default::default() });
        h.press('j');
        assert!(matches!(h.special(SpecialKey::Backspace), RecorderOutcome::Undone(_)));
        assert!(h.recorder.hold.is_none());
        assert!(!h.recorder.tick(FRAME * 10));
        h.release('j');

        h.tap('k');
        h.recorder.tick(FRAME * 10);
        assert_eq!(h.committed_texts(), vec!["5K"]);

        let mut manual = Harness::new(RecorderOptions {
            auto_commit_on_attack: false,
            hold_frames: 4,
            ..Default::default()
        });
        manual.press('s');
        manual.press('k');
        assert_eq!(manual.special(SpecialKey::Backspace), RecorderOutcome::Cleared);
        assert!(manual.recorder.hold.is_none());
        manual.recorder.tick(FRAME * 10);
        manual.release('k');
        manual.tap('j');
        manual.special(SpecialKey::Space);
        assert_eq!(manual.committed_texts(), vec!["2P"]);
    }

    #[test]
    fn test_hold_suffix_waits_for_manual_commit() {
        let mut h = Harness::new(RecorderOptions {
            auto_commit_on_attack: false,
            hold_frames: 4,
            ..Default::default()
        });
        h.press('s');
        h.press('k');
        h.recorder.tick(FRAME * 4);
        h.release('k');
        h.special(SpecialKey::Space);
        assert_eq!(h.committed_texts(), vec!["2K[hold]"]);
    }

    #[test]
    fn test_finalize_commits_pending_and_closes() {
        let mut h = Harness::manual();
        h.recorder.open(2, []);
        h.tap('j');
        h.special(SpecialKey::Space);
        h.tap('s');
        h.tap('k');

        match h.special(SpecialKey::Enter) {
            RecorderOutcome::Finalized(done) => {
                assert_eq!(done.target_cell, 2);
                let texts: Vec<_> = done.commands.iter().map(|c| c.text.as_str()).collect();
                assert_eq!(texts, vec!["5P", "2K"]);
                assert!(done.commands.iter().all(|c| c.action.is_some()));
            }
            other => panic!("Expected Finalized, got {:?}", other),
        }
        assert_eq!(h.recorder.state(), RecorderState::Idle);
        assert_eq!(h.press('j'), RecorderOutcome::Ignored);
    }

    #[test]
    fn test_cancel_discards_everything() {
        let mut h = Harness::new(RecorderOptions::default());
        h.tap('j');
        assert_eq!(h.special(SpecialKey::Escape), RecorderOutcome::Cancelled);
        assert!(h.recorder.committed().is_empty());
        assert!(!h.recorder.is_recording());
    }
}
