use gilrs::{
    Axis,
    Button,
    Event,
    EventType,
    Gilrs,
};
use tracing::{
    info,
    warn,
};

use super::input::{
    ControllerSnapshot,
    ControllerSource,
};

/// Standard gamepad order; position is the `button:N` index.
pub const BUTTON_LAYOUT: [Button; 17] = [
    Button::South,
    Button::East,
    Button::West,
    Button::North,
    Button::LeftTrigger,
    Button::RightTrigger,
    Button::LeftTrigger2,
    Button::RightTrigger2,
    Button::Select,
    Button::Start,
    Button::LeftThumb,
    Button::RightThumb,
    Button::DPadUp,
    Button::DPadDown,
    Button::DPadLeft,
    Button::DPadRight,
    Button::Mode,
];

/// Position is the `axis:N` index.
pub const AXIS_LAYOUT: [Axis; 4] = [
    Axis::LeftStickX,
    Axis::LeftStickY,
    Axis::RightStickX,
    Axis::RightStickY,
];

/// gilrs reports stick Y positive upward; `axis:1+` means down.
pub fn axis_value(axis: Axis, raw: f32) -> f32 {
    match axis {
        Axis::LeftStickY | Axis::RightStickY => -raw,
        _ => raw,
    }
}

/// Reads the first connected gamepad through gilrs.
pub struct GilrsController {
    gilrs: Gilrs,
}

impl GilrsController {
    /// `None` when the platform offers no gamepad backend.
    pub fn new() -> Option<Self> {
        match Gilrs::new() {
            Ok(gilrs) => {
                for (_, gamepad) in gilrs.gamepads() {
                    info!("[Gamepad] Found {}", gamepad.name());
                }
                Some(Self { gilrs })
            }
            Err(e) => {
                warn!("[Gamepad] Controller support unavailable: {}", e);
                None
            }
        }
    }

    fn drain_events(&mut self) {
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            match event {
                EventType::Connected => {
                    let name = self.gilrs.gamepad(id).name().to_string();
                    info!("[Gamepad] Connected {}", name);
                }
                EventType::Disconnected => info!("[Gamepad] Disconnected"),
                _ => {}
            }
        }
    }
}

impl ControllerSource for GilrsController {
    fn snapshot(&mut self) -> Option<ControllerSnapshot> {
        self.drain_events();

        let (_, gamepad) = self.gilrs.gamepads().next()?;
        Some(ControllerSnapshot {
            buttons: BUTTON_LAYOUT.iter().map(|button| gamepad.is_pressed(*button)).collect(),
            axes: AXIS_LAYOUT.iter().map(|axis| axis_value(*axis, gamepad.value(*axis))).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::{
        GamepadPoller,
        InputEvent,
        InputId,
    };

    #[test]
    fn test_button_layout_matches_standard_indices() {
        assert_eq!(BUTTON_LAYOUT[0], Button::South);
        assert_eq!(BUTTON_LAYOUT[3], Button::North);
        assert_eq!(BUTTON_LAYOUT[12], Button::DPadUp);
        assert_eq!(BUTTON_LAYOUT[15], Button::DPadRight);

        for (i, button) in BUTTON_LAYOUT.iter().enumerate() {
            assert!(!BUTTON_LAYOUT[i + 1..].contains(button), "{:?} listed twice", button);
        }
    }

    #[test]
    fn test_stick_down_maps_to_positive_vertical_axis() {
        let raw_down = -1.0;
        let snapshot = ControllerSnapshot {
            buttons: vec![false; BUTTON_LAYOUT.len()],
            axes: AXIS_LAYOUT
                .iter()
                .map(|axis| match axis {
                    Axis::LeftStickY => axis_value(*axis, raw_down),
                    _ => 0.0,
                })
                .collect(),
        };

        let mut poller = GamepadPoller::default();
        assert_eq!(
            poller.diff(&snapshot),
            vec![InputEvent::press(InputId::Axis { axis: 1, positive: true })]
        );
        assert_eq!(axis_value(Axis::LeftStickX, 0.75), 0.75);
    }
}
