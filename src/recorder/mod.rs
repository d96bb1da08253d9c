pub mod controller;
pub mod input;
pub mod state;

pub use controller::GilrsController;
pub use input::{
    resolve_control,
    Control,
    ControllerSnapshot,
    ControllerSource,
    GamepadMapping,
    GamepadPoller,
    InputEvent,
    InputId,
    KeyboardLayout,
    SpecialKey,
};
pub use state::{
    FinalizedCommands,
    Recorder,
    RecorderOptions,
    RecorderOutcome,
    RecorderState,
    Token,
};
