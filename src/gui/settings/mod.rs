pub mod data;
pub mod modal;

pub use data::{
    SettingsData,
    SETTINGS_FILE,
};
pub use modal::SettingsModal;
