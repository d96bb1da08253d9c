mod app;
pub mod editor_panel;
pub mod error_modal;
pub mod memo_panel;
pub mod message_overlay;
pub mod modal;
pub mod recorder_modal;
pub mod records_table;
pub mod settings;
pub mod table_modals;
pub mod theme;
pub mod top_bar;

pub use app::ComboApp;
