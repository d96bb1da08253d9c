pub mod core;
pub mod gui;
pub mod memo;
pub mod mpv;
pub mod persistence;
pub mod player;
pub mod recorder;
pub mod store;
