mod manager;
pub mod types;

pub use manager::MpvPlayer;
