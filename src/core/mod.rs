pub mod editor;
pub mod errors;
pub mod models;
pub mod notation;

pub use editor::{
    Cell,
    EditorGrid,
};
pub use errors::ComboError;
pub use models::{
    Action,
    ActionId,
    ActionTable,
    CommittedCommand,
    Rgb,
};
