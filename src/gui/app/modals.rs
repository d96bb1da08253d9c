use std::path::PathBuf;

use crate::gui::{
    error_modal::ErrorModal,
    modal::ConfirmModal,
    recorder_modal::RecorderModal,
    settings::SettingsModal,
    table_modals::{
        TableFormModal,
        TransferModal,
    },
};

/// Destructive operations waiting for a yes from the user.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingAction {
    DeleteRecords(Vec<u64>),
    DeleteTable(String),
    Import(PathBuf),
}

pub struct Modals {
    pub error: ErrorModal,
    pub confirm: ConfirmModal<PendingAction>,
    pub table_form: TableFormModal,
    pub transfer: TransferModal,
    pub settings: SettingsModal,
    pub recorder: RecorderModal,
}

impl Default for Modals {
    fn default() -> Self {
        Self {
            error: ErrorModal::new(),
            confirm: ConfirmModal::new(),
            table_form: TableFormModal::new(),
            transfer: TransferModal::new(),
            settings: SettingsModal::new(),
            recorder: RecorderModal::new(),
        }
    }
}
