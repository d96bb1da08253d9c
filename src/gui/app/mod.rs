mod modals;

use std::{
    path::{
        Path,
        PathBuf,
    },
    time::Instant,
};

use eframe::egui;
use modals::{
    Modals,
    PendingAction,
};
use serde_json::Value;
use tracing::{
    info,
    warn,
};

use super::{
    editor_panel::{
        EditorAction,
        EditorPanel,
    },
    memo_panel::{
        MemoAction,
        MemoPanel,
    },
    message_overlay::MessageOverlay,
    recorder_modal::keys_down,
    records_table::{
        RecordsAction,
        RecordsTable,
    },
    settings::SettingsData,
    table_modals::TransferRequest,
    theme::Theme,
    top_bar::{
        TopBar,
        TopBarAction,
    },
};
use crate::{
    core::{
        ComboError,
        EditorGrid,
    },
    memo::MemoBook,
    mpv::MpvPlayer,
    persistence::get_app_data_dir,
    player::{
        PlayerManager,
        VideoPlayer,
    },
    recorder::{
        input::AXIS_DEADZONE,
        ControllerSource,
        GamepadPoller,
        GilrsController,
        InputEvent,
        Recorder,
    },
    store::{
        plan_transfer,
        Record,
        StoreManager,
        TableSchema,
        TransferMode,
        DATABASE_FILE,
    },
};

pub struct ComboApp {
    // Configuration
    pub settings: SettingsData,
    data_dir: PathBuf,

    // Data
    store: StoreManager,
    schemas: Vec<TableSchema>,
    active_table: String,
    records: Vec<Record>,
    memos: MemoBook,

    // Editing
    grid: EditorGrid,
    editor: EditorPanel,
    recorder: Recorder,
    gamepad: GamepadPoller,
    controller: Option<Box<dyn ControllerSource>>,

    // UI State
    records_table: RecordsTable,
    memo_panel: MemoPanel,
    theme: Theme,
    message_overlay: MessageOverlay,
    modals: Modals,
    last_frame: Option<Instant>,

    // External Services
    player: PlayerManager,
}

impl ComboApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let mut app = Self::load(get_app_data_dir());
        if let Some(controller) = GilrsController::new() {
            app = app.with_controller(Box::new(controller));
        }

        app.theme.apply(&cc.egui_ctx);
        cc.egui_ctx.set_theme(if app.settings.dark_mode {
            egui::Theme::Dark
        } else {
            egui::Theme::Light
        });

        app
    }

    /// Builds the app state from the files in `data_dir`. Store errors are
    /// queued for the error modal instead of aborting start-up.
    pub fn load(data_dir: PathBuf) -> Self {
        let settings = SettingsData::load_from(&data_dir);
        let player = MpvPlayer::new(settings.mpv_endpoint.clone());
        Self::with_player(data_dir, settings, Box::new(player))
    }

    pub fn with_player(
        data_dir: PathBuf,
        settings: SettingsData,
        player: Box<dyn VideoPlayer>,
    ) -> Self {
        let memos = MemoBook::load_from(&data_dir).unwrap_or_else(|e| {
            warn!("Failed to load memos: {}. Starting empty.", e);
            MemoBook::default()
        });

        let mut app = Self {
            store: StoreManager::new(data_dir.join(DATABASE_FILE)),
            schemas: Vec::new(),
            active_table: settings.last_table.clone().unwrap_or_default(),
            records: Vec::new(),
            memos,

            grid: EditorGrid::new(settings.merge_separator.clone()),
            editor: EditorPanel::new(),
            recorder: Recorder::new(settings.recorder.clone()),
            gamepad: GamepadPoller::new(AXIS_DEADZONE),
            controller: None,

            records_table: RecordsTable::new(),
            memo_panel: MemoPanel::new(),
            theme: Theme::dracula(),
            message_overlay: MessageOverlay::new(),
            modals: Modals::default(),
            last_frame: None,

            player: PlayerManager::new(player),
            settings,
            data_dir,
        };

        if let Err(e) = app.reload() {
            app.modals.error.report("Failed to open the combo database", &e);
        }
        app
    }

    pub fn with_controller(mut self, controller: Box<dyn ControllerSource>) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn active_table(&self) -> &str {
        &self.active_table
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn grid(&self) -> &EditorGrid {
        &self.grid
    }

    fn active_schema(&self) -> Option<&TableSchema> {
        self.schemas.iter().find(|schema| schema.table_name == self.active_table)
    }

    fn reload(&mut self) -> Result<(), ComboError> {
        self.schemas = self.store.get_all_schemas()?;
        if self.active_schema().is_none() {
            self.active_table =
                self.schemas.first().map(|schema| schema.table_name.clone()).unwrap_or_default();
        }
        self.records = if self.active_table.is_empty() {
            Vec::new()
        } else {
            self.store.get_all_records(&self.active_table)?
        };
        Ok(())
    }

    fn save_settings(&mut self) {
        if let Err(e) = self.settings.save_to(&self.data_dir) {
            self.modals.error.report("Failed to save settings", &e);
        }
    }

    fn save_memos(&mut self) {
        if let Err(e) = self.memos.save_to(&self.data_dir) {
            self.modals.error.report("Failed to save memos", &e);
        }
    }

    /// Surfaces a failed operation in the error modal.
    fn check<T>(&mut self, title: &str, result: Result<T, ComboError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.modals.error.report(title, &e);
                None
            }
        }
    }

    pub fn select_table(&mut self, table: &str) -> Result<(), ComboError> {
        self.active_table = table.to_string();
        self.records_table.reset();
        self.editor.editing_record = None;
        self.reload()?;

        self.settings.last_table = Some(self.active_table.clone());
        self.settings.save_to(&self.data_dir)
    }

    /// Stores the editor grid: a new row, or an update of the row being edited.
    pub fn save_grid(&mut self) -> Result<u64, ComboError> {
        let schema = self
            .active_schema()
            .cloned()
            .ok_or_else(|| ComboError::NotFound("No table selected".into()))?;
        let row = self.grid.to_record(&schema);

        let id = match self.editor.editing_record {
            Some(id) => {
                let mut existing = self.store.get_record(&self.active_table, id)?;
                for (column, value) in row {
                    if Some(&column) != schema.creation_date_column_id.as_ref() {
                        existing.insert(column, value);
                    }
                }
                self.store.update_record(&self.active_table, existing)?;
                id
            }
            None => self.store.add_record(&self.active_table, row)?,
        };

        self.grid.clear();
        self.editor.editing_record = None;
        self.editor.selected = 0;
        self.reload()?;
        Ok(id)
    }

    /// Loads a stored row back into the editor grid.
    pub fn edit_record(&mut self, id: u64) -> Result<(), ComboError> {
        let schema = self
            .active_schema()
            .cloned()
            .ok_or_else(|| ComboError::NotFound("No table selected".into()))?;
        let record = self.store.get_record(&self.active_table, id)?;
        let text =
            record.get(&schema.combo_column_id).and_then(Value::as_str).unwrap_or_default();

        self.grid =
            EditorGrid::from_text(text, &self.settings.merge_separator, &self.settings.actions);
        self.editor.editing_record = Some(id);
        self.editor.selected = 0;
        Ok(())
    }

    pub fn delete_records(&mut self, ids: &[u64]) -> Result<(), ComboError> {
        for &id in ids {
            self.store.delete_record(&self.active_table, id)?;
            if self.editor.editing_record == Some(id) {
                self.editor.editing_record = None;
            }
        }
        self.reload()
    }

    /// Starts a transfer, or asks first when destination columns are missing.
    pub fn request_transfer(
        &mut self,
        ids: Vec<u64>,
        destination: String,
        mode: TransferMode,
    ) -> Result<(), ComboError> {
        let find = |name: &str| {
            self.schemas
                .iter()
                .find(|schema| schema.table_name == name)
                .ok_or_else(|| ComboError::NotFound(format!("Table '{}'", name)))
        };
        let mapping = plan_transfer(find(&self.active_table)?, find(&destination)?);

        let request = TransferRequest {
            ids,
            source: self.active_table.clone(),
            destination,
            copy: mode == TransferMode::Copy,
            dropped: mapping.dropped,
        };
        if request.dropped.is_empty() {
            self.run_transfer(request)
        } else {
            self.modals.transfer.ask(request);
            Ok(())
        }
    }

    fn run_transfer(&mut self, request: TransferRequest) -> Result<(), ComboError> {
        let report = self.store.transfer_records(
            &request.source,
            &request.destination,
            &request.ids,
            request.mode(),
        )?;

        let verb = if request.copy { "Copied" } else { "Moved" };
        let mut message =
            format!("{} {} rows to {}", verb, report.transferred.len(), request.destination);
        if !report.skipped.is_empty() {
            message.push_str(&format!(" ({} no longer existed)", report.skipped.len()));
        }
        self.message_overlay.set_message(message);
        self.records_table.reset();
        self.reload()
    }

    pub fn export_bundle(&mut self, dir: &Path) -> Result<PathBuf, ComboError> {
        let snapshot = self.settings.to_snapshot()?;
        let path = self.store.export_to_dir(dir, Some(snapshot))?;
        info!("Exported backup to {}", path.display());
        Ok(path)
    }

    /// Replaces every table with the bundle's and adopts its settings, if any.
    pub fn import_bundle(&mut self, path: &Path) -> Result<(), ComboError> {
        let settings = self.store.import_from_file(path)?;
        if let Some(snapshot) = settings {
            let mut imported = SettingsData::from_snapshot(snapshot)?;
            imported.mpv_endpoint = self.settings.mpv_endpoint.clone();
            self.apply_settings(imported);
        }

        self.records_table.reset();
        self.editor.editing_record = None;
        self.reload()
    }

    fn apply_settings(&mut self, settings: SettingsData) {
        self.settings = settings;
        self.grid.set_separator(self.settings.merge_separator.clone());
        self.grid.recolor(&self.settings.actions);
        self.recorder.set_options(self.settings.recorder.clone());
        self.save_settings();
    }

    fn handle_top_bar(&mut self, action: TopBarAction) {
        match action {
            TopBarAction::SelectTable(table) => {
                let result = self.select_table(&table);
                self.check("Failed to open table", result);
            }
            TopBarAction::NewTable => self.modals.table_form.open_new(),
            TopBarAction::EditTable => {
                if let Some(schema) = self.active_schema().cloned() {
                    self.modals.table_form.open_edit(&schema);
                }
            }
            TopBarAction::DeleteTable => {
                if !self.active_table.is_empty() {
                    let table = self.active_table.clone();
                    self.modals.confirm.ask(
                        "Delete table",
                        format!("Delete '{}' and all {} of its rows?", table, self.records.len()),
                        PendingAction::DeleteTable(table),
                    );
                }
            }
            TopBarAction::RenumberTable => {
                let result = self.store.renumber_unique_numbers(&self.active_table);
                if let Some(count) = self.check("Failed to renumber rows", result) {
                    self.message_overlay.set_message(format!("Renumbered {} rows", count));
                    let result = self.reload();
                    self.check("Failed to reload table", result);
                }
            }
            TopBarAction::ExportBundle => {
                if let Some(dir) = rfd::FileDialog::new().pick_folder() {
                    let result = self.export_bundle(&dir);
                    if let Some(path) = self.check("Export failed", result) {
                        self.message_overlay.set_message(format!("Saved {}", path.display()));
                    }
                }
            }
            TopBarAction::ImportBundle => {
                if let Some(path) =
                    rfd::FileDialog::new().add_filter("Backup", &["json"]).pick_file()
                {
                    self.modals.confirm.ask(
                        "Import backup",
                        "Importing replaces every table with the backup's contents.",
                        PendingAction::Import(path),
                    );
                }
            }
            TopBarAction::ExportCsv => {
                if let Some(dir) = rfd::FileDialog::new().pick_folder() {
                    let result = self.store.export_csv_to_dir(&dir);
                    if let Some(paths) = self.check("CSV export failed", result) {
                        self.message_overlay
                            .set_message(format!("Wrote {} CSV files", paths.len()));
                    }
                }
            }
            TopBarAction::OpenSettings => self.modals.settings.open(&self.settings),
            TopBarAction::ToggleMemo => self.memo_panel.open = !self.memo_panel.open,
            TopBarAction::LaunchPlayer => {
                let result = self.player.launch();
                if let Some(child) = self.check("Failed to start the player", result) {
                    self.message_overlay.set_message(format!("Started mpv (pid {})", child.id()));
                }
            }
        }
    }

    fn handle_editor(&mut self, action: EditorAction, ctx: &egui::Context) {
        match action {
            EditorAction::Record(index) => {
                self.editor.selected = index;
                let held: Vec<_> =
                    keys_down(ctx).into_iter().chain(self.gamepad.held().copied()).collect();
                self.recorder.open(index, held);
            }
            EditorAction::CellEdited(index, text) => {
                self.grid.set_text(index, text, &self.settings.actions);
            }
            EditorAction::InsertCell(index) => {
                self.grid.insert_cell(index);
                self.editor.selected = index;
            }
            EditorAction::RemoveCell(index) => {
                self.grid.remove_cell(index);
            }
            EditorAction::Save => {
                let result = self.save_grid();
                if let Some(id) = self.check("Failed to save the combo", result) {
                    self.message_overlay
                        .set_message(format!("Saved row {} to {}", id, self.active_table));
                }
            }
            EditorAction::Clear => {
                self.grid.clear();
                self.editor.editing_record = None;
                self.editor.selected = 0;
            }
        }
    }

    fn handle_records(&mut self, action: RecordsAction) {
        match action {
            RecordsAction::Edit(id) => {
                let result = self.edit_record(id);
                self.check("Failed to load the row", result);
            }
            RecordsAction::Delete(ids) => {
                let message = format!("Delete {} row(s) from '{}'?", ids.len(), self.active_table);
                self.modals.confirm.ask("Delete rows", message, PendingAction::DeleteRecords(ids));
            }
            RecordsAction::Transfer { ids, destination, mode } => {
                let result = self.request_transfer(ids, destination, mode);
                self.check("Transfer failed", result);
            }
        }
    }

    fn handle_memo(&mut self, action: MemoAction) {
        match action {
            MemoAction::Open(video_id) => {
                if self.player.is_connected() {
                    let result = self.player.open_video(&video_id);
                    self.check("Failed to load the video", result);
                }
            }
            MemoAction::Seek { video_id, seconds } => {
                let result = self.player.seek_to(&video_id, seconds);
                self.check("Failed to seek", result);
            }
            MemoAction::TogglePause => {
                let result = self.player.toggle_pause();
                self.check("Player error", result);
            }
            MemoAction::Add { video_id, seconds, text } => {
                let result = self.memos.add(&video_id, seconds, &text);
                if self.check("Failed to add the note", result).is_some() {
                    self.save_memos();
                }
            }
            MemoAction::Update { video_id, id, text } => {
                let result = self.memos.update_text(&video_id, id, &text);
                if self.check("Failed to update the note", result).is_some() {
                    self.save_memos();
                }
            }
            MemoAction::Remove { video_id, id } => {
                if self.memos.remove(&video_id, id).is_some() {
                    self.save_memos();
                }
            }
        }
    }

    fn run_pending(&mut self, action: PendingAction) {
        match action {
            PendingAction::DeleteRecords(ids) => {
                let result = self.delete_records(&ids);
                self.check("Failed to delete rows", result);
            }
            PendingAction::DeleteTable(table) => {
                let result = self.store.delete_table(&table).and_then(|_| {
                    self.records_table.reset();
                    self.editor.editing_record = None;
                    self.reload()
                });
                self.check("Failed to delete the table", result);
            }
            PendingAction::Import(path) => {
                let result = self.import_bundle(&path);
                if self.check("Import failed", result).is_some() {
                    self.message_overlay.set_message(format!("Imported {}", path.display()));
                }
            }
        }
    }

    fn apply_table_form(&mut self, schema: TableSchema, is_edit: bool) {
        let name = schema.table_name.clone();
        let result = if is_edit {
            self.store.update_schema(schema).map(|_| ())
        } else {
            self.store.create_table(schema)
        };
        if self.check("Failed to save the table", result).is_some() {
            let result = self.select_table(&name);
            self.check("Failed to open table", result);
        }
    }

    fn poll_gamepad(&mut self) -> Vec<InputEvent> {
        match self.controller.as_mut() {
            Some(source) => self.gamepad.poll(source.as_mut()),
            None => Vec::new(),
        }
    }
}

impl eframe::App for ComboApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        let elapsed = self.last_frame.map(|prev| now.duration_since(prev)).unwrap_or_default();
        self.last_frame = Some(now);
        if self.recorder.tick(elapsed) {
            ctx.request_repaint();
        }

        let gamepad_events = self.poll_gamepad();
        self.player.update();

        let dark_mode = ctx.theme() == egui::Theme::Dark;
        if dark_mode != self.settings.dark_mode {
            self.settings.dark_mode = dark_mode;
            self.save_settings();
        }

        if let Some(action) = TopBar::show(
            ctx,
            &self.theme,
            &self.schemas,
            &self.active_table,
            self.player.is_connected(),
            self.memo_panel.open,
        ) {
            self.handle_top_bar(action);
        }

        // Must run before any text field so it can take the key events.
        if self.recorder.is_recording() {
            if let Some(done) = self.modals.recorder.show(
                ctx,
                &mut self.recorder,
                &self.settings,
                &self.theme,
                gamepad_events.clone(),
            ) {
                let next = self.grid.write_commands(
                    done.target_cell,
                    &done.commands,
                    &self.settings.actions,
                );
                self.editor.selected = next.min(self.grid.len().saturating_sub(1));
            }
        }

        let position = self.player.position();
        let connected = self.player.is_connected();
        let action = self.memo_panel.show(ctx, &self.theme, &self.memos, position, connected);
        if let Some(action) = action {
            self.handle_memo(action);
        }

        if let Some(action) = self.editor.show(ctx, &self.grid, &self.theme, &self.active_table) {
            self.handle_editor(action, ctx);
        }

        let others: Vec<String> = self
            .schemas
            .iter()
            .map(|schema| schema.table_name.clone())
            .filter(|name| *name != self.active_table)
            .collect();
        let active = self.schemas.iter().find(|schema| schema.table_name == self.active_table);
        let records_action = match active {
            Some(schema) => {
                self.records_table.show(ctx, &self.theme, schema, &self.records, &others)
            }
            None => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.centered_and_justified(|ui| {
                        ui.label("No tables. Create one from the Table menu.");
                    });
                });
                None
            }
        };
        if let Some(action) = records_action {
            self.handle_records(action);
        }

        if let Some((schema, is_edit)) = self.modals.table_form.show(ctx) {
            self.apply_table_form(schema, is_edit);
        }
        if let Some(request) = self.modals.transfer.show(ctx) {
            let result = self.run_transfer(request);
            self.check("Transfer failed", result);
        }
        if let Some(action) = self.modals.confirm.show(ctx) {
            self.run_pending(action);
        }
        if let Some(settings) = self.modals.settings.show(ctx, &gamepad_events) {
            self.apply_settings(settings);
        }
        let listening = self.recorder.is_recording() || self.modals.settings.is_open();
        if listening && self.controller.is_some() {
            ctx.request_repaint();
        }

        self.message_overlay.show(ctx, &self.theme);
        self.modals.error.show(ctx);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        core::CommittedCommand,
        player::PlayerStatus,
    };

    struct NoPlayer;

    impl VideoPlayer for NoPlayer {
        fn name(&self) -> &str {
            "none"
        }

        fn is_available(&self) -> bool {
            false
        }

        fn load(&mut self, _video_id: &str, _start: f64) -> Result<(), ComboError> {
            Err(ComboError::Player("unavailable".into()))
        }

        fn seek(&mut self, _seconds: f64) -> Result<(), ComboError> {
            Err(ComboError::Player("unavailable".into()))
        }

        fn set_paused(&mut self, _paused: bool) -> Result<(), ComboError> {
            Err(ComboError::Player("unavailable".into()))
        }

        fn state(&mut self) -> Result<PlayerStatus, ComboError> {
            Ok(PlayerStatus::default())
        }
    }

    fn app(dir: &Path) -> ComboApp {
        ComboApp::with_player(dir.to_path_buf(), SettingsData::new(), Box::new(NoPlayer))
    }

    fn write_combo(app: &mut ComboApp, parts: &[&str]) {
        let commands: Vec<_> = parts.iter().map(|p| CommittedCommand::new(*p, None)).collect();
        app.grid.write_commands(0, &commands, &app.settings.actions);
    }

    #[test]
    fn test_fresh_start_opens_default_table() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        assert_eq!(app.active_table(), "Combos");
        assert!(app.records().is_empty());
        assert!(!app.modals.error.is_open());
    }

    #[test]
    fn test_save_then_edit_keeps_created_date() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());

        write_combo(&mut app, &["5K", "2D", "6HS"]);
        let id = app.save_grid().unwrap();
        assert!(app.grid().is_empty());

        assert_eq!(app.records()[0].get("combo"), Some(&json!("5K > 2D > 6HS")));
        assert_eq!(app.records()[0].get("starter"), Some(&json!("5K")));
        let mut row = app.records()[0].clone();
        row.insert("created".into(), json!("2001-01-01 00:00"));
        app.store.update_record("Combos", row).unwrap();

        app.edit_record(id).unwrap();
        assert_eq!(app.grid().merged_text(), "5K > 2D > 6HS");
        app.grid.set_text(0, "c.S", &app.settings.actions);
        assert_eq!(app.save_grid().unwrap(), id);

        assert_eq!(app.records().len(), 1);
        assert_eq!(app.records()[0].get("combo"), Some(&json!("c.S > 2D > 6HS")));
        assert_eq!(app.records()[0].get("created"), Some(&json!("2001-01-01 00:00")));
    }

    #[test]
    fn test_transfer_with_dropped_columns_waits_for_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());

        write_combo(&mut app, &["5P"]);
        let id = app.save_grid().unwrap();

        let slim = TableSchema::new(
            "Slim",
            vec![crate::store::Column::new("c", "Combo")],
            "c",
        );
        app.store.create_table(slim).unwrap();
        app.reload().unwrap();

        app.request_transfer(vec![id], "Slim".into(), TransferMode::Move).unwrap();
        assert_eq!(app.records().len(), 1);

        app.run_transfer(TransferRequest {
            ids: vec![id],
            source: "Combos".into(),
            destination: "Slim".into(),
            copy: false,
            dropped: vec!["Starter".into()],
        })
        .unwrap();
        assert!(app.records().is_empty());

        app.select_table("Slim").unwrap();
        assert_eq!(app.records()[0].get("c"), Some(&json!("5P")));
    }

    #[test]
    fn test_selected_table_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut app = app(dir.path());
            let schema = TableSchema { table_name: "Sol".into(), ..TableSchema::default_table() };
            app.apply_table_form(schema, false);
            assert_eq!(app.active_table(), "Sol");
        }

        let settings = SettingsData::load_from(dir.path());
        let reopened =
            ComboApp::with_player(dir.path().to_path_buf(), settings, Box::new(NoPlayer));
        assert_eq!(reopened.active_table(), "Sol");
    }

    #[test]
    fn test_import_adopts_bundle_settings() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        write_combo(&mut app, &["2K"]);
        let id = app.save_grid().unwrap();

        app.settings.merge_separator = " , ".into();
        let backup = app.export_bundle(dir.path()).unwrap();

        app.settings.merge_separator = " > ".into();
        app.delete_records(&[id]).unwrap();
        assert!(app.records().is_empty());

        app.import_bundle(&backup).unwrap();
        assert_eq!(app.records().len(), 1);
        assert_eq!(app.settings.merge_separator, " , ");
        assert_eq!(app.grid().separator(), " , ");
    }
}
