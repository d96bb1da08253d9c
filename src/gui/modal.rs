use eframe::egui;

/// A blocking dialog holding an editable copy of `T` until it is confirmed.
pub struct Modal<T> {
    open: bool,
    title: String,
    width: f32,
    pub data: T,
}

#[derive(Debug, Clone)]
pub enum ModalResult<T> {
    Confirmed(T),
    Cancelled,
}

impl<T: Default> Modal<T> {
    pub fn new(title: impl Into<String>) -> Self {
        Self::new_with_data(title, T::default())
    }
}

impl<T> Modal<T> {
    pub fn new_with_data(title: impl Into<String>, data: T) -> Self {
        Self { open: false, title: title.into(), width: 420.0, data }
    }

    pub fn with_width(mut self, width: f32) -> Self {
        self.width = width;
        self
    }

    pub fn open_with(&mut self, data: T) {
        self.data = data;
        self.open = true;
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Draws the dialog. `content` returns a result to close it; Escape or a
    /// click outside counts as cancel.
    pub fn show<F>(&mut self, ctx: &egui::Context, content: F) -> Option<ModalResult<T>>
    where
        F: FnOnce(&mut egui::Ui, &mut T) -> Option<ModalResult<T>>,
        T: Clone,
    {
        if !self.open {
            return None;
        }

        let id = egui::Id::new(("modal", self.title.as_str()));
        let mut result = None;
        let response = egui::Modal::new(id).show(ctx, |ui| {
            ui.set_width(self.width);
            ui.heading(&self.title);
            ui.add_space(8.0);
            result = content(ui, &mut self.data);
        });

        if result.is_none() && response.should_close() {
            result = Some(ModalResult::Cancelled);
        }
        if result.is_some() {
            self.open = false;
        }
        result
    }
}

/// Right-aligned confirm/cancel row. `Some(true)` on confirm, `Some(false)` on cancel.
pub fn dialog_buttons(
    ui: &mut egui::Ui,
    confirm_text: &str,
    cancel_text: &str,
    confirm_enabled: bool,
) -> Option<bool> {
    ui.add_space(10.0);
    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
        if ui.add_enabled(confirm_enabled, egui::Button::new(confirm_text)).clicked() {
            Some(true)
        } else if ui.button(cancel_text).clicked() {
            Some(false)
        } else {
            None
        }
    })
    .inner
}

/// Yes/no prompt carrying the action to run once confirmed.
pub struct ConfirmModal<A> {
    modal: Modal<Option<A>>,
    message: String,
}

impl<A: Clone> ConfirmModal<A> {
    pub fn new() -> Self {
        Self { modal: Modal::new_with_data("Confirm", None), message: String::new() }
    }

    pub fn ask(&mut self, title: impl Into<String>, message: impl Into<String>, action: A) {
        self.modal.set_title(title);
        self.message = message.into();
        self.modal.open_with(Some(action));
    }

    pub fn show(&mut self, ctx: &egui::Context) -> Option<A> {
        let message = &self.message;
        match self.modal.show(ctx, |ui, action| {
            ui.label(message.as_str());
            match dialog_buttons(ui, "Continue", "Cancel", true)? {
                true => Some(ModalResult::Confirmed(action.clone())),
                false => Some(ModalResult::Cancelled),
            }
        })? {
            ModalResult::Confirmed(action) => action,
            ModalResult::Cancelled => None,
        }
    }
}

impl<A: Clone> Default for ConfirmModal<A> {
    fn default() -> Self {
        Self::new()
    }
}
