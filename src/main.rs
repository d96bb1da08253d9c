use comboscribe::gui::ComboApp;
use eframe::egui;
use tracing_subscriber::EnvFilter;

fn main() -> eframe::Result {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("comboscribe=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Comboscribe")
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([720.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native("Comboscribe", options, Box::new(|cc| Ok(Box::new(ComboApp::new(cc)))))
}
