mod backend_bridge;
mod controller;
mod ui;

use std::path::PathBuf;

use clap::Parser;
use client_core::{config::load_settings, prefs::LAST_FILENAME_KEY};
use crossbeam_channel::bounded;
use eframe::egui;
use tracing_subscriber::EnvFilter;

use crate::backend_bridge::{commands::BackendCommand, runtime};
use crate::controller::events::UiEvent;
use crate::ui::{DashboardApp, StartupConfig};

#[derive(Parser, Debug)]
#[command(about = "ClassQuiz classroom dashboard")]
struct Args {
    /// Hub base url; overrides dashboard.toml and DASHBOARD_SERVER_URL.
    #[arg(long)]
    server_url: Option<String>,
    /// Directory for configuration files downloaded from the hub.
    #[arg(long)]
    download_dir: Option<PathBuf>,
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut settings = load_settings();
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    if let Some(dir) = args.download_dir {
        settings.download_dir = Some(dir);
    }
    let server_url = settings.server_url.clone();

    let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(256);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(2048);
    runtime::launch(settings, cmd_rx, ui_tx);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("ClassQuiz Dashboard")
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([980.0, 640.0]),
        ..Default::default()
    };
    eframe::run_native(
        "ClassQuiz Dashboard",
        options,
        Box::new(move |cc| {
            let last_filename = cc
                .storage
                .and_then(|storage| storage.get_string(LAST_FILENAME_KEY))
                .filter(|name| !name.is_empty());
            Ok(Box::new(DashboardApp::new(
                StartupConfig {
                    server_url,
                    last_filename,
                },
                cmd_tx,
                ui_rx,
            )))
        }),
    )
}
