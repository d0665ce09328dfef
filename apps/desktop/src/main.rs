mod session;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    api::LoadSource,
    config::load_settings,
    devices::commit_name_edit,
    prefs::{FilePreferences, PreferenceStore, LAST_FILENAME_KEY},
    Command, CommandDispatcher, DashboardState, HttpBackendApi, WsTransport,
};
use shared::{domain::DeviceId, protocol::ClientEmit};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::session::Session;

#[derive(Parser, Debug)]
#[command(about = "Streams the ClassQuiz hub log and runs one-shot commands")]
struct Cli {
    /// Hub base url; overrides dashboard.toml and DASHBOARD_SERVER_URL.
    #[arg(long)]
    server_url: Option<String>,
    /// Directory for configuration files downloaded from the hub.
    #[arg(long)]
    download_dir: Option<PathBuf>,
    /// Hide DEBUG entries from the printed log.
    #[arg(long)]
    hide_debug: bool,
    /// Only print log lines containing this text (case-insensitive).
    #[arg(long)]
    filter: Option<String>,
    /// How long to collect roster and configuration events before a command.
    #[arg(long, default_value_t = 1500)]
    settle_ms: u64,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Stream the dashboard log until Ctrl-C.
    Monitor,
    Discover,
    Connect {
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        pin: Option<String>,
        #[arg(long)]
        timeout: Option<String>,
    },
    Save {
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        pin: Option<String>,
        #[arg(long)]
        timeout: Option<String>,
        /// Base name without extension; defaults to the last used filename.
        #[arg(long)]
        filename: Option<String>,
    },
    Load {
        /// Name of a configuration file known to the hub.
        #[arg(long, conflicts_with = "file")]
        filename: Option<String>,
        /// Local CSV file to upload.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    Finalize,
    Rename {
        device_id: String,
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(server_url) = cli.server_url.clone() {
        settings.server_url = server_url;
    }
    if let Some(dir) = cli.download_dir.clone() {
        settings.download_dir = Some(dir);
    }

    let prefs = FilePreferences::in_config_dir();
    let mut state = DashboardState::new();
    if let Some(filename) = prefs.as_ref().and_then(|prefs| prefs.get(LAST_FILENAME_KEY)) {
        state.remember_filename(&filename);
    }
    if cli.hide_debug {
        state.set_debug_logs_visible(false);
    }
    if let Some(filter) = cli.filter.as_deref() {
        state.set_log_search(filter);
    }

    let api = HttpBackendApi::new(&settings.server_url)
        .with_context(|| format!("invalid server url '{}'", settings.server_url))?;
    let policy = settings.reconnect_policy();
    let (transport, events) = WsTransport::connect(&settings.server_url, policy)
        .context("failed to start realtime transport")?;
    let (outcome_tx, outcomes) = mpsc::unbounded_channel();
    let dispatcher = CommandDispatcher::new(
        Arc::new(api),
        Arc::new(transport),
        outcome_tx,
        settings.resolved_download_dir(),
    );

    let mut session = Session::new(state, dispatcher, events, outcomes);
    session.dispatch(Command::FetchConfig);
    session.settle(Duration::from_millis(cli.settle_ms)).await;

    let command = match cli.command {
        CliCommand::Monitor => return session.monitor().await,
        CliCommand::Discover => Command::Discover,
        CliCommand::Connect { url, pin, timeout } => {
            let form = session.state.form_mut();
            override_field(&mut form.url, url);
            override_field(&mut form.pin, pin);
            override_field(&mut form.timeout, timeout);
            Command::ConnectClassQuiz(session.state.form().connect_request()?)
        }
        CliCommand::Save {
            url,
            pin,
            timeout,
            filename,
        } => {
            let form = session.state.form_mut();
            override_field(&mut form.url, url);
            override_field(&mut form.pin, pin);
            override_field(&mut form.timeout, timeout);
            override_field(&mut form.filename, filename);
            Command::SaveAll(session.state.form().save_request(session.state.devices())?)
        }
        CliCommand::Load {
            file: Some(path), ..
        } => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("could not read '{}'", path.display()))?;
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "configuration.csv".to_string());
            Command::LoadConfig(LoadSource::Upload { filename, bytes })
        }
        CliCommand::Load { filename, file: None } => {
            override_field(&mut session.state.form_mut().filename, filename);
            Command::LoadConfig(session.state.form().load_request()?)
        }
        CliCommand::Finalize => Command::Emit(ClientEmit::FinalizeVote),
        CliCommand::Rename { device_id, name } => {
            let device_id = DeviceId::new(device_id);
            let emit = commit_name_edit(&mut session.state, &device_id, &name).with_context(|| {
                format!("'{device_id}' is not on the roster or the name is blank or unchanged")
            })?;
            Command::Emit(emit)
        }
    };

    let is_emit = matches!(command, Command::Emit(_));
    session.run(command).await?;
    if is_emit {
        // Emits are queued on the transport; give it a moment to write them.
        session.settle(Duration::from_millis(500)).await;
    }

    if let (Some(prefs), Some(filename)) = (prefs.as_ref(), session.state.last_filename()) {
        prefs
            .set(LAST_FILENAME_KEY, filename)
            .context("failed to remember last filename")?;
    }
    Ok(())
}

fn override_field(field: &mut String, value: Option<String>) {
    if let Some(value) = value {
        *field = value;
    }
}
