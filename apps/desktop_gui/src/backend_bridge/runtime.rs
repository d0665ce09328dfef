//! Backend worker: owns the tokio runtime, the realtime transport and the
//! command dispatcher, and forwards everything they produce to the UI.

use std::{path::Path, sync::Arc, thread};

use client_core::{
    api::LoadSource,
    config::Settings,
    dispatcher::{CommandKind, CommandOutcome},
    Command, CommandDispatcher, HttpBackendApi, TransportEvent, WsTransport,
};
use crossbeam_channel::{Receiver, Sender};
use tokio::sync::{broadcast, mpsc};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{UiError, UiErrorContext, UiEvent};

pub fn launch(settings: Settings, cmd_rx: Receiver<BackendCommand>, ui_tx: Sender<UiEvent>) {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                    UiErrorContext::BackendStartup,
                    format!("failed to build backend runtime: {err}"),
                )));
                tracing::error!("failed to build backend runtime: {err}");
                return;
            }
        };

        runtime.block_on(run_backend(settings, cmd_rx, ui_tx));
    });
}

async fn run_backend(
    settings: Settings,
    cmd_rx: Receiver<BackendCommand>,
    ui_tx: Sender<UiEvent>,
) {
    let api = match HttpBackendApi::new(&settings.server_url) {
        Ok(api) => api,
        Err(err) => {
            report_startup_failure(&ui_tx, err.to_string());
            return;
        }
    };
    let policy = settings.reconnect_policy();
    let (transport, transport_rx) = match WsTransport::connect(&settings.server_url, policy) {
        Ok(pair) => pair,
        Err(err) => {
            report_startup_failure(&ui_tx, err.to_string());
            return;
        }
    };

    let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
    let dispatcher = CommandDispatcher::new(
        Arc::new(api),
        Arc::new(transport),
        outcome_tx,
        settings.resolved_download_dir(),
    );
    tokio::spawn(forward_transport_events(transport_rx, ui_tx.clone()));
    tokio::spawn(forward_outcomes(outcome_rx, ui_tx.clone()));

    tracing::info!(server_url = %settings.server_url, "backend worker ready");
    let _ = ui_tx.try_send(UiEvent::BackendReady);
    dispatcher.dispatch(Command::FetchConfig);

    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            BackendCommand::Dispatch(command) => {
                dispatcher.dispatch(command);
            }
            BackendCommand::UploadConfig { path } => {
                let dispatcher = dispatcher.clone();
                let ui_tx = ui_tx.clone();
                tokio::spawn(async move {
                    match read_upload(&path).await {
                        Ok(source) => {
                            dispatcher.dispatch(Command::LoadConfig(source));
                        }
                        Err(err) => {
                            let _ = ui_tx.try_send(UiEvent::Outcome(CommandOutcome {
                                kind: CommandKind::Load,
                                result: Err(err),
                            }));
                        }
                    }
                });
            }
        }
    }
    tracing::info!("ui command queue closed; backend worker exiting");
}

fn report_startup_failure(ui_tx: &Sender<UiEvent>, message: String) {
    tracing::error!("backend worker startup failure: {message}");
    let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
        UiErrorContext::BackendStartup,
        message,
    )));
}

async fn read_upload(path: &Path) -> Result<LoadSource, String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|err| format!("could not read '{}': {err}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "configuration.csv".to_string());
    Ok(LoadSource::Upload { filename, bytes })
}

async fn forward_transport_events(
    mut transport_rx: broadcast::Receiver<TransportEvent>,
    ui_tx: Sender<UiEvent>,
) {
    loop {
        match transport_rx.recv().await {
            Ok(event) => {
                if ui_tx.send(UiEvent::Transport(event)).is_err() {
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "ui fell behind realtime events");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

async fn forward_outcomes(
    mut outcome_rx: mpsc::UnboundedReceiver<CommandOutcome>,
    ui_tx: Sender<UiEvent>,
) {
    while let Some(outcome) = outcome_rx.recv().await {
        if ui_tx.send(UiEvent::Outcome(outcome)).is_err() {
            return;
        }
    }
}
