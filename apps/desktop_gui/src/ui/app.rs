use std::{collections::HashMap, fs, time::Instant};

use chrono::Utc;
use client_core::{
    devices::commit_name_edit,
    logs::export_filename,
    prefs::LAST_FILENAME_KEY,
    store::ConnectionStatus,
    Command, DashboardState, TransportEvent,
};
use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use shared::{
    domain::{DeviceId, LogLevel},
    protocol::ServerEvent,
};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{UiError, UiEvent};
use crate::controller::orchestration::dispatch_backend_command;
use crate::ui::panels::{self, PanelAction};

#[derive(Debug, Clone)]
pub struct StartupConfig {
    pub server_url: String,
    pub last_filename: Option<String>,
}

pub struct DashboardApp {
    state: DashboardState,
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    server_url: String,
    /// Queue and backend problems that are not part of the dashboard log.
    status: String,
    /// Cleared by a fatal backend error; command buttons are disabled until the backend is ready.
    backend_available: bool,
    name_edits: HashMap<DeviceId, String>,
    log_search: String,
    confirming_finalize: bool,
}

impl DashboardApp {
    pub fn new(
        startup: StartupConfig,
        cmd_tx: Sender<BackendCommand>,
        ui_rx: Receiver<UiEvent>,
    ) -> Self {
        let mut state = DashboardState::new();
        if let Some(filename) = startup.last_filename.as_deref() {
            state.remember_filename(filename);
        }
        state.log(LogLevel::Info, "Dashboard started");
        Self {
            state,
            cmd_tx,
            ui_rx,
            server_url: startup.server_url,
            status: String::new(),
            backend_available: false,
            name_edits: HashMap::new(),
            log_search: String::new(),
            confirming_finalize: false,
        }
    }

    fn process_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::BackendReady => {
                    self.status.clear();
                    self.backend_available = true;
                    tracing::debug!("backend worker reported ready");
                }
                UiEvent::Transport(event) => {
                    if matches!(
                        event,
                        TransportEvent::Server(ServerEvent::DevicesUpdated(_))
                            | TransportEvent::Server(ServerEvent::ConfigLoaded(_))
                    ) {
                        self.name_edits.clear();
                    }
                    if matches!(event, TransportEvent::Server(ServerEvent::NewQuestion(_))) {
                        self.confirming_finalize = false;
                    }
                    self.state.apply_transport(event);
                }
                UiEvent::Outcome(outcome) => self.state.apply_outcome(outcome),
                UiEvent::Error(err) => self.report_error(err),
            }
        }
    }

    fn report_error(&mut self, err: UiError) {
        if err.is_fatal() {
            self.backend_available = false;
        }
        self.status = err.display_message();
        self.state.log(LogLevel::Error, err.message().to_string());
    }

    fn queue(&mut self, command: BackendCommand) {
        if let Err(err) = dispatch_backend_command(&self.cmd_tx, command) {
            self.report_error(err);
        }
    }

    fn send(&mut self, command: Command) {
        self.state.note_dispatched(&command);
        self.queue(BackendCommand::Dispatch(command));
    }

    fn apply_action(&mut self, action: PanelAction) {
        match action {
            PanelAction::FormEdited(form) => {
                self.state.update_form(form);
            }
            PanelAction::Dispatch(command) => self.send(command),
            PanelAction::UploadConfig(path) => {
                let name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                self.state
                    .log(LogLevel::Info, format!("Loading from file: {name}"));
                self.queue(BackendCommand::UploadConfig { path });
            }
            PanelAction::Invalid(err) => self.state.reject_input(&err),
            PanelAction::CommitName { device_id, input } => {
                if let Some(emit) = commit_name_edit(&mut self.state, &device_id, &input) {
                    self.send(Command::Emit(emit));
                }
                self.name_edits.remove(&device_id);
            }
            PanelAction::RequestFinalize => self.confirming_finalize = true,
            PanelAction::CancelFinalize => self.confirming_finalize = false,
            PanelAction::ConfirmFinalize => {
                self.confirming_finalize = false;
                if let Some(emit) = self.state.finalize_question() {
                    self.send(Command::Emit(emit));
                }
            }
            PanelAction::HideQuestion => self.state.hide_question(),
            PanelAction::SetDebugVisible(visible) => self.state.set_debug_logs_visible(visible),
            PanelAction::SearchChanged(query) => self.state.set_log_search(&query),
            PanelAction::ClearLogs => self.state.clear_logs(),
            PanelAction::ExportLogs => self.export_logs(),
            PanelAction::PauseAutoScroll => self.state.pause_auto_scroll(Instant::now()),
            PanelAction::DismissAlert => {
                self.state.dismiss_alert();
            }
        }
    }

    fn export_logs(&mut self) {
        let suggested = export_filename(Utc::now());
        let Some(path) = rfd::FileDialog::new()
            .set_file_name(&suggested)
            .save_file()
        else {
            return;
        };
        match fs::write(&path, self.state.logs().export_text()) {
            Ok(()) => self.status = format!("Exported logs to {}", path.display()),
            Err(err) => {
                self.state
                    .log(LogLevel::Error, format!("Failed to export logs: {err}"));
            }
        }
    }

    fn show_top_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("ClassQuiz Dashboard");
                ui.separator();
                panels::connection_badge(ui, self.state.connection());
                ui.weak(&self.server_url);
                if !self.status.is_empty() {
                    ui.separator();
                    ui.label(&self.status);
                    if ui.small_button("✕").clicked() {
                        self.status.clear();
                    }
                }
            });
        });
    }

    fn show_workspace(&mut self, ctx: &egui::Context, actions: &mut Vec<PanelAction>) {
        let now = Instant::now();
        let devices = self.state.devices().to_vec();

        egui::SidePanel::left("config_panel")
            .resizable(true)
            .default_width(380.0)
            .show(ctx, |ui| {
                ui.heading("Configuration");
                panels::config_panel(
                    ui,
                    self.state.form(),
                    &devices,
                    self.state.connect_banner(now),
                    self.backend_available,
                    actions,
                );
                ui.separator();
                ui.heading("Devices");
                panels::device_table(ui, &devices, &mut self.name_edits, actions);
            });

        egui::TopBottomPanel::bottom("log_panel")
            .resizable(true)
            .default_height(240.0)
            .show(ctx, |ui| {
                ui.heading("Logs");
                panels::log_panel(ui, self.state.logs(), &mut self.log_search, now, actions);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Current question");
            panels::question_panel(ui, self.state.question(), self.confirming_finalize, actions);
        });

        panels::alert_window(ctx, self.state.alert(), actions);
    }
}

impl eframe::App for DashboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_ui_events();

        let mut actions = Vec::new();
        self.show_top_bar(ctx);
        self.show_workspace(ctx, &mut actions);
        for action in actions {
            self.apply_action(action);
        }

        if self.state.connection() == ConnectionStatus::Connected
            || self.state.question().is_active()
        {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        } else {
            ctx.request_repaint_after(std::time::Duration::from_millis(250));
        }
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        if let Some(filename) = self.state.last_filename() {
            storage.set_string(LAST_FILENAME_KEY, filename.to_string());
        }
    }
}
