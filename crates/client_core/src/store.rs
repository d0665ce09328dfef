//! Client state store: the single owned value renderers read from.
//!
//! All mutation goes through `&mut DashboardState` on one thread. Transport
//! events and command outcomes enter through [`DashboardState::apply_transport`]
//! and [`DashboardState::apply_outcome`]; every mutation bumps `revision`.

use std::time::{Duration, Instant};

use shared::{
    domain::{DeviceId, DeviceRecord, LogLevel},
    protocol::{ClientEmit, ConfigLoadedPayload, Roster, ServerEvent},
};
use tracing::debug;

use crate::{
    dispatcher::{
        Command, CommandKind, CommandOutcome, CommandSuccess, ConfigForm, ValidationError,
    },
    logs::{LogEntry, LogReconciler},
    question::{ActiveQuestion, QuestionPanel},
    transport::TransportEvent,
};

/// How long a successful connect banner stays up.
pub const CONNECT_BANNER_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    Connected,
    #[default]
    Disconnected,
}

impl ConnectionStatus {
    pub fn badge(self) -> &'static str {
        match self {
            Self::Connected => "🟢 Connected",
            Self::Disconnected => "🔴 Disconnected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

/// Blocking message the user has to acknowledge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectBanner {
    pub severity: Severity,
    pub text: String,
    hide_at: Option<Instant>,
}

impl ConnectBanner {
    pub fn is_visible(&self, now: Instant) -> bool {
        self.hide_at.map_or(true, |deadline| now < deadline)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    devices: Vec<DeviceRecord>,
    logs: LogReconciler,
    question: QuestionPanel,
    connection: ConnectionStatus,
    form: ConfigForm,
    alert: Option<Alert>,
    connect_banner: Option<ConnectBanner>,
    last_filename: Option<String>,
    revision: u64,
}

impl DashboardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    // Roster.

    pub fn devices(&self) -> &[DeviceRecord] {
        &self.devices
    }

    pub fn device(&self, id: &DeviceId) -> Option<&DeviceRecord> {
        self.devices.iter().find(|device| &device.id == id)
    }

    /// Discards the previous roster entirely, even rows being edited.
    pub fn replace_devices(&mut self, records: Vec<DeviceRecord>) {
        self.devices = Roster::from(records).into_records();
        self.touch();
    }

    /// Renames a known device. Returns `false` (and changes nothing) when the
    /// id is not on the current roster.
    pub fn update_device_name(&mut self, id: &DeviceId, name: &str) -> bool {
        let Some(device) = self.devices.iter_mut().find(|device| &device.id == id) else {
            debug!(device_id = %id, "ignoring rename for unknown device");
            return false;
        };
        device.name = name.to_string();
        self.touch();
        true
    }

    // Logs.

    pub fn logs(&self) -> &LogReconciler {
        &self.logs
    }

    pub fn append_log(&mut self, entry: LogEntry) {
        self.logs.push(entry);
        self.touch();
    }

    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        self.append_log(LogEntry::new(level, message, None));
    }

    pub fn clear_logs(&mut self) {
        self.logs.clear();
        self.touch();
    }

    pub fn set_debug_logs_visible(&mut self, visible: bool) {
        self.logs.set_debug_visible(visible);
        let state = if visible { "enabled" } else { "disabled" };
        self.log(LogLevel::Info, format!("DEBUG logs {state}"));
    }

    pub fn set_log_search(&mut self, query: &str) {
        self.logs.set_search(query);
        self.touch();
    }

    pub fn pause_auto_scroll(&mut self, now: Instant) {
        self.logs.pause_auto_scroll(now);
        self.touch();
    }

    // Question panel.

    pub fn question(&self) -> &QuestionPanel {
        &self.question
    }

    pub fn set_active_question(&mut self, question: Option<ActiveQuestion>) {
        self.question.set(question);
        self.touch();
    }

    /// User-confirmed finalize: closes the panel and returns the event for the hub.
    pub fn finalize_question(&mut self) -> Option<ClientEmit> {
        if !self.question.is_active() {
            return None;
        }
        self.question.clear();
        self.log(LogLevel::Info, "Vote finalized manually");
        Some(ClientEmit::FinalizeVote)
    }

    pub fn hide_question(&mut self) {
        self.set_active_question(None);
    }

    // Connection, form, notices.

    pub fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    pub fn form(&self) -> &ConfigForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut ConfigForm {
        self.touch();
        &mut self.form
    }

    /// Replaces the form with an edited copy. Returns `false`, leaving the
    /// revision untouched, when nothing changed.
    pub fn update_form(&mut self, form: ConfigForm) -> bool {
        if self.form == form {
            return false;
        }
        self.form = form;
        self.touch();
        true
    }

    pub fn alert(&self) -> Option<&Alert> {
        self.alert.as_ref()
    }

    pub fn dismiss_alert(&mut self) -> Option<Alert> {
        self.touch();
        self.alert.take()
    }

    pub fn connect_banner(&self, now: Instant) -> Option<&ConnectBanner> {
        self.connect_banner
            .as_ref()
            .filter(|banner| banner.is_visible(now))
    }

    pub fn last_filename(&self) -> Option<&str> {
        self.last_filename.as_deref()
    }

    /// Restores the persisted filename into state and the filename input.
    pub fn remember_filename(&mut self, filename: &str) {
        if filename.is_empty() {
            return;
        }
        self.last_filename = Some(filename.to_string());
        self.form.filename = filename.to_string();
        self.touch();
    }

    /// Input that failed client-side validation: nothing was sent.
    pub fn reject_input(&mut self, err: &ValidationError) {
        self.log(LogLevel::Warning, err.to_string());
        self.raise_alert(Severity::Info, err.to_string());
    }

    fn raise_alert(&mut self, severity: Severity, message: impl Into<String>) {
        self.alert = Some(Alert {
            severity,
            message: message.into(),
        });
        self.touch();
    }

    fn show_connect_banner(&mut self, severity: Severity, text: String, hide_at: Option<Instant>) {
        self.connect_banner = Some(ConnectBanner {
            severity,
            text,
            hide_at,
        });
        self.touch();
    }

    // Inbound events.

    pub fn apply_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                self.connection = ConnectionStatus::Connected;
                self.log(LogLevel::Info, "Connected to server");
            }
            TransportEvent::Disconnected { reason } => {
                self.connection = ConnectionStatus::Disconnected;
                self.log(
                    LogLevel::Warning,
                    format!("Disconnected from server: {reason}"),
                );
            }
            TransportEvent::GaveUp { attempts } => {
                self.connection = ConnectionStatus::Disconnected;
                self.log(
                    LogLevel::Error,
                    format!("Server unreachable after {attempts} attempts"),
                );
            }
            TransportEvent::Server(event) => self.apply_server_event(event),
            TransportEvent::Malformed { error, .. } => {
                self.log(
                    LogLevel::Warning,
                    format!("Ignored malformed event: {error}"),
                );
            }
        }
    }

    pub fn apply_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Log(payload) => {
                self.append_log(LogEntry::new(payload.level, payload.msg, payload.timestamp));
            }
            ServerEvent::DevicesUpdated(payload) => {
                self.devices = payload.devices.into_records();
                debug!(count = self.devices.len(), "roster replaced");
                self.touch();
            }
            ServerEvent::AnswerReceived(answer) => {
                self.log(
                    LogLevel::Info,
                    format!(
                        "Answer received: {} → {}",
                        answer.name,
                        answer.answer.as_deref().unwrap_or_default()
                    ),
                );
                if !self.question.record_answer(&answer) {
                    debug!(device_id = %answer.device_id, "answer has no row in the panel");
                }
            }
            ServerEvent::Countdown(countdown) => {
                if self.question.set_countdown(countdown.seconds) {
                    self.touch();
                } else {
                    debug!(
                        seconds = countdown.seconds,
                        "countdown with no active question"
                    );
                }
            }
            ServerEvent::NewQuestion(question) => {
                let headline = format!(
                    "New question: {} with {} options",
                    question.kind, question.num_options
                );
                let active = ActiveQuestion::start(question, &self.devices);
                self.set_active_question(Some(active));
                self.log(LogLevel::Info, headline);
            }
            ServerEvent::ConfigLoaded(payload) => self.apply_config_loaded(payload),
        }
    }

    fn apply_config_loaded(&mut self, payload: ConfigLoadedPayload) {
        self.log(LogLevel::Info, "Configuration loaded from CSV file");
        self.form.merge_remote(
            payload.url.as_deref(),
            payload.pin.as_deref(),
            payload.timeout,
        );
        if let Some(students) = payload.students {
            let count = students.len();
            self.replace_devices(students);
            self.log(
                LogLevel::Info,
                format!("{count} students loaded into table"),
            );
        }
    }

    // Command lifecycle.

    /// Records that a command is about to leave, before its outcome is known.
    pub fn note_dispatched(&mut self, command: &Command) {
        match command {
            Command::Discover => self.log(LogLevel::Info, "Starting device discovery..."),
            Command::ConnectClassQuiz(_) => {
                self.log(LogLevel::Info, "Connecting devices to ClassQuiz...");
                self.show_connect_banner(Severity::Info, "Connecting...".to_string(), None);
            }
            Command::SaveAll(request) => self.log(
                LogLevel::Info,
                format!("Saving to file: {}.csv", request.filename),
            ),
            Command::LoadConfig(source) => self.log(
                LogLevel::Info,
                format!("Loading from file: {}", source.display_name()),
            ),
            Command::FetchConfig | Command::Emit(_) => {}
        }
    }

    pub fn apply_outcome(&mut self, outcome: CommandOutcome) {
        self.apply_outcome_at(outcome, Instant::now());
    }

    pub fn apply_outcome_at(&mut self, outcome: CommandOutcome, now: Instant) {
        let kind = outcome.kind;
        let success = match outcome.result {
            Ok(success) => success,
            Err(err) => {
                self.apply_failure(kind, err);
                return;
            }
        };
        match success {
            CommandSuccess::Discovered => self.log(LogLevel::Info, "Discovery command sent"),
            CommandSuccess::Connected { count } => {
                self.log(
                    LogLevel::Info,
                    format!("Connection started for {count} device(s)"),
                );
                self.show_connect_banner(
                    Severity::Success,
                    format!("✅ {count} device(s) connecting..."),
                    Some(now + CONNECT_BANNER_TTL),
                );
            }
            CommandSuccess::Saved(receipt) => {
                self.log(LogLevel::Info, format!("✅ Saved to: {}", receipt.location));
                self.last_filename = Some(receipt.filename);
                self.raise_alert(
                    Severity::Success,
                    format!(
                        "✅ Saved to:\n{}\n\nConfig + {} students",
                        receipt.location, receipt.students_saved
                    ),
                );
            }
            CommandSuccess::Loaded { filename, response } => {
                let location = response.file.clone().unwrap_or_default();
                let loaded = response.students_loaded.unwrap_or_default();
                self.log(LogLevel::Info, format!("✅ Loaded from: {location}"));
                self.log(LogLevel::Info, format!("Config loaded + {loaded} students"));
                self.form.merge_remote(
                    response.url.as_deref(),
                    response.pin.as_deref(),
                    response.timeout,
                );
                if let Some(filename) = filename {
                    self.last_filename = Some(filename);
                }
                self.raise_alert(
                    Severity::Success,
                    format!("✅ File loaded:\n{location}\n\nConfig + {loaded} students"),
                );
            }
            CommandSuccess::ConfigFetched(config) => {
                self.form.merge_remote(
                    config.url.as_deref(),
                    config.pin.as_deref(),
                    config.timeout,
                );
                self.touch();
            }
            CommandSuccess::Emitted => {
                debug!(command = kind.name(), "event delivered to transport")
            }
        }
    }

    fn apply_failure(&mut self, kind: CommandKind, err: String) {
        match kind {
            CommandKind::Discover => {
                self.log(LogLevel::Error, format!("Discovery failed: {err}"));
            }
            CommandKind::Connect => {
                self.log(
                    LogLevel::Error,
                    format!("Error connecting to ClassQuiz: {err}"),
                );
                self.show_connect_banner(Severity::Error, format!("❌ {err}"), None);
            }
            CommandKind::Save => {
                self.log(LogLevel::Error, format!("Error saving: {err}"));
                self.raise_alert(Severity::Error, "❌ Error saving file");
            }
            CommandKind::Load => {
                self.log(LogLevel::Error, format!("Error loading: {err}"));
                self.raise_alert(Severity::Error, format!("❌ Error loading file:\n{err}"));
            }
            CommandKind::FetchConfig => {
                self.log(
                    LogLevel::Warning,
                    format!("Could not fetch initial configuration: {err}"),
                );
            }
            CommandKind::Emit(event) => {
                self.log(LogLevel::Error, format!("Failed to send {event}: {err}"));
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
