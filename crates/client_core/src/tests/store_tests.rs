use super::*;

use shared::{
    domain::DeviceStatus,
    protocol::{
        decode_server_frame, AnswerPayload, CountdownPayload, DevicesPayload, LoadConfigResponse,
        QuestionPayload, RemoteConfig,
    },
};

use crate::{api::LoadSource, dispatcher::SaveReceipt, question::AnswerState};

fn roster(ids: &[&str]) -> Vec<DeviceRecord> {
    ids.iter()
        .map(|id| DeviceRecord::new(*id, "", DeviceStatus::Online))
        .collect()
}

fn question(num_options: u32) -> QuestionPayload {
    QuestionPayload {
        index: 1,
        kind: "multiple".into(),
        num_options,
        timeout: None,
    }
}

fn answer(device: &str, value: &str) -> AnswerPayload {
    AnswerPayload {
        device_id: DeviceId::from(device),
        name: String::new(),
        answer: Some(value.into()),
        group: None,
        role: None,
    }
}

fn messages(state: &DashboardState) -> Vec<String> {
    state
        .logs()
        .entries()
        .map(|entry| entry.message.clone())
        .collect()
}

fn logged(state: &DashboardState, message: &str) -> bool {
    state.logs().entries().any(|entry| entry.message == message)
}

fn outcome(kind: CommandKind, result: Result<CommandSuccess, String>) -> CommandOutcome {
    CommandOutcome { kind, result }
}

#[test]
fn every_mutation_bumps_revision() {
    let mut state = DashboardState::new();
    let start = state.revision();
    state.replace_devices(roster(&["a"]));
    let after_roster = state.revision();
    assert!(after_roster > start);

    state.log(LogLevel::Info, "x");
    assert!(state.revision() > after_roster);
}

#[test]
fn roster_snapshot_replaces_previous_devices() {
    let mut state = DashboardState::new();
    state.replace_devices(roster(&["a", "b"]));
    state.apply_server_event(ServerEvent::DevicesUpdated(DevicesPayload {
        devices: Roster::from(roster(&["c"])),
    }));
    let ids: Vec<_> = state.devices().iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["c"]);
}

#[test]
fn replace_devices_collapses_duplicate_ids() {
    let mut state = DashboardState::new();
    state.replace_devices(vec![
        DeviceRecord::new("a", "first", DeviceStatus::Online),
        DeviceRecord::new("b", "", DeviceStatus::Online),
        DeviceRecord::new("a", "second", DeviceStatus::Registered),
    ]);
    assert_eq!(state.devices().len(), 2);
    assert_eq!(state.devices()[0].name, "second");
}

#[test]
fn rename_of_unknown_device_is_ignored() {
    let mut state = DashboardState::new();
    state.replace_devices(roster(&["a"]));
    let revision = state.revision();
    assert!(!state.update_device_name(&DeviceId::from("zz"), "Zed"));
    assert_eq!(state.revision(), revision);
}

#[test]
fn transport_lifecycle_is_logged_and_tracked() {
    let mut state = DashboardState::new();
    assert_eq!(state.connection(), ConnectionStatus::Disconnected);

    state.apply_transport(TransportEvent::Connected);
    assert_eq!(state.connection(), ConnectionStatus::Connected);

    state.apply_transport(TransportEvent::Disconnected {
        reason: "closed".into(),
    });
    assert_eq!(state.connection(), ConnectionStatus::Disconnected);
    state.apply_transport(TransportEvent::GaveUp { attempts: 5 });

    let levels: Vec<_> = state.logs().entries().map(|entry| entry.level).collect();
    assert_eq!(
        levels,
        vec![LogLevel::Info, LogLevel::Warning, LogLevel::Error]
    );
    assert_eq!(messages(&state)[0], "Connected to server");
}

#[test]
fn malformed_frames_become_warnings() {
    let mut state = DashboardState::new();
    state.apply_transport(TransportEvent::Malformed {
        raw: "{".into(),
        error: "EOF".into(),
    });
    let entry = state.logs().entries().next().expect("entry");
    assert_eq!(entry.level, LogLevel::Warning);
    assert!(entry.message.contains("EOF"));
}

#[test]
fn hub_log_keeps_its_timestamp() {
    let mut state = DashboardState::new();
    let event = decode_server_frame(
        r#"{"event":"log","data":{"level":"DEBUG","msg":"raw","timestamp":"08:00:00"}}"#,
    )
    .expect("frame");
    state.apply_server_event(event);
    let entry = state.logs().entries().next().expect("entry");
    assert_eq!(entry.timestamp, "08:00:00");
    assert_eq!(entry.level, LogLevel::Debug);
}

#[test]
fn question_flow_from_idle_to_idle() {
    let mut state = DashboardState::new();
    state.replace_devices(roster(&["a", "b", "c"]));

    state.apply_server_event(ServerEvent::NewQuestion(question(4)));
    let active = state.question().active().expect("active");
    assert_eq!(active.rows().len(), 3);
    assert!(active
        .rows()
        .iter()
        .all(|row| row.answer == AnswerState::Awaiting));
    assert!(logged(&state, "New question: multiple with 4 options"));

    state.apply_server_event(ServerEvent::AnswerReceived(answer("b", "C")));
    let active = state.question().active().expect("active");
    assert_eq!(active.rows()[1].answer.label(), "C");
    assert_eq!(active.rows()[0].answer, AnswerState::Awaiting);
    assert_eq!(active.rows()[2].answer, AnswerState::Awaiting);

    assert_eq!(state.finalize_question(), Some(ClientEmit::FinalizeVote));
    assert!(!state.question().is_active());
    assert!(logged(&state, "Vote finalized manually"));
}

#[test]
fn answer_from_unknown_device_is_logged_but_adds_no_row() {
    let mut state = DashboardState::new();
    state.replace_devices(roster(&["a"]));
    state.apply_server_event(ServerEvent::NewQuestion(question(2)));

    state.apply_server_event(ServerEvent::AnswerReceived(answer("ghost", "A")));

    let active = state.question().active().expect("active");
    assert_eq!(active.rows().len(), 1);
    assert_eq!(active.answered_count(), 0);
    let logged = messages(&state);
    assert!(logged.iter().any(|m| m.starts_with("Answer received")));
}

#[test]
fn zero_countdown_keeps_question_open() {
    let mut state = DashboardState::new();
    state.replace_devices(roster(&["a"]));
    state.apply_server_event(ServerEvent::NewQuestion(question(2)));

    state.apply_server_event(ServerEvent::Countdown(CountdownPayload { seconds: 0 }));

    let active = state.question().active().expect("still active");
    assert_eq!(active.countdown_label(), "Complete");
}

#[test]
fn countdown_without_question_changes_nothing() {
    let mut state = DashboardState::new();
    let revision = state.revision();
    state.apply_server_event(ServerEvent::Countdown(CountdownPayload { seconds: 9 }));
    assert_eq!(state.revision(), revision);
    assert!(!state.question().is_active());
}

#[test]
fn finalize_while_idle_emits_nothing() {
    let mut state = DashboardState::new();
    assert_eq!(state.finalize_question(), None);
}

#[test]
fn debug_toggle_restores_visible_list_and_logs_change() {
    let mut state = DashboardState::new();
    state.log(LogLevel::Debug, "d1");
    state.log(LogLevel::Info, "i1");

    state.set_debug_logs_visible(false);
    assert!(state
        .logs()
        .displayed()
        .all(|entry| entry.level != LogLevel::Debug));
    state.set_debug_logs_visible(true);

    let shown: Vec<_> = state
        .logs()
        .displayed()
        .map(|entry| entry.message.clone())
        .collect();
    assert_eq!(
        shown,
        vec!["d1", "i1", "DEBUG logs disabled", "DEBUG logs enabled"]
    );
}

#[test]
fn config_loaded_event_fills_form_and_roster() {
    let mut state = DashboardState::new();
    let event = decode_server_frame(
        r#"{"event":"config_cargada","data":{"url":"http://quiz","pin":1234,"timeout":45,
            "alumnos":[{"id":"a","nombre":"Ana"},{"id":"b","nombre":"Bea"}]}}"#,
    )
    .expect("frame");
    state.apply_server_event(event);

    assert_eq!(state.form().url, "http://quiz");
    assert_eq!(state.form().pin, "1234");
    assert_eq!(state.form().timeout, "45");
    assert_eq!(state.devices().len(), 2);
    assert!(logged(&state, "2 students loaded into table"));
}

#[test]
fn connect_banner_hides_after_success_delay() {
    let mut state = DashboardState::new();
    let request = shared::protocol::ConnectRequest {
        url: "http://quiz".into(),
        pin: "1".into(),
        timeout: None,
    };
    let now = Instant::now();
    state.note_dispatched(&Command::ConnectClassQuiz(request));
    assert_eq!(
        state.connect_banner(now).map(|b| b.text.as_str()),
        Some("Connecting...")
    );

    state.apply_outcome_at(
        outcome(CommandKind::Connect, Ok(CommandSuccess::Connected { count: 3 })),
        now,
    );
    let banner = state.connect_banner(now).expect("banner");
    assert_eq!(banner.severity, Severity::Success);
    assert!(banner.text.contains("3 device(s)"));
    assert!(state
        .connect_banner(now + CONNECT_BANNER_TTL)
        .is_none());
}

#[test]
fn connect_failure_keeps_error_banner() {
    let mut state = DashboardState::new();
    let now = Instant::now();
    state.apply_outcome_at(
        outcome(CommandKind::Connect, Err("Port not connected".into())),
        now,
    );
    let later = now + Duration::from_secs(60);
    let banner = state.connect_banner(later).expect("banner");
    assert_eq!(banner.severity, Severity::Error);
    assert!(state.alert().is_none());
}

#[test]
fn save_success_remembers_filename_and_alerts() {
    let mut state = DashboardState::new();
    state.apply_outcome(outcome(
        CommandKind::Save,
        Ok(CommandSuccess::Saved(SaveReceipt {
            filename: "aula".into(),
            location: "data/aula.csv".into(),
            students_saved: 3,
        })),
    ));
    assert_eq!(state.last_filename(), Some("aula"));
    let alert = state.dismiss_alert().expect("alert");
    assert_eq!(alert.severity, Severity::Success);
    assert!(alert.message.contains("Config + 3 students"));
    assert!(state.alert().is_none());
}

#[test]
fn save_failure_raises_error_alert() {
    let mut state = DashboardState::new();
    state.apply_outcome(outcome(CommandKind::Save, Err("disk full".into())));
    assert_eq!(state.alert().map(|a| a.severity), Some(Severity::Error));
    assert_eq!(state.last_filename(), None);
    let last = state.logs().entries().last().expect("entry");
    assert_eq!(last.level, LogLevel::Error);
}

#[test]
fn named_load_merges_form_and_remembers_filename() {
    let mut state = DashboardState::new();
    state.form_mut().pin = "keep".into();
    state.apply_outcome(outcome(
        CommandKind::Load,
        Ok(CommandSuccess::Loaded {
            filename: Some("aula".into()),
            response: LoadConfigResponse {
                status: "ok".into(),
                file: Some("data/aula.csv".into()),
                url: Some("http://quiz".into()),
                timeout: Some(20),
                students_loaded: Some(2),
                ..LoadConfigResponse::default()
            },
        }),
    ));
    assert_eq!(state.form().url, "http://quiz");
    assert_eq!(state.form().pin, "keep");
    assert_eq!(state.form().timeout, "20");
    assert_eq!(state.last_filename(), Some("aula"));
    assert!(logged(&state, "Config loaded + 2 students"));
}

#[test]
fn upload_load_leaves_last_filename_alone() {
    let mut state = DashboardState::new();
    state.remember_filename("previous");
    let source = LoadSource::Upload {
        filename: "other.csv".into(),
        bytes: Vec::new(),
    };
    state.note_dispatched(&Command::LoadConfig(source));
    state.apply_outcome(outcome(
        CommandKind::Load,
        Ok(CommandSuccess::Loaded {
            filename: None,
            response: LoadConfigResponse::default(),
        }),
    ));
    assert_eq!(state.last_filename(), Some("previous"));
    assert!(logged(&state, "Loading from file: other.csv"));
}

#[test]
fn failed_config_fetch_is_only_a_warning() {
    let mut state = DashboardState::new();
    state.apply_outcome(outcome(
        CommandKind::FetchConfig,
        Err("connection refused".into()),
    ));
    assert!(state.alert().is_none());
    let entry = state.logs().entries().next().expect("entry");
    assert_eq!(entry.level, LogLevel::Warning);
}

#[test]
fn fetched_config_prefills_inputs() {
    let mut state = DashboardState::new();
    state.apply_outcome(outcome(
        CommandKind::FetchConfig,
        Ok(CommandSuccess::ConfigFetched(RemoteConfig {
            url: Some("http://quiz".into()),
            pin: Some("99".into()),
            timeout: None,
        })),
    ));
    assert_eq!(state.form().url, "http://quiz");
    assert_eq!(state.form().pin, "99");
    assert_eq!(state.form().timeout, "");
}

#[test]
fn failed_emit_is_logged_as_error() {
    let mut state = DashboardState::new();
    state.apply_outcome(outcome(
        CommandKind::Emit("update_name"),
        Err("realtime channel is closed".into()),
    ));
    let entry = state.logs().entries().next().expect("entry");
    assert_eq!(entry.level, LogLevel::Error);
    assert!(entry.message.contains("update_name"));
}

#[test]
fn remember_filename_ignores_empty_value() {
    let mut state = DashboardState::new();
    state.remember_filename("");
    assert_eq!(state.last_filename(), None);
    state.remember_filename("aula");
    assert_eq!(state.form().filename, "aula");
}

#[test]
fn rejected_input_alerts_without_touching_form() {
    let mut state = DashboardState::new();
    state.form_mut().timeout = "301".into();
    state.reject_input(&crate::dispatcher::ValidationError::InvalidTimeout);
    assert_eq!(state.form().timeout, "301");
    assert_eq!(state.alert().map(|a| a.severity), Some(Severity::Info));
}

#[test]
fn unchanged_form_copy_does_not_bump_revision() {
    let mut state = DashboardState::new();
    let revision = state.revision();
    assert!(!state.update_form(state.form().clone()));
    assert_eq!(state.revision(), revision);

    let mut draft = state.form().clone();
    draft.pin = "123456".into();
    assert!(state.update_form(draft));
    assert_eq!(state.form().pin, "123456");
    assert_eq!(state.revision(), revision + 1);
}
