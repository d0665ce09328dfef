use super::*;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use shared::{
    domain::{DeviceId, DeviceStatus},
    error::ApiError,
    protocol::{SaveResponse, StatusResponse},
};
use tokio::sync::Mutex;

use crate::error::{ApiClientError, TransportError};

#[derive(Default)]
struct FakeApi {
    calls: Mutex<Vec<&'static str>>,
    fail_discover: bool,
    save_download: Option<Download>,
}

#[async_trait]
impl BackendApi for FakeApi {
    async fn fetch_config(&self) -> Result<RemoteConfig, ApiClientError> {
        self.calls.lock().await.push("config");
        Ok(RemoteConfig {
            url: Some("http://quiz".into()),
            pin: None,
            timeout: Some(40),
        })
    }

    async fn discover(&self) -> Result<StatusResponse, ApiClientError> {
        self.calls.lock().await.push("discover");
        if self.fail_discover {
            return Err(ApiError::new(400, "Port not connected").into());
        }
        Ok(StatusResponse {
            status: "ok".into(),
            ..StatusResponse::default()
        })
    }

    async fn connect_classquiz(
        &self,
        _request: &ConnectRequest,
    ) -> Result<StatusResponse, ApiClientError> {
        self.calls.lock().await.push("connect");
        Ok(StatusResponse {
            status: "ok".into(),
            count: Some(4),
            error: None,
        })
    }

    async fn save_all(&self, _request: &SaveAllRequest) -> Result<SaveAllReply, ApiClientError> {
        self.calls.lock().await.push("save");
        Ok(match &self.save_download {
            Some(download) => SaveAllReply::File(download.clone()),
            None => SaveAllReply::Json(SaveResponse {
                status: "ok".into(),
                file: Some("data/aula.csv".into()),
                students_saved: None,
                error: None,
            }),
        })
    }

    async fn load_config(
        &self,
        _source: &LoadSource,
    ) -> Result<LoadConfigResponse, ApiClientError> {
        self.calls.lock().await.push("load");
        Ok(LoadConfigResponse {
            status: "ok".into(),
            students_loaded: Some(2),
            ..LoadConfigResponse::default()
        })
    }
}

#[derive(Default)]
struct RecordingSink {
    emitted: Mutex<Vec<ClientEmit>>,
    closed: bool,
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn emit(&self, event: ClientEmit) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.emitted.lock().await.push(event);
        Ok(())
    }
}

fn temp_dir(label: &str) -> PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    std::env::temp_dir().join(format!("classquiz_dashboard_{label}_{suffix}"))
}

fn dispatcher(
    api: Arc<FakeApi>,
    sink: Arc<RecordingSink>,
    dir: PathBuf,
) -> (CommandDispatcher, mpsc::UnboundedReceiver<CommandOutcome>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CommandDispatcher::new(api, sink, tx, dir), rx)
}

fn filled_form() -> ConfigForm {
    ConfigForm {
        url: " http://quiz ".into(),
        pin: "1234".into(),
        timeout: "30".into(),
        filename: "aula".into(),
    }
}

#[test]
fn save_requires_url_and_pin() {
    let form = ConfigForm {
        pin: String::new(),
        ..filled_form()
    };
    let err = form.save_request(&[]).expect_err("missing url");
    assert_eq!(err, ValidationError::MissingUrlOrPin);
}

#[test]
fn save_requires_filename() {
    let form = ConfigForm {
        filename: "  ".into(),
        ..filled_form()
    };
    let err = form.save_request(&[]).expect_err("missing filename");
    assert_eq!(err, ValidationError::MissingFilename);
}

#[test]
fn timeout_outside_range_is_rejected_not_clamped() {
    for raw in ["4", "301", "abc", "-5", ""] {
        let form = ConfigForm {
            timeout: raw.into(),
            ..filled_form()
        };
        assert_eq!(
            form.save_request(&[]),
            Err(ValidationError::InvalidTimeout),
            "timeout {raw:?}"
        );
        assert_eq!(form.timeout, raw);
    }
}

#[test]
fn save_request_carries_trimmed_fields_and_roster() {
    let devices = vec![
        DeviceRecord::new("a1", "Ana", DeviceStatus::Online),
        DeviceRecord::new("b2", "", DeviceStatus::Offline),
    ];
    let request = filled_form().save_request(&devices).expect("valid");
    assert_eq!(request.url, "http://quiz");
    assert_eq!(request.timeout, 30);
    assert_eq!(request.students.len(), 2);
    assert_eq!(request.students[1].id, DeviceId::from("b2"));
}

#[test]
fn connect_allows_blank_timeout() {
    let form = ConfigForm {
        timeout: String::new(),
        ..filled_form()
    };
    assert_eq!(form.connect_request().expect("valid").timeout, None);
}

#[test]
fn load_by_name_requires_filename() {
    assert_eq!(
        ConfigForm::default().load_request(),
        Err(ValidationError::MissingFilename)
    );
}

#[tokio::test]
async fn double_dispatch_issues_two_requests() {
    let api = Arc::new(FakeApi::default());
    let (dispatcher, mut outcomes) =
        dispatcher(Arc::clone(&api), Arc::default(), temp_dir("dup"));

    let first = dispatcher.dispatch(Command::Discover);
    let second = dispatcher.dispatch(Command::Discover);
    first.await.expect("join");
    second.await.expect("join");

    assert_eq!(*api.calls.lock().await, vec!["discover", "discover"]);
    for _ in 0..2 {
        let outcome = outcomes.recv().await.expect("outcome");
        assert_eq!(outcome.kind, CommandKind::Discover);
        assert_eq!(outcome.result, Ok(CommandSuccess::Discovered));
    }
}

#[tokio::test]
async fn failures_are_reported_as_outcomes() {
    let api = Arc::new(FakeApi {
        fail_discover: true,
        ..FakeApi::default()
    });
    let (dispatcher, _outcomes) = dispatcher(api, Arc::default(), temp_dir("fail"));

    let outcome = dispatcher.execute(Command::Discover).await;
    let err = outcome.result.expect_err("should fail");
    assert!(err.contains("Port not connected"), "{err}");
}

#[tokio::test]
async fn connect_reports_device_count() {
    let (dispatcher, _outcomes) =
        dispatcher(Arc::default(), Arc::default(), temp_dir("connect"));
    let request = filled_form().connect_request().expect("valid");
    let outcome = dispatcher
        .execute(Command::ConnectClassQuiz(request))
        .await;
    assert_eq!(outcome.result, Ok(CommandSuccess::Connected { count: 4 }));
}

#[tokio::test]
async fn save_json_reply_falls_back_to_sent_student_count() {
    let (dispatcher, _outcomes) = dispatcher(Arc::default(), Arc::default(), temp_dir("save"));
    let devices = vec![DeviceRecord::new("a1", "Ana", DeviceStatus::Online)];
    let request = filled_form().save_request(&devices).expect("valid");

    let outcome = dispatcher.execute(Command::SaveAll(request)).await;
    assert_eq!(
        outcome.result,
        Ok(CommandSuccess::Saved(SaveReceipt {
            filename: "aula".into(),
            location: "data/aula.csv".into(),
            students_saved: 1,
        }))
    );
}

#[tokio::test]
async fn save_download_is_written_to_download_dir() {
    let dir = temp_dir("download");
    let api = Arc::new(FakeApi {
        save_download: Some(Download {
            filename: "../aula.csv".into(),
            bytes: b"[ALUMNOS]\n".to_vec(),
        }),
        ..FakeApi::default()
    });
    let (dispatcher, _outcomes) = dispatcher(api, Arc::default(), dir.clone());
    let request = filled_form().save_request(&[]).expect("valid");

    let outcome = dispatcher.execute(Command::SaveAll(request)).await;
    let Ok(CommandSuccess::Saved(receipt)) = outcome.result else {
        panic!("expected saved outcome");
    };
    let written = dir.join("aula.csv");
    assert_eq!(receipt.location, written.display().to_string());
    assert_eq!(std::fs::read(&written).expect("file"), b"[ALUMNOS]\n");

    std::fs::remove_dir_all(dir).expect("cleanup");
}

#[tokio::test]
async fn named_load_remembers_filename() {
    let (dispatcher, _outcomes) = dispatcher(Arc::default(), Arc::default(), temp_dir("load"));
    let outcome = dispatcher
        .execute(Command::LoadConfig(LoadSource::Named("aula".into())))
        .await;
    let Ok(CommandSuccess::Loaded { filename, response }) = outcome.result else {
        panic!("expected loaded outcome");
    };
    assert_eq!(filename.as_deref(), Some("aula"));
    assert_eq!(response.students_loaded, Some(2));
}

#[tokio::test]
async fn emits_go_through_the_sink() {
    let sink = Arc::new(RecordingSink::default());
    let (dispatcher, _outcomes) =
        dispatcher(Arc::default(), Arc::clone(&sink), temp_dir("emit"));

    let outcome = dispatcher
        .execute(Command::Emit(ClientEmit::FinalizeVote))
        .await;
    assert_eq!(outcome.kind, CommandKind::Emit("finalize_vote"));
    assert_eq!(outcome.result, Ok(CommandSuccess::Emitted));
    assert_eq!(*sink.emitted.lock().await, vec![ClientEmit::FinalizeVote]);
}

#[tokio::test]
async fn emit_on_closed_transport_fails() {
    let sink = Arc::new(RecordingSink {
        closed: true,
        ..RecordingSink::default()
    });
    let (dispatcher, _outcomes) = dispatcher(Arc::default(), sink, temp_dir("closed"));
    let outcome = dispatcher
        .execute(Command::Emit(ClientEmit::FinalizeVote))
        .await;
    assert!(outcome.result.is_err());
}
