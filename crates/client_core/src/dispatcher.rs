//! Client-side validation and fire-and-forget execution of hub commands.
//!
//! Every dispatch spawns its own task: nothing is deduplicated, queued or
//! rate limited, so a double click sends the request twice. Results come
//! back as [`CommandOutcome`] values on the outcome channel.

use std::{
    ops::RangeInclusive,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use shared::{
    domain::DeviceRecord,
    protocol::{
        ClientEmit, ConnectRequest, LoadConfigResponse, RemoteConfig, SaveAllRequest, StudentEntry,
    },
};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error};

use crate::{
    api::{BackendApi, Download, LoadSource, SaveAllReply},
    transport::EventSink,
};

/// Vote timeout accepted by the hub, in seconds.
pub const TIMEOUT_RANGE: RangeInclusive<u32> = 5..=300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please fill in URL and PIN")]
    MissingUrlOrPin,
    #[error("Please enter a file name")]
    MissingFilename,
    #[error("Timeout must be a whole number between 5 and 300 seconds")]
    InvalidTimeout,
}

/// Raw contents of the configuration inputs. Kept as typed text so
/// validation can reject input without rewriting it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigForm {
    pub url: String,
    pub pin: String,
    pub timeout: String,
    pub filename: String,
}

impl ConfigForm {
    fn url_and_pin(&self) -> Result<(String, String), ValidationError> {
        let url = self.url.trim();
        let pin = self.pin.trim();
        if url.is_empty() || pin.is_empty() {
            return Err(ValidationError::MissingUrlOrPin);
        }
        Ok((url.to_string(), pin.to_string()))
    }

    fn parsed_timeout(&self) -> Result<Option<u32>, ValidationError> {
        let raw = self.timeout.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        match raw.parse::<u32>() {
            Ok(value) if TIMEOUT_RANGE.contains(&value) => Ok(Some(value)),
            _ => Err(ValidationError::InvalidTimeout),
        }
    }

    fn filename(&self) -> Result<String, ValidationError> {
        let filename = self.filename.trim();
        if filename.is_empty() {
            return Err(ValidationError::MissingFilename);
        }
        Ok(filename.to_string())
    }

    pub fn connect_request(&self) -> Result<ConnectRequest, ValidationError> {
        let (url, pin) = self.url_and_pin()?;
        Ok(ConnectRequest {
            url,
            pin,
            timeout: self.parsed_timeout()?,
        })
    }

    /// Save needs every field, including a timeout in range.
    pub fn save_request(
        &self,
        devices: &[DeviceRecord],
    ) -> Result<SaveAllRequest, ValidationError> {
        let (url, pin) = self.url_and_pin()?;
        let filename = self.filename()?;
        let timeout = self
            .parsed_timeout()?
            .ok_or(ValidationError::InvalidTimeout)?;
        Ok(SaveAllRequest {
            url,
            pin,
            timeout,
            filename,
            students: devices
                .iter()
                .map(|device| StudentEntry {
                    id: device.id.clone(),
                    name: device.name.clone(),
                })
                .collect(),
        })
    }

    pub fn load_request(&self) -> Result<LoadSource, ValidationError> {
        Ok(LoadSource::Named(self.filename()?))
    }

    /// Fills in whatever the hub reported; absent values leave inputs alone.
    pub fn merge_remote(&mut self, url: Option<&str>, pin: Option<&str>, timeout: Option<u32>) {
        if let Some(url) = url {
            self.url = url.to_string();
        }
        if let Some(pin) = pin {
            self.pin = pin.to_string();
        }
        if let Some(timeout) = timeout {
            self.timeout = timeout.to_string();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Discover,
    ConnectClassQuiz(ConnectRequest),
    SaveAll(SaveAllRequest),
    LoadConfig(LoadSource),
    FetchConfig,
    Emit(ClientEmit),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Discover,
    Connect,
    Save,
    Load,
    FetchConfig,
    Emit(&'static str),
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Discover => CommandKind::Discover,
            Self::ConnectClassQuiz(_) => CommandKind::Connect,
            Self::SaveAll(_) => CommandKind::Save,
            Self::LoadConfig(_) => CommandKind::Load,
            Self::FetchConfig => CommandKind::FetchConfig,
            Self::Emit(event) => CommandKind::Emit(event.name()),
        }
    }
}

impl CommandKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Discover => "discover",
            Self::Connect => "connect_classquiz",
            Self::Save => "save_all",
            Self::Load => "load_config",
            Self::FetchConfig => "fetch_config",
            Self::Emit(event) => event,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    pub filename: String,
    /// Where the configuration ended up: the hub's path or the local download.
    pub location: String,
    pub students_saved: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSuccess {
    Discovered,
    Connected { count: u32 },
    Saved(SaveReceipt),
    Loaded {
        filename: Option<String>,
        response: LoadConfigResponse,
    },
    ConfigFetched(RemoteConfig),
    Emitted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub kind: CommandKind,
    pub result: Result<CommandSuccess, String>,
}

#[derive(Clone)]
pub struct CommandDispatcher {
    api: Arc<dyn BackendApi>,
    sink: Arc<dyn EventSink>,
    outcomes: mpsc::UnboundedSender<CommandOutcome>,
    download_dir: PathBuf,
}

impl CommandDispatcher {
    pub fn new(
        api: Arc<dyn BackendApi>,
        sink: Arc<dyn EventSink>,
        outcomes: mpsc::UnboundedSender<CommandOutcome>,
        download_dir: PathBuf,
    ) -> Self {
        Self {
            api,
            sink,
            outcomes,
            download_dir,
        }
    }

    /// Spawns the command and reports its outcome later.
    pub fn dispatch(&self, command: Command) -> JoinHandle<()> {
        let this = self.clone();
        debug!(command = command.kind().name(), "dispatching command");
        tokio::spawn(async move {
            let outcome = this.execute(command).await;
            if this.outcomes.send(outcome).is_err() {
                debug!("command outcome dropped: receiver gone");
            }
        })
    }

    pub async fn execute(&self, command: Command) -> CommandOutcome {
        let kind = command.kind();
        let result = self.run(command).await.map_err(|err| {
            error!(command = kind.name(), "command failed: {err:#}");
            format!("{err:#}")
        });
        CommandOutcome { kind, result }
    }

    async fn run(&self, command: Command) -> Result<CommandSuccess> {
        match command {
            Command::Discover => {
                self.api.discover().await?;
                Ok(CommandSuccess::Discovered)
            }
            Command::ConnectClassQuiz(request) => {
                let reply = self.api.connect_classquiz(&request).await?;
                Ok(CommandSuccess::Connected {
                    count: reply.count.unwrap_or_default(),
                })
            }
            Command::SaveAll(request) => {
                let sent = u32::try_from(request.students.len()).unwrap_or(u32::MAX);
                let receipt = match self.api.save_all(&request).await? {
                    SaveAllReply::Json(body) => SaveReceipt {
                        location: body
                            .file
                            .unwrap_or_else(|| format!("{}.csv", request.filename)),
                        students_saved: body.students_saved.unwrap_or(sent),
                        filename: request.filename,
                    },
                    SaveAllReply::File(download) => {
                        let path = store_download(&self.download_dir, &download).await?;
                        SaveReceipt {
                            location: path.display().to_string(),
                            students_saved: sent,
                            filename: request.filename,
                        }
                    }
                };
                Ok(CommandSuccess::Saved(receipt))
            }
            Command::LoadConfig(source) => {
                let response = self.api.load_config(&source).await?;
                let filename = match source {
                    LoadSource::Named(name) => Some(name),
                    LoadSource::Upload { .. } => None,
                };
                Ok(CommandSuccess::Loaded { filename, response })
            }
            Command::FetchConfig => Ok(CommandSuccess::ConfigFetched(
                self.api.fetch_config().await?,
            )),
            Command::Emit(event) => {
                self.sink.emit(event).await?;
                Ok(CommandSuccess::Emitted)
            }
        }
    }
}

/// Writes a downloaded file under `dir`, keeping only the file name part.
async fn store_download(dir: &Path, download: &Download) -> Result<PathBuf> {
    let name = Path::new(&download.filename)
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "configuration.csv".into());
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create download directory '{}'", dir.display()))?;
    let path = dir.join(name);
    tokio::fs::write(&path, &download.bytes)
        .await
        .with_context(|| format!("failed to write '{}'", path.display()))?;
    Ok(path)
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
