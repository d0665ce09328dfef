//! Backend commands queued from UI to backend worker.

use std::path::PathBuf;

use client_core::Command;

pub enum BackendCommand {
    Dispatch(Command),
    /// Reads a locally picked configuration file and uploads it.
    UploadConfig { path: PathBuf },
}

impl BackendCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dispatch(command) => command.kind().name(),
            Self::UploadConfig { .. } => "upload_config",
        }
    }
}
