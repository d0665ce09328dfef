use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use tracing::warn;

use crate::transport::ReconnectPolicy;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";
pub const SETTINGS_FILE: &str = "dashboard.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub reconnect_attempts: u32,
    pub reconnect_delay_ms: u64,
    pub reconnect_delay_max_ms: u64,
    /// Where file downloads from the hub are written. `None` means the
    /// platform download directory.
    pub download_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.into(),
            reconnect_attempts: 5,
            reconnect_delay_ms: 1_000,
            reconnect_delay_max_ms: 5_000,
            download_dir: None,
        }
    }
}

impl Settings {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.reconnect_attempts.max(1),
            initial_delay: Duration::from_millis(self.reconnect_delay_ms),
            max_delay: Duration::from_millis(
                self.reconnect_delay_max_ms.max(self.reconnect_delay_ms),
            ),
        }
    }

    pub fn resolved_download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Defaults, then `dashboard.toml` in the working directory, then `DASHBOARD_*`
/// environment variables.
pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            Ok(file_cfg) => apply_file(&mut settings, &file_cfg),
            Err(err) => warn!(path = %path.display(), "ignoring unreadable settings file: {err}"),
        }
    }

    if let Some(v) = env("DASHBOARD_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = env("DASHBOARD_RECONNECT_ATTEMPTS") {
        if let Ok(parsed) = v.parse() {
            settings.reconnect_attempts = parsed;
        }
    }
    if let Some(v) = env("DASHBOARD_RECONNECT_DELAY_MS") {
        if let Ok(parsed) = v.parse() {
            settings.reconnect_delay_ms = parsed;
        }
    }
    if let Some(v) = env("DASHBOARD_RECONNECT_DELAY_MAX_MS") {
        if let Ok(parsed) = v.parse() {
            settings.reconnect_delay_max_ms = parsed;
        }
    }
    if let Some(v) = env("DASHBOARD_DOWNLOAD_DIR") {
        settings.download_dir = Some(PathBuf::from(v));
    }

    settings
}

fn apply_file(settings: &mut Settings, file_cfg: &HashMap<String, toml::Value>) {
    if let Some(v) = file_cfg.get("server_url").and_then(toml::Value::as_str) {
        settings.server_url = v.to_string();
    }
    if let Some(v) = file_integer(file_cfg, "reconnect_attempts") {
        settings.reconnect_attempts = u32::try_from(v).unwrap_or(settings.reconnect_attempts);
    }
    if let Some(v) = file_integer(file_cfg, "reconnect_delay_ms") {
        settings.reconnect_delay_ms = v;
    }
    if let Some(v) = file_integer(file_cfg, "reconnect_delay_max_ms") {
        settings.reconnect_delay_max_ms = v;
    }
    if let Some(v) = file_cfg.get("download_dir").and_then(toml::Value::as_str) {
        settings.download_dir = Some(PathBuf::from(v));
    }
}

fn file_integer(file_cfg: &HashMap<String, toml::Value>, key: &str) -> Option<u64> {
    file_cfg
        .get(key)
        .and_then(toml::Value::as_integer)
        .and_then(|v| u64::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn temp_file(contents: &str) -> PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("classquiz_dashboard_{suffix}.toml"));
        fs::write(&path, contents).expect("write settings");
        path
    }

    #[test]
    fn defaults_match_hub_client_policy() {
        let settings = load_settings_from(Path::new("does/not/exist.toml"), |_| None);
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.reconnect_policy(), ReconnectPolicy::default());
    }

    #[test]
    fn env_overrides_file_which_overrides_defaults() {
        let path = temp_file(
            "server_url = \"http://file:5000\"\nreconnect_attempts = 3\nreconnect_delay_ms = 200\n",
        );
        let settings = load_settings_from(&path, |key| match key {
            "DASHBOARD_SERVER_URL" => Some("http://env:5000".into()),
            "DASHBOARD_RECONNECT_DELAY_MS" => Some("not a number".into()),
            _ => None,
        });
        fs::remove_file(path).expect("cleanup");

        assert_eq!(settings.server_url, "http://env:5000");
        assert_eq!(settings.reconnect_attempts, 3);
        assert_eq!(settings.reconnect_delay_ms, 200);
        assert_eq!(settings.reconnect_delay_max_ms, 5_000);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let path = temp_file("server_url = ");
        let settings = load_settings_from(&path, |_| None);
        fs::remove_file(path).expect("cleanup");
        assert_eq!(settings.server_url, DEFAULT_SERVER_URL);
    }

    #[test]
    fn policy_never_has_zero_attempts_or_inverted_delays() {
        let settings = Settings {
            reconnect_attempts: 0,
            reconnect_delay_ms: 3_000,
            reconnect_delay_max_ms: 1_000,
            ..Settings::default()
        };
        let policy = settings.reconnect_policy();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.max_delay, Duration::from_secs(3));
    }
}
