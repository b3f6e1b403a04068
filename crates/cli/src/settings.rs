//! Layered settings: defaults, then a config file, then `TELLER__*` variables

use config::{Config, ConfigError, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const ENV_PREFIX: &str = "TELLER";
const CONFIG_FILE_NAME: &str = "teller.toml";

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Harness settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Banking API base URL
    pub base_url: String,

    /// Device identifier sent on login and refresh
    pub device_id: String,

    /// How long before expiry the refresh prompt fires
    pub prompt_window_secs: u64,

    /// Token status readout interval
    pub tick_interval_ms: u64,

    /// Request timeout in seconds (0 = no timeout)
    pub timeout_secs: u64,

    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            device_id: "demo-cli".to_string(),
            prompt_window_secs: 180,
            tick_interval_ms: 1_000,
            timeout_secs: 0,
            log_format: LogFormat::Pretty,
        }
    }
}

impl Settings {
    /// Load settings from `file` (or the per-user default) and the environment
    ///
    /// An explicitly named file must exist; the per-user file is optional.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let env = Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true);

        match file {
            Some(path) => Self::layered(Some((path, true)), env),
            None => {
                let default = Self::default_path();
                Self::layered(default.as_deref().map(|path| (path, false)), env)
            }
        }
    }

    /// Per-user settings file, `<config_dir>/teller.toml`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("rs", "Teller", "teller")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    fn layered(file: Option<(&Path, bool)>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some((path, required)) = file {
            debug!(path = %path.display(), required, "Adding settings file");
            builder = builder.add_source(File::from(path).required(required));
        }

        builder.add_source(env).build()?.try_deserialize()
    }

    pub const fn prompt_window(&self) -> Duration {
        Duration::from_secs(self.prompt_window_secs)
    }

    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Request timeout, `None` when disabled
    pub const fn timeout(&self) -> Option<Duration> {
        match self.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .source(Some(source))
    }

    #[test]
    fn defaults_without_sources() {
        let settings = Settings::layered(None, env(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.timeout(), None);
        assert_eq!(settings.prompt_window(), Duration::from_secs(180));
    }

    #[test]
    fn file_then_environment() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "base_url = \"https://bank.example\"\ndevice_id = \"laptop\"\ntimeout_secs = 5\nlog_format = \"json\""
        )
        .unwrap();

        let settings = Settings::layered(
            Some((file.path(), true)),
            env(&[("TELLER__DEVICE_ID", "from-env")]),
        )
        .unwrap();

        assert_eq!(settings.base_url, "https://bank.example");
        assert_eq!(settings.device_id, "from-env");
        assert_eq!(settings.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.tick_interval_ms, 1_000);
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(Settings::layered(Some((path.as_path(), true)), env(&[])).is_err());
        assert!(Settings::layered(Some((path.as_path(), false)), env(&[])).is_ok());
    }
}
