use crate::constants::{self, timing, SETTINGS_FILE_NAME};
use crate::errors::{ConfigError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// How the execution service reaches the submission host.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase", tag = "mode")]
pub enum ExecutionMode {
    #[default]
    Local,
    Ssh {
        /// user@host for the submission host.
        address: String,
        #[serde(default)]
        key_file: Option<PathBuf>,
        #[serde(default)]
        compression: bool,
    },
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ResubmissionSettings {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_resubmission_wait")]
    pub wait_seconds: u64,
}

fn default_attempts() -> u32 {
    1
}

fn default_resubmission_wait() -> u64 {
    timing::MIN_RESUBMISSION_WAIT_SECS
}

impl Default for ResubmissionSettings {
    fn default() -> Self {
        ResubmissionSettings {
            attempts: default_attempts(),
            wait_seconds: default_resubmission_wait(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WaitSettingsConfig {
    #[serde(default = "default_initial_delay")]
    pub initial_delay_seconds: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    #[serde(default)]
    pub deadline_seconds: Option<u64>,
}

fn default_initial_delay() -> u64 {
    timing::DEFAULT_PRE_POLL_DELAY_SECS
}

fn default_poll_interval() -> u64 {
    timing::DEFAULT_POLL_INTERVAL_SECS
}

impl Default for WaitSettingsConfig {
    fn default() -> Self {
        WaitSettingsConfig {
            initial_delay_seconds: default_initial_delay(),
            poll_interval_seconds: default_poll_interval(),
            deadline_seconds: None,
        }
    }
}

/// Application settings file (strand.toml). Absence of this file is a fatal
/// startup error; everything inside it has defaults except the backend id.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Backend identifier string, e.g. "pbs", "lsf", "sge", "slurm", "direct".
    pub backend: String,

    #[serde(default = "default_scratch_base")]
    pub scratch_base_directory: String,

    #[serde(default)]
    pub default_queue: Option<String>,

    #[serde(default)]
    pub execution: ExecutionMode,

    #[serde(default)]
    pub resubmission: ResubmissionSettings,

    #[serde(default)]
    pub wait: WaitSettingsConfig,

    /// Free-form configuration values layered in as application defaults.
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,

    /// Project-level configuration values; override the application defaults.
    #[serde(default)]
    pub project: BTreeMap<String, String>,

    /// Analysis-level configuration values; override the project layer.
    #[serde(default)]
    pub analysis: BTreeMap<String, String>,
}

fn default_scratch_base() -> String {
    constants::DEFAULT_SCRATCH_BASE.to_string()
}

impl Settings {
    pub fn parse(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        if settings.backend.trim().is_empty() {
            return Err(ConfigError::InvalidSettings(
                "the 'backend' entry must not be empty".to_string(),
            ));
        }
        Ok(settings)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::SettingsNotFound(path.to_path_buf()));
        }
        let content = fs_err::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Settings lookup order: the explicit --settings path, then
    /// ./strand.toml, then the XDG config directory.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        let cwd_candidate = PathBuf::from(SETTINGS_FILE_NAME);
        if cwd_candidate.exists() {
            return Self::load_from(&cwd_candidate);
        }

        let xdg_dirs = xdg::BaseDirectories::with_prefix("strand");
        if let Some(path) = xdg_dirs.find_config_file(SETTINGS_FILE_NAME) {
            return Self::load_from(&path);
        }

        Err(ConfigError::SettingsNotFound(
            xdg_dirs
                .get_config_home()
                .map(|home| home.join(SETTINGS_FILE_NAME))
                .unwrap_or(cwd_candidate),
        ))
    }
}
