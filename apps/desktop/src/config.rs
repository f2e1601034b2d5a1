use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use client_core::{ClientSettings, ConfigError};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "glide.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LauncherSettings {
    /// Backend executable. Unset means the backend is started by hand.
    pub backend_bin: Option<PathBuf>,
    pub backend_args: Vec<String>,
    pub frontend_port: u16,
    pub static_dir: PathBuf,
    pub logo_path: Option<PathBuf>,
    pub ready_retries: u32,
    pub ready_interval_ms: u64,
    pub ready_timeout_ms: u64,
    pub stop_grace_ms: u64,
    /// Command used to open the dashboard URL, e.g. `xdg-open`.
    pub opener: Option<String>,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            backend_bin: None,
            backend_args: Vec::new(),
            frontend_port: 3001,
            static_dir: PathBuf::from("out"),
            logo_path: None,
            ready_retries: 60,
            ready_interval_ms: 1_000,
            ready_timeout_ms: 1_000,
            stop_grace_ms: 3_000,
            opener: None,
        }
    }
}

impl LauncherSettings {
    pub fn ready_interval(&self) -> Duration {
        Duration::from_millis(self.ready_interval_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("GLIDE_BACKEND_BIN") {
            self.backend_bin = (!v.trim().is_empty()).then(|| PathBuf::from(v));
        }
        if let Some(v) = lookup("GLIDE_FRONTEND_PORT") {
            if let Ok(parsed) = v.parse::<u16>() {
                self.frontend_port = parsed;
            }
        }
        if let Some(v) = lookup("GLIDE_STATIC_DIR") {
            self.static_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("GLIDE_LOGO") {
            self.logo_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("GLIDE_READY_RETRIES") {
            if let Ok(parsed) = v.parse::<u32>() {
                self.ready_retries = parsed;
            }
        }
        if let Some(v) = lookup("GLIDE_OPENER") {
            self.opener = Some(v);
        }
    }
}

/// `glide.toml`: a `[client]` table and a `[launcher]` table, both optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DesktopConfig {
    pub client: ClientSettings,
    pub launcher: LauncherSettings,
}

/// Defaults, then the TOML file, then the environment. An explicitly named
/// file must exist; the default file is optional.
pub fn load_settings(path: Option<&Path>) -> Result<DesktopConfig, ConfigError> {
    let (path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };

    let mut config = match fs::read_to_string(&path) {
        Ok(raw) => parse(&path, &raw)?,
        Err(err) if !required && err.kind() == std::io::ErrorKind::NotFound => {
            DesktopConfig::default()
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                source,
            })
        }
    };

    let lookup = |key: &str| std::env::var(key).ok();
    config.client.apply_env_overrides(lookup);
    config.launcher.apply_env_overrides(lookup);
    Ok(config)
}

fn parse(path: &Path, raw: &str) -> Result<DesktopConfig, ConfigError> {
    toml::from_str(raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}
