use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::{
    channel::{ExponentialBackoff, FixedDelay, Limited, ReconnectPolicy},
    error::ConfigError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectStrategy {
    #[default]
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReconnectSettings {
    pub strategy: ReconnectStrategy,
    pub delay_ms: u64,
    pub max_delay_ms: u64,
    pub factor: f64,
    /// Give up after this many consecutive failed attempts. Unset retries
    /// forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            strategy: ReconnectStrategy::Fixed,
            delay_ms: 3_000,
            max_delay_ms: 30_000,
            factor: 2.0,
            max_attempts: None,
        }
    }
}

impl ReconnectSettings {
    pub fn policy(&self) -> Box<dyn ReconnectPolicy> {
        let delay = Duration::from_millis(self.delay_ms);
        let policy: Box<dyn ReconnectPolicy> = match self.strategy {
            ReconnectStrategy::Fixed => Box::new(FixedDelay(delay)),
            ReconnectStrategy::Exponential => Box::new(ExponentialBackoff {
                initial: delay,
                max: Duration::from_millis(self.max_delay_ms.max(self.delay_ms)),
                factor: self.factor.max(1.0),
            }),
        };
        match self.max_attempts {
            Some(max_attempts) => Box::new(Limited {
                inner: policy,
                max_attempts,
            }),
            None => policy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub api_url: String,
    /// Derived from `api_url` (`/ws`) when unset.
    pub ws_url: Option<String>,
    pub request_timeout_ms: u64,
    pub reconnect: ReconnectSettings,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8053".into(),
            ws_url: None,
            request_timeout_ms: 10_000,
            reconnect: ReconnectSettings::default(),
        }
    }
}

impl ClientSettings {
    /// Environment wins over file values. `lookup` is usually
    /// `|key| std::env::var(key).ok()`.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("GLIDE_API_URL") {
            self.api_url = v;
        }
        if let Some(v) = lookup("GLIDE_WS_URL") {
            self.ws_url = Some(v);
        }
        if let Some(v) = lookup("GLIDE_REQUEST_TIMEOUT_MS") {
            if let Ok(parsed) = v.parse::<u64>() {
                self.request_timeout_ms = parsed;
            }
        }
        if let Some(v) = lookup("GLIDE_RECONNECT_MS") {
            if let Ok(parsed) = v.parse::<u64>() {
                self.reconnect.delay_ms = parsed;
            }
        }
        if let Some(v) = lookup("GLIDE_RECONNECT_STRATEGY") {
            match v.to_ascii_lowercase().as_str() {
                "fixed" => self.reconnect.strategy = ReconnectStrategy::Fixed,
                "exponential" => self.reconnect.strategy = ReconnectStrategy::Exponential,
                _ => {}
            }
        }
    }

    pub fn api_base(&self) -> Result<Url, ConfigError> {
        let url = parse_url(&self.api_url)?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::Scheme(other.to_string())),
        }
    }

    pub fn ws_endpoint(&self) -> Result<Url, ConfigError> {
        if let Some(raw) = &self.ws_url {
            let url = parse_url(raw)?;
            return match url.scheme() {
                "ws" | "wss" => Ok(url),
                other => Err(ConfigError::Scheme(other.to_string())),
            };
        }

        let mut url = self.api_base()?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| ConfigError::Scheme(scheme.to_string()))?;
        url.set_path("/ws");
        url.set_query(None);
        Ok(url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn parse_url(raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|source| ConfigError::Url {
        url: raw.to_string(),
        source,
    })
}
