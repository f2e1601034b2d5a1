use reqwest::StatusCode;
use shared::domain::GestureId;
use thiserror::Error;

use crate::wizard::WizardStep;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid url `{url}`: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported url scheme `{0}`; expected http(s) or ws(s)")]
    Scheme(String),
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("{method} {url} failed: {source}")]
    Transport {
        method: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method} {url} returned {status}")]
    Status {
        method: &'static str,
        url: String,
        status: StatusCode,
    },
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("backend rejected request: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("gesture name must not be empty")]
    EmptyName,
    #[error("unknown desktop action `{0}`")]
    UnknownAction(String),
    #[error("gesture `{0}` is not in the library")]
    UnknownGesture(GestureId),
    #[error("nothing changed")]
    Unchanged,
    #[error("step {} ({}) is not complete", .0.number(), .0.label())]
    StepIncomplete(WizardStep),
    #[error("wizard is on step {} ({}), expected {}", .actual.number(), .actual.label(), .expected.label())]
    WrongStep {
        expected: WizardStep,
        actual: WizardStep,
    },
    #[error("sample target must be one of 30, 50 or 100, got {0}")]
    InvalidTarget(u32),
    #[error("a recording is already in progress")]
    AlreadyRecording,
    #[error("model training is in progress")]
    TrainingInProgress,
    #[error("model training has not been started")]
    NotStarted,
    #[error("model training failed: {0}")]
    TrainingFailed(String),
    #[error("timed out waiting for the backend")]
    Timeout,
    #[error("push channel closed")]
    ChannelClosed,
}
