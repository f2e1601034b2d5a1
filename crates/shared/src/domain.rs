use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::actions::DEFAULT_EMOJI;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(GestureId);
id_newtype!(DetectionId);

impl GestureId {
    /// Derives the slug the backend stores samples under.
    ///
    /// Lowercases and trims the name, then collapses every run of characters
    /// outside `[a-z0-9]` into a single `_`. An empty result becomes `unknown`.
    pub fn from_name(name: &str) -> Self {
        let lowered = name.to_lowercase();
        let mut slug = String::with_capacity(lowered.len());
        let mut in_separator = false;
        for ch in lowered.trim().chars() {
            if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
                slug.push(ch);
                in_separator = false;
            } else if !in_separator {
                slug.push('_');
                in_separator = true;
            }
        }
        if slug.is_empty() {
            slug.push_str("unknown");
        }
        Self(slug)
    }
}

impl DetectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

fn default_emoji() -> String {
    DEFAULT_EMOJI.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gesture {
    pub id: GestureId,
    pub name: String,
    #[serde(default = "default_emoji")]
    pub emoji: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub sample_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub id: DetectionId,
    pub gesture_id: GestureId,
    pub gesture_name: String,
    pub confidence: f64,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraStatus {
    #[default]
    On,
    Off,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    #[default]
    Loading,
    Ready,
    Error,
}

/// Backend health as last reported or optimistically assumed.
///
/// `confidence_threshold` is a percentage (0..=100), the unit the backend
/// both reports and accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub camera: CameraStatus,
    pub model: ModelStatus,
    pub detection_active: bool,
    pub fps: f64,
    pub ws_connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_mode: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_detections: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions_executed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_confidence: Option<f64>,
}

impl Default for SystemStatus {
    fn default() -> Self {
        Self {
            camera: CameraStatus::On,
            model: ModelStatus::Loading,
            detection_active: false,
            fps: 0.0,
            ws_connected: false,
            confidence_threshold: None,
            speed_factor: None,
            cursor_mode: Some(false),
            total_detections: None,
            actions_executed: None,
            avg_confidence: None,
        }
    }
}

impl SystemStatus {
    /// Shallow merge: every field present in `patch` overwrites, the rest stay.
    pub fn apply(&mut self, patch: SystemStatusPatch) {
        if let Some(v) = patch.camera {
            self.camera = v;
        }
        if let Some(v) = patch.model {
            self.model = v;
        }
        if let Some(v) = patch.detection_active {
            self.detection_active = v;
        }
        if let Some(v) = patch.fps {
            self.fps = v;
        }
        if let Some(v) = patch.ws_connected {
            self.ws_connected = v;
        }
        if let Some(v) = patch.confidence_threshold {
            self.confidence_threshold = Some(v);
        }
        if let Some(v) = patch.speed_factor {
            self.speed_factor = Some(v);
        }
        if let Some(v) = patch.cursor_mode {
            self.cursor_mode = Some(v);
        }
        if let Some(v) = patch.total_detections {
            self.total_detections = Some(v);
        }
        if let Some(v) = patch.actions_executed {
            self.actions_executed = Some(v);
        }
        if let Some(v) = patch.avg_confidence {
            self.avg_confidence = Some(v);
        }
    }
}

/// Partial [`SystemStatus`]. Serializes without absent fields, which is also
/// the body shape `POST /system/status` expects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatusPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<CameraStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws_connected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_mode: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_detections: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions_executed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_confidence: Option<f64>,
}

impl SystemStatusPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn camera(camera: CameraStatus) -> Self {
        Self {
            camera: Some(camera),
            ..Self::default()
        }
    }

    pub fn detection_active(active: bool) -> Self {
        Self {
            detection_active: Some(active),
            ..Self::default()
        }
    }

    pub fn ws_connected(connected: bool) -> Self {
        Self {
            ws_connected: Some(connected),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingState {
    pub in_progress: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gesture: Option<String>,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TrainingState {
    pub fn apply(&mut self, patch: TrainingPatch) {
        if let Some(v) = patch.in_progress {
            self.in_progress = v;
        }
        if let Some(v) = patch.gesture {
            self.gesture = Some(v);
        }
        if let Some(v) = patch.progress {
            self.progress = v.min(100);
        }
        if let Some(v) = patch.accuracy {
            self.accuracy = Some(v);
        }
        if let Some(v) = patch.error {
            self.error = Some(v);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_progress: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gesture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModalKind {
    AddGesture,
    EditGesture,
    DeleteGesture,
    MapAction,
    Retrain,
}

/// The single active modal. Opening another one replaces it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModalState {
    #[serde(rename = "type")]
    pub kind: Option<ModalKind>,
    #[serde(rename = "data", default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl ModalState {
    pub fn is_open(&self, kind: ModalKind) -> bool {
        self.kind == Some(kind)
    }

    /// Reads a string field out of the opaque payload.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.as_ref()?.get(key)?.as_str()
    }
}
