use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    domain::{
        CameraStatus, Detection, DetectionId, GestureId, ModelStatus, SystemStatusPatch,
    },
    error::ProtocolError,
};

/// Status frame pushed by the backend (`type: "status"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatusUpdate {
    pub camera: CameraStatus,
    pub model_ready: bool,
    pub fps: f64,
    pub detection_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_detections: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions_executed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_factor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_confidence: Option<f64>,
}

impl StatusUpdate {
    /// Receiving a status frame proves the channel is up, so the patch always
    /// carries `ws_connected = true`.
    pub fn to_patch(&self) -> SystemStatusPatch {
        SystemStatusPatch {
            camera: Some(self.camera),
            model: Some(if self.model_ready {
                ModelStatus::Ready
            } else {
                ModelStatus::Loading
            }),
            detection_active: Some(self.detection_active),
            fps: Some(self.fps),
            ws_connected: Some(true),
            cursor_mode: Some(self.cursor_mode.unwrap_or(false)),
            total_detections: self.total_detections,
            actions_executed: self.actions_executed,
            confidence_threshold: self.confidence_threshold,
            speed_factor: self.speed_factor,
            avg_confidence: self.avg_confidence,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionEvent {
    pub gesture_id: GestureId,
    #[serde(default)]
    pub gesture_name: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub executed: bool,
}

impl DetectionEvent {
    pub fn has_action(&self) -> bool {
        self.action.as_deref().is_some_and(|action| !action.is_empty())
    }

    pub fn into_detection(self, id: DetectionId, timestamp: DateTime<Utc>) -> Detection {
        Detection {
            id,
            gesture_name: self
                .gesture_name
                .unwrap_or_else(|| "Unknown".to_string()),
            gesture_id: self.gesture_id,
            confidence: self.confidence,
            action: self.action.unwrap_or_default(),
            timestamp,
        }
    }
}

/// Sample-capture or training progress (`type: "training"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrainingProgress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gesture_id: Option<GestureId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gesture_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complete: Option<bool>,
}

/// `type: "training_complete"`. The backend sends it both when a sample
/// capture finishes (with `gestureId`) and when a model retrain finishes
/// (with `accuracy`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrainingComplete {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gesture_id: Option<GestureId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

impl TrainingComplete {
    pub fn is_model_retrain(&self) -> bool {
        self.gesture_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Status(StatusUpdate),
    Detection(DetectionEvent),
    Training(TrainingProgress),
    TrainingComplete(TrainingComplete),
    Error(String),
    Heartbeat,
    Unknown(String),
}

impl ChannelEvent {
    pub fn kind(&self) -> &str {
        match self {
            Self::Status(_) => "status",
            Self::Detection(_) => "detection",
            Self::Training(_) => "training",
            Self::TrainingComplete(_) => "training_complete",
            Self::Error(_) => "error",
            Self::Heartbeat => "heartbeat",
            Self::Unknown(kind) => kind,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
    #[serde(default)]
    timestamp: Option<f64>,
}

/// One decoded push-channel text frame: `{ type, data, timestamp }`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelFrame {
    pub event: ChannelEvent,
    /// Backend clock, milliseconds since the epoch.
    pub timestamp: Option<f64>,
}

impl ChannelFrame {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let raw: RawFrame = serde_json::from_str(text).map_err(ProtocolError::Envelope)?;
        let event = match raw.kind.as_str() {
            "status" => ChannelEvent::Status(payload(&raw.kind, raw.data)?),
            "detection" => ChannelEvent::Detection(payload(&raw.kind, raw.data)?),
            "training" => ChannelEvent::Training(payload(&raw.kind, raw.data)?),
            "training_complete" => ChannelEvent::TrainingComplete(payload(&raw.kind, raw.data)?),
            "error" => ChannelEvent::Error(error_message(raw.data)),
            "heartbeat" => ChannelEvent::Heartbeat,
            _ => ChannelEvent::Unknown(raw.kind),
        };
        Ok(Self {
            event,
            timestamp: raw.timestamp,
        })
    }
}

fn payload<T: DeserializeOwned + Default>(
    kind: &str,
    data: serde_json::Value,
) -> Result<T, ProtocolError> {
    if data.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(data).map_err(|source| ProtocolError::Payload {
        kind: kind.to_string(),
        source,
    })
}

fn error_message(data: serde_json::Value) -> String {
    if let Some(message) = data.get("message").and_then(serde_json::Value::as_str) {
        return message.to_string();
    }
    match data {
        serde_json::Value::String(message) => message,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Body of `POST /train/capture`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    pub gesture_id: GestureId,
    pub num_samples: u32,
}

/// Body of `PUT /gestures/:id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GestureUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
}

/// Envelope most backend mutations answer with. A `200` can still carry
/// `status: "error"`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendReply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BackendReply {
    pub fn rejection(&self) -> Option<String> {
        (self.status.as_deref() == Some("error"))
            .then(|| self.message.clone().unwrap_or_else(|| "unspecified error".to_string()))
    }
}

/// Answer to `POST /system/status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatusUpdateReply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_status: Option<SystemStatusPatch>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_status_frame_into_connected_patch() {
        let frame = ChannelFrame::decode(
            r#"{"type":"status","data":{"camera":"on","modelReady":true,"fps":30,"detectionActive":true},"timestamp":1700000000000}"#,
        )
        .expect("frame");
        let ChannelEvent::Status(status) = frame.event else {
            panic!("expected status event");
        };
        let patch = status.to_patch();
        assert_eq!(patch.camera, Some(CameraStatus::On));
        assert_eq!(patch.model, Some(ModelStatus::Ready));
        assert_eq!(patch.fps, Some(30.0));
        assert_eq!(patch.ws_connected, Some(true));
        assert_eq!(patch.cursor_mode, Some(false));
        assert_eq!(frame.timestamp, Some(1_700_000_000_000.0));
    }

    #[test]
    fn detection_with_null_name_and_action() {
        let frame = ChannelFrame::decode(
            r#"{"type":"detection","data":{"gestureId":"detect_1","gestureName":null,"confidence":0.91,"action":null}}"#,
        )
        .expect("frame");
        let ChannelEvent::Detection(event) = frame.event else {
            panic!("expected detection event");
        };
        assert!(!event.has_action());
        let detection = event.into_detection(DetectionId::new("d1"), Utc::now());
        assert_eq!(detection.gesture_name, "Unknown");
        assert_eq!(detection.action, "");
    }

    #[test]
    fn unknown_kind_is_preserved_not_rejected() {
        let frame = ChannelFrame::decode(r#"{"type":"telemetry","data":{}}"#).expect("frame");
        assert_eq!(frame.event, ChannelEvent::Unknown("telemetry".to_string()));
    }

    #[test]
    fn training_complete_distinguishes_capture_from_retrain() {
        let capture = ChannelFrame::decode(
            r#"{"type":"training_complete","data":{"gestureId":"wave"}}"#,
        )
        .expect("frame");
        let retrain =
            ChannelFrame::decode(r#"{"type":"training_complete","data":{"accuracy":97.5}}"#)
                .expect("frame");
        match (capture.event, retrain.event) {
            (ChannelEvent::TrainingComplete(a), ChannelEvent::TrainingComplete(b)) => {
                assert!(!a.is_model_retrain());
                assert!(b.is_model_retrain());
                assert_eq!(b.accuracy, Some(97.5));
            }
            other => panic!("unexpected events {other:?}"),
        }
    }

    #[test]
    fn error_frames_accept_string_or_object() {
        let a = ChannelFrame::decode(r#"{"type":"error","data":"camera busy"}"#).expect("frame");
        let b = ChannelFrame::decode(r#"{"type":"error","data":{"message":"model missing"}}"#)
            .expect("frame");
        assert_eq!(a.event, ChannelEvent::Error("camera busy".to_string()));
        assert_eq!(b.event, ChannelEvent::Error("model missing".to_string()));
    }

    #[test]
    fn malformed_frames_are_errors() {
        assert!(matches!(
            ChannelFrame::decode("not json"),
            Err(ProtocolError::Envelope(_))
        ));
        assert!(matches!(
            ChannelFrame::decode(r#"{"type":"detection","data":{"confidence":"high"}}"#),
            Err(ProtocolError::Payload { .. })
        ));
    }

    #[test]
    fn backend_reply_rejection() {
        let reply: BackendReply =
            serde_json::from_str(r#"{"status":"error","message":"Already training"}"#)
                .expect("reply");
        assert_eq!(reply.rejection().as_deref(), Some("Already training"));
        let ok: BackendReply = serde_json::from_str(r#"{"status":"started"}"#).expect("reply");
        assert_eq!(ok.rejection(), None);
    }
}
