//! In-memory gateway and fixtures shared by the flow tests.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::Utc;
use shared::{
    domain::{Gesture, GestureId, SystemStatusPatch},
    protocol::{CaptureRequest, GestureUpdate},
};

use crate::{dashboard::Dashboard, error::GatewayError, gateway::GestureGateway, store::Store};

#[derive(Default)]
pub(crate) struct FakeGateway {
    gestures: Mutex<Vec<Gesture>>,
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<&'static str>>,
    status_reply: Mutex<Option<SystemStatusPatch>>,
}

impl FakeGateway {
    pub(crate) fn with_gestures(gestures: Vec<Gesture>) -> Arc<Self> {
        let gateway = Self::default();
        *gateway.gestures.lock().expect("lock") = gestures;
        Arc::new(gateway)
    }

    /// Makes every later call to `op` fail with a rejection.
    pub(crate) fn fail_on(&self, op: &'static str) {
        self.failing.lock().expect("lock").insert(op);
    }

    pub(crate) fn recover(&self, op: &'static str) {
        self.failing.lock().expect("lock").remove(op);
    }

    pub(crate) fn reply_status_with(&self, patch: SystemStatusPatch) {
        *self.status_reply.lock().expect("lock") = Some(patch);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock").clone()
    }

    fn record(&self, op: &'static str, detail: impl AsRef<str>) -> Result<(), GatewayError> {
        self.calls
            .lock()
            .expect("lock")
            .push(format!("{op} {}", detail.as_ref()).trim_end().to_string());
        if self.failing.lock().expect("lock").contains(op) {
            return Err(GatewayError::Rejected(format!("{op} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl GestureGateway for FakeGateway {
    async fn list_gestures(&self) -> Result<Vec<Gesture>, GatewayError> {
        self.record("list_gestures", "")?;
        Ok(self.gestures.lock().expect("lock").clone())
    }

    async fn create_gesture(&self, gesture: &Gesture) -> Result<Gesture, GatewayError> {
        self.record("create_gesture", gesture.id.as_str())?;
        self.gestures.lock().expect("lock").push(gesture.clone());
        Ok(gesture.clone())
    }

    async fn update_gesture(
        &self,
        id: &GestureId,
        update: &GestureUpdate,
    ) -> Result<(), GatewayError> {
        let body = serde_json::to_string(update).expect("json");
        self.record("update_gesture", format!("{id} {body}"))
    }

    async fn delete_gesture(&self, id: &GestureId) -> Result<(), GatewayError> {
        self.record("delete_gesture", id.as_str())
    }

    async fn update_system_status(
        &self,
        patch: &SystemStatusPatch,
    ) -> Result<Option<SystemStatusPatch>, GatewayError> {
        let body = serde_json::to_string(patch).expect("json");
        self.record("update_system_status", body)?;
        Ok(self.status_reply.lock().expect("lock").clone())
    }

    async fn start_capture(&self, request: &CaptureRequest) -> Result<(), GatewayError> {
        self.record(
            "start_capture",
            format!("{} {}", request.gesture_id, request.num_samples),
        )
    }

    async fn start_training(&self) -> Result<(), GatewayError> {
        self.record("start_training", "")
    }
}

pub(crate) fn gesture(id: &str, name: &str, action: &str) -> Gesture {
    Gesture {
        id: GestureId::new(id),
        name: name.to_string(),
        emoji: "👋".to_string(),
        action: action.to_string(),
        sample_count: 30,
        confidence: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Dashboard over a fresh store that already holds `gestures`.
pub(crate) fn dashboard(gateway: Arc<FakeGateway>, gestures: Vec<Gesture>) -> Dashboard {
    let store = Store::new();
    store.dispatch(crate::store::AppAction::SetGestures(gestures));
    Dashboard::new(store, gateway)
}
