use std::sync::Arc;

use chrono::Utc;
use shared::{
    actions::is_known_action,
    domain::{CameraStatus, Gesture, GestureId, SystemStatusPatch},
    protocol::GestureUpdate,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use url::Url;

use crate::{
    channel::{ChannelHandle, ReconnectPolicy},
    error::{FlowError, GatewayError},
    gateway::GestureGateway,
    store::{AppAction, Store},
};

/// User-triggered operations: the store plus the REST gateway, with the
/// ordering rules each operation needs between local dispatch and the
/// backend call.
#[derive(Clone)]
pub struct Dashboard {
    store: Store,
    gateway: Arc<dyn GestureGateway>,
}

impl Dashboard {
    pub fn new(store: Store, gateway: Arc<dyn GestureGateway>) -> Self {
        Self { store, gateway }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn gateway(&self) -> &Arc<dyn GestureGateway> {
        &self.gateway
    }

    pub async fn refresh_gestures(&self) -> Result<usize, GatewayError> {
        let gestures = self.gateway.list_gestures().await?;
        let count = gestures.len();
        self.store.dispatch(AppAction::SetGestures(gestures));
        Ok(count)
    }

    /// One-shot background load of the gesture library. Failure leaves the
    /// collection as it was; there is no retry.
    pub fn spawn_seed(&self) -> JoinHandle<()> {
        let dashboard = self.clone();
        tokio::spawn(async move {
            match dashboard.refresh_gestures().await {
                Ok(count) => info!(count, "dashboard: gesture library loaded"),
                Err(err) => warn!(%err, "dashboard: failed to load gesture library"),
            }
        })
    }

    /// Seeds the library and opens the push channel. The two are independent:
    /// the channel connects whether or not the seed succeeds.
    pub fn start(&self, endpoint: Url, policy: Box<dyn ReconnectPolicy>) -> ChannelHandle {
        self.spawn_seed();
        ChannelHandle::spawn(endpoint, self.store.clone(), policy)
    }

    /// Applies `patch` locally first, then tells the backend. When the
    /// backend answers with its own status that wins; on failure the local
    /// value is kept and the error returned.
    pub async fn update_system_status(&self, patch: SystemStatusPatch) -> Result<(), GatewayError> {
        if patch.is_empty() {
            return Ok(());
        }
        self.store
            .dispatch(AppAction::UpdateSystemStatus(patch.clone()));
        match self.gateway.update_system_status(&patch).await {
            Ok(Some(reported)) => {
                self.store.dispatch(AppAction::UpdateSystemStatus(reported));
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) => {
                warn!(%err, ?patch, "dashboard: status update failed; keeping local state");
                Err(err)
            }
        }
    }

    pub async fn set_camera(&self, camera: CameraStatus) -> Result<(), GatewayError> {
        self.update_system_status(SystemStatusPatch::camera(camera))
            .await
    }

    pub async fn set_detection_active(&self, active: bool) -> Result<(), GatewayError> {
        self.update_system_status(SystemStatusPatch::detection_active(active))
            .await
    }

    pub async fn toggle_detection(&self) -> Result<bool, GatewayError> {
        let active = !self.store.read(|state| state.system_status.detection_active);
        self.set_detection_active(active).await?;
        Ok(active)
    }

    /// `percent` is clamped to 0..=100.
    pub async fn set_confidence_threshold(&self, percent: f64) -> Result<(), GatewayError> {
        self.update_system_status(SystemStatusPatch {
            confidence_threshold: Some(percent.clamp(0.0, 100.0)),
            ..SystemStatusPatch::default()
        })
        .await
    }

    pub async fn set_speed_factor(&self, factor: f64) -> Result<(), GatewayError> {
        self.update_system_status(SystemStatusPatch {
            speed_factor: Some(factor.max(0.0)),
            ..SystemStatusPatch::default()
        })
        .await
    }

    /// Waits for the backend to accept the record before it appears locally.
    pub async fn create_gesture(&self, gesture: Gesture) -> Result<Gesture, FlowError> {
        validate(&gesture.name, &gesture.action)?;
        let stored = self.gateway.create_gesture(&gesture).await?;
        info!(id = %stored.id, name = %stored.name, "dashboard: gesture created");
        self.store.dispatch(AppAction::AddGesture(stored.clone()));
        Ok(stored)
    }

    pub async fn update_gesture(
        &self,
        id: &GestureId,
        name: &str,
        action: &str,
    ) -> Result<Gesture, FlowError> {
        let name = name.trim();
        validate(name, action)?;
        let current = self
            .store
            .read(|state| state.gesture(id).cloned())
            .ok_or_else(|| FlowError::UnknownGesture(id.clone()))?;

        let update = GestureUpdate {
            name: Some(name.to_string()),
            action: Some(action.to_string()),
            emoji: None,
        };
        self.gateway.update_gesture(id, &update).await?;

        let merged = Gesture {
            name: name.to_string(),
            action: action.to_string(),
            updated_at: Utc::now(),
            ..current
        };
        self.store.dispatch(AppAction::UpdateGesture(merged.clone()));
        Ok(merged)
    }

    /// Remaps only the action; the name and everything else stay.
    pub async fn map_action(&self, id: &GestureId, action: &str) -> Result<(), FlowError> {
        if !is_known_action(action) {
            return Err(FlowError::UnknownAction(action.to_string()));
        }
        if self.store.read(|state| state.gesture(id).is_none()) {
            return Err(FlowError::UnknownGesture(id.clone()));
        }
        let update = GestureUpdate {
            action: Some(action.to_string()),
            ..GestureUpdate::default()
        };
        self.gateway.update_gesture(id, &update).await?;
        self.store.dispatch(AppAction::UpdateGestureAction {
            id: id.clone(),
            action: action.to_string(),
        });
        Ok(())
    }

    pub async fn delete_gesture(&self, id: &GestureId) -> Result<(), FlowError> {
        self.gateway.delete_gesture(id).await?;
        info!(%id, "dashboard: gesture deleted");
        self.store.dispatch(AppAction::DeleteGesture(id.clone()));
        Ok(())
    }
}

fn validate(name: &str, action: &str) -> Result<(), FlowError> {
    if name.trim().is_empty() {
        return Err(FlowError::EmptyName);
    }
    if !is_known_action(action) {
        return Err(FlowError::UnknownAction(action.to_string()));
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/dashboard_tests.rs"]
mod tests;
