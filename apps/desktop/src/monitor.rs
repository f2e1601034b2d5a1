use std::sync::Arc;

use anyhow::{Context, Result};
use client_core::{AppState, ClientSettings, ConnectionState, Dashboard, HttpGateway, Store};
use shared::{
    actions::action_label,
    domain::{Detection, DetectionId, SystemStatus},
    format::{percent, ConfidenceLevel},
};
use tracing::{info, warn};

/// Detections in `state` that arrived after `last_seen`, oldest first.
fn new_detections<'a>(state: &'a AppState, last_seen: Option<&DetectionId>) -> Vec<&'a Detection> {
    let mut fresh: Vec<&Detection> = state
        .detections
        .iter()
        .take_while(|detection| Some(&detection.id) != last_seen)
        .collect();
    fresh.reverse();
    fresh
}

/// True when something worth a log line changed; fps and counters churn on
/// every frame and are left out.
fn status_changed(before: &SystemStatus, after: &SystemStatus) -> bool {
    before.camera != after.camera
        || before.model != after.model
        || before.detection_active != after.detection_active
        || before.ws_connected != after.ws_connected
        || before.cursor_mode != after.cursor_mode
}

fn log_detection(detection: &Detection) {
    let level = ConfidenceLevel::from_confidence(detection.confidence);
    info!(
        gesture = %detection.gesture_name,
        confidence = %percent(detection.confidence),
        level = %level,
        action = action_label(&detection.action),
        "monitor: detection"
    );
}

pub async fn run(settings: ClientSettings) -> Result<()> {
    let gateway = HttpGateway::new(settings.api_base()?, settings.request_timeout())
        .context("failed to create gateway")?;
    let store = Store::new();
    let dashboard = Dashboard::new(store.clone(), Arc::new(gateway));
    let endpoint = settings.ws_endpoint()?;
    info!(%endpoint, "monitor: starting");
    let channel = dashboard.start(endpoint, settings.reconnect.policy());

    let mut connection = channel.watch_connection();
    let mut updates = store.subscribe();
    let mut last_status = store.read(|state| state.system_status.clone());
    let mut last_seen = None;

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for ctrl-c")?;
                break;
            }
            changed = connection.changed() => {
                if changed.is_err() {
                    warn!("monitor: channel task ended");
                    break;
                }
                let state = *connection.borrow_and_update();
                info!(%state, "monitor: connection");
                if state == ConnectionState::Closed {
                    break;
                }
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                for detection in new_detections(&state, last_seen.as_ref()) {
                    log_detection(detection);
                }
                if let Some(newest) = state.detections.front() {
                    last_seen = Some(newest.id.clone());
                }
                if status_changed(&last_status, &state.system_status) {
                    let status = &state.system_status;
                    info!(
                        camera = ?status.camera,
                        model = ?status.model,
                        detection_active = status.detection_active,
                        ws_connected = status.ws_connected,
                        fps = status.fps,
                        "monitor: status"
                    );
                }
                last_status = state.system_status;
            }
        }
    }

    channel.shutdown().await;
    info!("monitor: stopped");
    Ok(())
}
