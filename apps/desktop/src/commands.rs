//! One-shot subcommands against a running backend.

use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use client_core::{
    AddGestureWizard, ChannelHandle, ClientSettings, ConnectionState, Dashboard,
    DeleteGestureFlow, EditGestureFlow, HttpGateway, RecordingState, RetrainFlow, Store,
    WizardStep,
};
use client_core::wizard::MIN_SAMPLES;
use shared::{
    actions::{action_label, DESKTOP_ACTIONS},
    domain::{CameraStatus, GestureId, SystemStatusPatch},
    format::relative_time,
};
use tracing::info;

pub fn dashboard(settings: &ClientSettings) -> Result<Dashboard> {
    let gateway = HttpGateway::new(settings.api_base()?, settings.request_timeout())
        .context("failed to create gateway")?;
    Ok(Dashboard::new(Store::new(), Arc::new(gateway)))
}

async fn connect(dashboard: &Dashboard, settings: &ClientSettings) -> Result<ChannelHandle> {
    let channel = ChannelHandle::spawn(
        settings.ws_endpoint()?,
        dashboard.store().clone(),
        settings.reconnect.policy(),
    );
    let mut state = channel.watch_connection();
    tokio::time::timeout(
        Duration::from_secs(10),
        state.wait_for(|state| {
            matches!(state, ConnectionState::Connected | ConnectionState::Closed)
        }),
    )
    .await
    .context("timed out connecting to the push channel")?
    .context("push channel stopped")?;
    if !channel.is_connected() {
        bail!("push channel closed before connecting");
    }
    Ok(channel)
}

pub async fn list_gestures(settings: &ClientSettings) -> Result<()> {
    let dashboard = dashboard(settings)?;
    dashboard.refresh_gestures().await?;
    let state = dashboard.store().snapshot();
    if state.gestures.is_empty() {
        println!("no gestures yet");
        return Ok(());
    }
    let now = Utc::now();
    for gesture in &state.gestures {
        println!(
            "{} {:<20} {:<20} {:>4} samples  {:<18} updated {}",
            gesture.emoji,
            gesture.id.as_str(),
            gesture.name,
            gesture.sample_count,
            action_label(&gesture.action),
            relative_time(gesture.updated_at, now),
        );
    }
    Ok(())
}

pub fn list_actions() {
    for action in DESKTOP_ACTIONS {
        println!("{:<22} {:<20} {}", action.id, action.label, action.shortcut);
    }
}

pub async fn delete_gesture(settings: &ClientSettings, id: &str) -> Result<()> {
    let dashboard = dashboard(settings)?;
    dashboard.refresh_gestures().await?;
    let flow = DeleteGestureFlow::open(dashboard, &GestureId::new(id))?;
    let name = flow.name().to_string();
    flow.confirm().await.map_err(|(_, err)| err)?;
    println!("deleted {name}");
    Ok(())
}

pub async fn map_action(settings: &ClientSettings, id: &str, action: &str) -> Result<()> {
    let dashboard = dashboard(settings)?;
    dashboard.refresh_gestures().await?;
    let mut flow = EditGestureFlow::open_map_action(dashboard, &GestureId::new(id))?;
    flow.set_action(action);
    let gesture = flow.save().await.map_err(|(_, err)| err)?;
    println!("{} now triggers {}", gesture.name, action_label(&gesture.action));
    Ok(())
}

pub async fn rename_gesture(
    settings: &ClientSettings,
    id: &str,
    name: &str,
    action: Option<&str>,
) -> Result<()> {
    let dashboard = dashboard(settings)?;
    dashboard.refresh_gestures().await?;
    let mut flow = EditGestureFlow::open_edit(dashboard, &GestureId::new(id))?;
    flow.set_name(name);
    if let Some(action) = action {
        flow.set_action(action);
    }
    let gesture = flow.save().await.map_err(|(_, err)| err)?;
    println!("saved {} ({})", gesture.name, gesture.id);
    Ok(())
}

pub struct NewGesture {
    pub name: String,
    pub action: String,
    pub emoji: Option<String>,
    pub samples: u32,
}

/// Walks the wizard headlessly: capture samples over the push channel, then
/// create the gesture.
pub async fn add_gesture(settings: &ClientSettings, new: NewGesture) -> Result<()> {
    let dashboard = dashboard(settings)?;
    let channel = connect(&dashboard, settings).await?;
    let mut events = channel.subscribe();

    let mut wizard = AddGestureWizard::open(dashboard).await;
    let outcome = async {
        wizard.set_name(&new.name);
        if let Some(emoji) = &new.emoji {
            wizard.set_emoji(emoji);
        }
        wizard.next()?;
        wizard.set_action(&new.action)?;
        wizard.set_target(new.samples)?;
        wizard.next()?;

        info!(
            gesture_id = %wizard.gesture_id(),
            target = wizard.target(),
            "add: hold the gesture in front of the camera"
        );
        wizard.start_recording().await?;
        let interrupted = tokio::select! {
            recorded = wizard.record(&mut events) => {
                recorded?;
                false
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for ctrl-c")?;
                true
            }
        };
        if interrupted {
            wizard.stop_recording();
        }
        if wizard.recording() != RecordingState::Complete {
            bail!(
                "only {} samples captured; at least {MIN_SAMPLES} needed",
                wizard.samples()
            );
        }
        if wizard.next()? != WizardStep::Confirm {
            bail!("wizard did not reach the confirm step");
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    let result = match outcome {
        Ok(()) => match wizard.submit().await {
            Ok(gesture) => {
                println!(
                    "created {} {} with {} samples",
                    gesture.emoji, gesture.name, gesture.sample_count
                );
                println!("run `glide-desktop retrain` to include it in the model");
                Ok(())
            }
            Err((wizard, err)) => {
                wizard.close().await;
                Err(anyhow!(err))
            }
        },
        Err(err) => {
            wizard.close().await;
            Err(err)
        }
    };
    channel.shutdown().await;
    result
}

pub async fn retrain(settings: &ClientSettings, limit: Duration) -> Result<()> {
    let dashboard = dashboard(settings)?;
    let channel = connect(&dashboard, settings).await?;
    let mut events = channel.subscribe();

    let mut flow = RetrainFlow::open(dashboard);
    let result = async {
        flow.start().await?;
        println!("training started; waiting up to {}s", limit.as_secs());
        let accuracy = flow.wait_for_completion(&mut events, limit).await?;
        println!("model ready, accuracy {accuracy:.1}%");
        Ok::<_, anyhow::Error>(())
    }
    .await;
    if result.is_ok() {
        flow.close()?;
    }
    channel.shutdown().await;
    result
}

#[derive(Debug, Default)]
pub struct StatusChange {
    pub camera: Option<bool>,
    pub detection: Option<bool>,
    pub threshold: Option<f64>,
    pub speed: Option<f64>,
}

impl StatusChange {
    fn into_patch(self) -> SystemStatusPatch {
        SystemStatusPatch {
            camera: self
                .camera
                .map(|on| if on { CameraStatus::On } else { CameraStatus::Off }),
            detection_active: self.detection,
            confidence_threshold: self.threshold.map(|percent| percent.clamp(0.0, 100.0)),
            speed_factor: self.speed,
            ..SystemStatusPatch::default()
        }
    }
}

pub async fn update_status(settings: &ClientSettings, change: StatusChange) -> Result<()> {
    let patch = change.into_patch();
    if patch.is_empty() {
        bail!("nothing to change; pass --camera, --detection, --threshold or --speed");
    }
    let dashboard = dashboard(settings)?;
    dashboard.update_system_status(patch).await?;
    let status = dashboard.store().snapshot().system_status;
    println!(
        "camera {:?}, model {:?}, detection {}, cursor mode {}",
        status.camera,
        status.model,
        if status.detection_active { "on" } else { "off" },
        if status.cursor_mode.unwrap_or(false) { "on" } else { "off" },
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_change_builds_sparse_patch() {
        let patch = StatusChange {
            camera: Some(false),
            threshold: Some(120.0),
            ..StatusChange::default()
        }
        .into_patch();
        assert_eq!(patch.camera, Some(CameraStatus::Off));
        assert_eq!(patch.confidence_threshold, Some(100.0));
        assert_eq!(patch.detection_active, None);
        assert!(StatusChange::default().into_patch().is_empty());
    }
}
