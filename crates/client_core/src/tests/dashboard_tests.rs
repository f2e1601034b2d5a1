use super::*;
use shared::domain::ModelStatus;

use crate::test_support::{dashboard, gesture, FakeGateway};

#[tokio::test]
async fn seed_loads_library_and_failure_leaves_it_empty() {
    let gateway = FakeGateway::with_gestures(vec![gesture("wave", "Wave", "None")]);
    let dash = dashboard(gateway.clone(), Vec::new());
    dash.spawn_seed().await.expect("seed task");
    assert_eq!(dash.store().snapshot().gestures.len(), 1);

    let failing = FakeGateway::with_gestures(vec![gesture("wave", "Wave", "None")]);
    failing.fail_on("list_gestures");
    let dash = dashboard(failing.clone(), Vec::new());
    dash.spawn_seed().await.expect("seed task");
    assert!(dash.store().snapshot().gestures.is_empty());
    assert_eq!(failing.calls(), vec!["list_gestures"]);
}

#[tokio::test]
async fn status_update_is_optimistic_and_reconciled() {
    let gateway = FakeGateway::with_gestures(Vec::new());
    gateway.reply_status_with(SystemStatusPatch {
        camera: Some(CameraStatus::Off),
        model: Some(ModelStatus::Ready),
        cursor_mode: Some(true),
        ..SystemStatusPatch::default()
    });
    let dash = dashboard(gateway.clone(), Vec::new());

    dash.set_camera(CameraStatus::Off).await.expect("status");
    let status = dash.store().snapshot().system_status;
    assert_eq!(status.camera, CameraStatus::Off);
    assert_eq!(status.model, ModelStatus::Ready);
    assert_eq!(status.cursor_mode, Some(true));
    assert_eq!(gateway.calls(), vec![r#"update_system_status {"camera":"off"}"#]);
}

#[tokio::test]
async fn failed_status_update_keeps_optimistic_value() {
    let gateway = FakeGateway::with_gestures(Vec::new());
    gateway.fail_on("update_system_status");
    let dash = dashboard(gateway, Vec::new());

    let err = dash.set_detection_active(true).await.expect_err("fails");
    assert!(matches!(err, GatewayError::Rejected(_)));
    assert!(dash.store().snapshot().system_status.detection_active);
}

#[tokio::test]
async fn toggle_flips_detection() {
    let gateway = FakeGateway::with_gestures(Vec::new());
    let dash = dashboard(gateway, Vec::new());
    assert!(dash.toggle_detection().await.expect("toggle"));
    assert!(!dash.toggle_detection().await.expect("toggle"));
}

#[tokio::test]
async fn threshold_is_clamped_to_percent() {
    let gateway = FakeGateway::with_gestures(Vec::new());
    let dash = dashboard(gateway.clone(), Vec::new());
    dash.set_confidence_threshold(140.0).await.expect("threshold");
    assert_eq!(
        dash.store().snapshot().system_status.confidence_threshold,
        Some(100.0)
    );
    assert_eq!(
        gateway.calls(),
        vec![r#"update_system_status {"confidenceThreshold":100.0}"#]
    );
}

#[tokio::test]
async fn empty_status_patch_makes_no_request() {
    let gateway = FakeGateway::with_gestures(Vec::new());
    let dash = dashboard(gateway.clone(), Vec::new());
    dash.update_system_status(SystemStatusPatch::default())
        .await
        .expect("noop");
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn create_dispatches_only_after_backend_accepts() {
    let gateway = FakeGateway::with_gestures(Vec::new());
    gateway.fail_on("create_gesture");
    let dash = dashboard(gateway.clone(), Vec::new());

    let err = dash
        .create_gesture(gesture("wave", "Wave", "mute"))
        .await
        .expect_err("rejected");
    assert!(matches!(err, FlowError::Gateway(_)));
    assert!(dash.store().snapshot().gestures.is_empty());
    assert!(!dash.store().snapshot().needs_retrain);

    gateway.recover("create_gesture");
    dash.create_gesture(gesture("wave", "Wave", "mute"))
        .await
        .expect("created");
    let state = dash.store().snapshot();
    assert_eq!(state.gestures.len(), 1);
    assert!(state.needs_retrain);
}

#[tokio::test]
async fn create_validates_before_calling_backend() {
    let gateway = FakeGateway::with_gestures(Vec::new());
    let dash = dashboard(gateway.clone(), Vec::new());
    assert!(matches!(
        dash.create_gesture(gesture("x", "  ", "mute")).await,
        Err(FlowError::EmptyName)
    ));
    assert!(matches!(
        dash.create_gesture(gesture("x", "X", "launch_rocket")).await,
        Err(FlowError::UnknownAction(_))
    ));
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn update_merges_into_existing_record() {
    let gateway = FakeGateway::with_gestures(Vec::new());
    let dash = dashboard(gateway.clone(), vec![gesture("wave", "Wave", "None")]);

    let updated = dash
        .update_gesture(&GestureId::new("wave"), " Big Wave ", "play_pause")
        .await
        .expect("update");
    assert_eq!(updated.name, "Big Wave");
    assert_eq!(updated.sample_count, 30);
    assert_eq!(dash.store().snapshot().gestures[0], updated);
    assert_eq!(
        gateway.calls(),
        vec![r#"update_gesture wave {"name":"Big Wave","action":"play_pause"}"#]
    );

    assert!(matches!(
        dash.update_gesture(&GestureId::new("ghost"), "Ghost", "mute").await,
        Err(FlowError::UnknownGesture(_))
    ));
}

#[tokio::test]
async fn delete_waits_for_backend() {
    let gateway = FakeGateway::with_gestures(Vec::new());
    gateway.fail_on("delete_gesture");
    let dash = dashboard(gateway.clone(), vec![gesture("wave", "Wave", "None")]);

    assert!(dash.delete_gesture(&GestureId::new("wave")).await.is_err());
    assert_eq!(dash.store().snapshot().gestures.len(), 1);

    gateway.recover("delete_gesture");
    dash.delete_gesture(&GestureId::new("wave"))
        .await
        .expect("deleted");
    assert!(dash.store().snapshot().gestures.is_empty());
}
