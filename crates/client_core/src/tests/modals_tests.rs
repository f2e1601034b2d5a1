use super::*;

use crate::test_support::{dashboard, gesture, FakeGateway};

fn library() -> Vec<Gesture> {
    vec![
        gesture("wave", "Wave", "None"),
        gesture("fist", "Fist", "mute"),
    ]
}

#[tokio::test]
async fn edit_opens_with_selected_gesture() {
    let gateway = FakeGateway::with_gestures(Vec::new());
    let dash = dashboard(gateway, library());
    let flow = EditGestureFlow::open_edit(dash.clone(), &GestureId::new("wave")).expect("open");

    let state = dash.store().snapshot();
    assert_eq!(state.selected_gesture_id, Some(GestureId::new("wave")));
    assert!(state.modal_state.is_open(ModalKind::EditGesture));
    assert_eq!(state.modal_state.payload_str("gestureId"), Some("wave"));
    assert_eq!(flow.name(), "Wave");
    assert!(!flow.can_save());
}

#[tokio::test]
async fn edit_requires_a_real_valid_change() {
    let gateway = FakeGateway::with_gestures(Vec::new());
    let dash = dashboard(gateway.clone(), library());
    let mut flow = EditGestureFlow::open_edit(dash, &GestureId::new("wave")).expect("open");

    flow.set_name("Wave ");
    assert!(!flow.is_dirty());

    flow.set_name("");
    let flow = match flow.save().await {
        Err((flow, FlowError::EmptyName)) => flow,
        Err((_, other)) => panic!("unexpected error {other}"),
        Ok(_) => panic!("empty name saved"),
    };

    let mut flow = flow;
    flow.set_name("Hello");
    flow.set_action("teleport");
    let flow = match flow.save().await {
        Err((flow, FlowError::UnknownAction(_))) => flow,
        Err((_, other)) => panic!("unexpected error {other}"),
        Ok(_) => panic!("unknown action saved"),
    };
    drop(flow);
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn edit_save_updates_store_and_closes() {
    let gateway = FakeGateway::with_gestures(Vec::new());
    let dash = dashboard(gateway.clone(), library());
    let mut flow = EditGestureFlow::open_edit(dash.clone(), &GestureId::new("wave")).expect("open");
    flow.set_name("Hello");
    flow.set_action("volume_up");
    assert!(flow.can_save());

    let saved = match flow.save().await {
        Ok(saved) => saved,
        Err((_, err)) => panic!("save failed: {err}"),
    };
    assert_eq!(saved.name, "Hello");

    let state = dash.store().snapshot();
    assert_eq!(state.gesture(&GestureId::new("wave")).map(|g| g.action.as_str()), Some("volume_up"));
    assert_eq!(state.modal_state.kind, None);
}

#[tokio::test]
async fn map_action_changes_action_only() {
    let gateway = FakeGateway::with_gestures(Vec::new());
    let dash = dashboard(gateway.clone(), library());
    let mut flow =
        EditGestureFlow::open_map_action(dash.clone(), &GestureId::new("fist")).expect("open");
    flow.set_name("ignored");
    flow.set_action("next_track");

    let saved = match flow.save().await {
        Ok(saved) => saved,
        Err((_, err)) => panic!("save failed: {err}"),
    };
    assert_eq!(saved.name, "Fist");
    assert_eq!(saved.action, "next_track");
    assert_eq!(
        gateway.calls(),
        vec![r#"update_gesture fist {"action":"next_track"}"#]
    );
    assert_eq!(dash.store().snapshot().gestures[1].action, "next_track");
}

#[tokio::test]
async fn failed_save_keeps_modal_open() {
    let gateway = FakeGateway::with_gestures(Vec::new());
    gateway.fail_on("update_gesture");
    let dash = dashboard(gateway, library());
    let mut flow = EditGestureFlow::open_edit(dash.clone(), &GestureId::new("wave")).expect("open");
    flow.set_action("mute");

    assert!(flow.save().await.is_err());
    let state = dash.store().snapshot();
    assert!(state.modal_state.is_open(ModalKind::EditGesture));
    assert_eq!(state.gestures[0].action, "None");
}

#[tokio::test]
async fn opening_unknown_gesture_fails() {
    let gateway = FakeGateway::with_gestures(Vec::new());
    let dash = dashboard(gateway, library());
    assert!(matches!(
        EditGestureFlow::open_edit(dash.clone(), &GestureId::new("ghost")),
        Err(FlowError::UnknownGesture(_))
    ));
    assert!(matches!(
        DeleteGestureFlow::open(dash, &GestureId::new("ghost")),
        Err(FlowError::UnknownGesture(_))
    ));
}

#[tokio::test]
async fn delete_confirm_removes_after_backend() {
    let gateway = FakeGateway::with_gestures(Vec::new());
    gateway.fail_on("delete_gesture");
    let dash = dashboard(gateway.clone(), library());
    dash.store()
        .dispatch(AppAction::SelectGesture(Some(GestureId::new("wave"))));

    let flow = DeleteGestureFlow::open(dash.clone(), &GestureId::new("wave")).expect("open");
    assert_eq!(flow.name(), "Wave");
    assert_eq!(
        dash.store().snapshot().modal_state.payload_str("name"),
        Some("Wave")
    );

    let flow = match flow.confirm().await {
        Ok(()) => panic!("delete should fail"),
        Err((flow, _)) => flow,
    };
    assert!(dash
        .store()
        .snapshot()
        .modal_state
        .is_open(ModalKind::DeleteGesture));
    assert_eq!(dash.store().snapshot().gestures.len(), 2);

    gateway.recover("delete_gesture");
    assert!(flow.confirm().await.is_ok());
    let state = dash.store().snapshot();
    assert_eq!(state.gestures.len(), 1);
    assert_eq!(state.selected_gesture_id, None);
    assert_eq!(state.modal_state.kind, None);
}

#[tokio::test]
async fn cancel_closes_without_requests() {
    let gateway = FakeGateway::with_gestures(Vec::new());
    let dash = dashboard(gateway.clone(), library());
    DeleteGestureFlow::open(dash.clone(), &GestureId::new("fist"))
        .expect("open")
        .cancel();
    assert_eq!(dash.store().snapshot().modal_state.kind, None);
    assert!(gateway.calls().is_empty());
}
