//! Client state store: a pure reducer over [`AppState`] plus the shared
//! [`Store`] handle every consumer dispatches through.

use std::{collections::VecDeque, sync::Arc};

use serde::{Deserialize, Serialize};
use shared::domain::{
    Detection, Gesture, GestureId, ModalKind, ModalState, SystemStatus, SystemStatusPatch,
    TrainingPatch, TrainingState,
};
use tokio::sync::watch;
use tracing::{debug, trace};

/// Detections kept in memory, most recent first.
pub const MAX_DETECTIONS: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub gestures: Vec<Gesture>,
    pub detections: VecDeque<Detection>,
    pub system_status: SystemStatus,
    pub training_state: TrainingState,
    pub modal_state: ModalState,
    pub selected_gesture_id: Option<GestureId>,
    pub needs_retrain: bool,
}

impl AppState {
    pub fn gesture(&self, id: &GestureId) -> Option<&Gesture> {
        self.gestures.iter().find(|gesture| &gesture.id == id)
    }

    pub fn selected_gesture(&self) -> Option<&Gesture> {
        self.selected_gesture_id
            .as_ref()
            .and_then(|id| self.gesture(id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppAction {
    SetGestures(Vec<Gesture>),
    AddGesture(Gesture),
    UpdateGesture(Gesture),
    UpdateGestureAction {
        id: GestureId,
        action: String,
    },
    DeleteGesture(GestureId),
    AddDetection(Detection),
    ClearDetections,
    UpdateSystemStatus(SystemStatusPatch),
    UpdateTrainingState(TrainingPatch),
    /// Replaces the training state outright. Used when a new run starts so
    /// the previous run's accuracy and error do not linger.
    SetTrainingState(TrainingState),
    RecordActionExecuted,
    SelectGesture(Option<GestureId>),
    OpenModal {
        #[serde(rename = "type")]
        kind: ModalKind,
        #[serde(rename = "data", default)]
        payload: Option<serde_json::Value>,
    },
    CloseModal,
    SetNeedsRetrain(bool),
    ResetState,
}

impl AppAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetGestures(_) => "SET_GESTURES",
            Self::AddGesture(_) => "ADD_GESTURE",
            Self::UpdateGesture(_) => "UPDATE_GESTURE",
            Self::UpdateGestureAction { .. } => "UPDATE_GESTURE_ACTION",
            Self::DeleteGesture(_) => "DELETE_GESTURE",
            Self::AddDetection(_) => "ADD_DETECTION",
            Self::ClearDetections => "CLEAR_DETECTIONS",
            Self::UpdateSystemStatus(_) => "UPDATE_SYSTEM_STATUS",
            Self::UpdateTrainingState(_) => "UPDATE_TRAINING_STATE",
            Self::SetTrainingState(_) => "SET_TRAINING_STATE",
            Self::RecordActionExecuted => "RECORD_ACTION_EXECUTED",
            Self::SelectGesture(_) => "SELECT_GESTURE",
            Self::OpenModal { .. } => "OPEN_MODAL",
            Self::CloseModal => "CLOSE_MODAL",
            Self::SetNeedsRetrain(_) => "SET_NEEDS_RETRAIN",
            Self::ResetState => "RESET_STATE",
        }
    }
}

/// Applies one action. Pure and total: no clocks, no I/O, every action yields
/// a state.
pub fn reduce(mut state: AppState, action: AppAction) -> AppState {
    match action {
        AppAction::SetGestures(gestures) => {
            state.gestures = gestures;
        }
        AppAction::AddGesture(gesture) => {
            match state.gestures.iter_mut().find(|g| g.id == gesture.id) {
                Some(existing) => *existing = gesture,
                None => state.gestures.push(gesture),
            }
            state.needs_retrain = true;
        }
        AppAction::UpdateGesture(gesture) => {
            if let Some(existing) = state.gestures.iter_mut().find(|g| g.id == gesture.id) {
                *existing = gesture;
            }
        }
        AppAction::UpdateGestureAction { id, action } => {
            if let Some(existing) = state.gestures.iter_mut().find(|g| g.id == id) {
                existing.action = action;
            }
        }
        AppAction::DeleteGesture(id) => {
            state.gestures.retain(|g| g.id != id);
            if state.selected_gesture_id.as_ref() == Some(&id) {
                state.selected_gesture_id = None;
            }
            state.needs_retrain = true;
        }
        AppAction::AddDetection(detection) => {
            state.detections.push_front(detection);
            state.detections.truncate(MAX_DETECTIONS);
        }
        AppAction::ClearDetections => {
            state.detections.clear();
        }
        AppAction::UpdateSystemStatus(patch) => {
            state.system_status.apply(patch);
        }
        AppAction::UpdateTrainingState(patch) => {
            state.training_state.apply(patch);
        }
        AppAction::SetTrainingState(training) => {
            state.training_state = training;
        }
        AppAction::RecordActionExecuted => {
            let executed = state.system_status.actions_executed.unwrap_or(0);
            state.system_status.actions_executed = Some(executed.saturating_add(1));
        }
        AppAction::SelectGesture(id) => {
            state.selected_gesture_id = id;
        }
        AppAction::OpenModal { kind, payload } => {
            state.modal_state = ModalState {
                kind: Some(kind),
                payload,
            };
        }
        AppAction::CloseModal => {
            state.modal_state = ModalState::default();
        }
        AppAction::SetNeedsRetrain(needs_retrain) => {
            state.needs_retrain = needs_retrain;
        }
        AppAction::ResetState => {
            state = AppState::default();
        }
    }
    state
}

/// Shared handle to the application state.
///
/// Created once at startup and handed to every consumer; the state lives as
/// long as any clone does. All mutation goes through [`Store::dispatch`], which
/// serializes reducers under the watch channel's lock.
#[derive(Clone)]
pub struct Store {
    state: Arc<watch::Sender<AppState>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self::with_state(AppState::default())
    }

    pub fn with_state(state: AppState) -> Self {
        let (state, _) = watch::channel(state);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn dispatch(&self, action: AppAction) {
        let name = action.name();
        self.state.send_modify(|state| {
            let current = std::mem::take(state);
            *state = reduce(current, action);
        });
        trace!(action = name, "store: dispatched");
    }

    /// Dispatches an action in its JSON form (`{"type": ..., "payload": ...}`).
    /// Unrecognised or malformed actions leave the state untouched.
    pub fn dispatch_json(&self, raw: &str) -> bool {
        match serde_json::from_str::<AppAction>(raw) {
            Ok(action) => {
                self.dispatch(action);
                true
            }
            Err(err) => {
                debug!(%err, "store: ignoring unrecognised action");
                false
            }
        }
    }

    pub fn snapshot(&self) -> AppState {
        self.state.borrow().clone()
    }

    /// Reads without cloning the whole state.
    pub fn read<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        f(&self.state.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.state.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
