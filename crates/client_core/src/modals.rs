use serde_json::json;
use shared::{
    actions::is_known_action,
    domain::{Gesture, GestureId, ModalKind},
};

use crate::{dashboard::Dashboard, error::FlowError, store::AppAction};

/// Edits a gesture's name and action (`editGesture`), or only its action
/// (`mapAction`).
pub struct EditGestureFlow {
    dashboard: Dashboard,
    kind: ModalKind,
    original: Gesture,
    name: String,
    action: String,
}

impl EditGestureFlow {
    pub fn open_edit(dashboard: Dashboard, id: &GestureId) -> Result<Self, FlowError> {
        Self::open(dashboard, id, ModalKind::EditGesture)
    }

    pub fn open_map_action(dashboard: Dashboard, id: &GestureId) -> Result<Self, FlowError> {
        Self::open(dashboard, id, ModalKind::MapAction)
    }

    fn open(dashboard: Dashboard, id: &GestureId, kind: ModalKind) -> Result<Self, FlowError> {
        let store = dashboard.store().clone();
        let original = store
            .read(|state| state.gesture(id).cloned())
            .ok_or_else(|| FlowError::UnknownGesture(id.clone()))?;
        store.dispatch(AppAction::SelectGesture(Some(id.clone())));
        store.dispatch(AppAction::OpenModal {
            kind,
            payload: Some(json!({ "gestureId": id })),
        });
        Ok(Self {
            dashboard,
            kind,
            name: original.name.clone(),
            action: original.action.clone(),
            original,
        })
    }

    pub fn kind(&self) -> ModalKind {
        self.kind
    }

    pub fn gesture(&self) -> &Gesture {
        &self.original
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    /// Ignored for `mapAction`, which only touches the action.
    pub fn set_name(&mut self, name: impl Into<String>) {
        if self.kind == ModalKind::EditGesture {
            self.name = name.into();
        }
    }

    pub fn set_action(&mut self, action: impl Into<String>) {
        self.action = action.into();
    }

    pub fn is_dirty(&self) -> bool {
        self.name.trim() != self.original.name || self.action != self.original.action
    }

    pub fn can_save(&self) -> bool {
        self.check().is_ok()
    }

    /// Persists the change, updates the store and closes the modal. A failed
    /// save leaves the modal open.
    pub async fn save(self) -> Result<Gesture, (Self, FlowError)> {
        if let Err(err) = self.check() {
            return Err((self, err));
        }
        let id = self.original.id.clone();
        let saved = match self.kind {
            ModalKind::MapAction => self
                .dashboard
                .map_action(&id, &self.action)
                .await
                .map(|()| Gesture {
                    action: self.action.clone(),
                    ..self.original.clone()
                }),
            _ => {
                self.dashboard
                    .update_gesture(&id, &self.name, &self.action)
                    .await
            }
        };
        match saved {
            Ok(gesture) => {
                self.dashboard.store().dispatch(AppAction::CloseModal);
                Ok(gesture)
            }
            Err(err) => Err((self, err)),
        }
    }

    pub fn cancel(self) {
        self.dashboard.store().dispatch(AppAction::CloseModal);
    }

    fn check(&self) -> Result<(), FlowError> {
        if self.name.trim().is_empty() {
            return Err(FlowError::EmptyName);
        }
        if !is_known_action(&self.action) {
            return Err(FlowError::UnknownAction(self.action.clone()));
        }
        if !self.is_dirty() {
            return Err(FlowError::Unchanged);
        }
        Ok(())
    }
}

pub struct DeleteGestureFlow {
    dashboard: Dashboard,
    id: GestureId,
    name: String,
}

impl DeleteGestureFlow {
    pub fn open(dashboard: Dashboard, id: &GestureId) -> Result<Self, FlowError> {
        let store = dashboard.store().clone();
        let name = store
            .read(|state| state.gesture(id).map(|gesture| gesture.name.clone()))
            .ok_or_else(|| FlowError::UnknownGesture(id.clone()))?;
        store.dispatch(AppAction::OpenModal {
            kind: ModalKind::DeleteGesture,
            payload: Some(json!({ "id": id, "name": name })),
        });
        Ok(Self {
            dashboard,
            id: id.clone(),
            name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The store changes only after the backend confirms the delete.
    pub async fn confirm(self) -> Result<(), (Self, FlowError)> {
        match self.dashboard.delete_gesture(&self.id).await {
            Ok(()) => {
                self.dashboard.store().dispatch(AppAction::CloseModal);
                Ok(())
            }
            Err(err) => Err((self, err)),
        }
    }

    pub fn cancel(self) {
        self.dashboard.store().dispatch(AppAction::CloseModal);
    }
}

#[cfg(test)]
#[path = "tests/modals_tests.rs"]
mod tests;
