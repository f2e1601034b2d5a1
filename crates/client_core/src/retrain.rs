use std::time::Duration;

use shared::{
    domain::{ModalKind, TrainingPatch, TrainingState},
    protocol::ChannelEvent,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::{dashboard::Dashboard, error::FlowError, store::AppAction};

/// Reported when the backend finishes without an accuracy figure.
const DEFAULT_ACCURACY: f64 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub enum RetrainPhase {
    Idle,
    Training,
    Success { accuracy: f64 },
    Error(String),
}

/// Model retrain modal. Completion arrives on the shared push channel, so
/// the caller hands in a receiver subscribed before [`RetrainFlow::start`].
pub struct RetrainFlow {
    dashboard: Dashboard,
    phase: RetrainPhase,
}

impl RetrainFlow {
    pub fn open(dashboard: Dashboard) -> Self {
        dashboard.store().dispatch(AppAction::OpenModal {
            kind: ModalKind::Retrain,
            payload: None,
        });
        Self {
            dashboard,
            phase: RetrainPhase::Idle,
        }
    }

    pub fn phase(&self) -> &RetrainPhase {
        &self.phase
    }

    /// Allowed from `Idle`, `Success` and `Error`.
    pub async fn start(&mut self) -> Result<(), FlowError> {
        if self.phase == RetrainPhase::Training {
            return Err(FlowError::TrainingInProgress);
        }
        self.phase = RetrainPhase::Training;
        self.dashboard
            .store()
            .dispatch(AppAction::SetTrainingState(TrainingState {
                in_progress: true,
                progress: 0,
                ..TrainingState::default()
            }));

        if let Err(err) = self.dashboard.gateway().start_training().await {
            warn!(%err, "retrain: request failed");
            let message = err.to_string();
            self.phase = RetrainPhase::Error(message.clone());
            self.dashboard
                .store()
                .dispatch(AppAction::UpdateTrainingState(TrainingPatch {
                    in_progress: Some(false),
                    error: Some(message),
                    ..TrainingPatch::default()
                }));
            return Err(err.into());
        }
        info!("retrain: training started");
        Ok(())
    }

    /// Returns true when `event` finished the retrain. Capture completions
    /// (which name a gesture) are not model retrains and are skipped.
    pub fn observe(&mut self, event: &ChannelEvent) -> bool {
        if self.phase != RetrainPhase::Training {
            return false;
        }
        let ChannelEvent::TrainingComplete(done) = event else {
            return false;
        };
        if !done.is_model_retrain() {
            debug!(gesture_id = ?done.gesture_id, "retrain: ignoring capture completion");
            return false;
        }

        let accuracy = done.accuracy.unwrap_or(DEFAULT_ACCURACY);
        self.phase = RetrainPhase::Success { accuracy };
        let store = self.dashboard.store();
        store.dispatch(AppAction::UpdateTrainingState(TrainingPatch {
            in_progress: Some(false),
            progress: Some(100),
            accuracy: Some(accuracy),
            ..TrainingPatch::default()
        }));
        store.dispatch(AppAction::SetNeedsRetrain(false));
        info!(accuracy, "retrain: model ready");
        true
    }

    /// Waits for completion. On timeout the phase stays `Training`.
    pub async fn wait_for_completion(
        &mut self,
        events: &mut broadcast::Receiver<ChannelEvent>,
        limit: Duration,
    ) -> Result<f64, FlowError> {
        if self.phase == RetrainPhase::Training {
            tokio::time::timeout(limit, self.next_completion(events))
                .await
                .map_err(|_| FlowError::Timeout)??;
        }

        match &self.phase {
            RetrainPhase::Success { accuracy } => Ok(*accuracy),
            RetrainPhase::Error(message) => Err(FlowError::TrainingFailed(message.clone())),
            RetrainPhase::Idle | RetrainPhase::Training => Err(FlowError::NotStarted),
        }
    }

    async fn next_completion(
        &mut self,
        events: &mut broadcast::Receiver<ChannelEvent>,
    ) -> Result<(), FlowError> {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if self.observe(&event) {
                        return Ok(());
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "retrain: lagged behind channel");
                }
                Err(RecvError::Closed) => return Err(FlowError::ChannelClosed),
            }
        }
    }

    /// Refused while training; otherwise resets to `Idle` and closes the modal.
    pub fn close(&mut self) -> Result<(), FlowError> {
        if self.phase == RetrainPhase::Training {
            return Err(FlowError::TrainingInProgress);
        }
        self.phase = RetrainPhase::Idle;
        self.dashboard.store().dispatch(AppAction::CloseModal);
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/retrain_tests.rs"]
mod tests;
