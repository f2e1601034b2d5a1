//! Four-step add-gesture wizard: name, action, sample recording, confirm.

use std::fmt;

use chrono::Utc;
use shared::{
    actions::{is_known_action, DEFAULT_EMOJI},
    domain::{Gesture, GestureId, ModalKind, SystemStatusPatch},
    protocol::{CaptureRequest, ChannelEvent},
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::{
    dashboard::Dashboard,
    error::FlowError,
    store::AppAction,
};

/// Fewest samples a gesture can be saved with.
pub const MIN_SAMPLES: u32 = 10;
pub const SAMPLE_TARGETS: [u32; 3] = [30, 50, 100];
pub const DEFAULT_SAMPLE_TARGET: u32 = SAMPLE_TARGETS[0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    Name,
    Action,
    Record,
    Confirm,
}

impl WizardStep {
    pub fn number(self) -> u8 {
        match self {
            Self::Name => 1,
            Self::Action => 2,
            Self::Record => 3,
            Self::Confirm => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Action => "Action",
            Self::Record => "Record",
            Self::Confirm => "Confirm",
        }
    }

    pub fn next(self) -> Option<Self> {
        match self {
            Self::Name => Some(Self::Action),
            Self::Action => Some(Self::Record),
            Self::Record => Some(Self::Confirm),
            Self::Confirm => None,
        }
    }

    pub fn prev(self) -> Option<Self> {
        match self {
            Self::Name => None,
            Self::Action => Some(Self::Name),
            Self::Record => Some(Self::Action),
            Self::Confirm => Some(Self::Record),
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/4 {}", self.number(), self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
    Complete,
}

pub struct AddGestureWizard {
    dashboard: Dashboard,
    step: WizardStep,
    name: String,
    emoji: String,
    action: Option<String>,
    target: u32,
    recording: RecordingState,
    samples: u32,
    resume_detection: bool,
}

impl AddGestureWizard {
    /// Opens the modal and pauses detection while samples are captured.
    pub async fn open(dashboard: Dashboard) -> Self {
        let store = dashboard.store().clone();
        let resume_detection = store.read(|state| state.system_status.detection_active);
        store.dispatch(AppAction::OpenModal {
            kind: ModalKind::AddGesture,
            payload: None,
        });
        if resume_detection {
            if let Err(err) = dashboard
                .update_system_status(SystemStatusPatch::detection_active(false))
                .await
            {
                warn!(%err, "wizard: failed to pause detection");
            }
        }
        Self {
            dashboard,
            step: WizardStep::Name,
            name: String::new(),
            emoji: DEFAULT_EMOJI.to_string(),
            action: None,
            target: DEFAULT_SAMPLE_TARGET,
            recording: RecordingState::Idle,
            samples: 0,
            resume_detection,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn emoji(&self) -> &str {
        &self.emoji
    }

    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    pub fn recording(&self) -> RecordingState {
        self.recording
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// Recording progress as a whole percentage of the target.
    pub fn progress(&self) -> u8 {
        if self.target == 0 {
            return 0;
        }
        (u64::from(self.samples) * 100 / u64::from(self.target)).min(100) as u8
    }

    pub fn gesture_id(&self) -> GestureId {
        GestureId::from_name(&self.name)
    }

    /// Samples are stored under the slug, so a rename that changes it throws
    /// away any capture already made.
    pub fn set_name(&mut self, name: impl Into<String>) {
        let previous = self.gesture_id();
        self.name = name.into();
        if self.gesture_id() != previous && self.recording != RecordingState::Idle {
            debug!(from = %previous, to = %self.gesture_id(), "wizard: slug changed; discarding samples");
            self.recording = RecordingState::Idle;
            self.samples = 0;
        }
    }

    pub fn set_emoji(&mut self, emoji: impl Into<String>) {
        self.emoji = emoji.into();
    }

    pub fn set_action(&mut self, action: &str) -> Result<(), FlowError> {
        if !is_known_action(action) {
            return Err(FlowError::UnknownAction(action.to_string()));
        }
        self.action = Some(action.to_string());
        Ok(())
    }

    pub fn set_target(&mut self, target: u32) -> Result<(), FlowError> {
        if !SAMPLE_TARGETS.contains(&target) {
            return Err(FlowError::InvalidTarget(target));
        }
        self.target = target;
        Ok(())
    }

    pub fn can_proceed(&self) -> bool {
        match self.step {
            WizardStep::Name => !self.name.trim().is_empty(),
            WizardStep::Action => self.action.is_some(),
            WizardStep::Record => {
                self.recording == RecordingState::Complete || self.samples >= MIN_SAMPLES
            }
            WizardStep::Confirm => true,
        }
    }

    pub fn next(&mut self) -> Result<WizardStep, FlowError> {
        if !self.can_proceed() {
            return Err(FlowError::StepIncomplete(self.step));
        }
        if let Some(next) = self.step.next() {
            self.step = next;
        }
        Ok(self.step)
    }

    pub fn back(&mut self) -> WizardStep {
        if let Some(prev) = self.step.prev() {
            self.step = prev;
        }
        self.step
    }

    /// Asks the backend to capture `target` samples for this gesture.
    pub async fn start_recording(&mut self) -> Result<(), FlowError> {
        self.expect_step(WizardStep::Record)?;
        if self.recording == RecordingState::Recording {
            return Err(FlowError::AlreadyRecording);
        }
        self.recording = RecordingState::Recording;
        self.samples = 0;

        let request = CaptureRequest {
            gesture_id: self.gesture_id(),
            num_samples: self.target,
        };
        if let Err(err) = self.dashboard.gateway().start_capture(&request).await {
            warn!(%err, gesture_id = %request.gesture_id, "wizard: capture request failed");
            self.recording = RecordingState::Idle;
            return Err(err.into());
        }
        info!(gesture_id = %request.gesture_id, target = self.target, "wizard: recording");
        Ok(())
    }

    /// Feeds one push-channel event. Returns true when it advanced this
    /// wizard's recording. Events for other gestures are ignored.
    pub fn observe(&mut self, event: &ChannelEvent) -> bool {
        if self.recording != RecordingState::Recording {
            return false;
        }
        let slug = self.gesture_id();
        match event {
            ChannelEvent::Training(progress) if progress.gesture_id.as_ref() == Some(&slug) => {
                if let Some(count) = progress.sample_count {
                    self.samples = count;
                }
                if self.samples >= self.target {
                    self.recording = RecordingState::Complete;
                }
                true
            }
            ChannelEvent::TrainingComplete(done) if done.gesture_id.as_ref() == Some(&slug) => {
                self.samples = self.samples.max(self.target);
                self.recording = RecordingState::Complete;
                true
            }
            _ => false,
        }
    }

    /// Drives [`observe`](Self::observe) from the shared channel until the
    /// recording completes or is no longer running.
    pub async fn record(
        &mut self,
        events: &mut broadcast::Receiver<ChannelEvent>,
    ) -> Result<u32, FlowError> {
        while self.recording == RecordingState::Recording {
            match events.recv().await {
                Ok(event) => {
                    if self.observe(&event) {
                        debug!(samples = self.samples, target = self.target, "wizard: progress");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "wizard: lagged behind channel");
                }
                Err(RecvError::Closed) => return Err(FlowError::ChannelClosed),
            }
        }
        Ok(self.samples)
    }

    /// Ends a recording early. It counts as complete only with enough samples.
    pub fn stop_recording(&mut self) -> RecordingState {
        if self.recording == RecordingState::Recording {
            self.recording = if self.samples >= MIN_SAMPLES {
                RecordingState::Complete
            } else {
                RecordingState::Idle
            };
        }
        self.recording
    }

    /// Creates the gesture. On success the modal closes and detection
    /// resumes; on failure the wizard stays where it is.
    pub async fn submit(self) -> Result<Gesture, (Self, FlowError)> {
        if let Err(err) = self.expect_step(WizardStep::Confirm) {
            return Err((self, err));
        }
        let now = Utc::now();
        let gesture = Gesture {
            id: self.gesture_id(),
            name: self.name.trim().to_string(),
            emoji: self.emoji.clone(),
            action: self.action.clone().unwrap_or_default(),
            sample_count: self.samples,
            confidence: None,
            created_at: now,
            updated_at: now,
        };
        match self.dashboard.create_gesture(gesture).await {
            Ok(stored) => {
                self.close().await;
                Ok(stored)
            }
            Err(err) => Err((self, err)),
        }
    }

    /// Discards all progress, closes the modal and resumes detection if the
    /// wizard paused it.
    pub async fn close(self) {
        self.dashboard.store().dispatch(AppAction::CloseModal);
        if self.resume_detection {
            if let Err(err) = self
                .dashboard
                .update_system_status(SystemStatusPatch::detection_active(true))
                .await
            {
                warn!(%err, "wizard: failed to resume detection");
            }
        }
    }

    fn expect_step(&self, expected: WizardStep) -> Result<(), FlowError> {
        if self.step != expected {
            return Err(FlowError::WrongStep {
                expected,
                actual: self.step,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/wizard_tests.rs"]
mod tests;
