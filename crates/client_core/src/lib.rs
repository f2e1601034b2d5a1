//! Client side of the gesture-control dashboard: state store, push channel,
//! REST gateway and the modal flows built on them.

pub mod channel;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod gateway;
pub mod modals;
pub mod retrain;
pub mod store;
pub mod wizard;

pub use channel::{ChannelHandle, ConnectionState, ExponentialBackoff, FixedDelay, ReconnectPolicy};
pub use config::{ClientSettings, ReconnectSettings, ReconnectStrategy};
pub use dashboard::Dashboard;
pub use error::{ConfigError, FlowError, GatewayError};
pub use gateway::{GestureGateway, HttpGateway};
pub use modals::{DeleteGestureFlow, EditGestureFlow};
pub use retrain::{RetrainFlow, RetrainPhase};
pub use store::{AppAction, AppState, Store};
pub use wizard::{AddGestureWizard, RecordingState, WizardStep};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
