//! Push-channel client: one long-lived WebSocket subscription that feeds the
//! store and re-broadcasts every decoded event to in-process subscribers.

use std::{fmt, time::Duration};

use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use shared::{
    domain::{DetectionId, SystemStatusPatch},
    protocol::{ChannelEvent, ChannelFrame},
};
use tokio::{
    net::TcpStream,
    sync::{broadcast, mpsc, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::store::{AppAction, Store};

const EVENT_BUFFER: usize = 256;

/// Decides how long to wait before reconnect attempt `attempt` (1-based,
/// reset after every successful open). `None` stops reconnecting.
pub trait ReconnectPolicy: Send {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration>;
}

impl<P: ReconnectPolicy + ?Sized> ReconnectPolicy for Box<P> {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        (**self).next_delay(attempt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay(pub Duration);

impl ReconnectPolicy for FixedDelay {
    fn next_delay(&mut self, _attempt: u32) -> Option<Duration> {
        Some(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialBackoff {
    pub initial: Duration,
    pub max: Duration,
    pub factor: f64,
}

impl ReconnectPolicy for ExponentialBackoff {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        let exponent = attempt.saturating_sub(1).min(64) as i32;
        let secs = self.initial.as_secs_f64() * self.factor.powi(exponent);
        if !secs.is_finite() || secs >= self.max.as_secs_f64() {
            return Some(self.max);
        }
        Some(Duration::from_secs_f64(secs.max(0.0)))
    }
}

/// Stops after `max_attempts` consecutive failures.
pub struct Limited<P> {
    pub inner: P,
    pub max_attempts: u32,
}

impl<P: ReconnectPolicy> ReconnectPolicy for Limited<P> {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        if attempt > self.max_attempts {
            return None;
        }
        self.inner.next_delay(attempt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Shut down, or the reconnect policy gave up. Terminal.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closed => "closed",
        })
    }
}

/// Applies the store-facing effects of one inbound event.
pub fn apply_event(store: &Store, event: &ChannelEvent) {
    match event {
        ChannelEvent::Status(status) => {
            store.dispatch(AppAction::UpdateSystemStatus(status.to_patch()));
        }
        ChannelEvent::Detection(detection) => {
            let has_action = detection.has_action();
            store.dispatch(AppAction::AddDetection(
                detection
                    .clone()
                    .into_detection(DetectionId::generate(), Utc::now()),
            ));
            if has_action {
                store.dispatch(AppAction::RecordActionExecuted);
            }
        }
        ChannelEvent::Training(progress) => {
            debug!(
                gesture_id = ?progress.gesture_id,
                sample_count = ?progress.sample_count,
                target = ?progress.target,
                "channel: training progress"
            );
        }
        ChannelEvent::TrainingComplete(done) => {
            debug!(gesture_id = ?done.gesture_id, accuracy = ?done.accuracy, "channel: training complete");
        }
        ChannelEvent::Error(message) => {
            error!(%message, "channel: backend reported error");
        }
        ChannelEvent::Heartbeat => {}
        ChannelEvent::Unknown(kind) => {
            debug!(%kind, "channel: ignoring unknown frame type");
        }
    }
}

pub struct ChannelHandle {
    state: watch::Receiver<ConnectionState>,
    events: broadcast::Sender<ChannelEvent>,
    outbound: mpsc::UnboundedSender<String>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ChannelHandle {
    /// Starts the connection task. The first connect attempt happens
    /// immediately; the handle owns the task and stopping it is explicit.
    pub fn spawn(endpoint: Url, store: Store, policy: Box<dyn ReconnectPolicy>) -> Self {
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);

        let worker = Worker {
            endpoint,
            store,
            policy,
            state: state_tx,
            events: events.clone(),
            outbound: outbound_rx,
            shutdown: shutdown_rx,
        };
        let task = tokio::spawn(worker.run());

        Self {
            state,
            events,
            outbound,
            shutdown,
            task,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }

    pub fn connection(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connection() == ConnectionState::Connected
    }

    /// Queues a text frame. Returns `false` without sending when the channel
    /// is not open.
    pub fn send<T: Serialize>(&self, message: &T) -> bool {
        if !self.is_connected() {
            debug!("channel: send dropped while not connected");
            return false;
        }
        match serde_json::to_string(message) {
            Ok(text) => self.outbound.send(text).is_ok(),
            Err(err) => {
                warn!(%err, "channel: failed to encode outbound frame");
                false
            }
        }
    }

    /// Closes the socket, cancels any pending reconnect and waits for the
    /// task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            warn!(%err, "channel: task ended abnormally");
        }
    }
}

enum PumpOutcome {
    Closed,
    Shutdown,
}

struct Worker {
    endpoint: Url,
    store: Store,
    policy: Box<dyn ReconnectPolicy>,
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<ChannelEvent>,
    outbound: mpsc::UnboundedReceiver<String>,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    async fn run(mut self) {
        let mut attempt: u32 = 0;
        loop {
            if *self.shutdown.borrow() {
                break;
            }
            self.set_state(ConnectionState::Connecting);
            let connected = tokio::select! {
                result = connect_async(self.endpoint.as_str()) => Some(result),
                _ = self.shutdown.changed() => None,
            };
            let Some(result) = connected else {
                break;
            };

            match result {
                Ok((stream, _)) => {
                    attempt = 0;
                    info!(endpoint = %self.endpoint, "channel: connected");
                    while self.outbound.try_recv().is_ok() {}
                    self.set_state(ConnectionState::Connected);
                    if let PumpOutcome::Shutdown = self.pump(stream).await {
                        break;
                    }
                    info!(endpoint = %self.endpoint, "channel: connection closed");
                }
                Err(err) => {
                    warn!(endpoint = %self.endpoint, %err, "channel: connect failed");
                }
            }

            self.set_state(ConnectionState::Disconnected);
            self.store.dispatch(AppAction::UpdateSystemStatus(
                SystemStatusPatch::ws_connected(false),
            ));

            attempt = attempt.saturating_add(1);
            let Some(delay) = self.policy.next_delay(attempt) else {
                warn!(attempt, "channel: reconnect policy gave up");
                break;
            };
            debug!(attempt, delay_ms = delay.as_millis() as u64, "channel: reconnecting");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.changed() => break,
            }
        }

        self.set_state(ConnectionState::Closed);
        self.store.dispatch(AppAction::UpdateSystemStatus(
            SystemStatusPatch::ws_connected(false),
        ));
        debug!("channel: stopped");
    }

    async fn pump(&mut self, stream: WebSocketStream<MaybeTlsStream<TcpStream>>) -> PumpOutcome {
        let (mut writer, mut reader) = stream.split();
        let Self {
            store,
            events,
            outbound,
            shutdown,
            ..
        } = self;

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    let _ = writer.send(Message::Close(None)).await;
                    return PumpOutcome::Shutdown;
                }
                queued = outbound.recv() => match queued {
                    Some(text) => {
                        if let Err(err) = writer.send(Message::Text(text)).await {
                            warn!(%err, "channel: send failed");
                            return PumpOutcome::Closed;
                        }
                    }
                    None => {
                        let _ = writer.send(Message::Close(None)).await;
                        return PumpOutcome::Shutdown;
                    }
                },
                incoming = reader.next() => match incoming {
                    Some(Ok(Message::Text(text))) => handle_text(store, events, &text),
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "channel: close frame received");
                        return PumpOutcome::Closed;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(%err, "channel: receive failed");
                        return PumpOutcome::Closed;
                    }
                    None => return PumpOutcome::Closed,
                },
            }
        }
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "channel: state");
        }
    }
}

fn handle_text(store: &Store, events: &broadcast::Sender<ChannelEvent>, text: &str) {
    match ChannelFrame::decode(text) {
        Ok(frame) => {
            apply_event(store, &frame.event);
            let _ = events.send(frame.event);
        }
        Err(err) => warn!(%err, "channel: dropping malformed frame"),
    }
}

#[cfg(test)]
#[path = "tests/channel_tests.rs"]
mod tests;
