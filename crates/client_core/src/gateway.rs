use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize};
use shared::{
    domain::{Gesture, GestureId, SystemStatusPatch},
    protocol::{BackendReply, CaptureRequest, GestureUpdate, StatusUpdateReply},
};
use tracing::debug;
use url::Url;

use crate::error::GatewayError;

/// REST surface of the recognition backend.
#[async_trait]
pub trait GestureGateway: Send + Sync {
    async fn list_gestures(&self) -> Result<Vec<Gesture>, GatewayError>;

    /// Returns the record as the backend stored it.
    async fn create_gesture(&self, gesture: &Gesture) -> Result<Gesture, GatewayError>;

    async fn update_gesture(
        &self,
        id: &GestureId,
        update: &GestureUpdate,
    ) -> Result<(), GatewayError>;

    async fn delete_gesture(&self, id: &GestureId) -> Result<(), GatewayError>;

    /// Returns the backend's view of the status afterwards, when it sends one.
    async fn update_system_status(
        &self,
        patch: &SystemStatusPatch,
    ) -> Result<Option<SystemStatusPatch>, GatewayError>;

    async fn start_capture(&self, request: &CaptureRequest) -> Result<(), GatewayError>;

    async fn start_training(&self) -> Result<(), GatewayError>;
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CreateGestureReply {
    status: Option<String>,
    message: Option<String>,
    gesture: Option<Gesture>,
}

#[derive(Clone)]
pub struct HttpGateway {
    http: Client,
    base: Url,
}

impl HttpGateway {
    pub fn new(base: Url, timeout: Duration) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GatewayError::Client)?;
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// MJPEG preview stream; consumed directly by whatever renders video.
    pub fn video_feed_url(&self) -> Url {
        self.url(&["video_feed"])
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn execute(
        &self,
        method: &'static str,
        url: &Url,
        request: RequestBuilder,
    ) -> Result<String, GatewayError> {
        debug!(method, %url, "gateway: request");
        let transport = |source: reqwest::Error| GatewayError::Transport {
            method,
            url: url.to_string(),
            source,
        };
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                method,
                url: url.to_string(),
                status,
            });
        }
        response.text().await.map_err(transport)
    }

    /// Runs a mutation whose body is the usual `{status, message}` envelope.
    async fn mutate(
        &self,
        method: &'static str,
        url: Url,
        request: RequestBuilder,
    ) -> Result<(), GatewayError> {
        let body = self.execute(method, &url, request).await?;
        let reply: BackendReply = decode(&url, &body)?;
        match reply.rejection() {
            Some(message) => Err(GatewayError::Rejected(message)),
            None => Ok(()),
        }
    }
}

fn decode<T: DeserializeOwned + Default>(url: &Url, body: &str) -> Result<T, GatewayError> {
    if body.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(body).map_err(|source| GatewayError::Decode {
        url: url.to_string(),
        source,
    })
}

#[async_trait]
impl GestureGateway for HttpGateway {
    async fn list_gestures(&self) -> Result<Vec<Gesture>, GatewayError> {
        let url = self.url(&["gestures"]);
        let body = self
            .execute("GET", &url, self.http.get(url.clone()))
            .await?;
        decode(&url, &body)
    }

    async fn create_gesture(&self, gesture: &Gesture) -> Result<Gesture, GatewayError> {
        let url = self.url(&["gestures"]);
        let body = self
            .execute("POST", &url, self.http.post(url.clone()).json(gesture))
            .await?;
        let reply: CreateGestureReply = decode(&url, &body)?;
        if reply.status.as_deref() == Some("error") {
            return Err(GatewayError::Rejected(
                reply.message.unwrap_or_else(|| "unspecified error".into()),
            ));
        }
        // The backend does not keep timestamps, so ours survive the echo.
        Ok(match reply.gesture {
            Some(stored) => Gesture {
                created_at: gesture.created_at,
                updated_at: gesture.updated_at,
                ..stored
            },
            None => gesture.clone(),
        })
    }

    async fn update_gesture(
        &self,
        id: &GestureId,
        update: &GestureUpdate,
    ) -> Result<(), GatewayError> {
        let url = self.url(&["gestures", id.as_str()]);
        let request = self.http.put(url.clone()).json(update);
        self.mutate("PUT", url, request).await
    }

    async fn delete_gesture(&self, id: &GestureId) -> Result<(), GatewayError> {
        let url = self.url(&["gestures", id.as_str()]);
        let request = self.http.delete(url.clone());
        self.mutate("DELETE", url, request).await
    }

    async fn update_system_status(
        &self,
        patch: &SystemStatusPatch,
    ) -> Result<Option<SystemStatusPatch>, GatewayError> {
        let url = self.url(&["system", "status"]);
        let body = self
            .execute("POST", &url, self.http.post(url.clone()).json(patch))
            .await?;
        let reply: StatusUpdateReply = decode(&url, &body)?;
        if reply.status.as_deref() == Some("error") {
            return Err(GatewayError::Rejected("status update refused".into()));
        }
        Ok(reply.system_status.filter(|reported| !reported.is_empty()))
    }

    async fn start_capture(&self, request: &CaptureRequest) -> Result<(), GatewayError> {
        let url = self.url(&["train", "capture"]);
        let builder = self.http.post(url.clone()).json(request);
        self.mutate("POST", url, builder).await
    }

    async fn start_training(&self) -> Result<(), GatewayError> {
        let url = self.url(&["train", "model"]);
        let builder = self.http.post(url.clone());
        self.mutate("POST", url, builder).await
    }
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
