//! Liveness probing of the hosting page.
//!
//! The emulator socket can stay nominally open after the page that bridges
//! the sensors has become unreachable. While a connection is open the
//! [`TransportClient`][crate::TransportClient] periodically runs a
//! [`LivenessProbe`]; the first failure closes the connection.

use std::time::Duration;

use async_trait::async_trait;
use sensorlink_types::LinkError;
use tracing::debug;

/// A lightweight check that the hosting context is still reachable.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    /// Return `Ok(())` while the hosting context answers.
    async fn check(&self) -> Result<(), LinkError>;
}

/// Issues `HEAD <origin>` against the page's own origin.
///
/// Any transport-level failure (refused connection, DNS error, timeout) is a
/// probe failure. An HTTP error status is not: the origin answered.
#[derive(Debug, Clone)]
pub struct HttpHeadProbe {
    client: reqwest::Client,
    origin: String,
    timeout: Duration,
}

impl HttpHeadProbe {
    /// Build a probe for `origin` (e.g. `"http://192.168.1.20:8000"`) whose
    /// requests give up after `timeout`.
    pub fn new(origin: impl Into<String>, timeout: Duration) -> Result<Self, LinkError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LinkError::Probe(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            origin: origin.into(),
            timeout,
        })
    }

    /// Build a probe that runs every `interval`. Requests time out after
    /// three quarters of the interval so a hung request fails before the
    /// next tick is due.
    pub fn for_interval(origin: impl Into<String>, interval: Duration) -> Result<Self, LinkError> {
        Self::new(origin, interval * 3 / 4)
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl LivenessProbe for HttpHeadProbe {
    async fn check(&self) -> Result<(), LinkError> {
        let response = self
            .client
            .head(&self.origin)
            .send()
            .await
            .map_err(|e| LinkError::Probe(format!("HEAD {}: {e}", self.origin)))?;
        debug!(origin = %self.origin, status = %response.status(), "liveness probe ok");
        Ok(())
    }
}
