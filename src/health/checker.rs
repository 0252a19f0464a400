//! HTTP liveness probe.
//!
//! A probe is a single GET to the job's target URL. Exactly `200 OK` within
//! the timeout counts as alive; any other status, a transport error or a
//! timeout counts as dead.

use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use tokio::sync::mpsc;

use crate::health::job::{CheckResult, HealthJob};
use crate::health::pool::{BoxError, Reusable};
use crate::observability::metrics;

pub struct Checker {
    /// `None` once closed.
    client: Option<Client>,
    timeout: Duration,
}

impl std::fmt::Debug for Checker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checker")
            .field("timeout", &self.timeout)
            .field("closed", &self.client.is_none())
            .finish()
    }
}

impl Checker {
    /// Build a checker whose probes give up after `timeout`.
    ///
    /// Both `http` and `https` targets are supported.
    pub fn new(timeout: Duration, user_agent: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent.into())
            .build()?;
        Ok(Self {
            client: Some(client),
            timeout,
        })
    }

    /// Factory for a [`CheckerPool`](crate::health::pool::CheckerPool).
    pub fn factory(
        timeout: Duration,
        user_agent: impl Into<String>,
    ) -> impl Fn() -> Result<Checker, BoxError> + Send + Sync + 'static {
        let user_agent = user_agent.into();
        move || Checker::new(timeout, user_agent.clone()).map_err(BoxError::from)
    }

    /// Run the job if it is due at `now` and report the outcome on `results`.
    ///
    /// Returns `false` when the job was not due, in which case nothing is
    /// probed or reported.
    pub async fn check(&self, job: &HealthJob, now: Instant, results: &mpsc::Sender<CheckResult>) -> bool {
        if !job.try_claim(now) {
            return false;
        }

        let is_alive = self.probe(job.target_url()).await;
        metrics::record_probe(is_alive);

        let result = CheckResult {
            instance_key: job.instance_key().to_string(),
            is_alive,
        };
        if results.send(result).await.is_err() {
            tracing::debug!(key = %job.instance_key(), "Result channel closed, dropping check result");
        }
        true
    }

    /// Probe `url` once.
    pub async fn probe(&self, url: &str) -> bool {
        let Some(client) = self.client.as_ref() else {
            tracing::error!(url = %url, "Probe attempted with a closed checker");
            return false;
        };

        match client.get(url).send().await {
            Ok(response) => {
                let alive = response.status() == StatusCode::OK;
                if alive {
                    tracing::debug!(url = %url, "Health check passed");
                } else {
                    tracing::warn!(url = %url, status = %response.status(), "Health check failed: unexpected status");
                }
                alive
            }
            Err(e) if e.is_timeout() => {
                tracing::warn!(url = %url, timeout_ms = self.timeout.as_millis() as u64, "Health check failed: timeout");
                false
            }
            Err(e) if e.is_builder() => {
                tracing::warn!(url = %url, error = %e, "Health check failed: invalid url");
                false
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Health check failed: connection error");
                false
            }
        }
    }
}

impl Reusable for Checker {
    fn close(&mut self) {
        self.client = None;
    }

    fn is_closed(&self) -> bool {
        self.client.is_none()
    }
}
