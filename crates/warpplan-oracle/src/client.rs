//! Oracle client: one validated advisory round trip.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use warpplan_core::{Clock, Decision, PlannerConfig, TelemetryWindow};

use crate::backoff::Backoff;
use crate::error::{OracleError, TransportError};
use crate::request::{Hints, build_body, system_prompt};
use crate::response::decode;
use crate::transport::{HttpTransport, OracleTransport, RawResponse};

pub struct OracleClient {
    transport: Box<dyn OracleTransport>,
    system_prompt: String,
    target: String,
}

impl OracleClient {
    pub fn new(transport: Box<dyn OracleTransport>, config: &PlannerConfig) -> Self {
        Self {
            transport,
            system_prompt: system_prompt(config),
            target: config.target.clone(),
        }
    }

    /// Build an HTTP-backed client, or `None` when no API key is configured.
    pub fn from_config(config: &PlannerConfig) -> Result<Option<Self>, TransportError> {
        let Some(api_key) = config.oracle_api_key.as_deref() else {
            return Ok(None);
        };
        let timeout = Duration::try_from_secs_f64(config.oracle_timeout_sec)
            .map_err(|_| TransportError::InvalidTimeout(config.oracle_timeout_sec))?;
        let transport = HttpTransport::new(&config.oracle_url, api_key, timeout)?;
        Ok(Some(Self::new(Box::new(transport), config)))
    }

    /// Ask the oracle for a decision.
    ///
    /// A rate-limit response trips `backoff` before returning
    /// `OracleError::RateLimited`. No other outcome touches `backoff`;
    /// resetting it after success is the caller's job.
    pub async fn invoke(
        &self,
        telemetry: &TelemetryWindow,
        hints: &Hints,
        backoff: &mut Backoff,
        clock: &dyn Clock,
    ) -> Result<Decision, OracleError> {
        let body = build_body(&self.system_prompt, telemetry, hints)?;
        let resp = self.transport.post(&body).await?;

        if is_rate_limited(&resp) {
            backoff.trip(resp.retry_after, clock.now());
            return Err(OracleError::RateLimited {
                retry_after: resp.retry_after,
            });
        }

        if !(200..300).contains(&resp.status) {
            warn!(status = resp.status, "oracle returned non-2xx");
            return Err(OracleError::Unavailable(format!(
                "oracle returned http {}",
                resp.status
            )));
        }

        let decision = decode(&resp.body, &self.target)?;
        debug!(action = %decision.action, reason = %decision.reason, "oracle decision");
        Ok(decision)
    }
}

/// HTTP 429, or a provider error body reporting exhausted quota.
fn is_rate_limited(resp: &RawResponse) -> bool {
    if resp.status == 429 {
        return true;
    }
    if resp.status < 400 {
        return false;
    }
    serde_json::from_slice::<Value>(&resp.body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/status")
                .and_then(Value::as_str)
                .map(|s| s == "RESOURCE_EXHAUSTED")
        })
        .unwrap_or(false)
}
