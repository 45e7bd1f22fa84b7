//! Backend health monitoring.
//!
//! Probes the configured backend via [`LlmBackend::ping`] bounded by a
//! short timeout. The result is cached briefly so health endpoints stay
//! cheap, but the TTL is short enough that an outage shows up within a few
//! seconds. A probe failure is reported as `reachable = false`; it never
//! propagates as an error to the caller.

use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::backend::{GenerateOptions, LlmBackend};
use crate::error::CoreError;
use crate::models::BackendHealth;

const DEFAULT_TTL: Duration = Duration::from_secs(5);
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Caching reachability monitor for one backend.
pub struct HealthMonitor {
    ttl: Duration,
    probe_timeout: Duration,
    cached: Mutex<Option<(Instant, BackendHealth)>>,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_PROBE_TIMEOUT)
    }
}

impl HealthMonitor {
    pub fn new(ttl: Duration, probe_timeout: Duration) -> Self {
        Self {
            ttl,
            probe_timeout,
            cached: Mutex::new(None),
        }
    }

    /// Current reachability of the backend, probing at most once per TTL.
    pub async fn check(&self, backend: &Arc<dyn LlmBackend>) -> BackendHealth {
        {
            let cached = self.cached.lock().unwrap();
            if let Some((at, health)) = cached.as_ref() {
                if at.elapsed() < self.ttl {
                    return health.clone();
                }
            }
        }

        let health = BackendHealth {
            backend_name: backend.name().to_string(),
            reachable: self.probe(backend).await,
            checked_at: Utc::now(),
        };

        *self.cached.lock().unwrap() = Some((Instant::now(), health.clone()));
        health
    }

    /// Any response, even an application-level error, proves the backend is
    /// reachable. Only connection failures and timeouts count against it.
    async fn probe(&self, backend: &Arc<dyn LlmBackend>) -> bool {
        let options = GenerateOptions {
            max_tokens: 1,
            temperature: 0.0,
            timeout: self.probe_timeout,
        };

        match tokio::time::timeout(self.probe_timeout, backend.ping(&options)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => !matches!(e, CoreError::BackendUnavailable(_)),
            Err(_) => false,
        }
    }
}
