//! The persisted pool document: ordered endpoints, pin and global defaults

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::endpoint::{
    default_max_fail_count, default_max_success_count, generate_endpoint_id, Endpoint,
};

/// Whole-document unit of persistence.
///
/// Endpoint order is meaningful: it is the scan and tie-break order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolDocument {
    #[serde(default)]
    pub api_endpoints: Vec<Endpoint>,

    #[serde(default = "default_max_success_count")]
    pub default_max_success_count: u32,

    #[serde(default = "default_max_fail_count")]
    pub default_max_fail_count: u32,

    #[serde(default = "default_ban_duration_hours")]
    pub ban_duration_hours: u32,

    #[serde(default = "default_retry_count")]
    pub request_retry_count: u32,

    /// Seconds between attempts against the same endpoint
    #[serde(default = "default_retry_delay")]
    pub request_retry_delay: f64,

    /// Per-upstream-call timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_true")]
    pub enable_detailed_log: bool,

    /// Pinned endpoint, by identifier
    #[serde(default)]
    pub current_api_id: Option<String>,

    /// Positional pin written by older deployments; migrated on load
    #[serde(default, skip_serializing)]
    current_api_index: Option<usize>,
}

fn default_ban_duration_hours() -> u32 {
    24
}

fn default_retry_count() -> u32 {
    2
}

fn default_retry_delay() -> f64 {
    1.0
}

fn default_timeout() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

impl Default for PoolDocument {
    fn default() -> Self {
        Self {
            api_endpoints: Vec::new(),
            default_max_success_count: default_max_success_count(),
            default_max_fail_count: default_max_fail_count(),
            ban_duration_hours: default_ban_duration_hours(),
            request_retry_count: default_retry_count(),
            request_retry_delay: default_retry_delay(),
            timeout: default_timeout(),
            enable_detailed_log: true,
            current_api_id: None,
            current_api_index: None,
        }
    }
}

/// Retry and timeout knobs the orchestrator reads for one call
#[derive(Debug, Clone, PartialEq)]
pub struct CallPolicy {
    pub retry_count: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
    pub detailed_log: bool,
}

impl PoolDocument {
    pub fn with_endpoints(endpoints: Vec<Endpoint>) -> Self {
        Self {
            api_endpoints: endpoints,
            ..Self::default()
        }
    }

    /// Repair a freshly loaded document: assign ids to endpoints stored with
    /// an empty id and migrate a positional pin to an identifier pin.
    pub fn normalize(&mut self) {
        for endpoint in &mut self.api_endpoints {
            if endpoint.id.is_empty() {
                endpoint.id = generate_endpoint_id();
            }
        }

        if let Some(index) = self.current_api_index.take() {
            if self.current_api_id.is_none() {
                self.current_api_id = self.api_endpoints.get(index).map(|e| e.id.clone());
            }
        }
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.api_endpoints.iter().position(|e| e.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Endpoint> {
        self.api_endpoints.iter().find(|e| e.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Endpoint> {
        self.api_endpoints.iter_mut().find(|e| e.id == id)
    }

    /// Position of the pinned endpoint. A pin to a deleted endpoint resolves to `None`.
    pub fn pinned_position(&self) -> Option<usize> {
        self.current_api_id.as_deref().and_then(|id| self.position(id))
    }

    /// Pin the endpoint at `index`
    pub fn pin_index(&mut self, index: usize) {
        self.current_api_id = self.api_endpoints.get(index).map(|e| e.id.clone());
    }

    /// The pinned endpoint, or the first endpoint when there is no valid pin
    pub fn current(&self) -> Option<&Endpoint> {
        self.pinned_position()
            .and_then(|i| self.api_endpoints.get(i))
            .or_else(|| self.api_endpoints.first())
    }

    /// Lift every expired timed ban. Returns how many bans were lifted.
    pub fn sweep_expired_bans(&mut self, now: DateTime<Utc>) -> usize {
        self.api_endpoints
            .iter_mut()
            .map(|e| e.expire_ban(now))
            .filter(|lifted| *lifted)
            .count()
    }

    pub fn enabled_count(&self) -> usize {
        self.api_endpoints.iter().filter(|e| e.enabled).count()
    }

    pub fn available_count(&self) -> usize {
        self.api_endpoints.iter().filter(|e| e.is_available()).count()
    }

    pub fn call_policy(&self) -> CallPolicy {
        let retry_delay = if self.request_retry_delay.is_finite() && self.request_retry_delay > 0.0 {
            Duration::from_secs_f64(self.request_retry_delay)
        } else {
            Duration::ZERO
        };

        CallPolicy {
            retry_count: self.request_retry_count,
            retry_delay,
            timeout: Duration::from_secs(self.timeout.max(1)),
            detailed_log: self.enable_detailed_log,
        }
    }
}
