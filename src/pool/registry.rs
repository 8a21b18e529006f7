//! Endpoint registry: the single mutation interface over the pool document
//!
//! Every operation is a load-mutate-persist cycle run under one async mutex,
//! so selection and outcome recording never interleave inside the process.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::document::{CallPolicy, PoolDocument};
use super::endpoint::{generate_endpoint_id, Endpoint, EndpointState};
use super::selection::{self, OutcomeEffect};
use super::store::PoolStore;
use crate::error::{AppError, Result};

/// Endpoint chosen for a call, with the policy read from the same document
#[derive(Debug, Clone)]
pub struct SelectedEndpoint {
    pub endpoint: Endpoint,
    pub policy: CallPolicy,
    /// Enabled endpoints at selection time; bounds failover hops
    pub enabled_count: usize,
}

/// Fields accepted when adding an endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewEndpoint {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub max_success_count: Option<u32>,
    #[serde(default)]
    pub max_fail_count: Option<u32>,
}

impl NewEndpoint {
    /// Fresh endpoint with zeroed counters; unset ceilings come from the pool defaults
    fn into_endpoint(self, doc: &PoolDocument) -> Endpoint {
        let mut endpoint = Endpoint::new(
            self.name.unwrap_or_else(|| "New API".to_string()),
            self.api_url,
            self.max_success_count.unwrap_or(doc.default_max_success_count),
            self.max_fail_count.unwrap_or(doc.default_max_fail_count),
        );
        if let Some(id) = self.id.filter(|id| !id.is_empty()) {
            endpoint.id = id;
        }
        endpoint.api_key = self.api_key;
        if let Some(model) = self.model {
            endpoint.model = model;
        }
        endpoint.enabled = self.enabled.unwrap_or(true);
        endpoint
    }
}

/// Editable endpoint fields. Runtime counters and ban state are never patched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointPatch {
    pub name: Option<String>,
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub enabled: Option<bool>,
    pub max_success_count: Option<u32>,
    pub max_fail_count: Option<u32>,
}

/// Editable pool-wide settings.
///
/// `api_endpoints`, when present, replaces the endpoint list in the given
/// order. Entries whose id matches an existing endpoint keep its counters
/// and ban state.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    pub api_endpoints: Option<Vec<NewEndpoint>>,
    pub default_max_success_count: Option<u32>,
    pub default_max_fail_count: Option<u32>,
    pub ban_duration_hours: Option<u32>,
    pub request_retry_count: Option<u32>,
    pub request_retry_delay: Option<f64>,
    pub timeout: Option<u64>,
    pub enable_detailed_log: Option<bool>,
}

/// Admin view of one endpoint
#[derive(Debug, Clone, Serialize)]
pub struct EndpointStatus {
    #[serde(flatten)]
    pub endpoint: Endpoint,
    pub state: EndpointState,
    pub is_available: bool,
    pub is_current: bool,
    pub ban_remaining_seconds: Option<i64>,
}

/// Admin view of the whole pool
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    pub api_endpoints: Vec<EndpointStatus>,
    pub current_api_id: Option<String>,
    pub current_api_name: Option<String>,
    pub default_max_success_count: u32,
    pub default_max_fail_count: u32,
    pub ban_duration_hours: u32,
    pub request_retry_count: u32,
    pub request_retry_delay: f64,
    pub timeout: u64,
    pub enable_detailed_log: bool,
}

impl PoolStatus {
    fn from_document(doc: &PoolDocument, now: DateTime<Utc>) -> Self {
        let current = doc.current();
        let current_id = current.map(|e| e.id.clone());

        let api_endpoints = doc
            .api_endpoints
            .iter()
            .map(|e| EndpointStatus {
                endpoint: e.clone(),
                state: e.state(),
                is_available: e.is_available(),
                is_current: current_id.as_deref() == Some(e.id.as_str()),
                ban_remaining_seconds: e.ban_remaining_seconds(now),
            })
            .collect();

        Self {
            api_endpoints,
            current_api_id: current_id,
            current_api_name: current.map(|e| e.name.clone()),
            default_max_success_count: doc.default_max_success_count,
            default_max_fail_count: doc.default_max_fail_count,
            ban_duration_hours: doc.ban_duration_hours,
            request_retry_count: doc.request_retry_count,
            request_retry_delay: doc.request_retry_delay,
            timeout: doc.timeout,
            enable_detailed_log: doc.enable_detailed_log,
        }
    }
}

/// Registry of upstream endpoints backed by a [`PoolStore`]
pub struct EndpointRegistry {
    store: Arc<dyn PoolStore>,
    lock: Mutex<()>,
}

impl EndpointRegistry {
    pub fn new(store: Arc<dyn PoolStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    /// Run `f` against a freshly loaded document; persist when it reports a change
    async fn mutate<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut PoolDocument) -> (R, bool),
    {
        let _guard = self.lock.lock().await;
        let mut document = self.store.load().await?;
        let (result, dirty) = f(&mut document);
        if dirty {
            self.store.save(&document).await?;
        }
        Ok(result)
    }

    /// Snapshot of the stored document, without sweeping
    pub async fn document(&self) -> Result<PoolDocument> {
        let _guard = self.lock.lock().await;
        self.store.load().await
    }

    /// Choose the endpoint for the next call
    pub async fn select(&self) -> Result<Option<SelectedEndpoint>> {
        let now = Utc::now();
        self.mutate(|doc| {
            if doc.api_endpoints.is_empty() {
                return (Err(AppError::NoEndpointsConfigured), false);
            }
            let (endpoint, dirty) = selection::select(doc, now);
            let selected = endpoint.map(|endpoint| SelectedEndpoint {
                endpoint,
                policy: doc.call_policy(),
                enabled_count: doc.enabled_count(),
            });
            (Ok(selected), dirty)
        })
        .await?
    }

    /// Pin an endpoint regardless of availability. Returns false for an unknown id.
    pub async fn switch_to(&self, id: &str) -> Result<bool> {
        let switched = self
            .mutate(|doc| {
                let switched = selection::switch_to(doc, id);
                (switched, switched)
            })
            .await?;
        if switched {
            info!(endpoint_id = %id, "Switched pinned endpoint");
        }
        Ok(switched)
    }

    pub async fn record_outcome(&self, id: &str, success: bool) -> Result<Option<OutcomeEffect>> {
        let now = Utc::now();
        let effect = self
            .mutate(|doc| {
                let effect = selection::record_outcome(doc, id, success, now);
                let dirty = effect.is_some();
                (effect, dirty)
            })
            .await?;

        if let Some(rotated_to) = effect.as_ref().and_then(|e| e.rotated_to.as_deref()) {
            debug!(endpoint_id = %id, rotated_to = %rotated_to, "Pin advanced");
        }
        Ok(effect)
    }

    /// Lift expired bans. Returns the number lifted.
    pub async fn sweep_expired_bans(&self) -> Result<usize> {
        let now = Utc::now();
        self.mutate(|doc| {
            let lifted = doc.sweep_expired_bans(now);
            (lifted, lifted > 0)
        })
        .await
    }

    pub async fn add_endpoint(&self, new: NewEndpoint) -> Result<Endpoint> {
        if new.api_url.trim().is_empty() {
            return Err(AppError::InvalidRequest("api_url is required".to_string()));
        }

        let endpoint = self
            .mutate(|doc| {
                let mut endpoint = new.into_endpoint(doc);
                if doc.position(&endpoint.id).is_some() {
                    endpoint.id = generate_endpoint_id();
                }
                doc.api_endpoints.push(endpoint.clone());
                (endpoint, true)
            })
            .await?;

        info!(endpoint = %endpoint.name, endpoint_id = %endpoint.id, "Added endpoint");
        Ok(endpoint)
    }

    pub async fn update_endpoint(&self, id: &str, patch: EndpointPatch) -> Result<Endpoint> {
        self.mutate(|doc| match doc.get_mut(id) {
            Some(endpoint) => {
                if let Some(name) = patch.name {
                    endpoint.name = name;
                }
                if let Some(api_url) = patch.api_url {
                    endpoint.api_url = api_url;
                }
                if let Some(api_key) = patch.api_key {
                    endpoint.api_key = api_key;
                }
                if let Some(model) = patch.model {
                    endpoint.model = model;
                }
                if let Some(enabled) = patch.enabled {
                    endpoint.enabled = enabled;
                }
                if let Some(max) = patch.max_success_count {
                    endpoint.max_success_count = max;
                }
                if let Some(max) = patch.max_fail_count {
                    endpoint.max_fail_count = max;
                }
                (Ok(endpoint.clone()), true)
            }
            None => (Err(AppError::EndpointNotFound(id.to_string())), false),
        })
        .await?
    }

    /// Delete an endpoint; a pin pointing at it is cleared
    pub async fn remove_endpoint(&self, id: &str) -> Result<bool> {
        let removed = self
            .mutate(|doc| {
                let before = doc.api_endpoints.len();
                doc.api_endpoints.retain(|e| e.id != id);
                let removed = doc.api_endpoints.len() != before;
                if removed && doc.current_api_id.as_deref() == Some(id) {
                    doc.current_api_id = None;
                }
                (removed, removed)
            })
            .await?;
        if removed {
            info!(endpoint_id = %id, "Removed endpoint");
        }
        Ok(removed)
    }

    async fn modify_one<F>(&self, id: &str, action: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut Endpoint),
    {
        let name = self
            .mutate(|doc| match doc.get_mut(id) {
                Some(endpoint) => {
                    f(endpoint);
                    (Some(endpoint.name.clone()), true)
                }
                None => (None, false),
            })
            .await?
            .ok_or_else(|| AppError::EndpointNotFound(id.to_string()))?;

        info!(endpoint = %name, action, "Endpoint updated");
        Ok(())
    }

    pub async fn unban(&self, id: &str) -> Result<()> {
        self.modify_one(id, "unban", Endpoint::unban).await
    }

    pub async fn reset_quota(&self, id: &str) -> Result<()> {
        self.modify_one(id, "reset_quota", Endpoint::reset_quota).await
    }

    pub async fn reset_stats(&self, id: &str) -> Result<()> {
        self.modify_one(id, "reset_stats", Endpoint::reset_stats).await
    }

    pub async fn reset_all_quotas(&self) -> Result<()> {
        self.mutate(|doc| {
            doc.api_endpoints.iter_mut().for_each(Endpoint::reset_quota);
            ((), true)
        })
        .await?;
        info!("Reset all endpoint quotas");
        Ok(())
    }

    pub async fn unban_all(&self) -> Result<()> {
        self.mutate(|doc| {
            doc.api_endpoints.iter_mut().for_each(Endpoint::unban);
            ((), true)
        })
        .await?;
        info!("Unbanned all endpoints");
        Ok(())
    }

    pub async fn update_settings(&self, patch: SettingsPatch) -> Result<()> {
        if patch.request_retry_delay.is_some_and(|d| !d.is_finite() || d < 0.0) {
            return Err(AppError::InvalidRequest(
                "request_retry_delay must be a non-negative number".to_string(),
            ));
        }
        if let Some(entries) = &patch.api_endpoints {
            if entries.iter().any(|e| e.api_url.trim().is_empty()) {
                return Err(AppError::InvalidRequest(
                    "every endpoint needs an api_url".to_string(),
                ));
            }
        }

        self.mutate(|doc| {
            if let Some(entries) = patch.api_endpoints {
                replace_endpoints(doc, entries);
            }
            if let Some(v) = patch.default_max_success_count {
                doc.default_max_success_count = v;
            }
            if let Some(v) = patch.default_max_fail_count {
                doc.default_max_fail_count = v;
            }
            if let Some(v) = patch.ban_duration_hours {
                doc.ban_duration_hours = v;
            }
            if let Some(v) = patch.request_retry_count {
                doc.request_retry_count = v;
            }
            if let Some(v) = patch.request_retry_delay {
                doc.request_retry_delay = v;
            }
            if let Some(v) = patch.timeout {
                doc.timeout = v;
            }
            if let Some(v) = patch.enable_detailed_log {
                doc.enable_detailed_log = v;
            }
            ((), true)
        })
        .await?;
        info!("Pool settings updated");
        Ok(())
    }

    /// The pinned endpoint, or the first one when no valid pin exists
    pub async fn current_endpoint(&self) -> Result<Option<Endpoint>> {
        Ok(self.document().await?.current().cloned())
    }

    /// Admin view. Expired bans are shown as lifted but nothing is persisted.
    pub async fn status(&self) -> Result<PoolStatus> {
        let now = Utc::now();
        let mut document = self.document().await?;
        document.sweep_expired_bans(now);
        Ok(PoolStatus::from_document(&document, now))
    }
}

/// Rebuild the endpoint list from `entries`, keeping runtime state for known ids
fn replace_endpoints(doc: &mut PoolDocument, entries: Vec<NewEndpoint>) {
    let previous = std::mem::take(&mut doc.api_endpoints);
    let mut rebuilt: Vec<Endpoint> = Vec::with_capacity(entries.len());

    for entry in entries {
        let mut endpoint = entry.into_endpoint(doc);
        if rebuilt.iter().any(|e| e.id == endpoint.id) {
            endpoint.id = generate_endpoint_id();
        }
        if let Some(existing) = previous.iter().find(|e| e.id == endpoint.id) {
            endpoint.carry_runtime_state(existing);
        }
        rebuilt.push(endpoint);
    }

    doc.api_endpoints = rebuilt;
    if doc.pinned_position().is_none() {
        doc.current_api_id = None;
    }
}
