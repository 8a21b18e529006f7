//! Endpoint selection policy: sticky pin, ordered scan, quota-reset escape valve
//!
//! These functions operate on an in-memory [`PoolDocument`]. Each returns
//! whether the document changed so the registry knows when to persist.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::document::PoolDocument;
use super::endpoint::Endpoint;

/// Result of recording a call outcome against one endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeEffect {
    /// The success just recorded reached the quota ceiling
    pub quota_reached: bool,
    /// The failure just recorded banned the endpoint
    pub banned: bool,
    /// Identifier now pinned, if the pin moved
    pub rotated_to: Option<String>,
}

/// Pick the endpoint that serves the next call.
///
/// Returns the chosen endpoint (if any) and whether the document was mutated.
pub fn select(doc: &mut PoolDocument, now: DateTime<Utc>) -> (Option<Endpoint>, bool) {
    let mut dirty = doc.sweep_expired_bans(now) > 0;

    if let Some(pinned) = doc.pinned_position() {
        let endpoint = &doc.api_endpoints[pinned];
        if endpoint.is_available() {
            return (Some(endpoint.clone()), dirty);
        }
    }

    if let Some(found) = scan(doc) {
        return (Some(found), true);
    }

    // Nothing usable: give every healthy endpoint its quota back. Banned
    // and disabled endpoints stay out.
    let mut reset = 0;
    for endpoint in doc.api_endpoints.iter_mut().filter(|e| e.enabled && !e.is_banned) {
        endpoint.reset_quota();
        reset += 1;
    }
    if reset > 0 {
        info!(endpoints = reset, "All endpoints out of quota, resetting quotas");
        dirty = true;
    }

    match scan(doc) {
        Some(found) => (Some(found), true),
        None => {
            warn!(total = doc.api_endpoints.len(), "No endpoint available after quota reset");
            (None, dirty)
        }
    }
}

/// First available endpoint in order; pins it
fn scan(doc: &mut PoolDocument) -> Option<Endpoint> {
    let index = doc.api_endpoints.iter().position(Endpoint::is_available)?;
    doc.pin_index(index);
    let endpoint = doc.api_endpoints[index].clone();
    debug!(endpoint = %endpoint.name, index, "Pinned endpoint");
    Some(endpoint)
}

/// Pin an endpoint by identifier regardless of its availability
pub fn switch_to(doc: &mut PoolDocument, id: &str) -> bool {
    match doc.position(id) {
        Some(index) => {
            doc.pin_index(index);
            true
        }
        None => false,
    }
}

/// Record the outcome of a call. Returns `None` for an unknown identifier.
pub fn record_outcome(
    doc: &mut PoolDocument,
    id: &str,
    success: bool,
    now: DateTime<Utc>,
) -> Option<OutcomeEffect> {
    let index = doc.position(id)?;
    let ban_hours = doc.ban_duration_hours;
    let endpoint = &mut doc.api_endpoints[index];

    let mut effect = OutcomeEffect {
        quota_reached: false,
        banned: false,
        rotated_to: None,
    };

    let rotate = if success {
        effect.quota_reached = endpoint.record_success();
        effect.quota_reached
    } else {
        effect.banned = endpoint.record_failure(now, ban_hours);
        if effect.banned {
            warn!(
                endpoint = %endpoint.name,
                reason = %endpoint.ban_reason,
                hours = ban_hours,
                "Endpoint banned"
            );
        }
        effect.banned
    };

    // Rotate ahead of the next lookup
    if rotate {
        let next = (index + 1) % doc.api_endpoints.len();
        doc.pin_index(next);
        effect.rotated_to = doc.current_api_id.clone();
    }

    Some(effect)
}
