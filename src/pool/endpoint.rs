//! Upstream endpoint record and its availability state machine

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Observable state of an endpoint.
///
/// `Disabled` is checked first and overrides the other three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointState {
    Available,
    QuotaExhausted,
    Banned,
    Disabled,
}

/// One upstream chat-completion backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(default = "generate_endpoint_id")]
    pub id: String,

    #[serde(default = "default_name")]
    pub name: String,

    /// Full URL the chat-completion request is POSTed to
    #[serde(default)]
    pub api_url: String,

    /// Bearer credential; an empty string sends no Authorization header
    #[serde(default)]
    pub api_key: String,

    /// Model identifier sent upstream
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub success_count: u32,

    /// Quota ceiling: successful calls served before rotating away
    #[serde(default = "default_max_success_count")]
    pub max_success_count: u32,

    #[serde(default)]
    pub consecutive_fail_count: u32,

    /// Ban threshold for consecutive failures
    #[serde(default = "default_max_fail_count")]
    pub max_fail_count: u32,

    #[serde(default)]
    pub is_banned: bool,

    /// `None` while banned means the ban lasts until a manual unban
    #[serde(default, deserialize_with = "ban_expiry::deserialize")]
    pub banned_until: Option<DateTime<Utc>>,

    #[serde(default)]
    pub ban_reason: String,

    #[serde(default)]
    pub total_success: u64,

    #[serde(default)]
    pub total_fail: u64,
}

mod ban_expiry {
    use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
    use serde::{de::Error, Deserialize, Deserializer};

    /// RFC 3339, or an offset-less timestamp read as local time
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) if raw.is_empty() => Ok(None),
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid banned_until timestamp '{}'", raw))),
        }
    }

    pub(super) fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|ts| ts.with_timezone(&Utc))
    }
}

/// Generate a short endpoint identifier
pub fn generate_endpoint_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn default_name() -> String {
    "Default API".to_string()
}

pub(crate) fn default_model() -> String {
    "z-image-turbo".to_string()
}

fn default_true() -> bool {
    true
}

pub(crate) fn default_max_success_count() -> u32 {
    10
}

pub(crate) fn default_max_fail_count() -> u32 {
    3
}

impl Endpoint {
    /// Create a new endpoint with a fresh identifier and zeroed counters
    pub fn new(
        name: impl Into<String>,
        api_url: impl Into<String>,
        max_success_count: u32,
        max_fail_count: u32,
    ) -> Self {
        Self {
            id: generate_endpoint_id(),
            name: name.into(),
            api_url: api_url.into(),
            api_key: String::new(),
            model: default_model(),
            enabled: true,
            success_count: 0,
            max_success_count,
            consecutive_fail_count: 0,
            max_fail_count,
            is_banned: false,
            banned_until: None,
            ban_reason: String::new(),
            total_success: 0,
            total_fail: 0,
        }
    }

    /// Current state. Pure: an expired ban still reports `Banned` until
    /// [`Endpoint::expire_ban`] has been run.
    pub fn state(&self) -> EndpointState {
        if !self.enabled {
            EndpointState::Disabled
        } else if self.is_banned {
            EndpointState::Banned
        } else if self.success_count >= self.max_success_count {
            EndpointState::QuotaExhausted
        } else {
            EndpointState::Available
        }
    }

    pub fn is_available(&self) -> bool {
        self.state() == EndpointState::Available
    }

    /// Clear a timed ban whose expiry has passed. Returns true if the ban was lifted.
    pub fn expire_ban(&mut self, now: DateTime<Utc>) -> bool {
        match self.banned_until {
            Some(until) if self.is_banned && now >= until => {
                self.unban();
                true
            }
            _ => false,
        }
    }

    /// Record a successful call. Returns true if the quota ceiling was reached.
    pub fn record_success(&mut self) -> bool {
        self.success_count = self.success_count.saturating_add(1);
        self.total_success += 1;
        self.consecutive_fail_count = 0;
        self.success_count >= self.max_success_count
    }

    /// Record a failed call. Returns true if this failure banned the endpoint.
    pub fn record_failure(&mut self, now: DateTime<Utc>, ban_hours: u32) -> bool {
        self.consecutive_fail_count = self.consecutive_fail_count.saturating_add(1);
        self.total_fail += 1;

        if self.consecutive_fail_count >= self.max_fail_count {
            self.is_banned = true;
            self.banned_until = Some(now + Duration::hours(i64::from(ban_hours)));
            self.ban_reason = format!("{} consecutive failures", self.consecutive_fail_count);
            return true;
        }

        false
    }

    pub fn reset_quota(&mut self) {
        self.success_count = 0;
    }

    pub fn unban(&mut self) {
        self.is_banned = false;
        self.banned_until = None;
        self.ban_reason.clear();
        self.consecutive_fail_count = 0;
    }

    /// Zero every counter, lifetime totals included, and lift any ban
    pub fn reset_stats(&mut self) {
        self.reset_quota();
        self.unban();
        self.total_success = 0;
        self.total_fail = 0;
    }

    /// Take counters and ban state from an earlier revision of this endpoint
    pub fn carry_runtime_state(&mut self, previous: &Endpoint) {
        self.success_count = previous.success_count;
        self.consecutive_fail_count = previous.consecutive_fail_count;
        self.total_success = previous.total_success;
        self.total_fail = previous.total_fail;
        self.is_banned = previous.is_banned;
        self.banned_until = previous.banned_until;
        self.ban_reason = previous.ban_reason.clone();
    }

    /// Seconds until a timed ban expires, if one is pending
    pub fn ban_remaining_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        if !self.is_banned {
            return None;
        }
        let remaining = (self.banned_until? - now).num_seconds();
        (remaining > 0).then_some(remaining)
    }
}
