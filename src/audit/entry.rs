//! Access log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Identity;

/// Protocol the access went over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Tcp,
    Udp,
}

/// The gateway's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Allow,
    Deny,
}

impl From<bool> for Action {
    fn from(allowed: bool) -> Self {
        if allowed {
            Action::Allow
        } else {
            Action::Deny
        }
    }
}

/// One access decision. Immutable once handed to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    /// When the decision was made. Unset entries are stamped at send time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub user_id: String,
    pub username: String,
    pub source_ip: String,
    pub target_host: String,
    pub protocol: Protocol,
    pub action: Action,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    // HTTP only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_sent: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl AccessLogEntry {
    pub fn new(
        protocol: Protocol,
        action: Action,
        source_ip: impl Into<String>,
        target_host: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: None,
            user_id: String::new(),
            username: String::new(),
            source_ip: source_ip.into(),
            target_host: target_host.into(),
            protocol,
            action,
            reason: None,
            method: None,
            path: None,
            status_code: None,
            bytes_sent: None,
            user_agent: None,
            request_id: None,
        }
    }

    pub fn with_identity(mut self, identity: Option<&Identity>) -> Self {
        if let Some(identity) = identity {
            self.user_id = identity.user_id.clone();
            self.username = identity.username.clone();
        }
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Fill in the timestamp if the producer left it unset.
    pub(crate) fn stamped(mut self, now: DateTime<Utc>) -> Self {
        self.timestamp.get_or_insert(now);
        self
    }
}
