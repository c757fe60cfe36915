//! Authenticated caller identity.

use std::collections::HashSet;

use serde::Serialize;

/// Who a validated bearer token belongs to and what it may do.
///
/// Lives in the request extensions for the duration of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Opaque user id issued by the identity provider.
    pub user_id: String,
    /// Display name.
    pub username: String,
    /// Granted permissions.
    pub permissions: HashSet<String>,
}

impl Identity {
    pub fn new<I, P>(user_id: impl Into<String>, username: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Required permissions this identity lacks, sorted for stable messages.
    pub fn missing_permissions<'a, I>(&self, required: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut missing: Vec<String> = required
            .into_iter()
            .filter(|p| !self.permissions.contains(*p))
            .cloned()
            .collect();
        missing.sort();
        missing
    }
}
