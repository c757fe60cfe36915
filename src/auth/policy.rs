//! Path based access policy.
//!
//! # Design Decisions
//! - Longest matching prefix wins
//! - Path matching is case-sensitive
//! - Paths without a rule only need an authenticated identity

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::auth::gateway::{deny, require_permissions};
use crate::auth::identity::Identity;
use crate::config::AccessRule;

#[derive(Debug, Default)]
pub struct AccessPolicy {
    rules: Vec<(String, HashSet<String>)>,
}

impl AccessPolicy {
    pub fn new(rules: &[AccessRule]) -> Self {
        let mut rules: Vec<(String, HashSet<String>)> = rules
            .iter()
            .map(|r| (r.path_prefix.clone(), r.permissions.iter().cloned().collect()))
            .collect();
        rules.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { rules }
    }

    /// Permissions required for `path`, if any rule covers it.
    pub fn required_for(&self, path: &str) -> Option<&HashSet<String>> {
        self.rules
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map(|(_, permissions)| permissions)
    }
}

/// Middleware: enforce the policy rule covering the request path.
pub async fn enforce_policy(
    State(policy): State<Arc<AccessPolicy>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let check = match policy.required_for(request.uri().path()) {
        Some(required) => require_permissions(request.extensions(), required).map(|_| ()),
        None => Ok(()),
    };

    match check {
        Ok(()) => next.run(request).await,
        Err(error) => {
            let identity = request.extensions().get::<Identity>().cloned();
            deny(error, identity, request.uri().path())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(prefix: &str, permissions: &[&str]) -> AccessRule {
        AccessRule {
            path_prefix: prefix.to_string(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_longest_prefix_wins() {
        let policy = AccessPolicy::new(&[
            rule("/api", &["api:read"]),
            rule("/api/admin", &["admin"]),
        ]);

        let admin = policy.required_for("/api/admin/users").unwrap();
        assert!(admin.contains("admin"));
        assert_eq!(admin.len(), 1);

        assert!(policy.required_for("/api/items").unwrap().contains("api:read"));
        assert!(policy.required_for("/static/logo.png").is_none());
    }
}
