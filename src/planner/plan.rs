//! Install plan types.
//!
//! This module defines what the planner produces: one plan per resolved
//! target, plus the requests and targets it had to leave out.

use serde::Serialize;

use crate::error::{CapabilityError, ReconcileError};
use crate::target::TargetDescriptor;

/// Roles to install on one target, in first-requested order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallPlan {
    /// Target to configure.
    pub target: TargetDescriptor,
    /// Valid, deduplicated roles.
    pub roles: Vec<String>,
}

/// A requested role that was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRequest {
    /// Target name.
    pub target: String,
    /// Requested role.
    pub role: String,
    /// Why the role was dropped.
    pub reason: CapabilityError,
}

/// A target with valid roles that cannot be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedTarget {
    /// Target that was left out.
    pub target: TargetDescriptor,
    /// Roles that would have been installed.
    pub roles: Vec<String>,
    /// Why the target was left out.
    pub reason: ReconcileError,
}

/// Result of planning a batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Planning {
    /// One plan per reachable target, in resolution order. Plans may be empty.
    pub plans: Vec<InstallPlan>,
    /// Dropped role requests.
    pub rejected: Vec<RejectedRequest>,
    /// Targets left out for lack of a transport bucket.
    pub blocked: Vec<BlockedTarget>,
}

impl InstallPlan {
    /// Returns true if nothing will be installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl Planning {
    /// Returns true if at least one plan installs something.
    #[must_use]
    pub fn has_work(&self) -> bool {
        self.plans.iter().any(|p| !p.is_empty())
    }

    /// Plans that install at least one role.
    pub fn active(&self) -> impl Iterator<Item = &InstallPlan> {
        self.plans.iter().filter(|p| !p.is_empty())
    }

    /// Every target the run knows about, planned or blocked.
    pub fn all_targets(&self) -> impl Iterator<Item = &TargetDescriptor> {
        self.plans
            .iter()
            .map(|p| &p.target)
            .chain(self.blocked.iter().map(|b| &b.target))
    }

    /// Total number of roles across all plans.
    #[must_use]
    pub fn role_count(&self) -> usize {
        self.plans.iter().map(|p| p.roles.len()).sum()
    }
}

/// Splits a comma-separated request into normalized role names.
///
/// Entries are trimmed and lowercased, empty entries are dropped and
/// duplicates keep their first position.
#[must_use]
pub fn parse_request(raw: &str) -> Vec<String> {
    let mut roles: Vec<String> = Vec::new();
    for role in raw.split(',').map(|r| r.trim().to_lowercase()) {
        if !role.is_empty() && !roles.contains(&role) {
            roles.push(role);
        }
    }
    roles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_normalizes() {
        assert_eq!(
            parse_request(" Nginx, redis ,,NGINX, mysql "),
            vec!["nginx", "redis", "mysql"]
        );
        assert!(parse_request("").is_empty());
        assert!(parse_request(" , ,").is_empty());
    }
}
