//! Software planning.
//!
//! Validates requested roles against the capability catalog and gates
//! targets on their transport bucket.

use tracing::{debug, info, warn};

use crate::catalog::CapabilityCatalog;
use crate::error::ReconcileError;
use crate::reconciler::ResolvedTarget;

use super::bucket::BucketSource;
use super::plan::{BlockedTarget, InstallPlan, Planning, RejectedRequest, parse_request};

/// Turns resolved targets and their requests into install plans.
#[derive(Debug)]
pub struct SoftwarePlanner<'a> {
    /// Catalog the requests are checked against.
    catalog: &'a CapabilityCatalog,
}

impl<'a> SoftwarePlanner<'a> {
    /// Creates a new planner.
    #[must_use]
    pub const fn new(catalog: &'a CapabilityCatalog) -> Self {
        Self { catalog }
    }

    /// Plans every resolved target.
    ///
    /// Invalid requests are dropped, never substituted. A target with valid
    /// roles but no bucket, even after asking `buckets`, is blocked.
    pub fn plan(&self, targets: &[ResolvedTarget], buckets: &mut dyn BucketSource) -> Planning {
        info!("Planning software for {} target(s)", targets.len());

        let mut planning = Planning::default();

        for resolved in targets {
            let mut target = resolved.descriptor.clone();
            let mut roles = Vec::new();

            for role in parse_request(&resolved.requested) {
                match self.catalog.check(&role, target.platform) {
                    Ok(()) => roles.push(role),
                    Err(reason) => {
                        warn!("Dropping '{role}' for {}: {reason}", target.name);
                        planning.rejected.push(RejectedRequest {
                            target: target.name.clone(),
                            role,
                            reason,
                        });
                    }
                }
            }

            if !roles.is_empty() && target.bucket().is_none() {
                debug!("Asking for a transport bucket for {}", target.name);
                target.transport_bucket = buckets
                    .bucket_for(&target)
                    .map(|b| b.trim().to_string())
                    .filter(|b| !b.is_empty());

                if target.transport_bucket.is_none() {
                    let reason = ReconcileError::MissingBucket {
                        name: target.name.clone(),
                    };
                    warn!("{reason}");
                    planning.blocked.push(BlockedTarget {
                        target,
                        roles,
                        reason,
                    });
                    continue;
                }
            }

            debug!("Planned [{}] for {}", roles.join(", "), target.name);
            planning.plans.push(InstallPlan { target, roles });
        }

        info!(
            "Planned {} role(s) on {} target(s), rejected {}, blocked {}",
            planning.role_count(),
            planning.active().count(),
            planning.rejected.len(),
            planning.blocked.len()
        );
        planning
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CapabilityEntry;
    use crate::error::CapabilityError;
    use crate::planner::DeclaredBuckets;
    use crate::target::{Origin, Platform, TargetDescriptor};

    fn catalog() -> CapabilityCatalog {
        CapabilityCatalog::from_entries(
            [
                CapabilityEntry::new("nginx", [Platform::Ubuntu]),
                CapabilityEntry::new("redis", [Platform::Ubuntu, Platform::Centos]),
            ],
            Platform::Ubuntu,
        )
    }

    fn resolved(name: &str, platform: Platform, bucket: Option<&str>, request: &str) -> ResolvedTarget {
        ResolvedTarget {
            descriptor: TargetDescriptor {
                instance_id: format!("i-{name}"),
                name: name.to_string(),
                region: String::from("ap-south-1"),
                platform,
                transport_bucket: bucket.map(str::to_string),
                origin: if bucket.is_some() { Origin::New } else { Origin::Existing },
            },
            requested: request.to_string(),
        }
    }

    #[test]
    fn test_unsupported_platform_is_dropped() {
        let catalog = catalog();
        let planner = SoftwarePlanner::new(&catalog);
        let targets = [resolved("db1", Platform::Centos, Some("b"), "nginx, redis")];

        let planning = planner.plan(&targets, &mut DeclaredBuckets::default());

        assert_eq!(planning.plans[0].roles, vec!["redis"]);
        assert_eq!(planning.rejected.len(), 1);
        assert_eq!(planning.rejected[0].role, "nginx");
        assert!(matches!(
            planning.rejected[0].reason,
            CapabilityError::UnsupportedPlatform { .. }
        ));
    }

    #[test]
    fn test_role_order_is_first_seen_valid_order() {
        let catalog = catalog();
        let planner = SoftwarePlanner::new(&catalog);
        let targets = [resolved("web1", Platform::Ubuntu, Some("b"), "REDIS, mysql, nginx, redis")];

        let planning = planner.plan(&targets, &mut DeclaredBuckets::default());

        assert_eq!(planning.plans[0].roles, vec!["redis", "nginx"]);
        assert!(matches!(
            planning.rejected[0].reason,
            CapabilityError::UnknownRole { .. }
        ));
    }

    #[test]
    fn test_missing_bucket_asks_source_then_blocks() {
        let catalog = catalog();
        let planner = SoftwarePlanner::new(&catalog);
        let targets = [
            resolved("db1", Platform::Ubuntu, None, "redis"),
            resolved("db2", Platform::Ubuntu, None, "redis"),
        ];
        let mut buckets = DeclaredBuckets::default().with("db1", "ssm-db1");

        let planning = planner.plan(&targets, &mut buckets);

        assert_eq!(planning.plans.len(), 1);
        assert_eq!(planning.plans[0].target.bucket(), Some("ssm-db1"));
        assert_eq!(planning.blocked.len(), 1);
        assert_eq!(planning.blocked[0].target.name, "db2");
        assert!(matches!(
            planning.blocked[0].reason,
            ReconcileError::MissingBucket { .. }
        ));
    }

    #[test]
    fn test_empty_plan_needs_no_bucket() {
        struct Refuse;
        impl BucketSource for Refuse {
            fn bucket_for(&mut self, _target: &TargetDescriptor) -> Option<String> {
                panic!("bucket must not be requested for an empty plan");
            }
        }

        let catalog = catalog();
        let planner = SoftwarePlanner::new(&catalog);
        let targets = [resolved("db1", Platform::Ubuntu, None, "mysql")];

        let planning = planner.plan(&targets, &mut Refuse);

        assert_eq!(planning.plans.len(), 1);
        assert!(planning.plans[0].is_empty());
        assert!(!planning.has_work());
    }
}
