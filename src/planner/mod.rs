//! Planning module for software installation.
//!
//! This module checks requested roles against the capability catalog and
//! produces one install plan per reachable target.

mod plan;
mod bucket;
mod software;

pub use plan::{BlockedTarget, InstallPlan, Planning, RejectedRequest, parse_request};
pub use bucket::{BucketSource, DeclaredBuckets, PromptBuckets};
pub use software::SoftwarePlanner;
