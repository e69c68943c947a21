//! Transport bucket sources.
//!
//! A target needs a transport bucket only once it has something to install.
//! Existing targets never carry one from the inventory, so the planner asks
//! a [`BucketSource`] at that point.

use std::collections::HashMap;
use std::io::{BufRead, Write};

use crate::config::TargetDeclaration;
use crate::target::TargetDescriptor;

/// Supplies a transport bucket for a target that lacks one.
pub trait BucketSource {
    /// Returns a bucket for `target`, or `None` if none is available.
    fn bucket_for(&mut self, target: &TargetDescriptor) -> Option<String>;
}

/// Buckets declared in the run file, keyed by target name.
#[derive(Debug, Clone, Default)]
pub struct DeclaredBuckets {
    buckets: HashMap<String, String>,
}

impl DeclaredBuckets {
    /// Collects the first non-blank bucket declared for each name.
    #[must_use]
    pub fn from_declarations(declarations: &[TargetDeclaration]) -> Self {
        let mut buckets = HashMap::new();
        for declaration in declarations {
            if let Some(bucket) = declaration.bucket().map(str::trim).filter(|b| !b.is_empty()) {
                buckets
                    .entry(declaration.name().trim().to_string())
                    .or_insert_with(|| bucket.to_string());
            }
        }
        Self { buckets }
    }

    /// Adds or replaces a bucket.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, bucket: impl Into<String>) -> Self {
        self.buckets.insert(name.into(), bucket.into());
        self
    }
}

impl BucketSource for DeclaredBuckets {
    fn bucket_for(&mut self, target: &TargetDescriptor) -> Option<String> {
        self.buckets.get(&target.name).cloned()
    }
}

/// Falls back to asking on a terminal when nothing was declared.
pub struct PromptBuckets<R, W> {
    declared: DeclaredBuckets,
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptBuckets<R, W> {
    /// Creates a prompting source on top of declared buckets.
    pub const fn new(declared: DeclaredBuckets, input: R, output: W) -> Self {
        Self {
            declared,
            input,
            output,
        }
    }

    /// Returns the declared buckets together with every answer given so far.
    #[must_use]
    pub fn into_declared(self) -> DeclaredBuckets {
        self.declared
    }
}

impl<R: BufRead, W: Write> BucketSource for PromptBuckets<R, W> {
    fn bucket_for(&mut self, target: &TargetDescriptor) -> Option<String> {
        if let Some(bucket) = self.declared.bucket_for(target) {
            return Some(bucket);
        }

        write!(self.output, "Enter S3 bucket name for {}: ", target.name).ok()?;
        self.output.flush().ok()?;

        let mut line = String::new();
        self.input.read_line(&mut line).ok()?;
        let bucket = line.trim();
        if bucket.is_empty() {
            return None;
        }

        self.declared
            .buckets
            .insert(target.name.clone(), bucket.to_string());
        Some(bucket.to_string())
    }
}
