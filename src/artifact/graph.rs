//! Task graph artifact.

use serde::Serialize;

/// Reference to a role's platform-specific task file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncludeRole {
    /// Role name.
    pub name: String,
    /// Task file inside the role, `<platform>.yml`.
    pub tasks_from: String,
}

/// One install step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    /// Display name.
    pub name: String,
    /// Role to include.
    pub include_role: IncludeRole,
}

/// All install steps for one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Play {
    /// Display name.
    pub name: String,
    /// Host name; matches a key of the inventory manifest.
    pub hosts: String,
    /// Run with privilege escalation.
    #[serde(rename = "become")]
    pub escalate: bool,
    /// Steps in plan order.
    pub tasks: Vec<Task>,
}

/// Ordered list of plays. Serialized as a plain sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TaskGraph {
    plays: Vec<Play>,
}

impl TaskGraph {
    /// Appends a play.
    pub fn push(&mut self, play: Play) {
        self.plays.push(play);
    }

    /// Plays in order.
    #[must_use]
    pub fn plays(&self) -> &[Play] {
        &self.plays
    }

    /// Host of each play, in order.
    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.plays.iter().map(|p| p.hosts.as_str())
    }

    /// Returns true if there are no plays.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plays.is_empty()
    }
}
