//! Requirement identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies the (project, requirement) pair a document belongs to.
///
/// A `RequirementRef` is fixed for the lifetime of a controller: every
/// version, session and chat exchange it owns is scoped to this pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequirementRef {
    /// Project the requirement belongs to.
    pub project_id: String,
    /// Requirement identifier inside the project.
    pub requirement_id: String,
}

impl RequirementRef {
    pub fn new(project_id: impl Into<String>, requirement_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            requirement_id: requirement_id.into(),
        }
    }
}

impl fmt::Display for RequirementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project_id, self.requirement_id)
    }
}

/// Descriptive requirement data sent alongside outbound requests.
///
/// The producer needs the requirement text to build its prompt; the history
/// backend stores the title next to every version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementDetails {
    /// Human-readable requirement title.
    pub title: String,
    /// Full requirement description.
    pub description: String,
}
