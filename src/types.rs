/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// Organization id used as the tenant key for row-level isolation
pub type TenantId = i64;

/// Entities that have a repository in the unit-of-work registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Organization,
    User,
    Earthquake,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Organization => "organization",
            EntityKind::User => "user",
            EntityKind::Earthquake => "earthquake",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
