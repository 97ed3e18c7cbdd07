//! Roles and the signed-in viewer.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Account role. Roles gate which idea actions are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular participant
    Citizen,
    /// Elected representative
    Representative,
    /// Platform administrator
    Administrator,
    /// Public authority that can promote ideas to official proposals
    Authority,
}

impl Role {
    /// Storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Citizen => "citizen",
            Self::Representative => "representative",
            Self::Administrator => "administrator",
            Self::Authority => "authority",
        }
    }

    /// Whether this role may edit or delete ideas it does not own.
    #[must_use]
    pub const fn can_moderate(self) -> bool {
        matches!(self, Self::Administrator)
    }

    /// Whether this role may mark ideas as official proposals.
    #[must_use]
    pub const fn can_promote(self) -> bool {
        matches!(self, Self::Administrator | Self::Authority)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "citizen" => Ok(Self::Citizen),
            "representative" => Ok(Self::Representative),
            "administrator" => Ok(Self::Administrator),
            "authority" => Ok(Self::Authority),
            other => Err(Error::InvalidInput {
                message: format!("unknown role '{other}'"),
            }),
        }
    }
}

/// The authenticated user on whose behalf actions run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    /// Backend user id
    pub user_id: String,
    /// Role held by the user
    pub role: Role,
    /// Whether the email address has been verified
    pub email_verified: bool,
}

impl Viewer {
    /// Creates a verified viewer with the given role.
    #[must_use]
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            email_verified: true,
        }
    }
}

/// Returns the viewer or `NotAuthenticated`.
pub fn require_viewer(viewer: Option<&Viewer>) -> Result<&Viewer> {
    viewer.ok_or(Error::NotAuthenticated)
}
