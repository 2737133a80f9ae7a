use serde::{Deserialize, Serialize};

use crate::errors::GatecheckError;

/// Per-node authorization policy statement for one user.
///
/// `Inherit` is a configuration-time value only: it defers to the nearest
/// ancestor with an explicit rule and is never produced by inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessRule {
    Allowed,
    Denied,
    Unknown,
    Inherit,
}

impl AccessRule {
    /// True for the values inference may return.
    pub fn is_concrete(&self) -> bool {
        !matches!(self, AccessRule::Inherit)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessRule::Allowed => "allowed",
            AccessRule::Denied => "denied",
            AccessRule::Unknown => "unknown",
            AccessRule::Inherit => "inherit",
        }
    }
}

impl std::fmt::Display for AccessRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccessRule {
    type Err = GatecheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "allowed" => Ok(AccessRule::Allowed),
            "denied" => Ok(AccessRule::Denied),
            "unknown" => Ok(AccessRule::Unknown),
            "inherit" => Ok(AccessRule::Inherit),
            other => Err(GatecheckError::Config(format!(
                "unrecognized access rule: {other}"
            ))),
        }
    }
}
