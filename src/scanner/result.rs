use serde::{Deserialize, Serialize};

use crate::rules::AccessRule;
use crate::users::{display_name, UserIdentity};

use super::collaborators::HistoryHandle;

/// Verdict for one replayed (node, user) attempt, comparing the observed
/// authorization outcome against the applicable access rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanOutcome {
    /// Access matched the rule: authorized where allowed, or refused where
    /// denied.
    Valid,
    /// Access contradicted the rule: authorized where denied, or refused
    /// where allowed.
    Illegal,
    /// The applicable rule is unknown; no correctness claim is made.
    Unknown,
}

impl ScanOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanOutcome::Valid => "valid",
            ScanOutcome::Illegal => "illegal",
            ScanOutcome::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies an attempt given the resolved rule and the observed
/// authorization outcome.
pub fn classify(rule: AccessRule, authorized: bool) -> ScanOutcome {
    match rule {
        AccessRule::Allowed => {
            if authorized {
                ScanOutcome::Valid
            } else {
                ScanOutcome::Illegal
            }
        }
        AccessRule::Denied => {
            if !authorized {
                ScanOutcome::Valid
            } else {
                ScanOutcome::Illegal
            }
        }
        _ => ScanOutcome::Unknown,
    }
}

/// One outcome per (node, user) pair, immutable once appended to the run's
/// result list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanResultEntry {
    pub history: HistoryHandle,
    /// `None` for results obtained while scanning unauthenticated.
    pub user: Option<UserIdentity>,
    pub method: String,
    pub uri: String,
    pub status: u16,
    pub authorized: bool,
    pub outcome: ScanOutcome,
    pub rule: AccessRule,
}

impl std::fmt::Display for ScanResultEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} - user={}: authorized={}, rule={}, outcome={}",
            self.uri,
            display_name(self.user.as_ref()),
            self.authorized,
            self.rule,
            self.outcome
        )
    }
}
