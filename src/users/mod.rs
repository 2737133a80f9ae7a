use serde::{Deserialize, Serialize};

/// Rule-table key reserved for results obtained while scanning without any
/// authenticated identity.
pub const UNAUTHENTICATED_USER_ID: i64 = -1;

/// A web-application identity the scanner can impersonate when replaying
/// recorded requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: i64,
    pub name: String,
    /// Headers that establish the identity's session on the target
    /// application (e.g. a `Cookie` or `Authorization` header). Applied to
    /// every replayed request in place of the recorded ones.
    #[serde(default)]
    pub session_headers: Vec<(String, String)>,
}

impl UserIdentity {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            session_headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.session_headers.push((name.into(), value.into()));
        self
    }
}

/// Display name for an optional identity, where `None` is the
/// unauthenticated sentinel.
pub fn display_name(user: Option<&UserIdentity>) -> &str {
    user.map_or("unauthenticated", |u| u.name.as_str())
}

/// Rule-table id for an optional identity.
pub fn rule_user_id(user: Option<&UserIdentity>) -> i64 {
    user.map_or(UNAUTHENTICATED_USER_ID, |u| u.id)
}
