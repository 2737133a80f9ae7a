use crate::alerts::RiskLevel;
use crate::errors::GatecheckError;
use crate::site::Context;
use crate::users::UserIdentity;

/// Immutable-once-started configuration for one access control scan run.
///
/// `target_users` holds the identities in attack order; a trailing `None`
/// entry is the unauthenticated sentinel. The sentinel is always appended
/// after all named users, never interleaved.
#[derive(Debug, Clone)]
pub struct ScanStartOptions {
    pub context: Context,
    pub target_users: Vec<Option<UserIdentity>>,
    pub raise_alerts: bool,
    pub alert_risk: RiskLevel,
}

impl ScanStartOptions {
    pub fn new(
        context: Context,
        users: Vec<UserIdentity>,
        include_unauthenticated: bool,
        raise_alerts: bool,
        alert_risk: RiskLevel,
    ) -> Result<Self, GatecheckError> {
        let mut target_users: Vec<Option<UserIdentity>> = users.into_iter().map(Some).collect();
        if include_unauthenticated {
            target_users.push(None);
        }
        let options = Self {
            context,
            target_users,
            raise_alerts,
            alert_risk,
        };
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), GatecheckError> {
        if self.target_users.is_empty() {
            return Err(GatecheckError::Config(
                "at least one target user (or the unauthenticated identity) is required".into(),
            ));
        }
        Ok(())
    }
}
