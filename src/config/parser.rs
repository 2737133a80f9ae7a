use std::path::Path;

use crate::errors::GatecheckError;

use super::types::SessionConfig;

pub async fn parse_session(path: &Path) -> Result<SessionConfig, GatecheckError> {
    if !path.exists() {
        return Err(GatecheckError::Config(format!(
            "Session file not found: {}",
            path.display()
        )));
    }

    let content = tokio::fs::read_to_string(path).await?;
    let session: SessionConfig = serde_yaml::from_str(&content)?;
    validate(&session)?;
    Ok(session)
}

fn validate(session: &SessionConfig) -> Result<(), GatecheckError> {
    if session.contexts.is_empty() {
        return Err(GatecheckError::Config(
            "session defines no contexts".into(),
        ));
    }
    for context in &session.contexts {
        if context.include_prefixes.is_empty() {
            return Err(GatecheckError::Config(format!(
                "context '{}' defines no include prefixes",
                context.name
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for user in &context.users {
            if !seen.insert(user.id) {
                return Err(GatecheckError::Config(format!(
                    "context '{}' defines user id {} more than once",
                    context.name, user.id
                )));
            }
        }
    }
    let mut ids = std::collections::HashSet::new();
    for context in &session.contexts {
        if !ids.insert(context.id) {
            return Err(GatecheckError::Config(format!(
                "duplicate context id: {}",
                context.id
            )));
        }
    }
    Ok(())
}
