mod parser;
mod types;

pub use parser::parse_session;
pub use types::{ContextConfig, NodeConfig, SessionConfig};

use std::sync::Arc;

use crate::alerts::TracingAlertSink;
use crate::detection::{ResponseMatcher, ResponseMatcherConfig};
use crate::errors::GatecheckError;
use crate::history::InMemoryHistory;
use crate::http::ReqwestReplay;
use crate::registry::ScanManager;
use crate::scanner::ScanCollaborators;

/// Wires a [`ScanManager`] from a parsed session: site tree, per-context
/// users, rules and authorization detection, with a live HTTP replay channel
/// and an in-memory history store.
pub fn manager_from_session(
    session: &SessionConfig,
    timeout_secs: u64,
) -> Result<Arc<ScanManager>, GatecheckError> {
    let provider = Arc::new(session.site_tree());
    let collaborators = ScanCollaborators {
        replay: Arc::new(ReqwestReplay::new(timeout_secs)?),
        detector: Arc::new(ResponseMatcher::from_config(
            &ResponseMatcherConfig::status_defaults(),
        )?),
        history: Arc::new(InMemoryHistory::new()),
        alerts: Some(Arc::new(TracingAlertSink)),
    };
    let manager = Arc::new(ScanManager::new(provider, collaborators));

    for context in &session.contexts {
        manager.register_users(context.id, context.users.clone());
        manager.register_detector(
            context.id,
            Arc::new(ResponseMatcher::from_config(&context.authorization)?),
        );
        let rules = manager.rules_manager(context.id);
        for serialized in &context.rules {
            rules.import_serialized(serialized)?;
        }
    }
    Ok(manager)
}
