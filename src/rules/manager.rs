use std::collections::HashMap;
use std::sync::RwLock;

use tracing::{debug, warn};

use crate::errors::GatecheckError;
use crate::site::{NodePath, SiteNode};

use super::AccessRule;

/// Per-context store of explicit access rules, keyed by (user id, node path).
///
/// Inference applies `Inherit` semantics: a node without an explicit concrete
/// rule takes the rule of its nearest ancestor that has one, defaulting to
/// `Unknown` at the root.
pub struct ContextRuleManager {
    context_id: i64,
    rules: RwLock<HashMap<(i64, NodePath), AccessRule>>,
}

impl ContextRuleManager {
    pub fn new(context_id: i64) -> Self {
        Self {
            context_id,
            rules: RwLock::new(HashMap::new()),
        }
    }

    pub fn context_id(&self) -> i64 {
        self.context_id
    }

    /// Sets the explicit rule for a (user, node) pair. Setting `Inherit`
    /// clears any explicit rule, restoring fall-through to the ancestors.
    pub fn set_rule(&self, user_id: i64, path: &NodePath, rule: AccessRule) {
        let Ok(mut rules) = self.rules.write() else {
            return;
        };
        if rule == AccessRule::Inherit {
            rules.remove(&(user_id, path.clone()));
        } else {
            rules.insert((user_id, path.clone()), rule);
        }
    }

    /// The explicit rule configured for a (user, node) pair, `Inherit` when
    /// none is set.
    pub fn rule(&self, user_id: i64, path: &NodePath) -> AccessRule {
        self.rules
            .read()
            .ok()
            .and_then(|rules| rules.get(&(user_id, path.clone())).copied())
            .unwrap_or(AccessRule::Inherit)
    }

    /// Resolves the concrete rule for a (user, node) pair by walking toward
    /// the tree root. Never returns `Inherit`.
    pub fn infer(&self, user_id: i64, path: &NodePath) -> AccessRule {
        let Ok(rules) = self.rules.read() else {
            return AccessRule::Unknown;
        };
        let mut current = Some(path.clone());
        while let Some(p) = current {
            if let Some(rule) = rules.get(&(user_id, p.clone())) {
                if rule.is_concrete() {
                    return *rule;
                }
            }
            current = p.parent();
        }
        AccessRule::Unknown
    }

    /// Imports one rule serialized as `<user_id>:<rule>:<node_path>`.
    pub fn import_serialized(&self, serialized: &str) -> Result<(), GatecheckError> {
        let mut parts = serialized.splitn(3, ':');
        let (user, rule, path) = match (parts.next(), parts.next(), parts.next()) {
            (Some(u), Some(r), Some(p)) => (u, r, p),
            _ => {
                return Err(GatecheckError::Config(format!(
                    "invalid serialized access rule: {serialized}"
                )))
            }
        };
        let user_id: i64 = user.parse().map_err(|_| {
            GatecheckError::Config(format!("invalid user id in serialized rule: {user}"))
        })?;
        let rule: AccessRule = rule.parse()?;
        let path = NodePath::from_joined(path);
        self.set_rule(user_id, &path, rule);
        Ok(())
    }

    /// Exports all explicit rules in the serialized form accepted by
    /// [`import_serialized`](Self::import_serialized). Order is stable.
    pub fn export_serialized(&self) -> Vec<String> {
        let Ok(rules) = self.rules.read() else {
            return Vec::new();
        };
        let mut out: Vec<String> = rules
            .iter()
            .map(|((user_id, path), rule)| format!("{user_id}:{rule}:{path}"))
            .collect();
        out.sort();
        out
    }

    /// Reconciles the rule table with a freshly loaded site tree, dropping
    /// rules for nodes that no longer exist. Called on session change.
    pub fn reload_site_tree(&self, nodes: &[SiteNode]) {
        let Ok(mut rules) = self.rules.write() else {
            return;
        };
        let before = rules.len();
        rules.retain(|(_, path), _| nodes.iter().any(|n| n.path == *path));
        let dropped = before - rules.len();
        if dropped > 0 {
            warn!(
                context_id = self.context_id,
                dropped, "Dropped access rules for nodes no longer in the site tree"
            );
        } else {
            debug!(context_id = self.context_id, "Site tree reloaded, rules unchanged");
        }
    }
}
