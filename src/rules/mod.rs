mod access_rule;
mod manager;

pub use access_rule::AccessRule;
pub use manager::ContextRuleManager;
