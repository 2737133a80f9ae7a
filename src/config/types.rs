use serde::{Deserialize, Serialize};

use crate::detection::ResponseMatcherConfig;
use crate::site::{
    Context, InMemorySiteTree, RecordedEntry, RecordedExchange, RecordedRequest,
    RecordedResponse, SiteNode,
};
use crate::users::UserIdentity;

/// A session file: the recorded site tree, contexts, users and access rules
/// a scan run is configured from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub contexts: Vec<ContextConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    pub id: i64,
    pub name: String,
    pub include_prefixes: Vec<String>,
    #[serde(default = "default_true")]
    pub in_scope: bool,
    #[serde(default)]
    pub users: Vec<UserIdentity>,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
    /// Serialized access rules, `<user_id>:<rule>:<node_path>`.
    #[serde(default)]
    pub rules: Vec<String>,
    /// Authorization-detection heuristic for this context. Defaults to
    /// treating 401/403 responses as unauthorized.
    #[serde(default = "ResponseMatcherConfig::status_defaults")]
    pub authorization: ResponseMatcherConfig,
}

fn default_true() -> bool {
    true
}

/// One recorded site node. Nodes without a recorded status are folder
/// placeholders that the scanner skips.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_method")]
    pub method: String,
    pub uri: String,
    #[serde(default)]
    pub request_headers: Vec<(String, String)>,
    #[serde(default)]
    pub request_body: String,
    /// Recorded response status; absent for never-visited nodes.
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub response_body: String,
}

fn default_method() -> String {
    "GET".to_string()
}

impl ContextConfig {
    pub fn context(&self) -> Context {
        Context {
            id: self.id,
            name: self.name.clone(),
            include_prefixes: self.include_prefixes.clone(),
            in_scope: self.in_scope,
        }
    }
}

impl SessionConfig {
    /// Builds the in-memory site tree described by this session.
    pub fn site_tree(&self) -> InMemorySiteTree {
        let mut tree = InMemorySiteTree::new();
        for context in &self.contexts {
            tree.add_context(context.context());
            for node in &context.nodes {
                let recorded = match node.status {
                    None => RecordedEntry::Missing,
                    Some(status) => RecordedEntry::Available(RecordedExchange {
                        request: RecordedRequest {
                            method: node.method.clone(),
                            uri: node.uri.clone(),
                            headers: node.request_headers.clone(),
                            body: node.request_body.clone(),
                        },
                        response: Some(RecordedResponse {
                            status,
                            headers: Vec::new(),
                            body: node.response_body.clone(),
                        }),
                    }),
                };
                tree.add_node(SiteNode::new(&node.method, node.uri.clone(), recorded));
            }
        }
        tree
    }
}
