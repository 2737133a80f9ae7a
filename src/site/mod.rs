//! Site-tree model: contexts, recorded exchanges and the provider trait the
//! scan worker enumerates nodes through.

use serde::{Deserialize, Serialize};

use crate::errors::GatecheckError;

/// A target context: a named subset of the site tree, selected by URI prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub id: i64,
    pub name: String,
    /// URI prefixes that select which site nodes belong to this context.
    pub include_prefixes: Vec<String>,
    /// Whether the context is in scope. Out-of-scope contexts cannot be
    /// scanned in Protected mode.
    #[serde(default = "default_true")]
    pub in_scope: bool,
}

fn default_true() -> bool {
    true
}

impl Context {
    pub fn contains(&self, uri: &str) -> bool {
        self.include_prefixes.iter().any(|p| uri.starts_with(p.as_str()))
    }
}

/// Hierarchical position of a node in the site tree, as URI segments from
/// the root (host first). Rule inheritance walks this path toward the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodePath(Vec<String>);

impl NodePath {
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// Derives the path from a URI: the host is the first segment, followed
    /// by the path segments. The query string is ignored.
    pub fn from_uri(uri: &str) -> Self {
        let rest = uri.splitn(2, "://").nth(1).unwrap_or(uri);
        let rest = rest.split('?').next().unwrap_or(rest);
        let segments = rest
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self(segments)
    }

    /// Parses the `/`-joined form produced by [`Display`](std::fmt::Display).
    pub fn from_joined(s: &str) -> Self {
        NodePath(
            s.split('/').filter(|p| !p.is_empty()).map(str::to_string).collect(),
        )
    }

    pub fn parent(&self) -> Option<NodePath> {
        if self.0.is_empty() {
            None
        } else {
            Some(NodePath(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl std::fmt::Display for NodePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

/// A request captured during exploration, used as the replay template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedRequest {
    pub method: String,
    pub uri: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: String,
}

/// The response observed for a recorded (or replayed) request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: String,
}

impl RecordedResponse {
    /// An empty response marks a node that was never actually visited
    /// (e.g. a folder placeholder created while building the tree).
    pub fn is_empty(&self) -> bool {
        self.status == 0
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedExchange {
    pub request: RecordedRequest,
    pub response: Option<RecordedResponse>,
}

/// Storage state of a node's recorded exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedEntry {
    /// Never visited; nothing recorded.
    Missing,
    /// A recorded exchange exists but cannot be loaded.
    Corrupt(String),
    Available(RecordedExchange),
}

/// One node of the site tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteNode {
    pub name: String,
    pub uri: String,
    pub path: NodePath,
    pub recorded: RecordedEntry,
}

impl SiteNode {
    pub fn new(method: &str, uri: impl Into<String>, recorded: RecordedEntry) -> Self {
        let uri = uri.into();
        let path = NodePath::from_uri(&uri);
        let leaf = path.segments().last().map_or("", |s| s.as_str());
        Self {
            name: format!("{method}:{leaf}"),
            uri,
            path,
            recorded,
        }
    }

    /// Loads the recorded exchange. `Ok(None)` means nothing was ever
    /// recorded; an error means the stored exchange is unreadable.
    pub fn load_recorded(&self) -> Result<Option<&RecordedExchange>, GatecheckError> {
        match &self.recorded {
            RecordedEntry::Missing => Ok(None),
            RecordedEntry::Corrupt(reason) => {
                Err(GatecheckError::MalformedMessage(reason.clone()))
            }
            RecordedEntry::Available(exchange) => Ok(Some(exchange)),
        }
    }
}

/// Supplies the scanner with the nodes belonging to a context, in site-tree
/// traversal order.
pub trait SiteTreeProvider: Send + Sync {
    fn context(&self, id: i64) -> Option<Context>;

    fn contexts(&self) -> Vec<Context>;

    /// Nodes belonging to the context, in traversal order. The order is
    /// preserved across the scan for reproducibility.
    fn nodes_in_context(&self, context: &Context) -> Vec<SiteNode>;
}

/// In-memory site tree, populated from a session file or by tests.
#[derive(Debug, Default)]
pub struct InMemorySiteTree {
    contexts: Vec<Context>,
    nodes: Vec<SiteNode>,
}

impl InMemorySiteTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_context(&mut self, context: Context) {
        self.contexts.push(context);
    }

    pub fn add_node(&mut self, node: SiteNode) {
        self.nodes.push(node);
    }
}

impl SiteTreeProvider for InMemorySiteTree {
    fn context(&self, id: i64) -> Option<Context> {
        self.contexts.iter().find(|c| c.id == id).cloned()
    }

    fn contexts(&self) -> Vec<Context> {
        self.contexts.clone()
    }

    fn nodes_in_context(&self, context: &Context) -> Vec<SiteNode> {
        self.nodes
            .iter()
            .filter(|n| context.contains(&n.uri))
            .cloned()
            .collect()
    }
}
