//! Shared fixtures for the scan engine integration tests: canned site trees
//! and in-memory collaborator doubles.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, Semaphore};

use gatecheck::alerts::Alert;
use gatecheck::errors::GatecheckError;
use gatecheck::scanner::{
    AlertSink, AuthorizationDetector, HistoryHandle, HistorySink, ReplayedExchange,
    RequestReplay, ScanCollaborators,
};
use gatecheck::site::{
    Context, InMemorySiteTree, RecordedEntry, RecordedExchange, RecordedRequest,
    RecordedResponse, SiteNode,
};
use gatecheck::users::UserIdentity;

pub const BASE: &str = "http://shop.example.com";

pub fn context(id: i64) -> Context {
    Context {
        id,
        name: format!("shop-{id}"),
        include_prefixes: vec![BASE.to_string()],
        in_scope: true,
    }
}

pub fn out_of_scope_context(id: i64) -> Context {
    Context {
        in_scope: false,
        ..context(id)
    }
}

pub fn recorded_node(uri: &str) -> SiteNode {
    SiteNode::new(
        "GET",
        uri,
        RecordedEntry::Available(RecordedExchange {
            request: RecordedRequest {
                method: "GET".into(),
                uri: uri.into(),
                headers: Vec::new(),
                body: String::new(),
            },
            response: Some(RecordedResponse {
                status: 200,
                headers: Vec::new(),
                body: "ok".into(),
            }),
        }),
    )
}

/// A node explored but never visited: no recorded response at all.
pub fn missing_node(uri: &str) -> SiteNode {
    SiteNode::new("GET", uri, RecordedEntry::Missing)
}

/// A node with an empty recorded response (folder placeholder).
pub fn empty_node(uri: &str) -> SiteNode {
    SiteNode::new(
        "GET",
        uri,
        RecordedEntry::Available(RecordedExchange {
            request: RecordedRequest {
                method: "GET".into(),
                uri: uri.into(),
                headers: Vec::new(),
                body: String::new(),
            },
            response: Some(RecordedResponse {
                status: 0,
                headers: Vec::new(),
                body: String::new(),
            }),
        }),
    )
}

pub fn corrupt_node(uri: &str) -> SiteNode {
    SiteNode::new("GET", uri, RecordedEntry::Corrupt("truncated record".into()))
}

pub fn site_tree(ctx: &Context, nodes: Vec<SiteNode>) -> Arc<InMemorySiteTree> {
    let mut tree = InMemorySiteTree::new();
    tree.add_context(ctx.clone());
    for node in nodes {
        tree.add_node(node);
    }
    Arc::new(tree)
}

pub fn user(id: i64, name: &str) -> UserIdentity {
    UserIdentity::new(id, name).with_header("Cookie", &format!("session={name}"))
}

/// Replay double returning a canned status per (uri, user id), with a
/// catch-all default. Records every send it serves.
pub struct MockReplay {
    responses: Mutex<HashMap<(String, Option<i64>), u16>>,
    default_status: u16,
    pub sent: Mutex<Vec<(String, Option<i64>)>>,
}

impl MockReplay {
    pub fn new(default_status: u16) -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            default_status,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn respond_with(self, uri: &str, user_id: Option<i64>, status: u16) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert((uri.to_string(), user_id), status);
        self
    }

    pub fn sent_uris(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
    }
}

#[async_trait]
impl RequestReplay for MockReplay {
    async fn send(
        &self,
        request: &RecordedRequest,
        identity: Option<&UserIdentity>,
    ) -> Result<RecordedResponse, GatecheckError> {
        let user_id = identity.map(|u| u.id);
        self.sent.lock().unwrap().push((request.uri.clone(), user_id));
        let status = self
            .responses
            .lock()
            .unwrap()
            .get(&(request.uri.clone(), user_id))
            .copied()
            .unwrap_or(self.default_status);
        Ok(RecordedResponse {
            status,
            headers: Vec::new(),
            body: format!("replayed {}", request.uri),
        })
    }
}

/// Replay double that serves the first `open_sends` requests immediately,
/// then signals the test and blocks until permits are released.
pub struct GatedReplay {
    hits: AtomicUsize,
    open_sends: usize,
    reached_tx: mpsc::UnboundedSender<()>,
    gate: Arc<Semaphore>,
}

impl GatedReplay {
    pub fn new(open_sends: usize) -> (Self, mpsc::UnboundedReceiver<()>, Arc<Semaphore>) {
        let (reached_tx, reached_rx) = mpsc::unbounded_channel();
        let gate = Arc::new(Semaphore::new(0));
        (
            Self {
                hits: AtomicUsize::new(0),
                open_sends,
                reached_tx,
                gate: gate.clone(),
            },
            reached_rx,
            gate,
        )
    }
}

#[async_trait]
impl RequestReplay for GatedReplay {
    async fn send(
        &self,
        request: &RecordedRequest,
        _identity: Option<&UserIdentity>,
    ) -> Result<RecordedResponse, GatecheckError> {
        let hit = self.hits.fetch_add(1, Ordering::SeqCst);
        if hit >= self.open_sends {
            let _ = self.reached_tx.send(());
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| GatecheckError::Network("gate closed".into()))?;
        }
        Ok(RecordedResponse {
            status: 200,
            headers: Vec::new(),
            body: format!("replayed {}", request.uri),
        })
    }
}

/// Detection double flagging a fixed status set as unauthorized.
pub struct StaticDetector {
    unauthorized: Vec<u16>,
}

impl StaticDetector {
    pub fn denying(unauthorized: Vec<u16>) -> Self {
        Self { unauthorized }
    }

    /// Standard heuristic used by most tests: 401 and 403 are unauthorized.
    pub fn standard() -> Self {
        Self::denying(vec![401, 403])
    }
}

impl AuthorizationDetector for StaticDetector {
    fn is_unauthorized_response(&self, response: &RecordedResponse) -> bool {
        self.unauthorized.contains(&response.status)
    }
}

/// Detection double that panics, standing in for a broken plug-in heuristic.
pub struct PanickingDetector;

impl AuthorizationDetector for PanickingDetector {
    fn is_unauthorized_response(&self, _response: &RecordedResponse) -> bool {
        panic!("detection heuristic failure");
    }
}

#[derive(Default)]
pub struct MockHistory {
    records: Mutex<Vec<ReplayedExchange>>,
    pub fail_load: bool,
}

impl MockHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl HistorySink for MockHistory {
    async fn record(&self, exchange: &ReplayedExchange) -> Result<HistoryHandle, GatecheckError> {
        let mut records = self.records.lock().unwrap();
        records.push(exchange.clone());
        Ok(HistoryHandle(records.len() as u64 - 1))
    }

    async fn load(&self, handle: HistoryHandle) -> Result<ReplayedExchange, GatecheckError> {
        if self.fail_load {
            return Err(GatecheckError::Storage("record unavailable".into()));
        }
        self.records
            .lock()
            .unwrap()
            .get(handle.0 as usize)
            .cloned()
            .ok_or_else(|| GatecheckError::Storage(format!("no record {}", handle.0)))
    }
}

#[derive(Default)]
pub struct CollectingAlertSink {
    pub alerts: Mutex<Vec<Alert>>,
}

impl CollectingAlertSink {
    pub fn len(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }
}

impl AlertSink for CollectingAlertSink {
    fn raise(&self, alert: Alert) {
        self.alerts.lock().unwrap().push(alert);
    }
}

pub struct TestCollaborators {
    pub collaborators: ScanCollaborators,
    pub history: Arc<MockHistory>,
    pub alerts: Arc<CollectingAlertSink>,
}

/// Bundles a replay double with the standard detector, a fresh history and a
/// collecting alert sink.
pub fn collaborators(replay: Arc<dyn RequestReplay>) -> TestCollaborators {
    let history = Arc::new(MockHistory::new());
    let alerts = Arc::new(CollectingAlertSink::default());
    TestCollaborators {
        collaborators: ScanCollaborators {
            replay,
            detector: Arc::new(StaticDetector::standard()),
            history: history.clone(),
            alerts: Some(alerts.clone()),
        },
        history,
        alerts,
    }
}
