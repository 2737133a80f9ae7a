//! Traits for the external collaborators the scan worker drives: the request
//! replay channel, the authorization-detection heuristic, the history sink
//! and the alert sink.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::alerts::Alert;
use crate::errors::GatecheckError;
use crate::site::{RecordedRequest, RecordedResponse};
use crate::users::UserIdentity;

/// Identifier of a replayed exchange persisted by a [`HistorySink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryHandle(pub u64);

/// A request/response pair produced by replaying a recorded request under a
/// given identity (`None` = unauthenticated).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayedExchange {
    pub request: RecordedRequest,
    pub response: RecordedResponse,
    pub user_id: Option<i64>,
}

/// Sends a cloned recorded request under the given identity and returns the
/// initial response. Implementations must not follow redirects.
#[async_trait]
pub trait RequestReplay: Send + Sync {
    async fn send(
        &self,
        request: &RecordedRequest,
        identity: Option<&UserIdentity>,
    ) -> Result<RecordedResponse, GatecheckError>;
}

/// Characterizes responses to unauthorized requests. The scanner treats a
/// response as authorized unless this heuristic says otherwise.
pub trait AuthorizationDetector: Send + Sync {
    fn is_unauthorized_response(&self, response: &RecordedResponse) -> bool;
}

/// Persists replayed exchanges, tagged for access control testing, and
/// reloads them when alerts need the message body.
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn record(&self, exchange: &ReplayedExchange) -> Result<HistoryHandle, GatecheckError>;

    async fn load(&self, handle: HistoryHandle) -> Result<ReplayedExchange, GatecheckError>;
}

/// Receives security findings. Absence of a sink disables alert raising.
pub trait AlertSink: Send + Sync {
    fn raise(&self, alert: Alert);
}

/// The collaborator bundle handed to the worker at scan start.
#[derive(Clone)]
pub struct ScanCollaborators {
    pub replay: Arc<dyn RequestReplay>,
    pub detector: Arc<dyn AuthorizationDetector>,
    pub history: Arc<dyn HistorySink>,
    pub alerts: Option<Arc<dyn AlertSink>>,
}
