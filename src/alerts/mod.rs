//! Converts ILLEGAL scan results into security findings.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::GatecheckError;
use crate::scanner::{
    AlertSink, HistoryHandle, HistorySink, ScanOutcome, ScanResultEntry, ScanStartOptions,
};

/// Fixed identifier for findings raised against the unauthenticated identity.
pub const ALERT_ID_IMPROPER_AUTHENTICATION: u32 = 10101;
/// Fixed identifier for findings raised against a named user.
pub const ALERT_ID_IMPROPER_AUTHORIZATION: u32 = 10102;

const CWE_IMPROPER_AUTHENTICATION: u32 = 287;
const CWE_BEHAVIORAL_DISCREPANCY: u32 = 205;
const WASC_AUTHENTICATION: u32 = 1;
const WASC_AUTHORIZATION: u32 = 2;

/// Risk level attached to raised findings, bounded to Info..High.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Info,
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Ordinal rank, Info = 0 through High = 3.
    pub fn rank(&self) -> u8 {
        match self {
            RiskLevel::Info => 0,
            RiskLevel::Low => 1,
            RiskLevel::Medium => 2,
            RiskLevel::High => 3,
        }
    }

    pub fn from_rank(rank: u8) -> Result<Self, GatecheckError> {
        match rank {
            0 => Ok(RiskLevel::Info),
            1 => Ok(RiskLevel::Low),
            2 => Ok(RiskLevel::Medium),
            3 => Ok(RiskLevel::High),
            other => Err(GatecheckError::Config(format!(
                "risk level out of bounds: {other} (expected 0..=3)"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Info => "info",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = GatecheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(RiskLevel::Info),
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(GatecheckError::Config(format!(
                "unrecognized risk level: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
    Confirmed,
}

/// A security finding raised for an ILLEGAL scan result.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub alert_id: u32,
    pub name: String,
    pub risk: RiskLevel,
    pub confidence: Confidence,
    pub description: String,
    pub uri: String,
    pub cwe_id: u32,
    pub wasc_id: u32,
    pub history: HistoryHandle,
    /// Response body of the offending exchange, when it could be reloaded.
    pub evidence: Option<String>,
}

/// Consumes classified results and raises one finding per ILLEGAL result,
/// when alert raising was requested at scan configuration time and a sink is
/// available.
pub struct AlertsProcessor {
    enabled: bool,
    risk: RiskLevel,
    sink: Option<Arc<dyn AlertSink>>,
    history: Arc<dyn HistorySink>,
}

impl AlertsProcessor {
    pub fn new(
        options: &ScanStartOptions,
        sink: Option<Arc<dyn AlertSink>>,
        history: Arc<dyn HistorySink>,
    ) -> Self {
        Self {
            enabled: options.raise_alerts && sink.is_some(),
            risk: options.alert_risk,
            sink,
            history,
        }
    }

    /// True iff this result must produce a finding.
    pub fn should_process(&self, entry: &ScanResultEntry) -> bool {
        self.enabled && entry.outcome == ScanOutcome::Illegal
    }

    pub async fn process(&self, entry: &ScanResultEntry) {
        if !self.should_process(entry) {
            return;
        }
        let Some(sink) = &self.sink else {
            return;
        };

        // Reattaching the message body is best effort: the finding is still
        // raised when the exchange cannot be reloaded.
        let evidence = match self.history.load(entry.history).await {
            Ok(exchange) => Some(exchange.response.body),
            Err(e) => {
                warn!(
                    history_id = entry.history.0,
                    error = %e,
                    "Could not reload exchange for alert, raising without message body"
                );
                None
            }
        };

        sink.raise(self.build_alert(entry, evidence));
    }

    fn build_alert(&self, entry: &ScanResultEntry, evidence: Option<String>) -> Alert {
        let authorization = if entry.authorized {
            "authorized"
        } else {
            "unauthorized"
        };
        match &entry.user {
            None => Alert {
                alert_id: ALERT_ID_IMPROPER_AUTHENTICATION,
                name: "Insufficient Authentication".into(),
                risk: self.risk,
                confidence: Confidence::High,
                description: format!(
                    "The resource was {authorization} when requested without any \
                     authenticated identity, while the configured access rule is '{}'.",
                    entry.rule
                ),
                uri: entry.uri.clone(),
                cwe_id: CWE_IMPROPER_AUTHENTICATION,
                wasc_id: WASC_AUTHENTICATION,
                history: entry.history,
                evidence,
            },
            Some(user) => Alert {
                alert_id: ALERT_ID_IMPROPER_AUTHORIZATION,
                name: "Access Control Issue - Improper Authorization".into(),
                risk: self.risk,
                confidence: Confidence::High,
                description: format!(
                    "The resource was {authorization} when requested as user '{}', while \
                     the configured access rule is '{}'.",
                    user.name, entry.rule
                ),
                uri: entry.uri.clone(),
                cwe_id: CWE_BEHAVIORAL_DISCREPANCY,
                wasc_id: WASC_AUTHORIZATION,
                history: entry.history,
                evidence,
            },
        }
    }
}

/// Alert sink that logs findings through `tracing`. Used by the CLI.
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn raise(&self, alert: Alert) {
        warn!(
            alert_id = alert.alert_id,
            risk = %alert.risk,
            uri = %alert.uri,
            cwe = alert.cwe_id,
            wasc = alert.wasc_id,
            "{}: {}",
            alert.name,
            alert.description
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::AccessRule;
    use crate::scanner::ReplayedExchange;
    use crate::site::Context;
    use crate::users::UserIdentity;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct NullHistory {
        fail_load: bool,
    }

    #[async_trait]
    impl HistorySink for NullHistory {
        async fn record(&self, _: &ReplayedExchange) -> Result<HistoryHandle, GatecheckError> {
            Ok(HistoryHandle(1))
        }

        async fn load(&self, _: HistoryHandle) -> Result<ReplayedExchange, GatecheckError> {
            if self.fail_load {
                Err(GatecheckError::Storage("record gone".into()))
            } else {
                Ok(ReplayedExchange {
                    request: crate::site::RecordedRequest {
                        method: "GET".into(),
                        uri: "http://ex.com/app".into(),
                        headers: Vec::new(),
                        body: String::new(),
                    },
                    response: crate::site::RecordedResponse {
                        status: 200,
                        headers: Vec::new(),
                        body: "secret".into(),
                    },
                    user_id: None,
                })
            }
        }
    }

    #[derive(Default)]
    struct CollectingSink {
        alerts: Mutex<Vec<Alert>>,
    }

    impl AlertSink for CollectingSink {
        fn raise(&self, alert: Alert) {
            self.alerts.lock().unwrap().push(alert);
        }
    }

    fn options(raise_alerts: bool, risk: RiskLevel) -> ScanStartOptions {
        ScanStartOptions {
            context: Context {
                id: 1,
                name: "test".into(),
                include_prefixes: vec!["http://ex.com".into()],
                in_scope: true,
            },
            target_users: vec![None],
            raise_alerts,
            alert_risk: risk,
        }
    }

    fn entry(user: Option<UserIdentity>, outcome: ScanOutcome) -> ScanResultEntry {
        ScanResultEntry {
            history: HistoryHandle(7),
            user,
            method: "GET".into(),
            uri: "http://ex.com/app/admin".into(),
            status: 200,
            authorized: true,
            outcome,
            rule: AccessRule::Denied,
        }
    }

    fn processor(
        raise_alerts: bool,
        fail_load: bool,
    ) -> (AlertsProcessor, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::default());
        let processor = AlertsProcessor::new(
            &options(raise_alerts, RiskLevel::High),
            Some(sink.clone()),
            Arc::new(NullHistory { fail_load }),
        );
        (processor, sink)
    }

    #[tokio::test]
    async fn raises_only_for_illegal_results() {
        let (processor, sink) = processor(true, false);
        processor.process(&entry(None, ScanOutcome::Valid)).await;
        processor.process(&entry(None, ScanOutcome::Unknown)).await;
        assert!(sink.alerts.lock().unwrap().is_empty());

        processor.process(&entry(None, ScanOutcome::Illegal)).await;
        assert_eq!(sink.alerts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn disabled_processor_raises_nothing() {
        let (processor, sink) = processor(false, false);
        processor.process(&entry(None, ScanOutcome::Illegal)).await;
        assert!(sink.alerts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn category_is_determined_by_the_user() {
        let (processor, sink) = processor(true, false);
        processor.process(&entry(None, ScanOutcome::Illegal)).await;
        processor
            .process(&entry(Some(UserIdentity::new(2, "admin")), ScanOutcome::Illegal))
            .await;

        let alerts = sink.alerts.lock().unwrap();
        assert_eq!(alerts[0].alert_id, ALERT_ID_IMPROPER_AUTHENTICATION);
        assert_eq!(alerts[0].cwe_id, 287);
        assert_eq!(alerts[0].wasc_id, 1);
        assert_eq!(alerts[1].alert_id, ALERT_ID_IMPROPER_AUTHORIZATION);
        assert_eq!(alerts[1].cwe_id, 205);
        assert_eq!(alerts[1].wasc_id, 2);
        assert!(alerts[1].description.contains("admin"));
    }

    #[tokio::test]
    async fn alerts_carry_the_configured_risk_and_reloaded_body() {
        let (processor, sink) = processor(true, false);
        processor.process(&entry(None, ScanOutcome::Illegal)).await;
        let alerts = sink.alerts.lock().unwrap();
        assert_eq!(alerts[0].risk, RiskLevel::High);
        assert_eq!(alerts[0].confidence, Confidence::High);
        assert_eq!(alerts[0].evidence.as_deref(), Some("secret"));
    }

    #[tokio::test]
    async fn storage_failure_degrades_to_alert_without_body() {
        let (processor, sink) = processor(true, true);
        processor.process(&entry(None, ScanOutcome::Illegal)).await;
        let alerts = sink.alerts.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].evidence.is_none());
    }

    #[test]
    fn risk_rank_bounds() {
        assert_eq!(RiskLevel::from_rank(0).unwrap(), RiskLevel::Info);
        assert_eq!(RiskLevel::from_rank(3).unwrap(), RiskLevel::High);
        assert!(RiskLevel::from_rank(4).is_err());
    }
}
