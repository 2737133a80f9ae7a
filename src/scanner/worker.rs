use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::alerts::AlertsProcessor;
use crate::errors::GatecheckError;
use crate::rules::ContextRuleManager;
use crate::site::{RecordedExchange, SiteNode, SiteTreeProvider};
use crate::users::{display_name, rule_user_id, UserIdentity};

use super::collaborators::{ReplayedExchange, ScanCollaborators};
use super::events::ScanEvent;
use super::options::ScanStartOptions;
use super::result::{classify, ScanResultEntry};

/// The scan worker for one context: replays every eligible recorded request
/// under every target identity, classifies each outcome against policy and
/// publishes results incrementally.
///
/// All iteration runs sequentially on one dedicated task. Pause and stop are
/// cooperative, polled at node granularity; an in-flight network call is
/// allowed to finish.
pub struct AccessControlScanner {
    context_id: i64,
    running: AtomicBool,
    has_run: AtomicBool,
    interrupted: AtomicBool,
    progress: AtomicUsize,
    max_progress: AtomicUsize,
    paused_tx: watch::Sender<bool>,
    /// Replaced with a fresh token on every `start`; `stop` cancels the
    /// current one.
    cancel: RwLock<CancellationToken>,
    /// Snapshot of the most recent finished (or stopped) run. `None` while a
    /// run is in progress or before the first run; readers never observe a
    /// partially built list.
    results: RwLock<Option<Arc<Vec<ScanResultEntry>>>>,
    options: RwLock<Option<ScanStartOptions>>,
    listeners: Mutex<Vec<mpsc::UnboundedSender<ScanEvent>>>,
}

impl AccessControlScanner {
    pub fn new(context_id: i64) -> Self {
        let (paused_tx, _) = watch::channel(false);
        Self {
            context_id,
            running: AtomicBool::new(false),
            has_run: AtomicBool::new(false),
            interrupted: AtomicBool::new(false),
            progress: AtomicUsize::new(0),
            max_progress: AtomicUsize::new(0),
            paused_tx,
            cancel: RwLock::new(CancellationToken::new()),
            results: RwLock::new(None),
            options: RwLock::new(None),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn context_id(&self) -> i64 {
        self.context_id
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        *self.paused_tx.borrow()
    }

    pub fn has_run(&self) -> bool {
        self.has_run.load(Ordering::SeqCst)
    }

    /// True when the last run was stopped before completing.
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// `(current, maximum)` progress counters. The maximum is
    /// `node_count + 1`, leaving room for one unit of post-loop bookkeeping.
    pub fn progress(&self) -> (usize, usize) {
        (
            self.progress.load(Ordering::SeqCst),
            self.max_progress.load(Ordering::SeqCst),
        )
    }

    /// Suspends the worker before the next node. The current node's
    /// in-flight work completes first.
    pub fn pause(&self) {
        if self.is_running() {
            let _ = self.paused_tx.send(true);
        }
    }

    pub fn resume(&self) {
        let _ = self.paused_tx.send(false);
    }

    /// Requests a cooperative stop. The worker exits its loop before the
    /// next node, finalizes progress to maximum and still notifies finish.
    pub fn stop(&self) {
        if self.is_running() {
            self.interrupted.store(true, Ordering::SeqCst);
        }
        // Unblock a paused worker so the stop is observed.
        let _ = self.paused_tx.send(false);
        if let Ok(cancel) = self.cancel.read() {
            cancel.cancel();
        }
    }

    /// The options of the current (or last) run.
    pub fn options(&self) -> Option<ScanStartOptions> {
        self.options.read().ok().and_then(|o| o.clone())
    }

    /// Registers a listener. Must be called before `start` to observe every
    /// event of the next run.
    pub fn add_listener(&self) -> mpsc::UnboundedReceiver<ScanEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(tx);
        }
        rx
    }

    /// Read-only snapshot of the results of the most recent completed or
    /// stopped run; `None` while a run is in progress or if none has run.
    pub fn last_results(&self) -> Option<Arc<Vec<ScanResultEntry>>> {
        self.results.read().ok().and_then(|r| r.clone())
    }

    /// Starts the run on a dedicated task. Fails fast when a run is already
    /// active for this scanner.
    pub fn start(
        self: &Arc<Self>,
        options: ScanStartOptions,
        provider: Arc<dyn SiteTreeProvider>,
        rules: Arc<ContextRuleManager>,
        collaborators: ScanCollaborators,
    ) -> Result<(), GatecheckError> {
        options.validate()?;
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(GatecheckError::AlreadyRunning(self.context_id));
        }
        self.has_run.store(true, Ordering::SeqCst);
        self.interrupted.store(false, Ordering::SeqCst);
        self.progress.store(0, Ordering::SeqCst);
        self.max_progress.store(0, Ordering::SeqCst);
        let _ = self.paused_tx.send(false);
        if let Ok(mut results) = self.results.write() {
            *results = None;
        }
        if let Ok(mut stored) = self.options.write() {
            *stored = Some(options.clone());
        }
        let cancel = CancellationToken::new();
        if let Ok(mut stored) = self.cancel.write() {
            *stored = cancel.clone();
        }

        let alerts = AlertsProcessor::new(
            &options,
            collaborators.alerts.clone(),
            collaborators.history.clone(),
        );
        let worker = ScanWorker {
            scanner: self.clone(),
            paused_rx: self.paused_tx.subscribe(),
            cancel,
            options,
            provider,
            rules,
            collaborators,
            alerts,
            results: Vec::new(),
        };
        tokio::spawn(worker.run());
        Ok(())
    }

    fn emit(&self, event: ScanEvent) {
        let Ok(mut listeners) = self.listeners.lock() else {
            return;
        };
        listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

struct ScanWorker {
    scanner: Arc<AccessControlScanner>,
    paused_rx: watch::Receiver<bool>,
    cancel: CancellationToken,
    options: ScanStartOptions,
    provider: Arc<dyn SiteTreeProvider>,
    rules: Arc<ContextRuleManager>,
    collaborators: ScanCollaborators,
    alerts: AlertsProcessor,
    results: Vec<ScanResultEntry>,
}

impl ScanWorker {
    /// Top-level run loop. Whatever happens inside the scan, progress is
    /// finalized, the results snapshot is published and finish is signaled
    /// exactly once.
    async fn run(mut self) {
        let context_id = self.scanner.context_id;
        self.scanner.emit(ScanEvent::ScanStarted { context_id });

        // Collaborators are pluggable; a panic in one must not skip
        // finalization or leave the scanner marked running.
        match AssertUnwindSafe(self.scan_impl()).catch_unwind().await {
            Ok(Ok(())) => debug!(context_id, "Access control scan completed"),
            Ok(Err(e)) => {
                error!(context_id, error = %e, "Error while scanning, terminating run")
            }
            Err(_) => error!(context_id, "Panic while scanning, terminating run"),
        }

        let max = self.scanner.max_progress.load(Ordering::SeqCst);
        self.scanner.progress.store(max, Ordering::SeqCst);
        if let Ok(mut results) = self.scanner.results.write() {
            *results = Some(Arc::new(std::mem::take(&mut self.results)));
        }
        self.scanner.running.store(false, Ordering::SeqCst);
        self.scanner.emit(ScanEvent::ScanFinished { context_id });
    }

    async fn scan_impl(&mut self) -> Result<(), GatecheckError> {
        let nodes = self.provider.nodes_in_context(&self.options.context);
        // One extra unit is reserved for post-loop bookkeeping.
        self.scanner
            .max_progress
            .store(nodes.len() + 1, Ordering::SeqCst);

        debug!(
            context_id = self.scanner.context_id,
            nodes = nodes.len(),
            users = self.options.target_users.len(),
            "Starting access control scan"
        );

        let users = self.options.target_users.clone();
        let mut progress = 0;
        for node in &nodes {
            self.wait_while_paused().await;
            if self.cancel.is_cancelled() {
                break;
            }

            match node.load_recorded() {
                Ok(Some(exchange)) if should_attack(exchange) => {
                    for user in &users {
                        self.attack_node(node, exchange, user.as_ref()).await;
                    }
                }
                Ok(_) => {
                    // No recorded response: probably a folder placeholder
                    // never reached via exploration.
                    debug!(node = %node.path, "Skipping node without recorded response");
                }
                Err(e) => {
                    error!(node = %node.path, error = %e, "Failed to load recorded exchange");
                }
            }

            progress += 1;
            self.scanner.progress.store(progress, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn attack_node(
        &mut self,
        node: &SiteNode,
        original: &RecordedExchange,
        user: Option<&UserIdentity>,
    ) {
        debug!(
            uri = %original.request.uri,
            user = display_name(user),
            "Attacking node"
        );

        let response = match self.collaborators.replay.send(&original.request, user).await {
            Ok(response) => response,
            Err(e) => {
                error!(
                    uri = %original.request.uri,
                    user = display_name(user),
                    error = %e,
                    "Error sending access control testing message"
                );
                return;
            }
        };

        // Authorized unless the detection heuristic proves otherwise.
        let authorized = !self
            .collaborators
            .detector
            .is_unauthorized_response(&response);

        let exchange = ReplayedExchange {
            request: original.request.clone(),
            response,
            user_id: user.map(|u| u.id),
        };
        let history = match self.collaborators.history.record(&exchange).await {
            Ok(handle) => handle,
            Err(e) => {
                error!(
                    uri = %original.request.uri,
                    error = %e,
                    "Failed to persist access control testing message"
                );
                return;
            }
        };

        let rule = self.rules.infer(rule_user_id(user), &node.path);
        let outcome = classify(rule, authorized);

        let entry = ScanResultEntry {
            history,
            user: user.cloned(),
            method: original.request.method.clone(),
            uri: original.request.uri.clone(),
            status: exchange.response.status,
            authorized,
            outcome,
            rule,
        };
        self.results.push(entry.clone());
        self.alerts.process(&entry).await;
        self.scanner.emit(ScanEvent::ResultObtained {
            context_id: self.scanner.context_id,
            entry,
        });
    }

    async fn wait_while_paused(&mut self) {
        while *self.paused_rx.borrow() {
            if self.paused_rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Nodes without a recorded response are not attacked: they likely
/// correspond to places never reached via exploration.
fn should_attack(exchange: &RecordedExchange) -> bool {
    exchange.response.as_ref().is_some_and(|r| !r.is_empty())
}
