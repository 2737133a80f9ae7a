//! Per-context orchestration: lazily-created scanners and rule managers,
//! scan mode enforcement and lifecycle operations.

use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::errors::GatecheckError;
use crate::report::{build_report, ScanReport};
use crate::rules::ContextRuleManager;
use crate::scanner::{
    AccessControlScanner, AuthorizationDetector, ScanCollaborators, ScanEvent, ScanStartOptions,
};
use crate::site::SiteTreeProvider;
use crate::users::UserIdentity;

/// Global application scan mode. Safe rejects every scan; Protected rejects
/// scans on out-of-scope contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Safe,
    Protect,
    Standard,
    Attack,
}

/// A started scan: the scanner plus an event receiver subscribed before the
/// worker was spawned, so no event is missed.
pub struct ScanHandle {
    pub scanner: Arc<AccessControlScanner>,
    pub events: mpsc::UnboundedReceiver<ScanEvent>,
}

/// Registry of one scanner and one rule manager per context, created lazily
/// and keyed by context id.
pub struct ScanManager {
    provider: Arc<dyn SiteTreeProvider>,
    collaborators: ScanCollaborators,
    mode: RwLock<Mode>,
    scanners: DashMap<i64, Arc<AccessControlScanner>>,
    rule_managers: DashMap<i64, Arc<ContextRuleManager>>,
    users: DashMap<i64, Vec<UserIdentity>>,
    detectors: DashMap<i64, Arc<dyn AuthorizationDetector>>,
}

impl ScanManager {
    pub fn new(provider: Arc<dyn SiteTreeProvider>, collaborators: ScanCollaborators) -> Self {
        Self {
            provider,
            collaborators,
            mode: RwLock::new(Mode::Standard),
            scanners: DashMap::new(),
            rule_managers: DashMap::new(),
            users: DashMap::new(),
            detectors: DashMap::new(),
        }
    }

    pub fn provider(&self) -> &Arc<dyn SiteTreeProvider> {
        &self.provider
    }

    pub fn mode(&self) -> Mode {
        self.mode.read().map(|m| *m).unwrap_or(Mode::Safe)
    }

    /// Changes the scan mode. Switching to Safe stops every scan; switching
    /// to Protected stops scans on out-of-scope contexts.
    pub fn set_mode(&self, mode: Mode) {
        if let Ok(mut current) = self.mode.write() {
            *current = mode;
        }
        match mode {
            Mode::Safe => self.stop_all(),
            Mode::Protect => {
                for entry in self.scanners.iter() {
                    let scanner = entry.value();
                    let out_of_scope = scanner
                        .options()
                        .is_some_and(|o| !o.context.in_scope);
                    if scanner.is_running() && out_of_scope {
                        info!(
                            context_id = scanner.context_id(),
                            "Stopping out-of-scope scan after switch to Protected mode"
                        );
                        scanner.stop();
                    }
                }
            }
            _ => {}
        }
    }

    /// Registers the identities available for a context.
    pub fn register_users(&self, context_id: i64, users: Vec<UserIdentity>) {
        self.users.insert(context_id, users);
    }

    pub fn users(&self, context_id: i64) -> Vec<UserIdentity> {
        self.users
            .get(&context_id)
            .map(|u| u.value().clone())
            .unwrap_or_default()
    }

    /// Resolves registered identities by id, failing on unknown ids.
    pub fn resolve_users(
        &self,
        context_id: i64,
        user_ids: &[i64],
    ) -> Result<Vec<UserIdentity>, GatecheckError> {
        let known = self.users(context_id);
        user_ids
            .iter()
            .map(|id| {
                known
                    .iter()
                    .find(|u| u.id == *id)
                    .cloned()
                    .ok_or(GatecheckError::UnknownUser(*id))
            })
            .collect()
    }

    /// Overrides the authorization-detection heuristic for one context.
    pub fn register_detector(&self, context_id: i64, detector: Arc<dyn AuthorizationDetector>) {
        self.detectors.insert(context_id, detector);
    }

    /// The rule manager for a context, created lazily.
    pub fn rules_manager(&self, context_id: i64) -> Arc<ContextRuleManager> {
        self.rule_managers
            .entry(context_id)
            .or_insert_with(|| Arc::new(ContextRuleManager::new(context_id)))
            .clone()
    }

    pub fn scanner(&self, context_id: i64) -> Option<Arc<AccessControlScanner>> {
        self.scanners.get(&context_id).map(|s| s.value().clone())
    }

    /// Starts an access control scan for the options' context.
    ///
    /// Rejected synchronously when the mode forbids it or a scan is already
    /// running for the context. A scanner that has already run is replaced
    /// by a fresh one before starting.
    pub fn start_scan(&self, options: ScanStartOptions) -> Result<ScanHandle, GatecheckError> {
        let context_id = options.context.id;

        match self.mode() {
            Mode::Safe => {
                return Err(GatecheckError::ModeViolation(
                    "access control scanning is not allowed in Safe mode".into(),
                ))
            }
            Mode::Protect if !options.context.in_scope => {
                return Err(GatecheckError::ModeViolation(format!(
                    "context '{}' is out of scope and cannot be scanned in Protected mode",
                    options.context.name
                )))
            }
            _ => {}
        }

        // The running check and the recreate-or-reuse decision happen under
        // one entry guard so concurrent starts serialize on the map; the
        // scanner's own running flag backstops the start itself.
        let scanner = {
            let mut entry = self
                .scanners
                .entry(context_id)
                .or_insert_with(|| Arc::new(AccessControlScanner::new(context_id)));
            if entry.is_running() {
                warn!(context_id, "Access control scan already running");
                return Err(GatecheckError::AlreadyRunning(context_id));
            }
            // One scanner instance per run: recreate when the previous one
            // has already run so its results and counters stay immutable.
            if entry.has_run() {
                *entry = Arc::new(AccessControlScanner::new(context_id));
            }
            entry.value().clone()
        };

        let mut collaborators = self.collaborators.clone();
        if let Some(detector) = self.detectors.get(&context_id) {
            collaborators.detector = detector.value().clone();
        }

        let events = scanner.add_listener();
        scanner.start(
            options,
            self.provider.clone(),
            self.rules_manager(context_id),
            collaborators,
        )?;
        info!(context_id, "Access control scan started");
        Ok(ScanHandle { scanner, events })
    }

    pub fn pause_scan(&self, context_id: i64) -> Result<(), GatecheckError> {
        self.scanner(context_id)
            .ok_or(GatecheckError::NoScan(context_id))
            .map(|s| s.pause())
    }

    pub fn resume_scan(&self, context_id: i64) -> Result<(), GatecheckError> {
        self.scanner(context_id)
            .ok_or(GatecheckError::NoScan(context_id))
            .map(|s| s.resume())
    }

    pub fn stop_scan(&self, context_id: i64) -> Result<(), GatecheckError> {
        self.scanner(context_id)
            .ok_or(GatecheckError::NoScan(context_id))
            .map(|s| s.stop())
    }

    pub fn stop_all(&self) {
        for entry in self.scanners.iter() {
            if entry.value().is_running() {
                entry.value().stop();
            }
        }
    }

    /// Scan progress as a percentage rounded to the nearest integer. Errors
    /// when no scan has run for the context.
    pub fn scan_progress(&self, context_id: i64) -> Result<u32, GatecheckError> {
        let scanner = self
            .scanner(context_id)
            .ok_or(GatecheckError::NoScan(context_id))?;
        if !scanner.is_running() && !scanner.has_run() {
            return Err(GatecheckError::NoScan(context_id));
        }
        let (progress, maximum) = scanner.progress();
        if maximum == 0 {
            return Ok(0);
        }
        Ok((progress as f64 / maximum as f64 * 100.0).round() as u32)
    }

    /// Textual scan status for the administrative surface.
    pub fn scan_status(&self, context_id: i64) -> &'static str {
        match self.scanner(context_id) {
            Some(scanner) if scanner.is_running() => {
                if scanner.is_paused() {
                    "PAUSED"
                } else {
                    "RUNNING"
                }
            }
            Some(scanner) if scanner.is_interrupted() => "INTERRUPTED",
            _ => "NOT RUNNING",
        }
    }

    /// Report over the last run's results for a context.
    pub fn last_scan_report(&self, context_id: i64) -> Result<ScanReport, GatecheckError> {
        let context = self
            .provider
            .context(context_id)
            .ok_or(GatecheckError::UnknownContext(context_id))?;
        let scanner = self
            .scanner(context_id)
            .ok_or(GatecheckError::NoScan(context_id))?;
        let results = scanner
            .last_results()
            .ok_or(GatecheckError::NoScan(context_id))?;
        let users = scanner.options().map(|o| o.target_users).unwrap_or_default();
        Ok(build_report(&context, &users, &results))
    }

    /// Reloads the site tree into every live rule manager. Called when the
    /// underlying session changes.
    pub fn session_changed(&self) {
        for entry in self.rule_managers.iter() {
            let context_id = *entry.key();
            if let Some(context) = self.provider.context(context_id) {
                let nodes = self.provider.nodes_in_context(&context);
                entry.value().reload_site_tree(&nodes);
            }
        }
    }

    /// Drops all per-context state for one context, stopping its scan.
    pub fn invalidate(&self, context_id: i64) {
        if let Some(scanner) = self.scanner(context_id) {
            scanner.stop();
        }
        self.scanners.remove(&context_id);
        self.rule_managers.remove(&context_id);
        self.users.remove(&context_id);
        self.detectors.remove(&context_id);
    }

    /// Drops all per-context state, stopping every scan.
    pub fn clear(&self) {
        self.stop_all();
        self.scanners.clear();
        self.rule_managers.clear();
        self.users.clear();
        self.detectors.clear();
    }
}
