use super::result::ScanResultEntry;

/// Messages sent from the scan worker to registered listeners, in strict
/// production order.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// The worker started processing.
    ScanStarted { context_id: i64 },
    /// A (node, user) attempt produced a result.
    ResultObtained {
        context_id: i64,
        entry: ScanResultEntry,
    },
    /// The run finished. Fires exactly once per started run, on normal
    /// completion, early stop and run-fatal error alike.
    ScanFinished { context_id: i64 },
}
