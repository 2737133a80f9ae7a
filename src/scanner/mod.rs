mod collaborators;
mod events;
mod options;
mod result;
mod worker;

pub use collaborators::{
    AlertSink, AuthorizationDetector, HistoryHandle, HistorySink, ReplayedExchange,
    RequestReplay, ScanCollaborators,
};
pub use events::ScanEvent;
pub use options::ScanStartOptions;
pub use result::{classify, ScanOutcome, ScanResultEntry};
pub use worker::AccessControlScanner;
