use chrono::{DateTime, Local};

/// A single observation forwarded to the ledger by one of the producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEvent {
    /// Raw user input (mouse or keyboard) was seen.
    Activity { at: DateTime<Local> },
    /// Result of polling the idle probe. Sent on every poll, not only on changes;
    /// the ledger reacts to edges alone.
    IdleStatus { idle: bool, at: DateTime<Local> },
}
