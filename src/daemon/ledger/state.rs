use chrono::{DateTime, Duration, Local, NaiveDate};
use tracing::{info, warn};

use crate::daemon::storage::daily_record::DailyUsageRecord;

/// A consistent point-in-time copy of the ledger, safe to hand to presentation code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageSnapshot {
    pub date: NaiveDate,
    pub total: Duration,
    pub idle: bool,
    /// The moment idle began. [Some] exactly when `idle` is set.
    pub idle_since: Option<DateTime<Local>>,
}

/// The active/idle accounting state machine for a single day of usage.
///
/// The ledger accrues the time between `last_activity` and "now" in steps: on every
/// accounting tick while active, and once more on the edge into idle. Steps longer
/// than `ceiling` are treated as clock anomalies (system sleep, manual clock changes)
/// and discarded, so a laptop waking from an overnight suspend doesn't book the whole
/// night as usage.
///
/// All methods take the current time as an argument. The ledger never reads a clock
/// itself, which is what keeps it testable.
pub struct UsageLedger {
    current_date: NaiveDate,
    total: Duration,
    /// Start of the open active window, or the moment idle began while idle.
    last_activity: DateTime<Local>,
    idle: bool,
    idle_started_at: Option<DateTime<Local>>,
    ceiling: Duration,
}

impl UsageLedger {
    /// Opens the ledger for a day. `carried` is the total recovered from storage for
    /// that day, if any. Counting starts as active from `now`.
    pub fn open(
        date: NaiveDate,
        carried: Duration,
        now: DateTime<Local>,
        ceiling: Duration,
    ) -> Self {
        Self {
            current_date: date,
            total: carried,
            last_activity: now,
            idle: false,
            idle_started_at: None,
            ceiling,
        }
    }

    /// Records a raw user-activity event. A no-op while already active; returns
    /// whether the ledger mutated so the caller knows a persistence write is due.
    pub fn on_activity(&mut self, now: DateTime<Local>) -> bool {
        if !self.idle {
            return false;
        }
        self.resume(now);
        true
    }

    /// Feeds the latest idle probe result. Only value transitions mutate the ledger,
    /// which is what debounces a probe that reports the same status every poll.
    pub fn on_idle_probe(&mut self, idle: bool, now: DateTime<Local>) -> bool {
        if idle == self.idle {
            return false;
        }
        if idle {
            // Snapshot the open active window before accounting stops.
            self.accrue(now);
            self.idle = true;
            self.idle_started_at = Some(now);
            self.last_activity = now;
            info!("User went idle, pausing accounting");
        } else {
            self.resume(now);
        }
        true
    }

    /// Accounts elapsed active time on the periodic tick. While idle this does
    /// nothing; the caller still persists, as a heartbeat.
    pub fn on_tick(&mut self, now: DateTime<Local>) {
        if self.idle {
            return;
        }
        self.accrue(now);
        self.last_activity = now;
    }

    /// True when the wall clock left the day this ledger accounts for.
    pub fn needs_rollover(&self, now: DateTime<Local>) -> bool {
        now.date_naive() != self.current_date
    }

    /// Closes the current day and re-opens the ledger for the day `now` belongs to.
    /// Returns the closed record so the caller can persist it as final.
    ///
    /// The total for the new day is `carried`, the load-or-zero contract shared with
    /// startup. The interval straddling the day boundary is dropped entirely: the old
    /// day closes with what its ticks accounted, the new one opens without a head
    /// start. The idle flag survives the transition.
    pub fn roll_over(&mut self, now: DateTime<Local>, carried: Duration) -> DailyUsageRecord {
        let closed = self.record(now);
        info!(
            "Day rolled over from {} to {}",
            self.current_date,
            now.date_naive()
        );
        self.current_date = now.date_naive();
        self.total = carried;
        self.last_activity = now;
        closed
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            date: self.current_date,
            total: self.total,
            idle: self.idle,
            idle_since: self.idle_started_at,
        }
    }

    /// Builds the persistable record for the current day.
    pub fn record(&self, now: DateTime<Local>) -> DailyUsageRecord {
        DailyUsageRecord {
            date: self.current_date,
            total: self.total,
            last_updated: now.time(),
        }
    }

    fn resume(&mut self, now: DateTime<Local>) {
        self.idle = false;
        self.idle_started_at = None;
        self.last_activity = now;
        info!("User became active, resuming accounting");
    }

    fn accrue(&mut self, now: DateTime<Local>) {
        let elapsed = now - self.last_activity;
        if elapsed < Duration::zero() || elapsed > self.ceiling {
            warn!(
                "Discarding anomalous interval of {}s since {}, the clock likely jumped",
                elapsed.num_seconds(),
                self.last_activity,
            );
        } else {
            self.total = self.total + elapsed;
        }
    }
}
