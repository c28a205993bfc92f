use std::time::{Duration, Instant};

use chrono::Local;
use tokio::sync::mpsc;
use tracing::error;

use crate::daemon::ledger::event::LedgerEvent;

/// Smallest spacing between forwarded activity events. Raw input arrives in bursts,
/// every mouse move is an event, while the ledger only cares about the first input
/// after a quiet stretch.
const FORWARD_INTERVAL: Duration = Duration::from_secs(1);

/// Forwards global mouse and keyboard events to the ledger.
///
/// rdev needs a dedicated OS thread for its listener loop, and the loop has no stop
/// mechanism. The thread therefore simply lives until process exit; once the ledger
/// is gone the sends degrade to no-ops. Failing to hook the input APIs is logged and
/// tolerated, the idle probe alone still drives idle/active edges.
pub fn spawn_activity_listener(next: mpsc::Sender<LedgerEvent>) {
    let listener = std::thread::Builder::new()
        .name("activity-listener".into())
        .spawn(move || {
            let mut last_forward: Option<Instant> = None;
            let result = rdev::listen(move |_event| {
                if last_forward.is_some_and(|at| at.elapsed() < FORWARD_INTERVAL) {
                    return;
                }
                last_forward = Some(Instant::now());
                // A full mailbox just means the ledger is busy; the next probe poll
                // covers the same edge.
                let _ = next.try_send(LedgerEvent::Activity { at: Local::now() });
            });
            if let Err(e) = result {
                error!("Global input listener stopped {e:?}");
            }
        });

    if let Err(e) = listener {
        error!("Failed to spawn the input listener thread {e:?}");
    }
}
