use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::{daemon::ledger::event::LedgerEvent, idle_probe::IdleProbe, utils::clock::Clock};

use super::evaluator::IdleEvaluator;

/// Polls the platform idle probe on a fixed cadence and forwards the evaluated
/// status to the ledger. Statuses are sent on every poll; edge detection is the
/// ledger's job.
pub struct IdleProbeModule {
    next: mpsc::Sender<LedgerEvent>,
    probe: Box<dyn IdleProbe>,
    shutdown: CancellationToken,
    evaluator: IdleEvaluator,
    poll_frequency: Duration,
    time_provider: Box<dyn Clock>,
}

impl IdleProbeModule {
    pub fn new(
        next: mpsc::Sender<LedgerEvent>,
        probe: Box<dyn IdleProbe>,
        shutdown: CancellationToken,
        evaluator: IdleEvaluator,
        poll_frequency: Duration,
        time_provider: Box<dyn Clock>,
    ) -> Self {
        Self {
            next,
            probe,
            shutdown,
            evaluator,
            poll_frequency,
            time_provider,
        }
    }

    fn poll(&mut self) -> LedgerEvent {
        // A failing probe must never look worse than "idle not detected", so each
        // signal degrades to its active-leaning default.
        let screensaver = self.probe.screensaver_active().unwrap_or_else(|e| {
            error!("Idle probe failed to query the screensaver {e:?}");
            false
        });
        let idle_ms = self.probe.idle_time().unwrap_or_else(|e| {
            error!("Idle probe failed to query idle time {e:?}");
            0
        });

        LedgerEvent::IdleStatus {
            idle: self.evaluator.is_idle(screensaver, idle_ms),
            at: self.time_provider.time(),
        }
    }

    /// Executes the probe polling loop.
    pub async fn run(mut self) -> Result<()> {
        let mut poll_point = self.time_provider.instant();
        loop {
            poll_point += self.poll_frequency;

            let event = self.poll();
            debug!("Sending message {:?}", event);
            self.next
                .send(event)
                .await
                .inspect_err(|e| error!("Unexpected error during sending {e:?}"))?;

            tokio::select! {
                // Cancelation stops the polling loop. Which means we also drop our
                // sender and let the ledger drain and finalize.
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.time_provider.sleep_until(poll_point) => ()
            }
        }
    }
}
