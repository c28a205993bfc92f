use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use collection::{
    activity::spawn_activity_listener, evaluator::IdleEvaluator, probe::IdleProbeModule,
};
use ledger::{event::LedgerEvent, module::LedgerModule, state::UsageSnapshot};
use storage::record_store::FsRecordStore;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::{
    idle_probe::{GenericIdleProbe, IdleProbe},
    utils::clock::{Clock, DefaultClock},
};

pub mod args;
pub mod collection;
pub mod ledger;
pub mod shutdown;
pub mod storage;

const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(5 * 60);
const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_IDLE_THRESHOLD_S: u32 = 2 * 60;

/// Cadences the daemon runs on. The defaults are meant for actual use; the command
/// line can shorten them for debugging.
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    /// Interval between accounting ticks. Elapsed intervals beyond twice this value
    /// are rejected as clock anomalies.
    pub tick_interval: Duration,
    /// Interval between idle probe polls.
    pub probe_interval: Duration,
    /// Seconds without input after which the user counts as idle.
    pub idle_threshold_s: u32,
}

impl Default for Cadence {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            idle_threshold_s: DEFAULT_IDLE_THRESHOLD_S,
        }
    }
}

/// Represents the starting point for the daemon.
pub async fn start_daemon(dir: PathBuf, cadence: Cadence) -> Result<()> {
    std::env::set_current_dir("/")?;

    let (sender, receiver) = mpsc::channel::<LedgerEvent>(10);
    let probe = GenericIdleProbe::new()?;

    let shutdown_token = CancellationToken::new();

    let prober = create_prober(sender.clone(), probe, &shutdown_token, cadence, DefaultClock);

    let (ledger, snapshots) = create_ledger(
        dir.join("records"),
        receiver,
        &shutdown_token,
        cadence.tick_interval,
        DefaultClock,
    )
    .await?;

    spawn_activity_listener(sender);

    // Nothing inside the daemon consumes snapshots; a tray or status surface would
    // subscribe here.
    drop(snapshots);

    let (_, probe_result, ledger_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token),
        prober.run(),
        ledger.run(),
    );

    if let Err(probe_result) = probe_result {
        error!("Probe module got an error {:?}", probe_result);
    }

    if let Err(ledger_result) = ledger_result {
        error!("Ledger module got an error {:?}", ledger_result);
    }

    Ok(())
}

fn create_prober(
    sender: mpsc::Sender<LedgerEvent>,
    probe: impl IdleProbe + 'static,
    shutdown_token: &CancellationToken,
    cadence: Cadence,
    clock: impl Clock,
) -> IdleProbeModule {
    IdleProbeModule::new(
        sender,
        Box::new(probe),
        shutdown_token.clone(),
        IdleEvaluator::from_seconds(cadence.idle_threshold_s),
        cadence.probe_interval,
        Box::new(clock),
    )
}

async fn create_ledger(
    record_dir: PathBuf,
    receiver: mpsc::Receiver<LedgerEvent>,
    shutdown_token: &CancellationToken,
    tick_interval: Duration,
    clock: impl Clock,
) -> Result<(LedgerModule<FsRecordStore>, watch::Receiver<UsageSnapshot>)> {
    let store = FsRecordStore::new(record_dir)?;
    LedgerModule::open(
        receiver,
        store,
        shutdown_token.clone(),
        tick_interval,
        Box::new(clock),
    )
    .await
}
