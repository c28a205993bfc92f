use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{daemon::storage::record_store::RecordStore, utils::clock::Clock};

use super::{
    event::LedgerEvent,
    state::{UsageLedger, UsageSnapshot},
};

/// Owns the [UsageLedger] and everything allowed to mutate it: the event mailbox fed
/// by the producers and the periodic accounting tick. Being the single owner is the
/// whole concurrency story. Readers get point-in-time copies over the watch channel.
pub struct LedgerModule<S: RecordStore> {
    receiver: mpsc::Receiver<LedgerEvent>,
    store: S,
    ledger: UsageLedger,
    tick_interval: Duration,
    shutdown: CancellationToken,
    clock: Box<dyn Clock>,
    snapshots: watch::Sender<UsageSnapshot>,
}

impl<S: RecordStore> LedgerModule<S> {
    /// Opens the ledger for today, recovering any total a previous run persisted.
    /// The returned receiver is the read-only surface for presentation code.
    pub async fn open(
        receiver: mpsc::Receiver<LedgerEvent>,
        store: S,
        shutdown: CancellationToken,
        tick_interval: Duration,
        clock: Box<dyn Clock>,
    ) -> Result<(Self, watch::Receiver<UsageSnapshot>)> {
        let now = clock.time();
        let ceiling = chrono::Duration::from_std(tick_interval * 2)?;
        let carried = recover_total(&store, now.date_naive()).await;
        let ledger = UsageLedger::open(now.date_naive(), carried, now, ceiling);
        let (snapshots, snapshot_receiver) = watch::channel(ledger.snapshot());

        Ok((
            Self {
                receiver,
                store,
                ledger,
                tick_interval,
                shutdown,
                clock,
                snapshots,
            },
            snapshot_receiver,
        ))
    }

    /// Executes the ledger event loop until shutdown, then runs the final save that
    /// guarantees no accounting interval is silently lost on exit.
    pub async fn run(mut self) -> Result<()> {
        let mut tick_point = self.clock.instant() + self.tick_interval;
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                event = self.receiver.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    // Every producer dropped its sender, nothing can change anymore.
                    None => break,
                },
                _ = self.clock.sleep_until(tick_point) => {
                    tick_point += self.tick_interval;
                    self.handle_tick().await;
                }
            }
        }

        self.handle_tick().await;
        info!("Ledger finalized");
        Ok(())
    }

    async fn handle_event(&mut self, event: LedgerEvent) {
        debug!("Processing event {:?}", event);
        let changed = match event {
            LedgerEvent::Activity { at } => self.ledger.on_activity(at),
            LedgerEvent::IdleStatus { idle, at } => self.ledger.on_idle_probe(idle, at),
        };
        if changed {
            self.persist().await;
            self.publish();
        }
    }

    async fn handle_tick(&mut self) {
        let now = self.clock.time();
        self.roll_over_if_needed(now).await;
        self.ledger.on_tick(now);
        self.persist().await;
        self.publish();
    }

    async fn roll_over_if_needed(&mut self, now: DateTime<Local>) {
        if !self.ledger.needs_rollover(now) {
            return;
        }
        let carried = recover_total(&self.store, now.date_naive()).await;
        let closed = self.ledger.roll_over(now, carried);
        if let Err(e) = self.store.save(&closed).await {
            error!("Failed to persist the final record for {} {e:?}", closed.date);
        }
    }

    async fn persist(&mut self) {
        let record = self.ledger.record(self.clock.time());
        if let Err(e) = self.store.save(&record).await {
            // In-memory totals are unaffected, the next tick retries the write.
            error!("Failed to persist record for {} {e:?}", record.date);
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.ledger.snapshot());
    }
}

async fn recover_total(store: &impl RecordStore, date: NaiveDate) -> chrono::Duration {
    match store.load(date).await {
        Ok(Some(record)) => {
            info!(
                "Recovered {} accounted minutes for {date}",
                record.total.num_minutes()
            );
            record.total
        }
        Ok(None) => chrono::Duration::zero(),
        Err(e) => {
            error!("Failed to load the record for {date}, starting from zero {e:?}");
            chrono::Duration::zero()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc, Mutex,
        },
        time::Duration,
    };

    use anyhow::{bail, Result};
    use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone};
    use tokio::sync::{mpsc, watch};
    use tokio_util::sync::CancellationToken;

    use crate::{
        daemon::{
            ledger::{event::LedgerEvent, module::LedgerModule, state::UsageSnapshot},
            storage::{daily_record::DailyUsageRecord, record_store::RecordStore},
        },
        utils::{clock::TestClock, logging::TEST_LOGGING},
    };

    const TEST_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2018, 7, 4) {
        Some(v) => v,
        None => panic!("Illegal test date"),
    };

    #[derive(Clone, Default)]
    struct MemoryStore {
        records: Arc<Mutex<HashMap<NaiveDate, DailyUsageRecord>>>,
        fail_writes: Arc<AtomicBool>,
    }

    impl MemoryStore {
        fn record(&self, date: NaiveDate) -> Option<DailyUsageRecord> {
            self.records.lock().unwrap().get(&date).cloned()
        }

        fn seed(&self, date: NaiveDate, minutes: i64) {
            self.records.lock().unwrap().insert(
                date,
                DailyUsageRecord {
                    date,
                    total: chrono::Duration::minutes(minutes),
                    last_updated: NaiveTime::MIN,
                },
            );
        }
    }

    impl RecordStore for MemoryStore {
        async fn load(&self, date: NaiveDate) -> Result<Option<DailyUsageRecord>> {
            Ok(self.record(date))
        }

        async fn save(&self, record: &DailyUsageRecord) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                bail!("Disk full");
            }
            self.records
                .lock()
                .unwrap()
                .insert(record.date, record.clone());
            Ok(())
        }
    }

    fn start_at(hour: u32, min: u32) -> DateTime<Local> {
        Local
            .from_local_datetime(&TEST_DATE.and_hms_opt(hour, min, 0).unwrap())
            .unwrap()
    }

    async fn open_module(
        store: MemoryStore,
        start: DateTime<Local>,
        tick_interval: Duration,
    ) -> (
        LedgerModule<MemoryStore>,
        watch::Receiver<UsageSnapshot>,
        mpsc::Sender<LedgerEvent>,
        CancellationToken,
    ) {
        let (sender, receiver) = mpsc::channel(10);
        let token = CancellationToken::new();
        let clock = TestClock::starting_at(start);
        let (module, snapshots) = LedgerModule::open(
            receiver,
            store,
            token.clone(),
            tick_interval,
            Box::new(clock),
        )
        .await
        .unwrap();
        (module, snapshots, sender, token)
    }

    #[tokio::test(start_paused = true)]
    async fn accrues_on_ticks_and_saves_on_shutdown() -> Result<()> {
        *TEST_LOGGING;
        let store = MemoryStore::default();
        let (module, snapshots, _sender, token) =
            open_module(store.clone(), start_at(9, 0), Duration::from_secs(60)).await;

        let (_, run_result) = tokio::join!(
            async {
                tokio::time::sleep(Duration::from_secs(150)).await;
                token.cancel();
            },
            module.run(),
        );
        run_result?;

        // Ticks at 60 and 120 seconds, then the final save picks up the last 30.
        let record = store.record(TEST_DATE).unwrap();
        assert_eq!(record.total, chrono::Duration::seconds(150));
        assert_eq!(snapshots.borrow().total, chrono::Duration::seconds(150));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_the_persisted_total_on_startup() -> Result<()> {
        *TEST_LOGGING;
        let store = MemoryStore::default();
        store.seed(TEST_DATE, 42);

        let (module, snapshots, _sender, token) =
            open_module(store.clone(), start_at(9, 0), Duration::from_secs(60)).await;
        assert_eq!(snapshots.borrow().total, chrono::Duration::minutes(42));

        let (_, run_result) = tokio::join!(
            async {
                tokio::time::sleep(Duration::from_secs(70)).await;
                token.cancel();
            },
            module.run(),
        );
        run_result?;

        let record = store.record(TEST_DATE).unwrap();
        assert_eq!(
            record.total,
            chrono::Duration::minutes(42) + chrono::Duration::seconds(70)
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn idle_events_pause_accounting() -> Result<()> {
        *TEST_LOGGING;
        let store = MemoryStore::default();
        let start = start_at(9, 0);
        let (module, snapshots, sender, token) =
            open_module(store.clone(), start, Duration::from_secs(300)).await;

        let (_, run_result) = tokio::join!(
            async {
                tokio::time::sleep(Duration::from_secs(120)).await;
                sender
                    .send(LedgerEvent::IdleStatus {
                        idle: true,
                        at: start + chrono::Duration::seconds(120),
                    })
                    .await
                    .unwrap();
                tokio::time::sleep(Duration::from_secs(80)).await;
                sender
                    .send(LedgerEvent::IdleStatus {
                        idle: false,
                        at: start + chrono::Duration::seconds(200),
                    })
                    .await
                    .unwrap();
                tokio::time::sleep(Duration::from_secs(60)).await;
                token.cancel();
            },
            module.run(),
        );
        run_result?;

        // 120 active seconds before the idle edge, 60 after resuming. The 80 idle
        // seconds in between are excluded.
        let record = store.record(TEST_DATE).unwrap();
        assert_eq!(record.total, chrono::Duration::seconds(180));
        assert!(!snapshots.borrow().idle);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn failed_writes_keep_totals_and_are_retried() -> Result<()> {
        *TEST_LOGGING;
        let store = MemoryStore::default();
        store.fail_writes.store(true, Ordering::SeqCst);

        let (module, _snapshots, _sender, token) =
            open_module(store.clone(), start_at(9, 0), Duration::from_secs(60)).await;

        let healing_store = store.clone();
        let (_, run_result) = tokio::join!(
            async {
                tokio::time::sleep(Duration::from_secs(90)).await;
                healing_store.fail_writes.store(false, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(40)).await;
                token.cancel();
            },
            module.run(),
        );
        run_result?;

        // The tick at 60s failed to write. Nothing was lost: the tick at 120s
        // persisted the full accounted amount, and the final save topped it up.
        let record = store.record(TEST_DATE).unwrap();
        assert_eq!(record.total, chrono::Duration::seconds(130));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn rollover_closes_the_old_day_and_recovers_the_new() -> Result<()> {
        *TEST_LOGGING;
        let next_day = TEST_DATE.succ_opt().unwrap();
        let store = MemoryStore::default();
        store.seed(next_day, 10);

        let (module, snapshots, _sender, token) =
            open_module(store.clone(), start_at(23, 0), Duration::from_secs(30 * 60)).await;

        let (_, run_result) = tokio::join!(
            async {
                // Until 01:15 on the next day.
                tokio::time::sleep(Duration::from_secs(2 * 3600 + 15 * 60)).await;
                token.cancel();
            },
            module.run(),
        );
        run_result?;

        // 23:30 accounts 30 minutes; the midnight tick closes the day at that total
        // and drops the straddling half hour.
        assert_eq!(
            store.record(TEST_DATE).unwrap().total,
            chrono::Duration::minutes(30)
        );

        // The new day carries its pre-existing 10 minutes, accounts the 00:30 and
        // 01:00 ticks, and the final save adds the last quarter hour.
        assert_eq!(
            store.record(next_day).unwrap().total,
            chrono::Duration::minutes(10 + 30 + 30 + 15)
        );
        assert_eq!(snapshots.borrow().date, next_day);
        Ok(())
    }
}
