use std::{path::PathBuf, time::Duration};

use clap::Parser;
use tracing::level_filters::LevelFilter;

use super::Cadence;


#[derive(Parser)]
pub struct DaemonArgs {
  #[arg(long)]
  pub force: bool,
  #[arg(long)]
  pub dir: Option<PathBuf>,
  /// This option is for debugging purposes only.
  #[arg(long = "log-console")]
  pub log_console : bool,
  #[arg(long = "log-filter")]
  pub log: Option<LevelFilter>,
  #[arg(long = "tick-interval", help = "Seconds between accounting ticks")]
  pub tick_interval: Option<u64>,
  #[arg(long = "probe-interval", help = "Seconds between idle probe polls")]
  pub probe_interval: Option<u64>,
  #[arg(long = "idle-threshold", help = "Seconds without input after which the user counts as idle")]
  pub idle_threshold: Option<u32>,
}

impl DaemonArgs {
    pub fn cadence(&self) -> Cadence {
        let defaults = Cadence::default();
        Cadence {
            tick_interval: self
                .tick_interval
                .map_or(defaults.tick_interval, Duration::from_secs),
            probe_interval: self
                .probe_interval
                .map_or(defaults.probe_interval, Duration::from_secs),
            idle_threshold_s: self.idle_threshold.unwrap_or(defaults.idle_threshold_s),
        }
    }
}
