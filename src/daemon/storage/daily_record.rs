use anyhow::{bail, Context, Result};
use chrono::{Duration, NaiveDate, NaiveTime};
use serde::Serialize;

/// One day of accounted usage, as stored on disk.
///
/// The on-disk layout is a small text file meant to be readable without any tooling:
///
/// ```text
/// Date: 2025-03-15
/// Total usage time: 3 hours, 27 minutes
/// Last updated: 14:05:32
/// Raw minutes: 207
/// ```
///
/// `Raw minutes` is the authoritative total and `Date` identifies the day. The other
/// lines are regenerated on every save and never trusted on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyUsageRecord {
    pub date: NaiveDate,
    #[serde(rename = "minutes", with = "minutes_ser")]
    pub total: Duration,
    pub last_updated: NaiveTime,
}

const DATE_PREFIX: &str = "Date: ";
const TOTAL_PREFIX: &str = "Total usage time: ";
const UPDATED_PREFIX: &str = "Last updated: ";
const RAW_MINUTES_PREFIX: &str = "Raw minutes: ";

impl DailyUsageRecord {
    pub fn empty(date: NaiveDate, last_updated: NaiveTime) -> Self {
        Self {
            date,
            total: Duration::zero(),
            last_updated,
        }
    }

    /// Renders the record in its on-disk format. Totals are rounded down to whole
    /// minutes, matching what `parse` can read back.
    pub fn render(&self) -> String {
        let minutes = self.total.num_minutes();
        format!(
            "{DATE_PREFIX}{}\n\
             {TOTAL_PREFIX}{} hours, {} minutes\n\
             {UPDATED_PREFIX}{}\n\
             {RAW_MINUTES_PREFIX}{minutes}\n",
            self.date.format("%Y-%m-%d"),
            minutes / 60,
            minutes % 60,
            self.last_updated.format("%H:%M:%S"),
        )
    }

    /// Parses the on-disk format. A record without a readable `Date` or `Raw minutes`
    /// line is an error, so that callers can treat the whole file as corrupt instead
    /// of trusting half of it. The display-only lines are allowed to be damaged.
    pub fn parse(content: &str) -> Result<Self> {
        let mut date = None;
        let mut minutes = None;
        let mut last_updated = None;

        for line in content.lines() {
            if let Some(value) = line.strip_prefix(DATE_PREFIX) {
                let parsed = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
                    .with_context(|| format!("Illegal date value {value:?}"))?;
                date = Some(parsed);
            } else if let Some(value) = line.strip_prefix(RAW_MINUTES_PREFIX) {
                let parsed = value
                    .trim()
                    .parse::<i64>()
                    .with_context(|| format!("Illegal raw minutes value {value:?}"))?;
                minutes = Some(parsed);
            } else if let Some(value) = line.strip_prefix(UPDATED_PREFIX) {
                // Diagnostic only, a garbled value shouldn't cost the day's total.
                last_updated = NaiveTime::parse_from_str(value.trim(), "%H:%M:%S").ok();
            }
        }

        let Some(date) = date else {
            bail!("Record is missing a {DATE_PREFIX:?} line");
        };
        let Some(minutes) = minutes else {
            bail!("Record is missing a {RAW_MINUTES_PREFIX:?} line");
        };
        if minutes < 0 {
            bail!("Raw minutes can't be negative, got {minutes}");
        }

        Ok(Self {
            date,
            total: Duration::minutes(minutes),
            last_updated: last_updated.unwrap_or(NaiveTime::MIN),
        })
    }
}

mod minutes_ser {
    use chrono::Duration;
    use serde::{self, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(duration.num_minutes())
    }
}
