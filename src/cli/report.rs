use std::{fmt::Display, future, sync::Arc};

use ansi_term::Style;
use anyhow::Result;
use chrono::{Duration, Local, NaiveDate};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};
use futures::{stream, Stream, StreamExt};
use now::DateTimeNow;

use crate::{
    daemon::storage::{
        daily_record::DailyUsageRecord,
        record_store::{FsRecordStore, RecordStore},
    },
    utils::dir::create_application_default_path,
};

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct TodayCommand {
    #[arg(long, help = "Print the record as json")]
    json: bool,
}

/// Command to show today's usage. Totals come from the record file, so while the
/// daemon is running the value can lag behind by up to one accounting tick.
pub async fn process_today_command(TodayCommand { json }: TodayCommand) -> Result<()> {
    let store = FsRecordStore::new(create_application_default_path()?.join("records"))?;
    let now = Local::now();
    let record = store
        .load(now.date_naive())
        .await?
        .unwrap_or_else(|| DailyUsageRecord::empty(now.date_naive(), now.time()));

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!(
            "{}\t{}",
            record.date.format("%x"),
            Style::new().bold().paint(format_duration(record.total))
        );
    }
    Ok(())
}

#[derive(Debug, Parser)]
pub struct ReportCommand {
    #[arg(
        long = "start",
        short,
        help = "Start of the range. Examples are \"yesterday\", \"3 days ago\", \"15/03/2025\""
    )]
    start_date: Option<String>,
    #[arg(
        long = "end",
        short,
        help = "End of the range, inclusive. Same formats as --start"
    )]
    end_date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
    #[arg(
        short,
        long,
        help = "Report on the current week, overriding --start and --end"
    )]
    week: bool,
    #[arg(long, help = "Include days without a recorded total")]
    show_empty: bool,
    #[arg(long, help = "Print the records as json")]
    json: bool,
}

const DEFAULT_REPORT_DAYS: i64 = 7;

/// Command to print per-day totals over a range of days, newest last, with a grand
/// total at the bottom.
pub async fn process_report_command(
    ReportCommand {
        start_date,
        end_date,
        date_style,
        week,
        show_empty,
        json,
    }: ReportCommand,
) -> Result<()> {
    let (start, end) = parse_range(start_date, end_date, date_style, week)?;

    let store = FsRecordStore::new(create_application_default_path()?.join("records"))?;

    let days: Vec<_> = load_range(store, start, end).collect().await;
    let mut records = Vec::with_capacity(days.len());
    for (day, loaded) in days {
        records.push((day, loaded?));
    }

    if json {
        let existing = records
            .iter()
            .filter_map(|(_, record)| record.as_ref())
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&existing)?);
        return Ok(());
    }

    let mut total = Duration::zero();
    for (day, record) in records {
        match record {
            Some(record) => {
                total = total + record.total;
                println!("{}\t{}", day.format("%x"), format_duration(record.total));
            }
            None if show_empty => println!("{}\t-", day.format("%x")),
            None => (),
        }
    }
    println!(
        "{}",
        Style::new()
            .bold()
            .paint(format!("Total\t{}", format_duration(total)))
    );
    Ok(())
}

/// Also provides sensible defaults for the `report` command.
fn parse_range(
    start_date: Option<String>,
    end_date: Option<String>,
    date_style: DateStyle,
    week: bool,
) -> Result<(NaiveDate, NaiveDate)> {
    let now = Local::now();
    if week {
        return Ok((now.beginning_of_week().date_naive(), now.date_naive()));
    }

    let dialect: chrono_english::Dialect = date_style.into();
    let start = match start_date.map(|s| parse_date_string(&s, now, dialect)) {
        Some(Ok(v)) => v.with_timezone(&Local),
        Some(Err(e)) => {
            return Err(Args::command()
                .error(
                    clap::error::ErrorKind::ValueValidation,
                    format!("Failed to validate start date {e}"),
                )
                .into());
        }
        None => now - Duration::days(DEFAULT_REPORT_DAYS - 1),
    };
    let end = match end_date.map(|s| parse_date_string(&s, now, dialect)) {
        Some(Ok(v)) => v.with_timezone(&Local),
        Some(Err(e)) => {
            return Err(Args::command()
                .error(
                    clap::error::ErrorKind::ValueValidation,
                    format!("Failed to validate end date {e}"),
                )
                .into());
        }
        None => now,
    };

    if end < start {
        return Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                "End date comes before start date",
            )
            .into());
    }

    Ok((start.date_naive(), end.date_naive()))
}

/// Streams records for every day between start and end (both inclusive). Days are
/// read concurrently but yielded in order.
fn load_range(
    store: impl RecordStore,
    start: NaiveDate,
    end: NaiveDate,
) -> impl Stream<Item = (NaiveDate, Result<Option<DailyUsageRecord>>)> {
    let store = Arc::new(store);
    date_range(start, end)
        .map(move |day| {
            let store = store.clone();
            async move { (day, store.load(day).await) }
        })
        .buffered(4)
}

/// Returns a stream of dates between start (inclusive) and end (inclusive).
fn date_range(start: NaiveDate, end: NaiveDate) -> impl Stream<Item = NaiveDate> {
    stream::unfold((start, end), |(mut current, end)| {
        future::ready({
            if current <= end {
                let last_current = current;
                current = current.succ_opt().expect("End of time should never happen");
                Some((last_current, (current, end)))
            } else {
                None
            }
        })
    })
}

fn format_duration(v: Duration) -> String {
    if v.num_hours() > 0 {
        format!("{}h{}m", v.num_hours(), v.num_minutes() % 60)
    } else {
        format!("{}m", v.num_minutes())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{Duration, NaiveDate, NaiveTime};
    use tempfile::tempdir;
    use tokio_stream::StreamExt;

    use crate::daemon::storage::{daily_record::DailyUsageRecord, record_store::FsRecordStore};

    use super::{format_duration, load_range};

    fn record(date: NaiveDate, minutes: i64) -> DailyUsageRecord {
        DailyUsageRecord {
            date,
            total: Duration::minutes(minutes),
            last_updated: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn load_range_yields_every_day_in_order() -> Result<()> {
        use crate::daemon::storage::record_store::RecordStore;

        let dir = tempdir()?;
        let store = FsRecordStore::new(dir.path().to_owned())?;
        let first = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let third = first + Duration::days(2);
        store.save(&record(first, 30)).await?;
        store.save(&record(third, 45)).await?;

        let days: Vec<_> = load_range(store, first, first + Duration::days(3))
            .collect()
            .await;

        assert_eq!(days.len(), 4);
        assert_eq!(days[0].0, first);
        assert_eq!(days[0].1.as_ref().unwrap().as_ref().unwrap().total, Duration::minutes(30));
        assert!(days[1].1.as_ref().unwrap().is_none());
        assert_eq!(days[2].1.as_ref().unwrap().as_ref().unwrap().total, Duration::minutes(45));
        assert!(days[3].1.as_ref().unwrap().is_none());
        Ok(())
    }

    #[test]
    fn durations_format_compactly() {
        assert_eq!(format_duration(Duration::minutes(0)), "0m");
        assert_eq!(format_duration(Duration::minutes(59)), "59m");
        assert_eq!(
            format_duration(Duration::hours(3) + Duration::minutes(27)),
            "3h27m"
        );
    }
}
