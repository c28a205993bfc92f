use std::{
    future::Future,
    io::ErrorKind,
    ops::Deref,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWriteExt},
};
use tracing::{debug, warn};

use crate::utils::time::date_to_record_name;

use super::daily_record::DailyUsageRecord;

/// Interface for abstracting storage of daily records.
pub trait RecordStore {
    /// Loads the record for a day. An absent file and a corrupt file both resolve to
    /// [None]: a damaged record is logged and discarded so it costs at most one day of
    /// history instead of taking the daemon down.
    fn load(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Option<DailyUsageRecord>>> + Send;

    /// Overwrites the record for its day. The write must be atomic from the point of
    /// view of a concurrent reader.
    fn save(&self, record: &DailyUsageRecord) -> impl Future<Output = Result<()>>;
}

impl<T: Deref> RecordStore for T
where
    T::Target: RecordStore,
{
    fn load(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Option<DailyUsageRecord>>> + Send {
        self.deref().load(date)
    }

    fn save(&self, record: &DailyUsageRecord) -> impl Future<Output = Result<()>> {
        self.deref().save(record)
    }
}

/// The main realization of [RecordStore]. One text file per day in a flat directory.
pub struct FsRecordStore {
    record_dir: PathBuf,
}

impl FsRecordStore {
    pub fn new(record_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&record_dir)?;

        Ok(Self { record_dir })
    }

    fn record_path(&self, date: NaiveDate) -> PathBuf {
        self.record_dir.join(date_to_record_name(date))
    }

    async fn read_to_string(path: &Path) -> Result<String, std::io::Error> {
        debug!("Extracting {path:?}");
        let mut file = File::open(path).await?;
        file.lock_shared()?;
        let mut content = String::new();
        let result = file.read_to_string(&mut content).await;
        file.unlock_async().await?;
        result?;
        Ok(content)
    }
}

impl RecordStore for FsRecordStore {
    async fn load(&self, date: NaiveDate) -> Result<Option<DailyUsageRecord>> {
        let path = self.record_path(date);
        let content = match Self::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read record {path:?}"))?,
        };

        match DailyUsageRecord::parse(&content) {
            Ok(record) if record.date != date => {
                // Somebody renamed or hand-edited the file. The date inside is the
                // identity, so the content can't be trusted for the requested day.
                warn!(
                    "Record in {path:?} accounts for {}, expected {date}",
                    record.date
                );
                Ok(None)
            }
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                // Might happen after shutdowns cutting a write short, or manual edits.
                warn!("Found corrupt record in {path:?}: {e}");
                Ok(None)
            }
        }
    }

    async fn save(&self, record: &DailyUsageRecord) -> Result<()> {
        let path = self.record_path(record.date);
        // Write-to-temp-then-rename keeps readers away from half-written files.
        let tmp_path = path.with_extension("txt.tmp");

        let mut file = File::create(&tmp_path).await?;
        file.lock_exclusive()?;
        let result = async {
            file.write_all(record.render().as_bytes()).await?;
            file.flush().await?;
            Ok::<_, std::io::Error>(())
        }
        .await;
        file.unlock_async().await?;
        result.with_context(|| format!("Failed to write record {tmp_path:?}"))?;
        drop(file);

        tokio::fs::rename(&tmp_path, &path).await?;
        debug!("Saved record for {}", record.date);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{Duration, NaiveDate, NaiveTime};
    use tempfile::tempdir;

    use super::{FsRecordStore, RecordStore};
    use crate::daemon::storage::daily_record::DailyUsageRecord;

    const TEST_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2018, 7, 4) {
        Some(v) => v,
        None => panic!("Illegal test date"),
    };

    fn record(minutes: i64) -> DailyUsageRecord {
        DailyUsageRecord {
            date: TEST_DATE,
            total: Duration::minutes(minutes),
            last_updated: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn save_load_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let store = FsRecordStore::new(dir.path().to_owned())?;

        store.save(&record(207)).await?;
        let loaded = store.load(TEST_DATE).await?;

        assert_eq!(loaded, Some(record(207)));
        Ok(())
    }

    #[tokio::test]
    async fn sub_minute_precision_is_dropped_on_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let store = FsRecordStore::new(dir.path().to_owned())?;

        let mut stored = record(12);
        stored.total = stored.total + Duration::seconds(45);
        store.save(&stored).await?;

        let loaded = store.load(TEST_DATE).await?.unwrap();
        assert_eq!(loaded.total, Duration::minutes(12));
        Ok(())
    }

    #[tokio::test]
    async fn missing_record_loads_as_none() -> Result<()> {
        let dir = tempdir()?;
        let store = FsRecordStore::new(dir.path().to_owned())?;

        assert_eq!(store.load(TEST_DATE).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_record_loads_as_none() -> Result<()> {
        let dir = tempdir()?;
        let store = FsRecordStore::new(dir.path().to_owned())?;

        std::fs::write(
            dir.path().join("2018-07-04.txt"),
            "Date: 2018-07-04\nRaw minutes: not-a-number\n",
        )?;

        assert_eq!(store.load(TEST_DATE).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn mismatched_date_loads_as_none() -> Result<()> {
        let dir = tempdir()?;
        let store = FsRecordStore::new(dir.path().to_owned())?;

        store.save(&record(30)).await?;
        std::fs::rename(
            dir.path().join("2018-07-04.txt"),
            dir.path().join("2018-07-05.txt"),
        )?;

        let next_day = TEST_DATE.succ_opt().unwrap();
        assert_eq!(store.load(next_day).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn save_overwrites_previous_total() -> Result<()> {
        let dir = tempdir()?;
        let store = FsRecordStore::new(dir.path().to_owned())?;

        store.save(&record(10)).await?;
        store.save(&record(25)).await?;

        let loaded = store.load(TEST_DATE).await?.unwrap();
        assert_eq!(loaded.total, Duration::minutes(25));

        // The temp file must not linger next to the record.
        let names = std::fs::read_dir(dir.path())?
            .map(|v| v.unwrap().file_name().into_string().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["2018-07-04.txt".to_string()]);
        Ok(())
    }
}
