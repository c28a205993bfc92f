//! Storage is organized through [record_store::FsRecordStore].
//! The basic idea is:
//!  - There is a directory with all the records.
//!  - Each record file holds the accounted usage total for one local calendar day.
//!  - Files are small human-readable text, safe to read while the daemon is running.

pub mod daily_record;
pub mod record_store;
