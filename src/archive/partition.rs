//! Hour partitioning
//!
//! Maps an event timestamp to the `(YYYY-MM, YYYY-MM-DD_HH)` pair naming its
//! month directory and hour file. The fixed-width format makes lexicographic
//! order equal chronological order, which replay relies on.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::types::Event;

/// Extension of hourly log files
pub const LOG_EXTENSION: &str = "log";

/// Month directory and hour file of one partition, in UTC
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionKey {
    month: String,
    hour: String,
}

impl PartitionKey {
    /// Partition of a Unix timestamp in whole seconds
    ///
    /// Returns `None` for timestamps chrono cannot represent.
    pub fn from_timestamp(secs: i64) -> Option<Self> {
        DateTime::<Utc>::from_timestamp(secs, 0).map(Self::from_datetime)
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self {
            month: at.format("%Y-%m").to_string(),
            hour: at.format("%Y-%m-%d_%H").to_string(),
        }
    }

    /// Partition of an event's `ts`, or of the current time when `ts` is
    /// missing or unusable
    pub fn for_event(event: &Event) -> Self {
        event
            .timestamp_secs()
            .and_then(Self::from_timestamp)
            .unwrap_or_else(Self::now)
    }

    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// `YYYY-MM`
    pub fn month(&self) -> &str {
        &self.month
    }

    /// `YYYY-MM-DD_HH`
    pub fn hour(&self) -> &str {
        &self.hour
    }

    /// `YYYY-MM/YYYY-MM-DD_HH.log`
    pub fn relative_path(&self) -> PathBuf {
        Path::new(&self.month).join(format!("{}.{}", self.hour, LOG_EXTENSION))
    }

    /// Month directory under a log root
    pub fn dir_in(&self, root: &Path) -> PathBuf {
        root.join(&self.month)
    }

    /// Hour file under a log root
    pub fn path_in(&self, root: &Path) -> PathBuf {
        root.join(self.relative_path())
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hour)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_formats_zero_padded_utc() {
        // 2023-11-14T22:13:20Z
        let key = PartitionKey::from_timestamp(1_700_000_000).unwrap();
        assert_eq!(key.month(), "2023-11");
        assert_eq!(key.hour(), "2023-11-14_22");

        // 2024-01-05T03:00:00Z
        let key = PartitionKey::from_timestamp(1_704_423_600).unwrap();
        assert_eq!(key.month(), "2024-01");
        assert_eq!(key.hour(), "2024-01-05_03");
        assert_eq!(
            key.relative_path(),
            Path::new("2024-01").join("2024-01-05_03.log")
        );
    }

    #[test]
    fn test_same_hour_same_key() {
        let start = PartitionKey::from_timestamp(1_704_423_600).unwrap();
        let end = PartitionKey::from_timestamp(1_704_423_600 + 3599).unwrap();
        let next = PartitionKey::from_timestamp(1_704_423_600 + 3600).unwrap();

        assert_eq!(start, end);
        assert_ne!(end, next);
        assert!(start < next);
    }

    #[test]
    fn test_month_boundary() {
        // 2024-01-31T23:59:59Z and 2024-02-01T00:00:00Z
        let jan = PartitionKey::from_timestamp(1_706_745_599).unwrap();
        let feb = PartitionKey::from_timestamp(1_706_745_600).unwrap();

        assert_eq!(jan.hour(), "2024-01-31_23");
        assert_eq!(feb.hour(), "2024-02-01_00");
        assert_eq!(feb.month(), "2024-02");
        assert!(jan.relative_path() < feb.relative_path());
    }

    #[test]
    fn test_for_event_uses_ts() {
        let event = Event::from_value(json!({"type": "message", "ts": "1700000000.000100"})).unwrap();
        assert_eq!(PartitionKey::for_event(&event).hour(), "2023-11-14_22");
    }

    #[test]
    fn test_for_event_falls_back_to_now() {
        let before = PartitionKey::now();
        let event = Event::from_value(json!({"type": "hello"})).unwrap();
        let key = PartitionKey::for_event(&event);
        let after = PartitionKey::now();

        assert!(before <= key && key <= after);
    }
}
