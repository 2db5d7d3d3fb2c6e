//! Import job vocabulary and read-side sort keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of an import job.
///
/// `Completed` and `Failed` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportJobStatus {
    Running,
    Completed,
    Failed,
}

impl ImportJobStatus {
    /// Get the string representation stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse from the stored string representation.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(crate::Error::InvalidStatus(s.to_string())),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for ImportJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What caused an import job to start.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportTrigger {
    /// Periodic scheduler.
    Cron,
    /// Operator-initiated "refresh now".
    #[default]
    Manual,
}

impl ImportTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cron => "cron",
            Self::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "cron" => Ok(Self::Cron),
            "manual" => Ok(Self::Manual),
            _ => Err(crate::Error::InvalidTrigger(s.to_string())),
        }
    }
}

impl fmt::Display for ImportTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort order for cache reads.
///
/// Every order breaks ties by import index, newest first, so paging is stable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSort {
    /// Highest import index first (freshness order).
    #[default]
    Latest,
    /// Lowest import index first.
    Oldest,
    NameAsc,
    NameDesc,
    /// Most active outlets first.
    OutletsDesc,
}

impl RecordSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::Oldest => "oldest",
            Self::NameAsc => "name_asc",
            Self::NameDesc => "name_desc",
            Self::OutletsDesc => "outlets_desc",
        }
    }

    /// SQL `ORDER BY` clause for this sort. Shared by every store backend.
    pub fn order_by(&self) -> &'static str {
        match self {
            Self::Latest => "import_index DESC",
            Self::Oldest => "import_index ASC",
            Self::NameAsc => "LOWER(COALESCE(name, '')) ASC, import_index DESC",
            Self::NameDesc => "LOWER(COALESCE(name, '')) DESC, import_index DESC",
            Self::OutletsDesc => "active_outlet_count DESC, import_index DESC",
        }
    }
}

impl FromStr for RecordSort {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "latest" | "import_index_desc" => Ok(Self::Latest),
            "oldest" | "import_index_asc" => Ok(Self::Oldest),
            "name" | "name_asc" => Ok(Self::NameAsc),
            "name_desc" => Ok(Self::NameDesc),
            "outlets" | "outlets_desc" => Ok(Self::OutletsDesc),
            other => Err(crate::Error::InvalidSort(other.to_string())),
        }
    }
}

impl fmt::Display for RecordSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_storage_string() {
        for status in [
            ImportJobStatus::Running,
            ImportJobStatus::Completed,
            ImportJobStatus::Failed,
        ] {
            assert_eq!(ImportJobStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(ImportJobStatus::parse("queued").is_err());
    }

    #[test]
    fn only_running_is_non_terminal() {
        assert!(!ImportJobStatus::Running.is_terminal());
        assert!(ImportJobStatus::Completed.is_terminal());
        assert!(ImportJobStatus::Failed.is_terminal());
    }

    #[test]
    fn trigger_defaults_to_manual() {
        assert_eq!(ImportTrigger::default(), ImportTrigger::Manual);
        assert_eq!(ImportTrigger::parse("cron").unwrap(), ImportTrigger::Cron);
        assert!(ImportTrigger::parse("webhook").is_err());
    }

    #[test]
    fn sort_accepts_aliases_and_rejects_unknown() {
        assert_eq!("".parse::<RecordSort>().unwrap(), RecordSort::Latest);
        assert_eq!("Name".parse::<RecordSort>().unwrap(), RecordSort::NameAsc);
        assert_eq!(
            "outlets".parse::<RecordSort>().unwrap(),
            RecordSort::OutletsDesc
        );
        assert!("random".parse::<RecordSort>().is_err());
    }

    #[test]
    fn sort_serde_uses_snake_case() {
        let json = serde_json::to_string(&RecordSort::NameDesc).unwrap();
        assert_eq!(json, "\"name_desc\"");
    }
}
