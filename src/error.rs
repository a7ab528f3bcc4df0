//! Error types for schedule loading and calendar generation.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors. Every variant aborts the run with exit code 1.
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Schedule file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Could not read or write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not parse schedule {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Could not serialize schedule: {0}")]
    Serialize(#[source] serde_yaml::Error),

    #[error("Unknown timezone '{0}'")]
    UnknownTimezone(String),
}

impl ScheduleError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScheduleError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;
