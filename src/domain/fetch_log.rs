use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What triggered an ingestion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchKind {
    Manual,
    Scheduled,
    Lookup,
}

/// Outcome of a whole run, derived from its page results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Partial,
    Error,
}

impl RunStatus {
    /// `success` when nothing failed, `error` when nothing succeeded.
    pub fn from_counts(succeeded: usize, failed: usize) -> Self {
        match (succeeded, failed) {
            (_, 0) => RunStatus::Success,
            (0, _) => RunStatus::Error,
            _ => RunStatus::Partial,
        }
    }
}

macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(format!("unknown {}: {}", stringify!($ty), other)),
                }
            }
        }
    };
}

text_enum!(FetchKind {
    Manual => "manual",
    Scheduled => "scheduled",
    Lookup => "lookup",
});

text_enum!(RunStatus {
    Success => "success",
    Partial => "partial",
    Error => "error",
});

/// A persisted, immutable record of one ingestion attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchLogEntry {
    pub id: i64,
    pub kind: FetchKind,
    pub status: RunStatus,
    pub items_fetched: i64,
    pub message: String,
    pub elapsed_ms: i64,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when appending to the fetch log.
#[derive(Debug, Clone)]
pub struct NewFetchLog {
    pub kind: FetchKind,
    pub status: RunStatus,
    pub items_fetched: i64,
    pub message: String,
    pub elapsed_ms: i64,
}
