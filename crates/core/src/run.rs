//! Run-level types: cursors, sparse run reports and registry snapshots.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::Status;

/// Position marker returned by a page fetch.
///
/// A job pages either by numeric key or by timestamp; the kind is fixed by
/// the job definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cursor {
    Numeric(i64),
    Textual(String),
}

impl Cursor {
    /// Whether this cursor carries a position worth persisting.
    pub fn is_set(&self) -> bool {
        match self {
            Cursor::Numeric(v) => *v > 0,
            Cursor::Textual(s) => !s.is_empty(),
        }
    }
}

/// Sparse update applied to a registry record after (or during) a run.
///
/// `None` fields leave the record unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub last_run_at: Option<DateTime<Utc>>,
    pub duration: Option<Duration>,
    pub status: Option<Status>,
    pub description: Option<String>,
    pub retry_count: Option<u32>,
}

impl RunReport {
    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn started_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_run_at = Some(at);
        self
    }

    pub fn took(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }
}

/// Read-only view of a registered job, as exposed by the admin surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub name: String,
    pub trigger_expression: String,
    /// `YYYY-MM-DD HH:MM:SS`, empty if the job never ran.
    pub last_run: String,
    /// Duration of the last completed run in milliseconds.
    pub interval_ms: u64,
    pub status: Status,
    pub description: String,
    pub retry_count: u32,
    pub batch_limit: u32,
    /// Whether a scheduler trigger is currently attached.
    pub attached: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_is_set_only_when_advanced() {
        assert!(!Cursor::Numeric(0).is_set());
        assert!(Cursor::Numeric(12).is_set());
        assert!(!Cursor::Textual(String::new()).is_set());
        assert!(Cursor::Textual("2024-01-01 00:00:00".into()).is_set());
    }

    #[test]
    fn report_builder_sets_only_requested_fields() {
        let report = RunReport::status(Status::Failed).with_retry_count(3);
        assert_eq!(report.status, Some(Status::Failed));
        assert_eq!(report.retry_count, Some(3));
        assert!(report.description.is_none());
        assert!(report.last_run_at.is_none());
        assert!(report.duration.is_none());
    }

    #[test]
    fn snapshot_uses_camel_case_keys() {
        let snapshot = JobSnapshot {
            name: "productInsert".into(),
            trigger_expression: "0/5 * * * * *".into(),
            last_run: String::new(),
            interval_ms: 0,
            status: Status::Ready,
            description: String::new(),
            retry_count: 0,
            batch_limit: 100,
            attached: true,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["triggerExpression"], "0/5 * * * * *");
        assert_eq!(json["batchLimit"], 100);
        assert_eq!(json["status"], 1);
    }
}
