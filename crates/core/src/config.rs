//! Persisted per-job configuration.
//!
//! A job config always carries the trigger expression, batch limit and status.
//! The cursor part depends on how the job walks its source:
//! - `ById`: paging by a monotonically increasing numeric key
//! - `ByTimestamp`: paging by time
//! - `HighWaterMark`: drift detection only, no paging
//! - `None`: jobs without a cursor (maintenance)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigFieldError;
use crate::run::Cursor;
use crate::status::Status;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    pub trigger_expression: String,
    pub batch_limit: u32,
    pub status: Status,
    #[serde(default)]
    pub cursor: CursorState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CursorState {
    #[default]
    None,
    ById {
        #[serde(default)]
        max_seen_id: i64,
        #[serde(default)]
        last_processed_id: i64,
        #[serde(default)]
        last_run_timestamp: Option<DateTime<Utc>>,
    },
    ByTimestamp {
        #[serde(default)]
        last_processed_timestamp: String,
    },
    HighWaterMark {
        #[serde(default)]
        observed_max_id: i64,
    },
}

impl CursorState {
    pub fn shape(&self) -> &'static str {
        match self {
            CursorState::None => "none",
            CursorState::ById { .. } => "by_id",
            CursorState::ByTimestamp { .. } => "by_timestamp",
            CursorState::HighWaterMark { .. } => "high_water_mark",
        }
    }
}

impl JobConfig {
    fn with_cursor(trigger_expression: impl Into<String>, batch_limit: u32, cursor: CursorState) -> Self {
        Self {
            trigger_expression: trigger_expression.into(),
            batch_limit,
            status: Status::Stopped,
            cursor,
        }
    }

    /// Config for a job without a cursor.
    pub fn limit_only(trigger_expression: impl Into<String>, batch_limit: u32) -> Self {
        Self::with_cursor(trigger_expression, batch_limit, CursorState::None)
    }

    pub fn by_id(trigger_expression: impl Into<String>, batch_limit: u32) -> Self {
        Self::with_cursor(
            trigger_expression,
            batch_limit,
            CursorState::ById {
                max_seen_id: 0,
                last_processed_id: 0,
                last_run_timestamp: None,
            },
        )
    }

    pub fn by_timestamp(trigger_expression: impl Into<String>, batch_limit: u32) -> Self {
        Self::with_cursor(
            trigger_expression,
            batch_limit,
            CursorState::ByTimestamp {
                last_processed_timestamp: String::new(),
            },
        )
    }

    pub fn high_water_mark(trigger_expression: impl Into<String>) -> Self {
        Self::with_cursor(
            trigger_expression,
            0,
            CursorState::HighWaterMark { observed_max_id: 0 },
        )
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn last_processed_id(&self) -> Option<i64> {
        match &self.cursor {
            CursorState::ById {
                last_processed_id, ..
            } => Some(*last_processed_id),
            _ => None,
        }
    }

    pub fn last_processed_timestamp(&self) -> Option<&str> {
        match &self.cursor {
            CursorState::ByTimestamp {
                last_processed_timestamp,
            } => Some(last_processed_timestamp),
            _ => None,
        }
    }

    pub fn observed_max_id(&self) -> Option<i64> {
        match &self.cursor {
            CursorState::HighWaterMark { observed_max_id } => Some(*observed_max_id),
            _ => None,
        }
    }

    /// Current cursor position, if the job pages through its source.
    pub fn position(&self) -> Option<Cursor> {
        match &self.cursor {
            CursorState::ById {
                last_processed_id, ..
            } => Some(Cursor::Numeric(*last_processed_id)),
            CursorState::ByTimestamp {
                last_processed_timestamp,
            } => Some(Cursor::Textual(last_processed_timestamp.clone())),
            _ => None,
        }
    }

    /// Apply a single field update in memory.
    pub fn apply(&mut self, field: ConfigField) -> Result<(), ConfigFieldError> {
        let shape = self.cursor.shape();
        let mismatch = |field: &ConfigField| ConfigFieldError {
            field: field.name(),
            shape,
        };

        match field {
            ConfigField::TriggerExpression(expr) => self.trigger_expression = expr,
            ConfigField::BatchLimit(limit) => self.batch_limit = limit,
            ConfigField::Status(status) => self.status = status,
            ConfigField::LastProcessedId(id) => match &mut self.cursor {
                CursorState::ById {
                    last_processed_id, ..
                } => *last_processed_id = id,
                _ => return Err(mismatch(&field)),
            },
            ConfigField::MaxSeenId(id) => match &mut self.cursor {
                CursorState::ById { max_seen_id, .. } => *max_seen_id = id,
                _ => return Err(mismatch(&field)),
            },
            ConfigField::LastRunTimestamp(at) => match &mut self.cursor {
                CursorState::ById {
                    last_run_timestamp, ..
                } => *last_run_timestamp = Some(at),
                _ => return Err(mismatch(&field)),
            },
            ConfigField::LastProcessedTimestamp(ref ts) => match &mut self.cursor {
                CursorState::ByTimestamp {
                    last_processed_timestamp,
                } => *last_processed_timestamp = ts.clone(),
                _ => return Err(mismatch(&field)),
            },
            ConfigField::ObservedMaxId(id) => match &mut self.cursor {
                CursorState::HighWaterMark { observed_max_id } => *observed_max_id = id,
                _ => return Err(mismatch(&field)),
            },
        }
        Ok(())
    }
}

/// A single field of a job config, used for field-level `set` on checkpoint stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigField {
    TriggerExpression(String),
    BatchLimit(u32),
    Status(Status),
    LastProcessedId(i64),
    MaxSeenId(i64),
    LastRunTimestamp(DateTime<Utc>),
    LastProcessedTimestamp(String),
    ObservedMaxId(i64),
}

impl ConfigField {
    pub fn name(&self) -> &'static str {
        match self {
            ConfigField::TriggerExpression(_) => "trigger_expression",
            ConfigField::BatchLimit(_) => "batch_limit",
            ConfigField::Status(_) => "status",
            ConfigField::LastProcessedId(_) => "last_processed_id",
            ConfigField::MaxSeenId(_) => "max_seen_id",
            ConfigField::LastRunTimestamp(_) => "last_run_timestamp",
            ConfigField::LastProcessedTimestamp(_) => "last_processed_timestamp",
            ConfigField::ObservedMaxId(_) => "observed_max_id",
        }
    }
}
