//! Job status codes.

use serde::{Deserialize, Serialize};

use crate::error::UnknownStatus;

/// Status shared by registry records and persisted job configs.
///
/// The integer codes are the persisted and wire representation:
/// `Ready(1)`, `Running(2)`, `Stopped(0)`, `Failed(-1)`, `Suspended(-2)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Status {
    /// Detached by an operator (or a one-shot job after its run).
    Stopped,
    /// Attached and waiting for the next trigger.
    Ready,
    /// A run is in flight.
    Running,
    /// Last run failed; will be retried on the next trigger.
    Failed,
    /// Retry budget exhausted; only an operator `resume` clears this.
    Suspended,
}

impl Status {
    pub const fn code(self) -> i8 {
        match self {
            Status::Stopped => 0,
            Status::Ready => 1,
            Status::Running => 2,
            Status::Failed => -1,
            Status::Suspended => -2,
        }
    }

    pub fn from_code(code: i8) -> Result<Self, UnknownStatus> {
        match code {
            0 => Ok(Status::Stopped),
            1 => Ok(Status::Ready),
            2 => Ok(Status::Running),
            -1 => Ok(Status::Failed),
            -2 => Ok(Status::Suspended),
            other => Err(UnknownStatus(other)),
        }
    }

    /// Whether a job registered with this status should be attached to its trigger.
    pub const fn is_schedulable(self) -> bool {
        self.code() > 0
    }
}

impl From<Status> for i8 {
    fn from(value: Status) -> Self {
        value.code()
    }
}

impl TryFrom<i8> for Status {
    type Error = UnknownStatus;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        Status::from_code(value)
    }
}

impl core::fmt::Display for Status {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Status::Stopped => "stopped",
            Status::Ready => "ready",
            Status::Running => "running",
            Status::Failed => "failed",
            Status::Suspended => "suspended",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_integers() {
        for status in [
            Status::Stopped,
            Status::Ready,
            Status::Running,
            Status::Failed,
            Status::Suspended,
        ] {
            assert_eq!(Status::from_code(status.code()).unwrap(), status);
        }
        assert_eq!(Status::from_code(7), Err(UnknownStatus(7)));
    }

    #[test]
    fn only_positive_codes_are_schedulable() {
        assert!(Status::Ready.is_schedulable());
        assert!(Status::Running.is_schedulable());
        assert!(!Status::Stopped.is_schedulable());
        assert!(!Status::Failed.is_schedulable());
        assert!(!Status::Suspended.is_schedulable());
    }

    #[test]
    fn serializes_as_integer_code() {
        assert_eq!(serde_json::to_string(&Status::Suspended).unwrap(), "-2");
        let parsed: Status = serde_json::from_str("1").unwrap();
        assert_eq!(parsed, Status::Ready);
        assert!(serde_json::from_str::<Status>("9").is_err());
    }
}
