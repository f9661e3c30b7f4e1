//! Delivery schedules accepted by `later`.

use chrono::TimeDelta;
use serde_json::Value;
use std::time::Duration;

use crate::errors::UnsupportedScheduleError;
use crate::utils::{seconds_until, Timestamp};

/// When a delayed invocation should be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// At an absolute instant; instants in the past deliver immediately.
    At(Timestamp),
    /// After a duration from now.
    After(Duration),
    /// After a number of seconds from now.
    Seconds(u64),
}

impl Schedule {
    /// Delay to hand to the queue, relative to `now`.
    #[must_use]
    pub fn delay_in_seconds(&self, now: Timestamp) -> u64 {
        match self {
            Self::At(when) => seconds_until(*when, now),
            Self::After(duration) => {
                let secs = duration.as_secs();
                if duration.subsec_millis() >= 500 {
                    secs.saturating_add(1)
                } else {
                    secs
                }
            }
            Self::Seconds(secs) => *secs,
        }
    }
}

/// Conversion of `later`'s `when` argument into a [`Schedule`].
pub trait IntoSchedule {
    /// Interprets `self` as a schedule.
    fn into_schedule(self) -> Result<Schedule, UnsupportedScheduleError>;
}

impl IntoSchedule for Schedule {
    fn into_schedule(self) -> Result<Schedule, UnsupportedScheduleError> {
        Ok(self)
    }
}

impl IntoSchedule for Timestamp {
    fn into_schedule(self) -> Result<Schedule, UnsupportedScheduleError> {
        Ok(Schedule::At(self))
    }
}

impl IntoSchedule for Duration {
    fn into_schedule(self) -> Result<Schedule, UnsupportedScheduleError> {
        Ok(Schedule::After(self))
    }
}

impl IntoSchedule for TimeDelta {
    fn into_schedule(self) -> Result<Schedule, UnsupportedScheduleError> {
        self.to_std()
            .map(Schedule::After)
            .map_err(|_| UnsupportedScheduleError::new(format!("negative duration {self}")))
    }
}

impl IntoSchedule for u64 {
    fn into_schedule(self) -> Result<Schedule, UnsupportedScheduleError> {
        Ok(Schedule::Seconds(self))
    }
}

impl IntoSchedule for u32 {
    fn into_schedule(self) -> Result<Schedule, UnsupportedScheduleError> {
        Ok(Schedule::Seconds(u64::from(self)))
    }
}

impl IntoSchedule for i64 {
    fn into_schedule(self) -> Result<Schedule, UnsupportedScheduleError> {
        u64::try_from(self)
            .map(Schedule::Seconds)
            .map_err(|_| UnsupportedScheduleError::new(self.to_string()))
    }
}

impl IntoSchedule for i32 {
    fn into_schedule(self) -> Result<Schedule, UnsupportedScheduleError> {
        i64::from(self).into_schedule()
    }
}

/// Only non-negative integers are accepted from JSON.
impl IntoSchedule for &Value {
    fn into_schedule(self) -> Result<Schedule, UnsupportedScheduleError> {
        self.as_u64()
            .map(Schedule::Seconds)
            .ok_or_else(|| UnsupportedScheduleError::new(self.to_string()))
    }
}

impl IntoSchedule for Value {
    fn into_schedule(self) -> Result<Schedule, UnsupportedScheduleError> {
        (&self).into_schedule()
    }
}
