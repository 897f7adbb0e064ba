//! Business-hours policy for appointment scheduling.
//!
//! The policy describes when appointments can be offered at all: which
//! weekdays are working days, the daily opening window, and the length of a
//! bookable slot. It is validated once when configuration is loaded;
//! a policy that fails validation is a deployment error, never something a
//! request handler should have to cope with.

use chrono::{Duration, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors detected while validating a [`BusinessHoursPolicy`].
///
/// These are fatal at configuration load time.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    /// The working day would end before it starts.
    #[error("day_end ({end}) must be after day_start ({start})")]
    InvertedDay { start: NaiveTime, end: NaiveTime },

    /// Slots must have positive length.
    #[error("slot_duration must be positive, got {minutes} minutes")]
    NonPositiveSlot { minutes: i64 },

    /// A single slot would not fit into the working day.
    #[error("slot_duration ({slot_minutes} minutes) exceeds the working day ({day_minutes} minutes)")]
    SlotLongerThanDay { slot_minutes: i64, day_minutes: i64 },

    /// At least one working day is required.
    #[error("working_days must not be empty")]
    NoWorkingDays,
}

/// When appointments can be offered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHoursPolicy {
    /// Weekdays on which slots are generated.
    pub working_days: Vec<Weekday>,
    /// Local wall-clock time the working day starts.
    pub day_start: NaiveTime,
    /// Local wall-clock time the working day ends.
    pub day_end: NaiveTime,
    /// Length of a bookable slot.
    #[serde(with = "duration_minutes")]
    pub slot_duration: Duration,
}

impl Default for BusinessHoursPolicy {
    fn default() -> Self {
        Self {
            working_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            day_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            day_end: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN),
            slot_duration: Duration::minutes(60),
        }
    }
}

impl BusinessHoursPolicy {
    /// Checks the policy for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns the first [`PolicyError`] found. Callers are expected to treat
    /// any error as fatal and refuse to start.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.working_days.is_empty() {
            return Err(PolicyError::NoWorkingDays);
        }
        if self.day_end <= self.day_start {
            return Err(PolicyError::InvertedDay {
                start: self.day_start,
                end: self.day_end,
            });
        }
        if self.slot_duration <= Duration::zero() {
            return Err(PolicyError::NonPositiveSlot {
                minutes: self.slot_duration.num_minutes(),
            });
        }
        let day = self.day_end - self.day_start;
        if self.slot_duration > day {
            return Err(PolicyError::SlotLongerThanDay {
                slot_minutes: self.slot_duration.num_minutes(),
                day_minutes: day.num_minutes(),
            });
        }
        Ok(())
    }

    /// Returns true if the given weekday is a working day.
    pub fn is_working_day(&self, weekday: Weekday) -> bool {
        self.working_days.contains(&weekday)
    }
}

mod duration_minutes {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_i64(d.num_minutes())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        let minutes = i64::deserialize(de)?;
        Ok(Duration::minutes(minutes))
    }
}
