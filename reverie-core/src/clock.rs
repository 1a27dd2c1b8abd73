//! Simulated-time helpers.
//!
//! The simulation clock is a naive (zone-less) `chrono` timestamp advanced
//! in whole seconds. Persisted timestamps are written with second precision
//! as `YYYY-MM-DD HH:MM:SS`.

use chrono::{Duration, NaiveDateTime, Timelike};

/// Format used for every persisted timestamp.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format used in the step-synchronization `meta.curr_time` field.
pub const STEP_TIME_FORMAT: &str = "%B %d, %Y, %H:%M:%S";

/// Minutes in a simulated day.
pub const MINUTES_PER_DAY: u32 = 1440;

/// Minutes elapsed since midnight (seconds ignored).
#[must_use]
pub fn minutes_into_day(t: NaiveDateTime) -> u32 {
    t.hour() * 60 + t.minute()
}

/// Round up to the next whole minute unless already on one.
#[must_use]
pub fn ceil_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    if t.second() == 0 && t.nanosecond() == 0 {
        return t;
    }
    let floored = t.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(t);
    floored + Duration::minutes(1)
}

/// Day label used in plans and memory triples, e.g. `Monday February 13`.
#[must_use]
pub fn date_label(t: NaiveDateTime) -> String {
    t.format("%A %B %d").to_string()
}

/// Clock label such as `07:30 AM`.
#[must_use]
pub fn clock_label(t: NaiveDateTime) -> String {
    t.format("%I:%M %p").to_string()
}

/// Label for the hour slot `hour` (0..24) in the hourly schedule prompt,
/// e.g. `00:00 AM`, `12:00 PM`, `01:00 PM`.
#[must_use]
pub fn hour_slot_label(hour: u32) -> String {
    let meridiem = if hour < 12 { "AM" } else { "PM" };
    let shown = if hour > 12 { hour - 12 } else { hour };
    format!("{shown:02}:00 {meridiem}")
}

/// Second-precision serde for `NaiveDateTime`.
pub mod serde_seconds {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIME_FORMAT;

    /// Serialize as `YYYY-MM-DD HH:MM:SS`.
    ///
    /// # Errors
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(t: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&t.format(TIME_FORMAT).to_string())
    }

    /// Parse `YYYY-MM-DD HH:MM:SS`.
    ///
    /// # Errors
    /// Fails on malformed timestamps.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, TIME_FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Second-precision serde for `Option<NaiveDateTime>`.
pub mod serde_seconds_option {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIME_FORMAT;

    /// Serialize as `YYYY-MM-DD HH:MM:SS` or `null`.
    ///
    /// # Errors
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(t: &Option<NaiveDateTime>, s: S) -> Result<S::Ok, S::Error> {
        match t {
            Some(t) => s.serialize_some(&t.format(TIME_FORMAT).to_string()),
            None => s.serialize_none(),
        }
    }

    /// Parse an optional `YYYY-MM-DD HH:MM:SS`.
    ///
    /// # Errors
    /// Fails on malformed timestamps.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDateTime>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        raw.map(|r| NaiveDateTime::parse_from_str(&r, TIME_FORMAT).map_err(serde::de::Error::custom))
            .transpose()
    }
}
