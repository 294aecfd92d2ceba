use std::ops::Deref;
use std::str::FromStr;

use hifitime::efmt::{Format, Formatter};
use hifitime::{Epoch, TimeScale, Unit};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A UTC instant with millisecond precision.
///
/// All N1B record times are UTC; this wraps [Epoch] so the date codecs and
/// the orbit bulletin can move between epoch milliseconds and the
/// year / day-of-year / milliseconds-of-day decomposition the file formats
/// use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Time(Epoch);

impl AsRef<Epoch> for Time {
    fn as_ref(&self) -> &Epoch {
        &self.0
    }
}

impl Deref for Time {
    type Target = Epoch;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Time {
    pub fn now() -> Self {
        Time(
            Epoch::now()
                .expect("failed to get system time")
                .to_time_scale(TimeScale::UTC),
        )
    }

    pub fn from_epoch(epoch: Epoch) -> Self {
        Time(epoch.to_time_scale(TimeScale::UTC))
    }

    /// Create [Time] from UTC milliseconds since Jan 1, 1970.
    pub fn from_utc_millis(millis: i64) -> Self {
        Self(Epoch::from_unix_milliseconds(millis as f64).to_time_scale(TimeScale::UTC))
    }

    /// Create [Time] from the year / day-of-year / milliseconds-of-day
    /// decomposition used by the N1B time codes.
    ///
    /// # Errors
    /// [Error::InvalidDate] if the components do not form a real UTC date.
    pub fn from_components(year: i32, day_of_year: u32, millis_of_day: u32) -> Result<Self> {
        if !(1..=366).contains(&day_of_year) {
            return Err(Error::InvalidDate(format!(
                "day of year {day_of_year} out of range"
            )));
        }
        if millis_of_day >= 86_400_000 {
            return Err(Error::InvalidDate(format!(
                "milliseconds of day {millis_of_day} out of range"
            )));
        }
        let day0 = Epoch::from_gregorian_utc_at_midnight(year, 1, 1);
        Ok(Self(
            day0 + Unit::Day * i64::from(day_of_year - 1) + Unit::Millisecond * i64::from(millis_of_day),
        ))
    }

    /// Return UTC milliseconds since Jan 1, 1970.
    pub fn utc_millis(&self) -> i64 {
        self.0.to_unix_milliseconds().round() as i64
    }

    pub fn year(&self) -> i32 {
        let (year, ..) = self.0.to_gregorian_utc();
        year
    }

    /// Day of year, 1-based.
    pub fn day_of_year(&self) -> u32 {
        let (year, ..) = self.0.to_gregorian_utc();
        let day0 = Epoch::from_gregorian_utc_at_midnight(year, 1, 1);
        ((self.0 - day0).to_unit(Unit::Day)).floor() as u32 + 1
    }

    /// Milliseconds elapsed since 00:00 UTC of this instant's day.
    pub fn millis_of_day(&self) -> u32 {
        let (year, month, day, ..) = self.0.to_gregorian_utc();
        let midnight = Epoch::from_gregorian_utc_at_midnight(year, month, day);
        (self.0 - midnight).to_unit(Unit::Millisecond).round() as u32
    }

    /// Start of this instant's UTC day.
    pub fn start_of_day(&self) -> Self {
        let (year, month, day, ..) = self.0.to_gregorian_utc();
        Self(Epoch::from_gregorian_utc_at_midnight(year, month, day))
    }

    /// Format ourself using the provided format string.
    ///
    /// See [hifitime::efmt::Format].
    pub fn format_utc(&self, fmt: &str) -> String {
        let fmt = Format::from_str(fmt).unwrap();
        let formatter = Formatter::to_time_scale(self.0, fmt, TimeScale::UTC);
        format!("{formatter}")
    }
}

impl std::fmt::Display for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.format_utc("%Y-%m-%dT%H:%M:%S"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_components() {
        // 1999-11-06 is day 310
        let time = Time::from_components(1999, 310, 39_600_000).unwrap();
        assert_eq!(time.year(), 1999);
        assert_eq!(time.day_of_year(), 310);
        assert_eq!(time.millis_of_day(), 39_600_000);
        assert_eq!(time.format_utc("%Y-%m-%dT%H:%M:%S"), "1999-11-06T11:00:00");
    }

    #[test]
    fn test_from_components_rejects_bad_day() {
        assert!(Time::from_components(1999, 0, 0).is_err());
        assert!(Time::from_components(1999, 367, 0).is_err());
        assert!(Time::from_components(1999, 1, 86_400_000).is_err());
    }

    #[test]
    fn test_utc_millis_roundtrip() {
        let millis: i64 = 941_886_000_123;
        assert_eq!(Time::from_utc_millis(millis).utc_millis(), millis);
    }

    #[test]
    fn test_millis_of_day() {
        let time = Time::from_utc_millis(86_400_000 + 1234);
        assert_eq!(time.millis_of_day(), 1234);
        assert_eq!(time.day_of_year(), 2);
    }
}
