// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Date, time and timestamp abstract data types.
//!
//! On the wire a date is a Julian day number, a time is a count of
//! microseconds since midnight, and a timestamp is a count of microseconds
//! since the start of Julian day zero. The free functions in this module
//! convert between those integers and their calendar components; they are
//! total over integer inputs and never consult a platform calendar, so years
//! far outside of [`chrono`]'s supported range round-trip exactly.
//!
//! Validating that a calendar triple actually names a day is the job of the
//! [`Date`], [`Time`] and [`Timestamp`] constructors, not of the codec.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// The number of microseconds in a second.
pub const MICROS_PER_SECOND: u64 = 1_000_000;
/// The number of microseconds in a minute.
pub const MICROS_PER_MINUTE: u64 = 60 * MICROS_PER_SECOND;
/// The number of microseconds in an hour.
pub const MICROS_PER_HOUR: u64 = 60 * MICROS_PER_MINUTE;
/// The number of microseconds in a day.
pub const MICROS_PER_DAY: u64 = 24 * MICROS_PER_HOUR;

/// The day number of 1970-01-01.
pub const UNIX_EPOCH_DAY_NUMBER: u32 = 2_440_588;

/// An error produced when constructing a date/time value from components that
/// do not name a valid or representable instant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DateTimeError {
    #[error("invalid date: {year:04}-{month:02}-{day:02}")]
    InvalidDate { year: i32, month: u32, day: u32 },
    #[error("date out of range: day number {0} is not representable")]
    DateOutOfRange(i64),
    #[error("invalid time: {hour:02}:{minute:02}:{second:02}.{micros:06}")]
    InvalidTime {
        hour: u32,
        minute: u32,
        second: u32,
        micros: u32,
    },
    #[error("time out of range: {0} microseconds exceeds one day")]
    TimeOutOfRange(u64),
    #[error("timestamp out of range")]
    TimestampOutOfRange,
}

/// Converts a proleptic Gregorian calendar date to its Julian day number.
///
/// `month` must be in `1..=12`. Any `year` is accepted, including years before
/// the start of the Julian period, in which case the result is negative.
pub fn encode_date(year: i32, month: u32, day: u32) -> i64 {
    let year = i64::from(year);
    let month = i64::from(month);
    let day = i64::from(day);

    let a = (14 - month) / 12;
    let y = year + 4800 - a;
    let m = month + 12 * a - 3;
    day + (153 * m + 2) / 5 + 365 * y + y.div_euclid(4) - y.div_euclid(100) + y.div_euclid(400)
        - 32045
}

/// Converts a Julian day number back to its `(year, month, day)` components.
///
/// This is the exact inverse of [`encode_date`] for every day number whose
/// year fits in an `i32`.
// The month and day are always in 1..=31 and the year fits for any day number
// produced by `encode_date`.
#[allow(clippy::as_conversions)]
pub fn decode_date(day_number: i64) -> (i32, u32, u32) {
    let a = day_number + 32044;
    let b = (4 * a + 3).div_euclid(146_097);
    let c = a - (146_097 * b).div_euclid(4);
    let d = (4 * c + 3).div_euclid(1461);
    let e = c - (1461 * d).div_euclid(4);
    let m = (5 * e + 2) / 153;

    let day = e - (153 * m + 2) / 5 + 1;
    let month = m + 3 - 12 * (m / 10);
    let year = 100 * b + d - 4800 + m / 10;
    (year as i32, month as u32, day as u32)
}

/// Converts a time of day to microseconds since midnight.
///
/// `24:00:00.000000` is accepted and encodes as exactly one day.
pub fn encode_time(hour: u32, minute: u32, second: u32, micros: u32) -> u64 {
    u64::from(micros)
        + MICROS_PER_SECOND * u64::from(second)
        + MICROS_PER_MINUTE * u64::from(minute)
        + MICROS_PER_HOUR * u64::from(hour)
}

/// Splits microseconds since midnight into `(hour, minute, second, micros)`.
// Each component is reduced modulo a small constant, except the hour, which
// is at most 24 for any value produced by `encode_time`.
#[allow(clippy::as_conversions)]
pub fn decode_time(micros_of_day: u64) -> (u32, u32, u32, u32) {
    let micros = micros_of_day % MICROS_PER_SECOND;
    let total_seconds = micros_of_day / MICROS_PER_SECOND;
    let second = total_seconds % 60;
    let total_minutes = total_seconds / 60;
    let minute = total_minutes % 60;
    let hour = total_minutes / 60;
    (hour as u32, minute as u32, second as u32, micros as u32)
}

/// Combines a day number and a time of day into microseconds since the start
/// of day zero.
pub fn encode_timestamp(day_number: u32, micros_of_day: u64) -> u64 {
    u64::from(day_number) * MICROS_PER_DAY + micros_of_day
}

/// Splits microseconds since the start of day zero into a day number and the
/// microseconds into that day.
// The quotient is bounded by `u64::MAX / MICROS_PER_DAY`, which fits in a u32.
#[allow(clippy::as_conversions)]
pub fn decode_timestamp(timestamp: u64) -> (u32, u64) {
    (
        (timestamp / MICROS_PER_DAY) as u32,
        timestamp % MICROS_PER_DAY,
    )
}

fn is_leap_year(year: i32) -> bool {
    let year = i64::from(year);
    (year.rem_euclid(4) == 0 && year.rem_euclid(100) != 0) || year.rem_euclid(400) == 0
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// A calendar date, stored as its Julian day number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Date {
    day_number: u32,
}

impl Date {
    /// The first day of the Julian period, `-4713-11-24`.
    pub const MIN: Date = Date { day_number: 0 };

    /// Constructs a date from a raw day number.
    pub const fn from_day_number(day_number: u32) -> Date {
        Date { day_number }
    }

    /// Constructs a date from calendar components, validating that they name a
    /// real day and that its day number is representable.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Date, DateTimeError> {
        if !(1..=12).contains(&month) || day == 0 || day > days_in_month(year, month) {
            return Err(DateTimeError::InvalidDate { year, month, day });
        }
        let day_number = encode_date(year, month, day);
        match u32::try_from(day_number) {
            Ok(day_number) => Ok(Date { day_number }),
            Err(_) => Err(DateTimeError::DateOutOfRange(day_number)),
        }
    }

    /// Returns the Julian day number of this date.
    pub fn day_number(&self) -> u32 {
        self.day_number
    }

    /// Returns the `(year, month, day)` components of this date.
    pub fn to_ymd(&self) -> (i32, u32, u32) {
        decode_date(i64::from(self.day_number))
    }

    pub fn year(&self) -> i32 {
        self.to_ymd().0
    }

    pub fn month(&self) -> u32 {
        self.to_ymd().1
    }

    pub fn day(&self) -> u32 {
        self.to_ymd().2
    }

    /// Converts this date to a [`NaiveDate`], if it lies within chrono's
    /// supported range.
    pub fn to_naive_date(&self) -> Option<NaiveDate> {
        let (year, month, day) = self.to_ymd();
        NaiveDate::from_ymd_opt(year, month, day)
    }
}

impl TryFrom<NaiveDate> for Date {
    type Error = DateTimeError;

    fn try_from(date: NaiveDate) -> Result<Date, DateTimeError> {
        Date::from_ymd(date.year(), date.month(), date.day())
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (year, month, day) = self.to_ymd();
        if year < 0 {
            write!(f, "-{:04}-{:02}-{:02}", year.unsigned_abs(), month, day)
        } else {
            write!(f, "{:04}-{:02}-{:02}", year, month, day)
        }
    }
}

/// A time of day with microsecond resolution, stored as microseconds since
/// midnight.
///
/// `24:00:00` is a valid time and denotes the end of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Time {
    micros: u64,
}

impl Time {
    /// `00:00:00`.
    pub const MIDNIGHT: Time = Time { micros: 0 };
    /// `24:00:00`.
    pub const END_OF_DAY: Time = Time {
        micros: MICROS_PER_DAY,
    };

    /// Constructs a time from its components.
    pub fn from_hms_micro(
        hour: u32,
        minute: u32,
        second: u32,
        micros: u32,
    ) -> Result<Time, DateTimeError> {
        let in_day = hour < 24 && minute < 60 && second < 60 && u64::from(micros) < MICROS_PER_SECOND;
        let end_of_day = hour == 24 && minute == 0 && second == 0 && micros == 0;
        if !in_day && !end_of_day {
            return Err(DateTimeError::InvalidTime {
                hour,
                minute,
                second,
                micros,
            });
        }
        Ok(Time {
            micros: encode_time(hour, minute, second, micros),
        })
    }

    /// Constructs a time from microseconds since midnight.
    pub fn from_micros(micros: u64) -> Result<Time, DateTimeError> {
        if micros > MICROS_PER_DAY {
            return Err(DateTimeError::TimeOutOfRange(micros));
        }
        Ok(Time { micros })
    }

    /// Returns the number of microseconds since midnight.
    pub fn micros(&self) -> u64 {
        self.micros
    }

    /// Returns the `(hour, minute, second, micros)` components of this time.
    pub fn to_hms_micro(&self) -> (u32, u32, u32, u32) {
        decode_time(self.micros)
    }

    /// Converts this time to a [`NaiveTime`]. Returns `None` for `24:00:00`,
    /// which chrono cannot represent.
    pub fn to_naive_time(&self) -> Option<NaiveTime> {
        let (hour, minute, second, micros) = self.to_hms_micro();
        NaiveTime::from_hms_micro_opt(hour, minute, second, micros)
    }
}

impl TryFrom<NaiveTime> for Time {
    type Error = DateTimeError;

    /// Sub-microsecond precision is truncated. Leap seconds are rejected.
    fn try_from(time: NaiveTime) -> Result<Time, DateTimeError> {
        Time::from_hms_micro(
            time.hour(),
            time.minute(),
            time.second(),
            time.nanosecond() / 1_000,
        )
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (hour, minute, second, micros) = self.to_hms_micro();
        write!(f, "{:02}:{:02}:{:02}", hour, minute, second)?;
        if micros != 0 {
            write!(f, ".{:06}", micros)?;
        }
        Ok(())
    }
}

/// A date and time without a time zone, stored as microseconds since the
/// start of day zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    micros: u64,
}

impl Timestamp {
    /// Constructs a timestamp from raw microseconds since the start of day
    /// zero.
    pub const fn from_micros(micros: u64) -> Timestamp {
        Timestamp { micros }
    }

    /// Combines a date and a time of day.
    ///
    /// Combining `24:00:00` with a date yields midnight of the following day.
    pub fn new(date: Date, time: Time) -> Result<Timestamp, DateTimeError> {
        u64::from(date.day_number())
            .checked_mul(MICROS_PER_DAY)
            .and_then(|micros| micros.checked_add(time.micros()))
            .map(|micros| Timestamp { micros })
            .ok_or(DateTimeError::TimestampOutOfRange)
    }

    /// Returns the number of microseconds since the start of day zero.
    pub fn micros(&self) -> u64 {
        self.micros
    }

    pub fn date(&self) -> Date {
        Date::from_day_number(decode_timestamp(self.micros).0)
    }

    pub fn time(&self) -> Time {
        Time {
            micros: decode_timestamp(self.micros).1,
        }
    }

    /// Converts this timestamp to a [`NaiveDateTime`], if it lies within
    /// chrono's supported range.
    pub fn to_naive_date_time(&self) -> Option<NaiveDateTime> {
        Some(self.date().to_naive_date()?.and_time(self.time().to_naive_time()?))
    }
}

impl TryFrom<NaiveDateTime> for Timestamp {
    type Error = DateTimeError;

    fn try_from(ts: NaiveDateTime) -> Result<Timestamp, DateTimeError> {
        Timestamp::new(Date::try_from(ts.date())?, Time::try_from(ts.time())?)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.date(), self.time())
    }
}

/// A point in time, stored as microseconds since the start of day zero in UTC.
///
/// The wire representation is identical to [`Timestamp`]; only the column
/// type differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimestampTz(pub Timestamp);

impl TimestampTz {
    pub fn micros(&self) -> u64 {
        self.0.micros()
    }

    pub fn to_date_time(&self) -> Option<DateTime<Utc>> {
        Some(self.0.to_naive_date_time()?.and_utc())
    }
}

impl TryFrom<DateTime<Utc>> for TimestampTz {
    type Error = DateTimeError;

    fn try_from(ts: DateTime<Utc>) -> Result<TimestampTz, DateTimeError> {
        Ok(TimestampTz(Timestamp::try_from(ts.naive_utc())?))
    }
}

impl fmt::Display for TimestampTz {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}+00", self.0)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn known_day_numbers() {
        assert_eq!(encode_date(1970, 1, 1), i64::from(UNIX_EPOCH_DAY_NUMBER));
        assert_eq!(encode_date(2000, 1, 1), 2_451_545);
        assert_eq!(encode_date(-4713, 11, 24), 0);
        assert_eq!(decode_date(0), (-4713, 11, 24));
        assert_eq!(decode_date(2_451_545), (2000, 1, 1));
        assert_eq!(decode_date(-1), (-4713, 11, 23));
    }

    #[test]
    fn leap_days() {
        assert_eq!(encode_date(2000, 3, 1) - encode_date(2000, 2, 28), 2);
        assert_eq!(encode_date(1900, 3, 1) - encode_date(1900, 2, 28), 1);
        assert_eq!(encode_date(-4, 3, 1) - encode_date(-4, 2, 28), 2);
        assert!(Date::from_ymd(2024, 2, 29).is_ok());
        assert_eq!(
            Date::from_ymd(2023, 2, 29),
            Err(DateTimeError::InvalidDate {
                year: 2023,
                month: 2,
                day: 29
            })
        );
    }

    #[test]
    fn date_range() {
        assert_eq!(Date::from_ymd(-4713, 11, 24), Ok(Date::MIN));
        assert_eq!(
            Date::from_ymd(-4713, 11, 23),
            Err(DateTimeError::DateOutOfRange(-1))
        );
        let far = Date::from_ymd(294_276, 12, 31).unwrap();
        assert_eq!(far.to_ymd(), (294_276, 12, 31));
        assert_eq!(far.to_naive_date(), None);
    }

    #[test]
    fn end_of_day() {
        assert_eq!(encode_time(24, 0, 0, 0), MICROS_PER_DAY);
        assert_eq!(decode_time(MICROS_PER_DAY), (24, 0, 0, 0));
        assert_eq!(Time::from_hms_micro(24, 0, 0, 0), Ok(Time::END_OF_DAY));
        assert!(Time::from_hms_micro(24, 0, 0, 1).is_err());
        assert!(Time::from_micros(MICROS_PER_DAY + 1).is_err());
        assert_eq!(Time::END_OF_DAY.to_naive_time(), None);
        assert_eq!(Time::END_OF_DAY.to_string(), "24:00:00");
    }

    #[test]
    fn timestamp_composition() {
        let date = Date::from_ymd(2000, 1, 1).unwrap();
        let time = Time::from_hms_micro(12, 30, 15, 250).unwrap();
        let ts = Timestamp::new(date, time).unwrap();
        assert_eq!(
            ts.micros(),
            2_451_545 * MICROS_PER_DAY + encode_time(12, 30, 15, 250)
        );
        assert_eq!(ts.date(), date);
        assert_eq!(ts.time(), time);
        assert_eq!(ts.to_string(), "2000-01-01 12:30:15.000250");

        let rollover = Timestamp::new(date, Time::END_OF_DAY).unwrap();
        assert_eq!(rollover.date().to_ymd(), (2000, 1, 2));
        assert_eq!(rollover.time(), Time::MIDNIGHT);
    }

    #[test]
    fn chrono_interop() {
        let naive = NaiveDate::from_ymd_opt(1999, 12, 31)
            .unwrap()
            .and_hms_micro_opt(23, 59, 59, 999_999)
            .unwrap();
        let ts = Timestamp::try_from(naive).unwrap();
        assert_eq!(ts.to_naive_date_time(), Some(naive));

        let tz = TimestampTz::try_from(naive.and_utc()).unwrap();
        assert_eq!(tz.micros(), ts.micros());
        assert_eq!(tz.to_date_time(), Some(naive.and_utc()));

        let unix = Date::try_from(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()).unwrap();
        assert_eq!(unix.day_number(), UNIX_EPOCH_DAY_NUMBER);
    }

    #[test]
    fn display_negative_years() {
        let date = Date::from_ymd(-44, 3, 15).unwrap();
        assert_eq!(date.to_string(), "-0044-03-15");
    }

    fn arb_ymd() -> impl Strategy<Value = (i32, u32, u32)> {
        (-1_000_000i32..1_000_000, 1u32..=12, 1u32..=31)
            .prop_filter("day must exist in month", |(y, m, d)| {
                *d <= days_in_month(*y, *m)
            })
    }

    proptest! {
        #[test]
        fn date_roundtrip((y, m, d) in arb_ymd()) {
            prop_assert_eq!(decode_date(encode_date(y, m, d)), (y, m, d));
        }

        #[test]
        fn day_number_roundtrip(n in -400_000_000i64..400_000_000) {
            let (y, m, d) = decode_date(n);
            prop_assert_eq!(encode_date(y, m, d), n);
        }

        #[test]
        fn date_is_monotonic(a in arb_ymd(), b in arb_ymd()) {
            let (ea, eb) = (encode_date(a.0, a.1, a.2), encode_date(b.0, b.1, b.2));
            prop_assert_eq!(a.cmp(&b), ea.cmp(&eb));
        }

        #[test]
        fn time_roundtrip(t in 0..=MICROS_PER_DAY) {
            let (h, m, s, us) = decode_time(t);
            prop_assert_eq!(encode_time(h, m, s, us), t);
        }

        #[test]
        fn time_is_monotonic(a in 0..MICROS_PER_DAY, b in 0..MICROS_PER_DAY) {
            prop_assert_eq!(decode_time(a).cmp(&decode_time(b)), a.cmp(&b));
        }

        #[test]
        fn timestamp_roundtrip(day in 0u32..110_000_000, t in 0..MICROS_PER_DAY) {
            prop_assert_eq!(decode_timestamp(encode_timestamp(day, t)), (day, t));
        }
    }
}
