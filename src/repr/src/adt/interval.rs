// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! A time interval abstract data type.

use std::fmt::{self, Write};

use serde::{Deserialize, Serialize};

use crate::adt::datetime::{MICROS_PER_HOUR, MICROS_PER_MINUTE, MICROS_PER_SECOND};

/// An interval of time meant to express SQL intervals.
///
/// The three components are independent: `micros` is never carried over into
/// `days`, and `days` is never carried over into `months`.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Interval {
    /// A possibly negative number of months.
    pub months: i32,
    /// A possibly negative number of days.
    pub days: i32,
    /// A possibly negative timespan in microseconds.
    pub micros: i64,
}

impl Interval {
    /// The encoded width of an interval.
    pub const ENCODED_LEN: usize = 16;

    /// Constructs a new `Interval` with the specified units of time.
    pub const fn new(months: i32, days: i32, micros: i64) -> Interval {
        Interval {
            months,
            days,
            micros,
        }
    }

    /// Returns the little-endian wire representation: microseconds, then days,
    /// then months.
    pub fn to_le_bytes(&self) -> [u8; Self::ENCODED_LEN] {
        let mut buf = [0; Self::ENCODED_LEN];
        buf[0..8].copy_from_slice(&self.micros.to_le_bytes());
        buf[8..12].copy_from_slice(&self.days.to_le_bytes());
        buf[12..16].copy_from_slice(&self.months.to_le_bytes());
        buf
    }
}

impl fmt::Display for Interval {
    /// Formats in the style of PostgreSQL's `postgres` interval output, e.g.
    /// `1 year 2 mons 3 days 04:05:06.7`.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut out = String::new();
        let push = |out: &mut String, n: i64, unit: &str| {
            if n != 0 {
                if !out.is_empty() {
                    out.push(' ');
                }
                let plural = if n.abs() == 1 { "" } else { "s" };
                let _ = write!(out, "{} {}{}", n, unit, plural);
            }
        };
        let years = self.months / 12;
        let months = self.months % 12;
        push(&mut out, i64::from(years), "year");
        push(&mut out, i64::from(months), "mon");
        push(&mut out, i64::from(self.days), "day");

        if self.micros != 0 || out.is_empty() {
            if !out.is_empty() {
                out.push(' ');
            }
            if self.micros < 0 {
                out.push('-');
            }
            let micros = self.micros.unsigned_abs();
            let hours = micros / MICROS_PER_HOUR;
            let minutes = (micros % MICROS_PER_HOUR) / MICROS_PER_MINUTE;
            let seconds = (micros % MICROS_PER_MINUTE) / MICROS_PER_SECOND;
            let fraction = micros % MICROS_PER_SECOND;
            let _ = write!(out, "{:02}:{:02}:{:02}", hours, minutes, seconds);
            if fraction != 0 {
                let digits = format!("{:06}", fraction);
                let _ = write!(out, ".{}", digits.trim_end_matches('0'));
            }
        }
        f.write_str(&out)
    }
}
