// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::adt::datetime::{Date, Time, Timestamp, TimestampTz};
use crate::adt::interval::Interval;
use crate::adt::numeric::{Numeric, NumericType};
use crate::ColumnType;

/// A single value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Datum<'a> {
    /// An unknown value.
    Null,
    /// A boolean value.
    Bool(bool),
    /// A 16-bit signed integer.
    Int16(i16),
    /// A 32-bit signed integer.
    Int32(i32),
    /// A 64-bit signed integer.
    Int64(i64),
    /// A 32-bit unsigned integer, used for object identifiers.
    UInt32(u32),
    /// A 64-bit floating point number.
    Float64(f64),
    /// An exact decimal number of arbitrary precision.
    Numeric(&'a Numeric),
    /// A sequence of Unicode codepoints encoded as UTF-8.
    String(&'a str),
    /// A sequence of untyped bytes.
    Bytes(&'a [u8]),
    /// A calendar date.
    Date(Date),
    /// A time of day.
    Time(Time),
    /// A date and time without a time zone.
    Timestamp(Timestamp),
    /// A date and time in UTC.
    TimestampTz(TimestampTz),
    /// A span of time.
    Interval(Interval),
}

impl<'a> Datum<'a> {
    /// Reports whether this datum is null (i.e., is [`Datum::Null`]).
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// The name of the type of this datum, as used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Datum::Null => "null",
            Datum::Bool(_) => "bool",
            Datum::Int16(_) => "smallint",
            Datum::Int32(_) => "int",
            Datum::Int64(_) => "bigint",
            Datum::UInt32(_) => "oid",
            Datum::Float64(_) => "double precision",
            Datum::Numeric(_) => "numeric",
            Datum::String(_) => "text",
            Datum::Bytes(_) => "bytea",
            Datum::Date(_) => "date",
            Datum::Time(_) => "time",
            Datum::Timestamp(_) => "timestamp",
            Datum::TimestampTz(_) => "timestamptz",
            Datum::Interval(_) => "interval",
        }
    }

    /// Reports whether this datum is an instance of the specified column type.
    pub fn is_instance_of(self, column_type: &ColumnType) -> bool {
        fn is_instance_of_scalar(datum: Datum, scalar_type: &ScalarType) -> bool {
            match (datum, scalar_type) {
                (Datum::Null, _) => false,
                (Datum::Bool(_), ScalarType::Bool) => true,
                (Datum::Bool(_), _) => false,
                (Datum::Int16(_), ScalarType::Int16) => true,
                (Datum::Int16(_), _) => false,
                (Datum::Int32(_), ScalarType::Int32) => true,
                (Datum::Int32(_), _) => false,
                (Datum::Int64(_), ScalarType::Int64) => true,
                (Datum::Int64(_), _) => false,
                (Datum::UInt32(_), ScalarType::Oid) => true,
                (Datum::UInt32(_), _) => false,
                (Datum::Float64(_), ScalarType::Float64) => true,
                (Datum::Float64(_), _) => false,
                (Datum::Numeric(_), ScalarType::Numeric(_)) => true,
                (Datum::Numeric(_), _) => false,
                (Datum::String(_), t) => t.is_text(),
                (Datum::Bytes(_), ScalarType::Bytes | ScalarType::Geography) => true,
                (Datum::Bytes(_), _) => false,
                (Datum::Date(_), ScalarType::Date) => true,
                (Datum::Date(_), _) => false,
                (Datum::Time(_), ScalarType::Time) => true,
                (Datum::Time(_), _) => false,
                (Datum::Timestamp(_), ScalarType::Timestamp) => true,
                (Datum::Timestamp(_), _) => false,
                (Datum::TimestampTz(_), ScalarType::TimestampTz) => true,
                (Datum::TimestampTz(_), _) => false,
                (Datum::Interval(_), ScalarType::Interval) => true,
                (Datum::Interval(_), _) => false,
            }
        }
        if column_type.nullable && self.is_null() {
            true
        } else {
            is_instance_of_scalar(self, &column_type.scalar_type)
        }
    }
}

impl<'a> From<bool> for Datum<'a> {
    #[inline]
    fn from(b: bool) -> Datum<'a> {
        Datum::Bool(b)
    }
}

impl<'a> From<i16> for Datum<'a> {
    #[inline]
    fn from(i: i16) -> Datum<'a> {
        Datum::Int16(i)
    }
}

impl<'a> From<i32> for Datum<'a> {
    #[inline]
    fn from(i: i32) -> Datum<'a> {
        Datum::Int32(i)
    }
}

impl<'a> From<i64> for Datum<'a> {
    #[inline]
    fn from(i: i64) -> Datum<'a> {
        Datum::Int64(i)
    }
}

impl<'a> From<u32> for Datum<'a> {
    #[inline]
    fn from(i: u32) -> Datum<'a> {
        Datum::UInt32(i)
    }
}

impl<'a> From<f64> for Datum<'a> {
    #[inline]
    fn from(f: f64) -> Datum<'a> {
        Datum::Float64(f)
    }
}

impl<'a> From<&'a Numeric> for Datum<'a> {
    #[inline]
    fn from(n: &'a Numeric) -> Datum<'a> {
        Datum::Numeric(n)
    }
}

impl<'a> From<&'a str> for Datum<'a> {
    #[inline]
    fn from(s: &'a str) -> Datum<'a> {
        Datum::String(s)
    }
}

impl<'a> From<&'a [u8]> for Datum<'a> {
    #[inline]
    fn from(b: &'a [u8]) -> Datum<'a> {
        Datum::Bytes(b)
    }
}

impl<'a> From<Date> for Datum<'a> {
    #[inline]
    fn from(d: Date) -> Datum<'a> {
        Datum::Date(d)
    }
}

impl<'a> From<Time> for Datum<'a> {
    #[inline]
    fn from(t: Time) -> Datum<'a> {
        Datum::Time(t)
    }
}

impl<'a> From<Timestamp> for Datum<'a> {
    #[inline]
    fn from(t: Timestamp) -> Datum<'a> {
        Datum::Timestamp(t)
    }
}

impl<'a> From<TimestampTz> for Datum<'a> {
    #[inline]
    fn from(t: TimestampTz) -> Datum<'a> {
        Datum::TimestampTz(t)
    }
}

impl<'a> From<Interval> for Datum<'a> {
    #[inline]
    fn from(iv: Interval) -> Datum<'a> {
        Datum::Interval(iv)
    }
}

impl<'a, T> From<Option<T>> for Datum<'a>
where
    Datum<'a>: From<T>,
{
    fn from(o: Option<T>) -> Datum<'a> {
        match o {
            Some(d) => d.into(),
            None => Datum::Null,
        }
    }
}

/// The type of a [`Datum`].
///
/// The text family (`String`, `VarChar`, `Char`, `Json`) shares one wire
/// encoding, as do `Bytes` and `Geography`. Length limits of `VarChar` and
/// `Char` are enforced by the database, not by the encoder.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    /// The type of [`Datum::Bool`].
    Bool,
    /// The type of [`Datum::Int16`].
    Int16,
    /// The type of [`Datum::Int32`].
    Int32,
    /// The type of [`Datum::Int64`].
    Int64,
    /// An object identifier, the type of [`Datum::UInt32`].
    Oid,
    /// The type of [`Datum::Float64`].
    Float64,
    /// The type of [`Datum::Numeric`], with its declared precision and scale.
    Numeric(NumericType),
    /// The type of [`Datum::String`].
    String,
    /// A string with an optional maximum length.
    VarChar { max_length: Option<u32> },
    /// A blank-padded string of fixed length.
    Char { length: u32 },
    /// A JSON document stored as text.
    Json,
    /// The type of [`Datum::Bytes`].
    Bytes,
    /// A geography value in its binary representation.
    Geography,
    /// The type of [`Datum::Date`].
    Date,
    /// The type of [`Datum::Time`].
    Time,
    /// The type of [`Datum::Timestamp`].
    Timestamp,
    /// The type of [`Datum::TimestampTz`].
    TimestampTz,
    /// The type of [`Datum::Interval`].
    Interval,
}

impl ScalarType {
    /// Constructs a [`ColumnType`] of this scalar type with the given
    /// nullability.
    pub fn nullable(self, nullable: bool) -> ColumnType {
        ColumnType {
            scalar_type: self,
            nullable,
        }
    }

    /// Reports whether values of this type are encoded as UTF-8 text.
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            ScalarType::String
                | ScalarType::VarChar { .. }
                | ScalarType::Char { .. }
                | ScalarType::Json
        )
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScalarType::Bool => f.write_str("bool"),
            ScalarType::Int16 => f.write_str("smallint"),
            ScalarType::Int32 => f.write_str("int"),
            ScalarType::Int64 => f.write_str("bigint"),
            ScalarType::Oid => f.write_str("oid"),
            ScalarType::Float64 => f.write_str("double precision"),
            ScalarType::Numeric(typ) => write!(f, "{}", typ),
            ScalarType::String => f.write_str("text"),
            ScalarType::VarChar { max_length: None } => f.write_str("varchar"),
            ScalarType::VarChar {
                max_length: Some(n),
            } => write!(f, "varchar({})", n),
            ScalarType::Char { length } => write!(f, "char({})", length),
            ScalarType::Json => f.write_str("json"),
            ScalarType::Bytes => f.write_str("bytea"),
            ScalarType::Geography => f.write_str("geography"),
            ScalarType::Date => f.write_str("date"),
            ScalarType::Time => f.write_str("time"),
            ScalarType::Timestamp => f.write_str("timestamp"),
            ScalarType::TimestampTz => f.write_str("timestamptz"),
            ScalarType::Interval => f.write_str("interval"),
        }
    }
}
