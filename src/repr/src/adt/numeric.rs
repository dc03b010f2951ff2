// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Functions related to the numeric type, whose values are arbitrary-precision
//! [`BigDecimal`]s and whose columns are fixed-point integers.
//!
//! A column declared as `NUMERIC(p, s)` stores `v × 10^s` as a scaled
//! integer: an `i64` when `p <= 18` (the narrow encoding) and an `i128`
//! otherwise (the wide encoding). Digits beyond `s` are truncated toward zero;
//! values whose integer part needs more than `p - s` digits are rejected.

use std::fmt;
use std::sync::LazyLock;

use bigdecimal::BigDecimal;
use num_bigint::{BigInt, Sign};
use num_traits::{ToPrimitive, Zero};
use serde::{Deserialize, Serialize};

/// A numeric value.
pub type Numeric = BigDecimal;

/// The maximum precision of a numeric column.
pub const NUMERIC_MAX_PRECISION: u8 = 38;

/// The maximum precision that uses the narrow 64-bit encoding.
pub const NUMERIC_NARROW_MAX_PRECISION: u8 = 18;

/// The width of the wide encoding, in bytes.
pub const NUMERIC_WIDE_BYTE_WIDTH: usize = 16;

/// The largest power of ten kept in the precomputed tables.
const POW10_TABLE_MAX: usize = 39;

const fn pow10_native_table() -> [i128; 39] {
    let mut table = [1i128; 39];
    let mut i = 1;
    while i < table.len() {
        table[i] = table[i - 1] * 10;
        i += 1;
    }
    table
}

/// `10^0` through `10^38`, every power of ten that fits in an `i128`.
static POW10_NATIVE: [i128; 39] = pow10_native_table();

/// `10^0` through `10^39`.
static POW10_WIDE: LazyLock<Vec<BigInt>> = LazyLock::new(|| {
    let mut table = Vec::with_capacity(POW10_TABLE_MAX + 1);
    let mut n = BigInt::from(1);
    for _ in 0..=POW10_TABLE_MAX {
        table.push(n.clone());
        n *= 10;
    }
    table
});

fn pow10_native(exp: u64) -> Option<i128> {
    usize::try_from(exp)
        .ok()
        .and_then(|exp| POW10_NATIVE.get(exp))
        .copied()
}

fn pow10_wide(exp: u64) -> BigInt {
    match usize::try_from(exp).ok().and_then(|exp| POW10_WIDE.get(exp)) {
        Some(n) => n.clone(),
        None => BigInt::from(10).pow(u32::try_from(exp).unwrap_or(u32::MAX)),
    }
}

/// An error produced while converting a [`Numeric`] to its column encoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NumericError {
    #[error(
        "precision for type numeric must be between 1 and {max}, got {0}",
        max = NUMERIC_MAX_PRECISION
    )]
    InvalidPrecision(u8),
    #[error("scale for type numeric({precision}) must be between 0 and {precision}, got {scale}")]
    InvalidScale { precision: u8, scale: u8 },
    #[error("numeric value {value} does not fit in NUMERIC({precision}, {scale})")]
    Overflow {
        value: String,
        precision: u8,
        scale: u8,
    },
    #[error(
        "scaled numeric needs {0} bytes, more than the {width} available",
        width = NUMERIC_WIDE_BYTE_WIDTH
    )]
    TooWide(usize),
}

/// The precision and scale of a numeric column.
///
/// Deserialization goes through [`NumericType::new`], so a decoded type obeys
/// the same bounds as a constructed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawNumericType")]
pub struct NumericType {
    precision: u8,
    scale: u8,
}

#[derive(Deserialize)]
struct RawNumericType {
    precision: u8,
    scale: u8,
}

impl TryFrom<RawNumericType> for NumericType {
    type Error = NumericError;

    fn try_from(raw: RawNumericType) -> Result<NumericType, NumericError> {
        NumericType::new(raw.precision, raw.scale)
    }
}

impl NumericType {
    /// Constructs a numeric type, validating that `precision` is in
    /// `1..=NUMERIC_MAX_PRECISION` and that `scale <= precision`.
    pub fn new(precision: u8, scale: u8) -> Result<NumericType, NumericError> {
        if precision == 0 || precision > NUMERIC_MAX_PRECISION {
            return Err(NumericError::InvalidPrecision(precision));
        }
        if scale > precision {
            return Err(NumericError::InvalidScale { precision, scale });
        }
        Ok(NumericType { precision, scale })
    }

    pub fn precision(&self) -> u8 {
        self.precision
    }

    pub fn scale(&self) -> u8 {
        self.scale
    }

    /// Reports whether values of this type use the 64-bit encoding.
    pub fn is_narrow(&self) -> bool {
        self.precision <= NUMERIC_NARROW_MAX_PRECISION
    }

    /// The number of bytes a value of this type occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        if self.is_narrow() {
            8
        } else {
            NUMERIC_WIDE_BYTE_WIDTH
        }
    }

    fn overflow(&self, value: &Numeric) -> NumericError {
        NumericError::Overflow {
            value: value.to_string(),
            precision: self.precision,
            scale: self.scale,
        }
    }
}

impl fmt::Display for NumericType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "numeric({},{})", self.precision, self.scale)
    }
}

/// A numeric value scaled to its column's fixed-point encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaledNumeric {
    Narrow(i64),
    Wide(i128),
}

/// Computes `trunc(value × 10^scale)` as an integer with at most
/// `typ.precision()` digits.
///
/// The value's own fractional digit count is its internal scale. When it is at
/// least the target scale the coefficient only needs to be divided. Otherwise
/// it is multiplied, in `i128` while that cannot overflow and in [`BigInt`]
/// from then on.
fn scale_coefficient(value: &Numeric, typ: NumericType) -> Result<BigInt, NumericError> {
    let (mantissa, internal_scale) = value.as_bigint_and_exponent();
    if mantissa.is_zero() {
        return Ok(BigInt::zero());
    }

    let target_scale = i64::from(typ.scale);
    let digits = i64::try_from(value.digits()).unwrap_or(i64::MAX);
    // The leading digit is non-zero, so the value is at least
    // 10^(integer_digits - 1).
    let integer_digits = digits.saturating_sub(internal_scale);
    if integer_digits > i64::from(typ.precision - typ.scale) {
        return Err(typ.overflow(value));
    }

    let scaled = if internal_scale >= target_scale {
        let shift = internal_scale.abs_diff(target_scale);
        if shift >= value.digits() {
            // Every significant digit lies beyond the target scale.
            return Ok(BigInt::zero());
        }
        // Division truncates toward zero.
        mantissa / pow10_wide(shift)
    } else {
        let shift = target_scale.abs_diff(internal_scale);
        let native = mantissa
            .to_i128()
            .zip(pow10_native(shift))
            .and_then(|(m, p)| m.checked_mul(p));
        match native {
            Some(n) => BigInt::from(n),
            None => mantissa * pow10_wide(shift),
        }
    };

    if scaled.magnitude() >= pow10_wide(u64::from(typ.precision)).magnitude() {
        return Err(typ.overflow(value));
    }
    Ok(scaled)
}

/// Scales `value` for a narrow (`precision <= 18`) column.
pub fn scale_narrow(value: &Numeric, typ: NumericType) -> Result<i64, NumericError> {
    scale_coefficient(value, typ)?
        .to_i64()
        .ok_or_else(|| typ.overflow(value))
}

/// Scales `value` for a wide (`precision > 18`) column.
pub fn scale_wide(value: &Numeric, typ: NumericType) -> Result<i128, NumericError> {
    encode_wide(value, typ).map(i128::from_le_bytes)
}

/// Scales `value` and returns its 16-byte little-endian two's complement
/// representation.
pub fn encode_wide(
    value: &Numeric,
    typ: NumericType,
) -> Result<[u8; NUMERIC_WIDE_BYTE_WIDTH], NumericError> {
    to_le_bytes_sign_extended(&scale_coefficient(value, typ)?)
}

/// Scales `value` according to the encoding `typ` selects.
pub fn scale_numeric(value: &Numeric, typ: NumericType) -> Result<ScaledNumeric, NumericError> {
    if typ.is_narrow() {
        scale_narrow(value, typ).map(ScaledNumeric::Narrow)
    } else {
        scale_wide(value, typ).map(ScaledNumeric::Wide)
    }
}

/// Copies the minimal little-endian two's complement bytes of `n` and pads
/// them to 16 bytes with `0x00` for non-negative values or `0xFF` for negative
/// ones.
pub fn to_le_bytes_sign_extended(
    n: &BigInt,
) -> Result<[u8; NUMERIC_WIDE_BYTE_WIDTH], NumericError> {
    let raw = n.to_signed_bytes_le();
    if raw.len() > NUMERIC_WIDE_BYTE_WIDTH {
        return Err(NumericError::TooWide(raw.len()));
    }
    let fill = if n.sign() == Sign::Minus { 0xFF } else { 0x00 };
    let mut buf = [fill; NUMERIC_WIDE_BYTE_WIDTH];
    buf[..raw.len()].copy_from_slice(&raw);
    Ok(buf)
}
