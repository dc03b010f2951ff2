// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The chunk row buffer.
//!
//! A [`RowBuffer`] accumulates one chunk of encoded rows. The chunk starts
//! with an engine-defined header, followed by each row's fields in column
//! order:
//!
//! ```text
//! [null flag: 1 byte, nullable columns only][payload]
//! ```
//!
//! The null flag is `0` when a value follows and `1` when the field is null,
//! in which case no payload follows. Fixed-width payloads are little-endian;
//! strings and byte blobs are a `u32` little-endian length followed by the
//! raw bytes.
//!
//! Row boundaries are not marked. Callers write exactly one field per column
//! and track rows themselves (see [`Inserter`](crate::Inserter)).

use std::cmp;
use std::fmt;
use std::sync::Arc;

use bytes::{BufMut, Bytes};
use hb_repr::adt::datetime::{Date, Time, Timestamp, TimestampTz};
use hb_repr::adt::interval::Interval;
use hb_repr::adt::numeric::{self, Numeric, NumericType, ScaledNumeric};
use tracing::{debug, trace};

use crate::error::RowBufferError;

/// The largest a chunk may grow, in bytes.
pub const MAX_BUFFER_SIZE: usize = 2_147_483_647;

/// The most UTF-16 code units a single string may have. Transcoding to UTF-8
/// can quadruple a string's size, which must still fit in a chunk.
pub const MAX_UTF16_LEN: usize = MAX_BUFFER_SIZE / 4;

const NOT_NULL: u8 = 0;
const NULL: u8 = 1;

/// Grows `current` by a factor of 1.2.
fn grow(current: usize) -> usize {
    current.saturating_add(current / 5)
}

/// Writes the opaque header that starts every chunk.
pub trait HeaderWriter: fmt::Debug + Send + Sync {
    /// Appends the header to `buf` and returns the number of bytes written.
    fn write_header(&self, buf: &mut Vec<u8>) -> usize;
}

/// A [`HeaderWriter`] that writes the same bytes every time.
#[derive(Debug, Clone, Default)]
pub struct StaticHeader(Bytes);

impl StaticHeader {
    pub fn new(header: impl Into<Bytes>) -> StaticHeader {
        StaticHeader(header.into())
    }
}

impl HeaderWriter for StaticHeader {
    fn write_header(&self, buf: &mut Vec<u8>) -> usize {
        buf.extend_from_slice(&self.0);
        self.0.len()
    }
}

/// An append-only, growable buffer holding one chunk of encoded rows.
///
/// The buffer is always either positioned at the start of a chunk (holding
/// only the header) or accumulating fields. [`RowBuffer::reset`] is the only
/// way back to the start.
pub struct RowBuffer {
    /// The encoded chunk. Its length is the buffer's size.
    data: Vec<u8>,
    /// The reserved capacity, which `data` never exceeds.
    allocated: usize,
    header: Arc<dyn HeaderWriter>,
    header_len: usize,
    /// UTF-8 transcoding scratch space for UTF-16 input.
    scratch: Vec<u8>,
    released: bool,
}

impl fmt::Debug for RowBuffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RowBuffer")
            .field("size", &self.data.len())
            .field("allocated", &self.allocated)
            .field("header_len", &self.header_len)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl RowBuffer {
    /// Creates a buffer with `initial_capacity` bytes reserved and the chunk
    /// header already written.
    pub fn new(
        header: Arc<dyn HeaderWriter>,
        initial_capacity: usize,
    ) -> Result<RowBuffer, RowBufferError> {
        if initial_capacity > MAX_BUFFER_SIZE {
            return Err(RowBufferError::RowTooBig {
                requested: initial_capacity,
            });
        }
        let mut buf = RowBuffer {
            data: Vec::with_capacity(initial_capacity),
            allocated: initial_capacity,
            header,
            header_len: 0,
            scratch: Vec::new(),
            released: false,
        };
        buf.write_header();
        Ok(buf)
    }

    fn write_header(&mut self) {
        self.data.clear();
        self.header_len = self.header.write_header(&mut self.data);
        debug_assert_eq!(self.header_len, self.data.len());
        self.allocated = cmp::max(self.allocated, self.data.len());
    }

    /// The number of bytes written, including the header.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// The number of bytes reserved.
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    /// The length of the chunk header.
    pub fn header_len(&self) -> usize {
        self.header_len
    }

    /// Reports whether no field has been written since the last reset.
    pub fn is_at_chunk_start(&self) -> bool {
        self.data.len() == self.header_len
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// The encoded chunk, header included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The encoded fields written since the header.
    pub fn payload(&self) -> &[u8] {
        &self.data[self.header_len..]
    }

    /// Truncates the buffer back to the header, ready for the next chunk.
    ///
    /// Capacity is retained. Resetting a released buffer does nothing.
    pub fn reset(&mut self) {
        if self.released {
            return;
        }
        self.write_header();
        debug!("reset row buffer, {} bytes allocated", self.allocated);
    }

    /// Discards fields written after byte `size`.
    ///
    /// `size` is clamped so that the header is never discarded.
    pub fn truncate(&mut self, size: usize) {
        self.data.truncate(cmp::max(size, self.header_len));
    }

    /// Frees the buffer's memory. Releasing an already released buffer does
    /// nothing. Any later write fails with [`RowBufferError::Released`].
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.data = Vec::new();
        self.scratch = Vec::new();
        self.allocated = 0;
        self.header_len = 0;
        self.released = true;
        debug!("released row buffer");
    }

    /// Ensures at least `needed` more bytes fit, growing the buffer to
    /// `max(allocated + deficit, allocated * 1.2)` if they do not.
    fn reserve(&mut self, needed: usize) -> Result<(), RowBufferError> {
        if self.released {
            return Err(RowBufferError::Released);
        }
        let size = self.data.len();
        if needed <= self.allocated - size {
            return Ok(());
        }
        let allocated = grown_capacity(self.allocated, size, needed)?;
        self.data.reserve_exact(allocated - size);
        trace!("grew row buffer from {} to {} bytes", self.allocated, allocated);
        self.allocated = allocated;
        Ok(())
    }

    /// Reserves space for a field with a `payload`-byte value and writes its
    /// null flag if the column is nullable.
    fn begin_field(&mut self, payload: usize, nullable: bool) -> Result<(), RowBufferError> {
        self.reserve(payload.saturating_add(usize::from(nullable)))?;
        if nullable {
            self.data.put_u8(NOT_NULL);
        }
        Ok(())
    }

    /// Writes a null into a nullable column.
    pub fn write_null(&mut self) -> Result<(), RowBufferError> {
        self.reserve(1)?;
        self.data.put_u8(NULL);
        Ok(())
    }

    pub fn write_bool(&mut self, value: bool, nullable: bool) -> Result<(), RowBufferError> {
        self.begin_field(1, nullable)?;
        self.data.put_u8(u8::from(value));
        Ok(())
    }

    pub fn write_i16(&mut self, value: i16, nullable: bool) -> Result<(), RowBufferError> {
        self.begin_field(2, nullable)?;
        self.data.put_i16_le(value);
        Ok(())
    }

    pub fn write_i32(&mut self, value: i32, nullable: bool) -> Result<(), RowBufferError> {
        self.begin_field(4, nullable)?;
        self.data.put_i32_le(value);
        Ok(())
    }

    pub fn write_i64(&mut self, value: i64, nullable: bool) -> Result<(), RowBufferError> {
        self.begin_field(8, nullable)?;
        self.data.put_i64_le(value);
        Ok(())
    }

    /// Writes an unsigned 32-bit integer. The bit pattern is the same as the
    /// signed 32-bit encoding.
    pub fn write_u32(&mut self, value: u32, nullable: bool) -> Result<(), RowBufferError> {
        self.begin_field(4, nullable)?;
        self.data.put_u32_le(value);
        Ok(())
    }

    /// Writes an unsigned 64-bit integer. The bit pattern is the same as the
    /// signed 64-bit encoding.
    pub fn write_u64(&mut self, value: u64, nullable: bool) -> Result<(), RowBufferError> {
        self.begin_field(8, nullable)?;
        self.data.put_u64_le(value);
        Ok(())
    }

    pub fn write_f64(&mut self, value: f64, nullable: bool) -> Result<(), RowBufferError> {
        self.begin_field(8, nullable)?;
        self.data.put_f64_le(value);
        Ok(())
    }

    pub fn write_date(&mut self, value: Date, nullable: bool) -> Result<(), RowBufferError> {
        self.begin_field(4, nullable)?;
        self.data.put_u32_le(value.day_number());
        Ok(())
    }

    pub fn write_time(&mut self, value: Time, nullable: bool) -> Result<(), RowBufferError> {
        self.begin_field(8, nullable)?;
        self.data.put_u64_le(value.micros());
        Ok(())
    }

    pub fn write_timestamp(
        &mut self,
        value: Timestamp,
        nullable: bool,
    ) -> Result<(), RowBufferError> {
        self.begin_field(8, nullable)?;
        self.data.put_u64_le(value.micros());
        Ok(())
    }

    pub fn write_timestamp_tz(
        &mut self,
        value: TimestampTz,
        nullable: bool,
    ) -> Result<(), RowBufferError> {
        self.write_timestamp(value.0, nullable)
    }

    pub fn write_interval(&mut self, value: Interval, nullable: bool) -> Result<(), RowBufferError> {
        self.begin_field(Interval::ENCODED_LEN, nullable)?;
        self.data.put_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Writes `value` scaled to the fixed-point encoding of `typ`: 8 bytes for
    /// precisions up to 18, 16 bytes otherwise.
    ///
    /// The value is scaled before anything is written, so a value that does
    /// not fit leaves the buffer untouched.
    pub fn write_numeric(
        &mut self,
        value: &Numeric,
        typ: NumericType,
        nullable: bool,
    ) -> Result<(), RowBufferError> {
        match numeric::scale_numeric(value, typ)? {
            ScaledNumeric::Narrow(n) => {
                self.begin_field(typ.encoded_len(), nullable)?;
                self.data.put_i64_le(n);
            }
            ScaledNumeric::Wide(n) => {
                self.begin_field(typ.encoded_len(), nullable)?;
                self.data.put_i128_le(n);
            }
        }
        Ok(())
    }

    /// Writes a length-prefixed byte string.
    fn write_varlen(&mut self, value: &[u8], nullable: bool) -> Result<(), RowBufferError> {
        let len = u32::try_from(value.len()).map_err(|_| RowBufferError::RowTooBig {
            requested: self.data.len().saturating_add(value.len()),
        })?;
        self.begin_field(value.len().saturating_add(4), nullable)?;
        self.data.put_u32_le(len);
        self.data.put_slice(value);
        Ok(())
    }

    /// Writes a UTF-8 string.
    pub fn write_text(&mut self, value: &str, nullable: bool) -> Result<(), RowBufferError> {
        self.write_varlen(value.as_bytes(), nullable)
    }

    /// Writes `len` UTF-16 code units of `value` starting at `start`,
    /// transcoded to UTF-8. Unpaired surrogates become U+FFFD.
    pub fn write_utf16(
        &mut self,
        value: &[u16],
        start: usize,
        len: usize,
        nullable: bool,
    ) -> Result<(), RowBufferError> {
        check_utf16_len(len)?;
        let units = slice_arg(value, start, len)?;
        let mut scratch = std::mem::take(&mut self.scratch);
        transcode_utf16(&mut scratch, units);
        let res = self.write_varlen(&scratch, nullable);
        self.scratch = scratch;
        res
    }

    /// Writes `len` bytes of `value` starting at `start`.
    pub fn write_bytes(
        &mut self,
        value: &[u8],
        start: usize,
        len: usize,
        nullable: bool,
    ) -> Result<(), RowBufferError> {
        let bytes = slice_arg(value, start, len)?;
        self.write_varlen(bytes, nullable)
    }
}

/// Computes the capacity a buffer with `size` of `allocated` bytes used must
/// grow to so that `needed` more bytes fit: the larger of the exact deficit
/// and the 1.2x growth step. It is an error for that capacity to exceed
/// [`MAX_BUFFER_SIZE`], even when the deficit alone would fit.
fn grown_capacity(
    allocated: usize,
    size: usize,
    needed: usize,
) -> Result<usize, RowBufferError> {
    let deficit = needed.saturating_sub(allocated - size);
    let new = cmp::max(allocated.saturating_add(deficit), grow(allocated));
    if new > MAX_BUFFER_SIZE {
        return Err(RowBufferError::RowTooBig { requested: new });
    }
    Ok(new)
}

/// Returns `value[start..start + len]`, or an error if that range is out of
/// bounds.
fn slice_arg<T>(value: &[T], start: usize, len: usize) -> Result<&[T], RowBufferError> {
    start
        .checked_add(len)
        .and_then(|end| value.get(start..end))
        .ok_or(RowBufferError::InvalidArgument {
            start,
            len,
            total: value.len(),
        })
}

/// Rejects strings whose UTF-8 form could overflow a chunk.
pub fn check_utf16_len(len: usize) -> Result<(), RowBufferError> {
    if len > MAX_UTF16_LEN {
        return Err(RowBufferError::StringTooBig { len });
    }
    Ok(())
}

/// Transcodes `units` into `scratch`, first growing `scratch` to
/// `max(needed, capacity * 1.2)` if it is too small.
fn transcode_utf16(scratch: &mut Vec<u8>, units: &[u16]) {
    // Every code unit expands to at most three UTF-8 bytes.
    let needed = units.len().saturating_mul(3);
    scratch.clear();
    if scratch.capacity() < needed {
        scratch.reserve_exact(cmp::max(needed, grow(scratch.capacity())));
    }
    let mut encoded = [0; 4];
    for c in char::decode_utf16(units.iter().copied()) {
        let c = c.unwrap_or(char::REPLACEMENT_CHARACTER);
        scratch.extend_from_slice(c.encode_utf8(&mut encoded).as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use hb_repr::adt::numeric::NumericError;
    use proptest::prelude::*;

    use super::*;

    const HEADER: &[u8] = b"HDR\x00\x01";

    fn buffer(capacity: usize) -> RowBuffer {
        RowBuffer::new(Arc::new(StaticHeader::new(HEADER)), capacity).unwrap()
    }

    #[test]
    fn starts_with_header() {
        let buf = buffer(64);
        assert_eq!(buf.as_bytes(), HEADER);
        assert_eq!(buf.header_len(), HEADER.len());
        assert!(buf.is_at_chunk_start());
        assert_eq!(buf.allocated(), 64);
    }

    #[test]
    fn header_larger_than_capacity() {
        let buf = buffer(0);
        assert_eq!(buf.size(), HEADER.len());
        assert!(buf.size() <= buf.allocated());
    }

    #[test]
    fn fixed_width_encodings() {
        let mut buf = buffer(0);
        buf.write_bool(true, false).unwrap();
        buf.write_i16(-2, false).unwrap();
        buf.write_i32(0x01020304, false).unwrap();
        buf.write_i64(-1, false).unwrap();
        buf.write_u32(u32::MAX, false).unwrap();
        buf.write_u64(1, false).unwrap();
        buf.write_f64(1.5, false).unwrap();
        let mut expected = vec![1];
        expected.extend_from_slice(&(-2i16).to_le_bytes());
        expected.extend_from_slice(&[4, 3, 2, 1]);
        expected.extend_from_slice(&[0xFF; 8]);
        expected.extend_from_slice(&(-1i32).to_le_bytes());
        expected.extend_from_slice(&1u64.to_le_bytes());
        expected.extend_from_slice(&1.5f64.to_bits().to_le_bytes());
        assert_eq!(buf.payload(), &expected[..]);
    }

    #[test]
    fn datetime_encodings() {
        let mut buf = buffer(0);
        let date = Date::from_ymd(2000, 1, 1).unwrap();
        let time = Time::from_hms_micro(1, 0, 0, 0).unwrap();
        let ts = Timestamp::new(date, time).unwrap();
        buf.write_date(date, false).unwrap();
        buf.write_time(time, false).unwrap();
        buf.write_timestamp(ts, false).unwrap();
        buf.write_timestamp_tz(TimestampTz(ts), false).unwrap();
        buf.write_interval(Interval::new(1, 2, 3), false).unwrap();

        let payload = buf.payload();
        assert_eq!(payload.len(), 4 + 8 + 8 + 8 + 16);
        assert_eq!(&payload[0..4], &2_451_545u32.to_le_bytes());
        assert_eq!(&payload[4..12], &3_600_000_000u64.to_le_bytes());
        assert_eq!(&payload[12..20], &ts.micros().to_le_bytes());
        assert_eq!(&payload[20..28], &ts.micros().to_le_bytes());
        assert_eq!(&payload[28..], &Interval::new(1, 2, 3).to_le_bytes());
    }

    #[test]
    fn nullable_encoding() {
        let mut buf = buffer(0);
        buf.write_null().unwrap();
        assert_eq!(buf.payload(), &[1]);

        let mut buf = buffer(0);
        buf.write_i64(7, true).unwrap();
        assert_eq!(buf.payload().len(), 1 + 8);
        assert_eq!(buf.payload()[0], 0);
        assert_eq!(&buf.payload()[1..], &7i64.to_le_bytes());

        let mut buf = buffer(0);
        buf.write_interval(Interval::default(), true).unwrap();
        assert_eq!(buf.payload().len(), 1 + 16);
        assert_eq!(buf.payload()[0], 0);
    }

    #[test]
    fn numeric_encodings() {
        let mut buf = buffer(0);
        let narrow = NumericType::new(4, 2).unwrap();
        let wide = NumericType::new(20, 2).unwrap();
        buf.write_numeric(&Numeric::from_str("12.34").unwrap(), narrow, false)
            .unwrap();
        buf.write_numeric(&Numeric::from_str("-0.01").unwrap(), wide, true)
            .unwrap();
        let payload = buf.payload();
        assert_eq!(&payload[0..8], &1234i64.to_le_bytes());
        assert_eq!(payload[8], 0);
        assert_eq!(&payload[9..], &[0xFF; 16]);
    }

    #[test]
    fn numeric_overflow_writes_nothing() {
        let mut buf = buffer(0);
        let typ = NumericType::new(4, 2).unwrap();
        let err = buf
            .write_numeric(&Numeric::from_str("100").unwrap(), typ, true)
            .unwrap_err();
        assert!(matches!(
            err,
            RowBufferError::Numeric(NumericError::Overflow { .. })
        ));
        assert!(buf.is_at_chunk_start());
    }

    #[test]
    fn end_to_end() {
        let mut buf = buffer(16);
        let before = buf.size();
        buf.write_i32(42, false).unwrap();
        buf.write_null().unwrap();
        buf.write_text("ab", true).unwrap();
        assert_eq!(buf.size() - before, 12);
        assert_eq!(
            buf.payload(),
            &[42, 0, 0, 0, 1, 0, 2, 0, 0, 0, b'a', b'b']
        );
        assert!(buf.size() <= buf.allocated());
    }

    #[test]
    fn strings_and_bytes() {
        let mut buf = buffer(0);
        buf.write_text("", false).unwrap();
        buf.write_text("é", false).unwrap();
        buf.write_bytes(b"xyzw", 1, 2, false).unwrap();
        assert_eq!(
            buf.payload(),
            &[0, 0, 0, 0, 2, 0, 0, 0, 0xC3, 0xA9, 2, 0, 0, 0, b'y', b'z']
        );
    }

    #[test]
    fn utf16_transcoding() {
        let text = "a€😀";
        let units: Vec<u16> = text.encode_utf16().collect();
        let mut buf = buffer(0);
        buf.write_utf16(&units, 0, units.len(), false).unwrap();
        let mut expected = u32::try_from(text.len()).unwrap().to_le_bytes().to_vec();
        expected.extend_from_slice(text.as_bytes());
        assert_eq!(buf.payload(), &expected[..]);

        // A sub-range and an unpaired surrogate.
        let mut buf = buffer(0);
        buf.write_utf16(&[0x61, 0xD800, 0x62], 1, 1, false).unwrap();
        assert_eq!(buf.payload(), &[3, 0, 0, 0, 0xEF, 0xBF, 0xBD]);
    }

    #[test]
    fn scratch_growth() {
        let mut scratch = Vec::new();
        transcode_utf16(&mut scratch, &[0x61; 10]);
        assert_eq!(scratch.len(), 10);
        assert!(scratch.capacity() >= 30);
        let cap = scratch.capacity();
        transcode_utf16(&mut scratch, &[0x61; 11]);
        assert!(scratch.capacity() >= cmp::max(33, grow(cap)));
        // Smaller inputs reuse the existing allocation.
        let cap = scratch.capacity();
        transcode_utf16(&mut scratch, &[0x61; 2]);
        assert_eq!(scratch.capacity(), cap);
        assert_eq!(&scratch[..], b"aa");
    }

    #[test]
    fn string_size_guard() {
        assert!(check_utf16_len(MAX_UTF16_LEN).is_ok());
        assert!(matches!(
            check_utf16_len(MAX_UTF16_LEN + 1),
            Err(RowBufferError::StringTooBig { len }) if len == MAX_UTF16_LEN + 1
        ));

        // The length is checked before the range, so an oversized request is
        // rejected without touching the value or the scratch buffer.
        let mut buf = buffer(0);
        assert!(matches!(
            buf.write_utf16(&[0x61], 0, MAX_UTF16_LEN + 1, true),
            Err(RowBufferError::StringTooBig { len }) if len == MAX_UTF16_LEN + 1
        ));
        assert!(buf.is_at_chunk_start());
        assert_eq!(buf.size(), HEADER.len());
        assert_eq!(buf.scratch.capacity(), 0);
        buf.write_utf16(&[0x61], 0, 1, true).unwrap();
        assert_eq!(&buf.as_bytes()[HEADER.len()..], &[0, 1, 0, 0, 0, b'a']);
    }

    #[test]
    fn limit_error_messages() {
        assert_eq!(
            RowBufferError::RowTooBig { requested: 7 }.to_string(),
            "row too big: a chunk of 7 bytes exceeds the limit of 2147483647 bytes"
        );
        assert_eq!(
            RowBufferError::StringTooBig { len: 9 }.to_string(),
            "string too big: 9 UTF-16 code units exceeds the limit of 536870911"
        );
    }

    #[test]
    fn invalid_ranges_write_nothing() {
        let mut buf = buffer(0);
        for (start, len) in [(0, 5), (5, 0), (2, 3), (usize::MAX, 2)] {
            assert!(matches!(
                buf.write_bytes(b"abcd", start, len, true),
                Err(RowBufferError::InvalidArgument { .. })
            ));
            assert!(matches!(
                buf.write_utf16(&[1, 2, 3, 4], start, len, true),
                Err(RowBufferError::InvalidArgument { .. })
            ));
        }
        assert!(buf.is_at_chunk_start());
        buf.write_bytes(b"abcd", 4, 0, false).unwrap();
        assert_eq!(buf.payload(), &[0, 0, 0, 0]);
    }

    #[test]
    fn growth_policy() {
        let mut buf = buffer(100);
        // Fill to exactly the capacity without growing.
        buf.write_bytes(&[0; 91], 0, 91, false).unwrap();
        assert_eq!(buf.size(), 100);
        assert_eq!(buf.allocated(), 100);
        // A small deficit grows by the factor.
        buf.write_bool(true, false).unwrap();
        assert_eq!(buf.allocated(), 120);
        // A large deficit grows by exactly the deficit.
        let size = buf.size();
        buf.write_bytes(&[0; 500], 0, 500, false).unwrap();
        assert_eq!(buf.allocated(), 120 + (size + 504 - 120));
        assert_eq!(buf.size(), buf.allocated());
    }

    #[test]
    fn row_too_big() {
        let mut buf = buffer(0);
        let err = buf.reserve(MAX_BUFFER_SIZE).unwrap_err();
        assert!(matches!(err, RowBufferError::RowTooBig { .. }));
        assert!(matches!(
            RowBuffer::new(Arc::new(StaticHeader::default()), MAX_BUFFER_SIZE + 1),
            Err(RowBufferError::RowTooBig { .. })
        ));
    }

    #[test]
    fn growth_past_limit_fails() {
        assert_eq!(grown_capacity(100, 100, 1).unwrap(), 120);
        assert_eq!(grown_capacity(100, 90, 50).unwrap(), 140);
        assert_eq!(
            grown_capacity(1_700_000_000, 1_700_000_000, 1).unwrap(),
            2_040_000_000
        );
        // The growth step overshoots the limit although one byte would fit.
        assert!(matches!(
            grown_capacity(1_900_000_000, 1_900_000_000, 1),
            Err(RowBufferError::RowTooBig { requested }) if requested == 2_280_000_000
        ));
        let big = MAX_BUFFER_SIZE - 10;
        assert!(matches!(
            grown_capacity(big, big, 5),
            Err(RowBufferError::RowTooBig { .. })
        ));
    }

    #[test]
    fn reset_is_idempotent() {
        let mut buf = buffer(8);
        buf.write_text("hello world", false).unwrap();
        let allocated = buf.allocated();
        buf.reset();
        let first = buf.size();
        buf.reset();
        assert_eq!(buf.size(), first);
        assert_eq!(first, HEADER.len());
        assert_eq!(buf.as_bytes(), HEADER);
        assert_eq!(buf.allocated(), allocated);
    }

    #[test]
    fn truncate_keeps_header() {
        let mut buf = buffer(0);
        buf.write_i32(1, false).unwrap();
        let mark = buf.size();
        buf.write_i32(2, false).unwrap();
        buf.truncate(mark);
        assert_eq!(buf.payload(), &1i32.to_le_bytes());
        buf.truncate(0);
        assert_eq!(buf.as_bytes(), HEADER);
    }

    #[test]
    fn release_is_idempotent() {
        let mut buf = buffer(64);
        buf.release();
        buf.release();
        assert!(buf.is_released());
        assert_eq!(buf.allocated(), 0);
        assert!(matches!(
            buf.write_bool(true, false),
            Err(RowBufferError::Released)
        ));
        assert!(matches!(buf.write_null(), Err(RowBufferError::Released)));
        buf.reset();
        assert_eq!(buf.size(), 0);
    }

    #[derive(Debug, Clone)]
    enum Write {
        Null,
        Bool(bool, bool),
        I16(i16, bool),
        I32(i32, bool),
        I64(i64, bool),
        F64(f64, bool),
        Text(String, bool),
        Bytes(Vec<u8>, bool),
        Interval(i32, i32, i64, bool),
    }

    impl Write {
        fn encoded_len(&self) -> usize {
            let (payload, nullable) = match self {
                Write::Null => return 1,
                Write::Bool(_, n) => (1, n),
                Write::I16(_, n) => (2, n),
                Write::I32(_, n) => (4, n),
                Write::I64(_, n) | Write::F64(_, n) => (8, n),
                Write::Text(s, n) => (4 + s.len(), n),
                Write::Bytes(b, n) => (4 + b.len(), n),
                Write::Interval(.., n) => (16, n),
            };
            payload + usize::from(*nullable)
        }

        fn apply(&self, buf: &mut RowBuffer) -> Result<(), RowBufferError> {
            match self {
                Write::Null => buf.write_null(),
                Write::Bool(v, n) => buf.write_bool(*v, *n),
                Write::I16(v, n) => buf.write_i16(*v, *n),
                Write::I32(v, n) => buf.write_i32(*v, *n),
                Write::I64(v, n) => buf.write_i64(*v, *n),
                Write::F64(v, n) => buf.write_f64(*v, *n),
                Write::Text(v, n) => buf.write_text(v, *n),
                Write::Bytes(v, n) => buf.write_bytes(v, 0, v.len(), *n),
                Write::Interval(m, d, us, n) => buf.write_interval(Interval::new(*m, *d, *us), *n),
            }
        }
    }

    fn arb_write() -> impl Strategy<Value = Write> {
        prop_oneof![
            Just(Write::Null),
            (any::<bool>(), any::<bool>()).prop_map(|(v, n)| Write::Bool(v, n)),
            (any::<i16>(), any::<bool>()).prop_map(|(v, n)| Write::I16(v, n)),
            (any::<i32>(), any::<bool>()).prop_map(|(v, n)| Write::I32(v, n)),
            (any::<i64>(), any::<bool>()).prop_map(|(v, n)| Write::I64(v, n)),
            (any::<f64>(), any::<bool>()).prop_map(|(v, n)| Write::F64(v, n)),
            (".{0,40}", any::<bool>()).prop_map(|(v, n)| Write::Text(v, n)),
            (prop::collection::vec(any::<u8>(), 0..64), any::<bool>())
                .prop_map(|(v, n)| Write::Bytes(v, n)),
            (any::<i32>(), any::<i32>(), any::<i64>(), any::<bool>())
                .prop_map(|(m, d, us, n)| Write::Interval(m, d, us, n)),
        ]
    }

    proptest! {
        #[test]
        fn size_tracks_writes(
            capacity in 0usize..64,
            writes in prop::collection::vec(arb_write(), 0..100),
        ) {
            let mut buf = buffer(capacity);
            let mut expected = HEADER.len();
            for write in &writes {
                let before = buf.size();
                write.apply(&mut buf).unwrap();
                // Every write appends exactly its own bytes after the previous
                // write's, leaving no gaps.
                prop_assert_eq!(buf.size() - before, write.encoded_len());
                expected += write.encoded_len();
                prop_assert!(buf.size() <= buf.allocated());
            }
            prop_assert_eq!(buf.size(), expected);
            prop_assert_eq!(&buf.as_bytes()[..HEADER.len()], HEADER);
        }
    }
}
