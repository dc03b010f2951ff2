// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Schema-checked bulk insertion.
//!
//! An [`Inserter`] encodes rows of a [`RelationDesc`] into a [`RowBuffer`]
//! one field at a time and hands the buffer to a [`ChunkTransport`] whenever
//! it grows past the configured chunk size.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use hb_repr::adt::datetime::{Date, Time, Timestamp, TimestampTz};
use hb_repr::adt::interval::Interval;
use hb_repr::adt::numeric::Numeric;
use hb_repr::{ColumnName, ColumnType, Datum, RelationDesc, ScalarType};
use tracing::{debug, warn};

use crate::buffer::{HeaderWriter, RowBuffer};
use crate::config::InserterConfig;
use crate::error::InserterError;

/// Delivers encoded chunks to the database.
pub trait ChunkTransport {
    /// Sends one chunk holding `rows` complete rows. `chunk` starts with the
    /// chunk header.
    fn send_chunk(&mut self, chunk: &[u8], rows: u64) -> Result<(), anyhow::Error>;
}

impl<T: ChunkTransport + ?Sized> ChunkTransport for &mut T {
    fn send_chunk(&mut self, chunk: &[u8], rows: u64) -> Result<(), anyhow::Error> {
        (**self).send_chunk(chunk, rows)
    }
}

impl<T: ChunkTransport + ?Sized> ChunkTransport for Box<T> {
    fn send_chunk(&mut self, chunk: &[u8], rows: u64) -> Result<(), anyhow::Error> {
        (**self).send_chunk(chunk, rows)
    }
}

/// A [`ChunkTransport`] that keeps every chunk in memory.
#[derive(Debug, Default, Clone)]
pub struct VecTransport {
    /// The chunks received so far, with their row counts.
    pub chunks: Vec<(Bytes, u64)>,
}

impl VecTransport {
    pub fn new() -> VecTransport {
        VecTransport::default()
    }

    /// The total number of rows received.
    pub fn rows(&self) -> u64 {
        self.chunks.iter().map(|(_, rows)| rows).sum()
    }
}

impl ChunkTransport for VecTransport {
    fn send_chunk(&mut self, chunk: &[u8], rows: u64) -> Result<(), anyhow::Error> {
        self.chunks.push((Bytes::copy_from_slice(chunk), rows));
        Ok(())
    }
}

/// Encodes rows of a table and sends them to the database in chunks.
///
/// Values are added column by column, in the order of the table's
/// [`RelationDesc`], and each row is completed with [`Inserter::end_row`].
/// Every value is checked against its column's type and nullability before
/// anything is encoded.
///
/// Finish with [`Inserter::execute`] to send the last chunk, or
/// [`Inserter::close`] to discard it.
pub struct Inserter<T: ChunkTransport> {
    desc: RelationDesc,
    buffer: RowBuffer,
    transport: T,
    config: InserterConfig,
    /// The index of the next column to write in the current row.
    column: usize,
    /// The buffer size at the start of the current row.
    row_start: usize,
    /// Completed rows in the buffer.
    chunk_rows: u64,
    /// Rows sent to the transport.
    total_rows: u64,
    closed: bool,
}

impl<T: ChunkTransport> fmt::Debug for Inserter<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Inserter")
            .field("desc", &self.desc)
            .field("buffer", &self.buffer)
            .field("config", &self.config)
            .field("column", &self.column)
            .field("chunk_rows", &self.chunk_rows)
            .field("total_rows", &self.total_rows)
            .finish_non_exhaustive()
    }
}

impl<T: ChunkTransport> Inserter<T> {
    pub fn new(
        desc: RelationDesc,
        header: Arc<dyn HeaderWriter>,
        transport: T,
        config: InserterConfig,
    ) -> Result<Inserter<T>, InserterError> {
        config.validate()?;
        if desc.arity() == 0 {
            return Err(InserterError::EmptyTable);
        }
        let buffer = RowBuffer::new(header, config.initial_capacity)?;
        debug!(
            "created inserter for {} columns, chunk size {}",
            desc.arity(),
            config.chunk_size
        );
        Ok(Inserter {
            desc,
            row_start: buffer.size(),
            buffer,
            transport,
            config,
            column: 0,
            chunk_rows: 0,
            total_rows: 0,
            closed: false,
        })
    }

    pub fn desc(&self) -> &RelationDesc {
        &self.desc
    }

    /// The buffer holding the current chunk.
    pub fn buffer(&self) -> &RowBuffer {
        &self.buffer
    }

    /// The number of completed rows not yet sent.
    pub fn chunk_rows(&self) -> u64 {
        self.chunk_rows
    }

    /// The number of rows sent so far.
    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    /// Returns the type of the next column in the current row.
    fn next_column_type(&self) -> Result<ColumnType, InserterError> {
        self.desc
            .get_type(self.column)
            .copied()
            .ok_or(InserterError::TooManyValues {
                arity: self.desc.arity(),
            })
    }

    fn column_name(&self) -> ColumnName {
        self.desc
            .get_name(self.column)
            .cloned()
            .unwrap_or_else(|| format!("#{}", self.column).into())
    }

    fn type_mismatch(&self, expected: ScalarType, found: &'static str) -> InserterError {
        InserterError::TypeMismatch {
            column: self.column_name(),
            expected,
            found,
        }
    }

    /// Returns the type of the next column, checking that `datum` is an
    /// instance of it.
    fn check_datum(&self, datum: Datum) -> Result<ColumnType, InserterError> {
        let column_type = self.next_column_type()?;
        if datum.is_instance_of(&column_type) {
            Ok(column_type)
        } else if datum.is_null() {
            Err(InserterError::NotNullable {
                column: self.column_name(),
            })
        } else {
            Err(self.type_mismatch(column_type.scalar_type, datum.type_name()))
        }
    }

    /// Writes `datum` into the next column.
    ///
    /// Nothing is written if `datum` does not match the column's type or
    /// nullability.
    pub fn add_datum(&mut self, datum: Datum) -> Result<(), InserterError> {
        let ColumnType {
            scalar_type,
            nullable,
        } = self.check_datum(datum)?;
        match datum {
            Datum::Null => self.buffer.write_null()?,
            Datum::Bool(b) => self.buffer.write_bool(b, nullable)?,
            Datum::Int16(i) => self.buffer.write_i16(i, nullable)?,
            Datum::Int32(i) => self.buffer.write_i32(i, nullable)?,
            Datum::Int64(i) => self.buffer.write_i64(i, nullable)?,
            Datum::UInt32(i) => self.buffer.write_u32(i, nullable)?,
            Datum::Float64(f) => self.buffer.write_f64(f, nullable)?,
            Datum::Numeric(n) => {
                let ScalarType::Numeric(typ) = scalar_type else {
                    return Err(self.type_mismatch(scalar_type, datum.type_name()));
                };
                self.buffer.write_numeric(n, typ, nullable)?
            }
            Datum::String(s) => self.buffer.write_text(s, nullable)?,
            Datum::Bytes(b) => self.buffer.write_bytes(b, 0, b.len(), nullable)?,
            Datum::Date(d) => self.buffer.write_date(d, nullable)?,
            Datum::Time(t) => self.buffer.write_time(t, nullable)?,
            Datum::Timestamp(t) => self.buffer.write_timestamp(t, nullable)?,
            Datum::TimestampTz(t) => self.buffer.write_timestamp_tz(t, nullable)?,
            Datum::Interval(iv) => self.buffer.write_interval(iv, nullable)?,
        }
        self.column += 1;
        Ok(())
    }

    /// Writes a null into the next column, which must be nullable.
    pub fn add_null(&mut self) -> Result<(), InserterError> {
        self.add_datum(Datum::Null)
    }

    pub fn add_bool(&mut self, value: bool) -> Result<(), InserterError> {
        self.add_datum(Datum::Bool(value))
    }

    pub fn add_i16(&mut self, value: i16) -> Result<(), InserterError> {
        self.add_datum(Datum::Int16(value))
    }

    pub fn add_i32(&mut self, value: i32) -> Result<(), InserterError> {
        self.add_datum(Datum::Int32(value))
    }

    pub fn add_i64(&mut self, value: i64) -> Result<(), InserterError> {
        self.add_datum(Datum::Int64(value))
    }

    pub fn add_oid(&mut self, value: u32) -> Result<(), InserterError> {
        self.add_datum(Datum::UInt32(value))
    }

    pub fn add_f64(&mut self, value: f64) -> Result<(), InserterError> {
        self.add_datum(Datum::Float64(value))
    }

    /// Writes a decimal, scaled to the column's declared precision and scale.
    pub fn add_numeric(&mut self, value: &Numeric) -> Result<(), InserterError> {
        self.add_datum(Datum::Numeric(value))
    }

    pub fn add_text(&mut self, value: &str) -> Result<(), InserterError> {
        self.add_datum(Datum::String(value))
    }

    /// Writes `len` UTF-16 code units of `value` starting at `start`.
    pub fn add_utf16(
        &mut self,
        value: &[u16],
        start: usize,
        len: usize,
    ) -> Result<(), InserterError> {
        // The value is checked as text; its contents do not affect the type.
        let typ = self.check_datum(Datum::String(""))?;
        self.buffer.write_utf16(value, start, len, typ.nullable)?;
        self.column += 1;
        Ok(())
    }

    pub fn add_bytes(&mut self, value: &[u8]) -> Result<(), InserterError> {
        self.add_datum(Datum::Bytes(value))
    }

    pub fn add_date(&mut self, value: Date) -> Result<(), InserterError> {
        self.add_datum(Datum::Date(value))
    }

    pub fn add_time(&mut self, value: Time) -> Result<(), InserterError> {
        self.add_datum(Datum::Time(value))
    }

    pub fn add_timestamp(&mut self, value: Timestamp) -> Result<(), InserterError> {
        self.add_datum(Datum::Timestamp(value))
    }

    pub fn add_timestamp_tz(&mut self, value: TimestampTz) -> Result<(), InserterError> {
        self.add_datum(Datum::TimestampTz(value))
    }

    pub fn add_interval(&mut self, value: Interval) -> Result<(), InserterError> {
        self.add_datum(Datum::Interval(value))
    }

    /// Writes a complete row and ends it.
    ///
    /// If a value is rejected, none of the row is written. A row must not
    /// already be in progress.
    ///
    /// Once every value is written the row is committed, and a
    /// [`InserterError::Transport`] error from sending the full chunk leaves
    /// it committed. The chunk is retried on the next [`Inserter::end_row`]
    /// or [`Inserter::execute`].
    pub fn add_row(&mut self, datums: &[Datum]) -> Result<(), InserterError> {
        if self.column != 0 {
            return Err(InserterError::IncompleteRow {
                written: self.column,
                arity: self.desc.arity(),
            });
        }
        let res = datums
            .iter()
            .try_for_each(|datum| self.add_datum(*datum));
        if let Err(e) = res {
            self.buffer.truncate(self.row_start);
            self.column = 0;
            return Err(e);
        }
        if self.column != self.desc.arity() {
            let written = self.column;
            self.buffer.truncate(self.row_start);
            self.column = 0;
            return Err(InserterError::IncompleteRow {
                written,
                arity: self.desc.arity(),
            });
        }
        self.end_row()
    }

    /// Completes the current row, sending the chunk if it has reached the
    /// configured chunk size.
    ///
    /// The row is committed before the chunk is sent, so a transport error
    /// does not undo it.
    pub fn end_row(&mut self) -> Result<(), InserterError> {
        if self.column != self.desc.arity() {
            return Err(InserterError::IncompleteRow {
                written: self.column,
                arity: self.desc.arity(),
            });
        }
        self.column = 0;
        self.chunk_rows += 1;
        self.row_start = self.buffer.size();
        if self.buffer.size() >= self.config.chunk_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), InserterError> {
        if self.chunk_rows == 0 {
            return Ok(());
        }
        self.transport
            .send_chunk(self.buffer.as_bytes(), self.chunk_rows)
            .map_err(InserterError::Transport)?;
        debug!(
            "sent chunk of {} rows, {} bytes",
            self.chunk_rows,
            self.buffer.size()
        );
        self.total_rows += self.chunk_rows;
        self.chunk_rows = 0;
        self.buffer.reset();
        self.row_start = self.buffer.size();
        Ok(())
    }

    /// Sends any remaining rows and returns the total number of rows
    /// inserted.
    pub fn execute(mut self) -> Result<u64, InserterError> {
        if self.column != 0 {
            return Err(InserterError::IncompleteRow {
                written: self.column,
                arity: self.desc.arity(),
            });
        }
        self.flush()?;
        self.closed = true;
        self.buffer.release();
        debug!("inserted {} rows", self.total_rows);
        Ok(self.total_rows)
    }

    /// Discards any rows not yet sent and frees the buffer.
    pub fn close(mut self) {
        if self.chunk_rows > 0 || self.column > 0 {
            debug!("discarding {} unsent rows", self.chunk_rows);
        }
        self.closed = true;
        self.buffer.release();
    }
}

impl<T: ChunkTransport> Drop for Inserter<T> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if self.chunk_rows > 0 || self.column > 0 {
            warn!(
                "inserter dropped without execute or close, discarding {} unsent rows",
                self.chunk_rows
            );
        }
        self.buffer.release();
    }
}

#[cfg(test)]
mod tests {
    use hb_repr::adt::numeric::NumericType;

    use super::*;
    use crate::buffer::StaticHeader;

    fn desc() -> RelationDesc {
        RelationDesc::empty()
            .with_column("id", ScalarType::Int32.nullable(false))
            .with_column("name", ScalarType::String.nullable(true))
    }

    fn inserter(transport: &mut VecTransport, chunk_size: usize) -> Inserter<&mut VecTransport> {
        let config = InserterConfig {
            initial_capacity: 16,
            chunk_size,
        };
        Inserter::new(desc(), Arc::new(StaticHeader::new(&b"H"[..])), transport, config)
            .unwrap()
    }

    #[test]
    fn rejects_empty_table() {
        let res = Inserter::new(
            RelationDesc::empty(),
            Arc::new(StaticHeader::default()),
            VecTransport::new(),
            InserterConfig::default(),
        );
        assert!(matches!(res, Err(InserterError::EmptyTable)));
    }

    #[test]
    fn type_and_nullability_checks() {
        let mut transport = VecTransport::new();
        let mut ins = inserter(&mut transport, 1024);
        assert!(matches!(
            ins.add_i64(1),
            Err(InserterError::TypeMismatch { found: "bigint", .. })
        ));
        assert!(matches!(
            ins.add_null(),
            Err(InserterError::NotNullable { .. })
        ));
        assert!(ins.buffer().is_at_chunk_start());
        ins.add_i32(1).unwrap();
        ins.add_null().unwrap();
        assert!(matches!(
            ins.add_i32(2),
            Err(InserterError::TooManyValues { arity: 2 })
        ));
        ins.end_row().unwrap();
        assert_eq!(ins.buffer().payload(), &[1, 0, 0, 0, 1]);
    }

    #[test]
    fn end_row_requires_all_columns() {
        let mut transport = VecTransport::new();
        let mut ins = inserter(&mut transport, 1024);
        ins.add_i32(1).unwrap();
        assert!(matches!(
            ins.end_row(),
            Err(InserterError::IncompleteRow {
                written: 1,
                arity: 2
            })
        ));
    }

    #[test]
    fn add_row_is_atomic() {
        let mut transport = VecTransport::new();
        let mut ins = inserter(&mut transport, 1024);
        ins.add_row(&[Datum::Int32(1), Datum::String("a")]).unwrap();
        let size = ins.buffer().size();
        assert!(ins
            .add_row(&[Datum::Int32(2), Datum::Int32(3)])
            .is_err());
        assert!(ins.add_row(&[Datum::Int32(2)]).is_err());
        assert_eq!(ins.buffer().size(), size);
        assert_eq!(ins.chunk_rows(), 1);
        ins.add_row(&[Datum::Int32(2), Datum::Null]).unwrap();
        assert_eq!(ins.execute().unwrap(), 2);
        assert_eq!(transport.chunks.len(), 1);
        assert_eq!(transport.chunks[0].1, 2);
    }

    #[test]
    fn numeric_column_uses_declared_type() {
        let numeric = NumericType::new(4, 2).unwrap();
        let desc = RelationDesc::empty().with_column("n", ScalarType::Numeric(numeric).nullable(false));
        let mut transport = VecTransport::new();
        let mut ins = Inserter::new(
            desc,
            Arc::new(StaticHeader::default()),
            &mut transport,
            InserterConfig::default(),
        )
        .unwrap();
        ins.add_numeric(&"12.34".parse().unwrap()).unwrap();
        ins.end_row().unwrap();
        assert_eq!(ins.buffer().payload(), &1234i64.to_le_bytes());
        assert!(matches!(
            ins.add_numeric(&"123.4".parse().unwrap()),
            Err(InserterError::Buffer(_))
        ));
        ins.close();
        assert!(transport.chunks.is_empty());
    }
}
