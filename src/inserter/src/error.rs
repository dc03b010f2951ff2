// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Errors produced while encoding and inserting rows.

use hb_repr::adt::numeric::NumericError;
use hb_repr::{ColumnName, ScalarType};

use crate::buffer::{MAX_BUFFER_SIZE, MAX_UTF16_LEN};

/// An error produced by a [`RowBuffer`](crate::RowBuffer) write.
///
/// `RowTooBig` and `Released` leave the buffer unusable for the current
/// chunk. Every other variant is raised before any byte of the offending
/// field is written, so the buffer's size is unchanged.
#[derive(Debug, thiserror::Error)]
pub enum RowBufferError {
    /// Growing the buffer would exceed the addressable chunk size.
    #[error(
        "row too big: a chunk of {requested} bytes exceeds the limit of {max} bytes",
        max = MAX_BUFFER_SIZE
    )]
    RowTooBig { requested: usize },
    /// A string has too many code units to be transcoded safely.
    #[error(
        "string too big: {len} UTF-16 code units exceeds the limit of {max}",
        max = MAX_UTF16_LEN
    )]
    StringTooBig { len: usize },
    /// A `start`/`len` pair does not lie within the value it slices.
    #[error("invalid argument: range {start}+{len} is out of bounds for a value of length {total}")]
    InvalidArgument {
        start: usize,
        len: usize,
        total: usize,
    },
    #[error(transparent)]
    Numeric(#[from] NumericError),
    /// The buffer's memory has already been released.
    #[error("row buffer used after release")]
    Released,
}

/// An error produced by an [`Inserter`](crate::Inserter).
#[derive(Debug, thiserror::Error)]
pub enum InserterError {
    #[error(transparent)]
    Buffer(#[from] RowBufferError),
    #[error("invalid inserter configuration: {0}")]
    InvalidConfig(String),
    #[error("table has no columns")]
    EmptyTable,
    #[error("column {column} has type {expected}, but a {found} value was given")]
    TypeMismatch {
        column: ColumnName,
        expected: ScalarType,
        found: &'static str,
    },
    #[error("column {column} is not nullable")]
    NotNullable { column: ColumnName },
    #[error("row already has all {arity} columns")]
    TooManyValues { arity: usize },
    #[error("row is incomplete: {written} of {arity} columns written")]
    IncompleteRow { written: usize, arity: usize },
    #[error("sending chunk to the database: {0:#}")]
    Transport(anyhow::Error),
}
