// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Fundamental data representation.
//!
//! This module contains the types for representing data in the database
//! engine's bulk-insert format, as well as the calendar and decimal codecs
//! that translate between those types and their on-the-wire integers.

#![warn(missing_debug_implementations)]

pub mod adt;

mod relation;
mod scalar;

pub use crate::relation::{ColumnName, ColumnType, RelationDesc};
pub use crate::scalar::{Datum, ScalarType};
