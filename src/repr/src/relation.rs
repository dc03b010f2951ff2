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

use crate::ScalarType;

/// The type of a column.
///
/// [`ColumnType`] bundles information about the scalar type of a datum (e.g.,
/// Int32 or String) with its nullability.
///
/// To construct a column type, either initialize the struct directly, or
/// use the [`ScalarType::nullable`] method.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ColumnType {
    /// The underlying scalar type (e.g., Int32 or String) of this column.
    pub scalar_type: ScalarType,
    /// Whether this datum can be null.
    #[serde(default = "return_true")]
    pub nullable: bool,
}

#[inline(always)]
fn return_true() -> bool {
    true
}

impl ColumnType {
    /// Consumes this `ColumnType` and returns a new `ColumnType` with its
    /// nullability set to the specified boolean.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

/// The name of a column in a [`RelationDesc`].
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct ColumnName(String);

impl ColumnName {
    /// Returns this column name as a `str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ColumnName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ColumnName {
    fn from(s: String) -> ColumnName {
        ColumnName(s)
    }
}

impl From<&str> for ColumnName {
    fn from(s: &str) -> ColumnName {
        ColumnName(s.into())
    }
}

/// A description of the shape of a table: its columns' names and types, in
/// declaration order.
///
/// Rows are encoded column by column in exactly this order.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RelationDesc {
    columns: Vec<(ColumnName, ColumnType)>,
}

impl RelationDesc {
    /// Constructs a `RelationDesc` with no columns.
    pub fn empty() -> Self {
        RelationDesc::default()
    }

    /// Appends a column.
    pub fn with_column<N>(mut self, name: N, column_type: ColumnType) -> Self
    where
        N: Into<ColumnName>,
    {
        self.columns.push((name.into(), column_type));
        self
    }

    /// Returns the number of columns.
    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    /// Returns the type of the column at `i`, if any.
    pub fn get_type(&self, i: usize) -> Option<&ColumnType> {
        self.columns.get(i).map(|(_, typ)| typ)
    }

    /// Returns the name of the column at `i`, if any.
    pub fn get_name(&self, i: usize) -> Option<&ColumnName> {
        self.columns.get(i).map(|(name, _)| name)
    }

    /// Iterates over the columns' names and types.
    pub fn iter(&self) -> impl Iterator<Item = (&ColumnName, &ColumnType)> {
        self.columns.iter().map(|(name, typ)| (name, typ))
    }

    /// Iterates over the columns' types.
    pub fn iter_types(&self) -> impl Iterator<Item = &ColumnType> {
        self.columns.iter().map(|(_, typ)| typ)
    }
}
