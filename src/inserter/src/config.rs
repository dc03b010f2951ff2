// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use serde::{Deserialize, Serialize};

use crate::buffer::MAX_BUFFER_SIZE;
use crate::error::InserterError;

/// The default number of bytes reserved for a new chunk.
pub const DEFAULT_INITIAL_CAPACITY: usize = 1 << 20;

/// The default chunk size at which an inserter flushes.
pub const DEFAULT_CHUNK_SIZE: usize = 16 << 20;

/// Tuning parameters for an [`Inserter`](crate::Inserter).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InserterConfig {
    /// Bytes reserved up front for each chunk buffer.
    pub initial_capacity: usize,
    /// Once a completed row leaves the chunk at least this large, the chunk
    /// is sent.
    pub chunk_size: usize,
}

impl Default for InserterConfig {
    fn default() -> Self {
        InserterConfig {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl InserterConfig {
    pub fn validate(&self) -> Result<(), InserterError> {
        if self.initial_capacity == 0 {
            return Err(InserterError::InvalidConfig(
                "initial_capacity must be positive".into(),
            ));
        }
        if self.initial_capacity > MAX_BUFFER_SIZE {
            return Err(InserterError::InvalidConfig(format!(
                "initial_capacity {} exceeds the chunk limit of {} bytes",
                self.initial_capacity, MAX_BUFFER_SIZE
            )));
        }
        if self.chunk_size == 0 || self.chunk_size > MAX_BUFFER_SIZE {
            return Err(InserterError::InvalidConfig(format!(
                "chunk_size must be between 1 and {} bytes, got {}",
                MAX_BUFFER_SIZE, self.chunk_size
            )));
        }
        Ok(())
    }
}
