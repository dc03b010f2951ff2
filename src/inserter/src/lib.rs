// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Binary row encoding and chunked bulk insertion.

#![warn(missing_debug_implementations)]

pub mod buffer;
pub mod config;
pub mod error;
mod inserter;

pub use crate::buffer::{HeaderWriter, RowBuffer, StaticHeader};
pub use crate::config::InserterConfig;
pub use crate::error::{InserterError, RowBufferError};
pub use crate::inserter::{ChunkTransport, Inserter, VecTransport};
