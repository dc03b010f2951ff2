// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Abstract data types.
//!
//! Native Rust types are used for the primitive types. The types in this
//! module have a custom wire representation that needs more than a byte
//! copy: dates as Julian day numbers, times and timestamps as microsecond
//! counts, and numerics as scaled fixed-point integers.

pub mod datetime;
pub mod interval;
pub mod numeric;
