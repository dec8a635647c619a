// Snowcap: Synthesizing Network-Wide Configuration Updates
// Copyright (C) 2021  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! # SAT-based verifier
//!
//! [`core`] declares the z3 encoding of located packets and policies; [`verify`] answers the
//! correctness and isolation queries built on top of it; [`structural`] answers the handful of
//! related questions that never need a solver at all.

pub mod core;
pub mod structural;
pub mod verify;

pub use self::core::Encoder;
pub use structural::{disjoint_observations, observations, slice_node_isolated, slice_switch_isolated};
pub use verify::{
    compiled_correctly, equivalent, isolated, isolated_diagnostic, isolated_model, not_empty, one_per_edge,
    separate, shared_inputs, shared_io, shared_outputs, shared_transit, simulates, simulates_forwards,
    simulates_forwards2, simulates_observes, Witness,
};
