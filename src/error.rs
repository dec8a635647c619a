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

//! Module containing all error types

use crate::slice::SliceError;
use crate::topology::TopologyError;
use crate::vlan::VlanError;
use thiserror::Error;

/// Main error type, composed from every subsystem's own error enum.
#[derive(Debug, Error)]
pub enum Error {
    /// Lowering a virtual (logical) header or action to the physical topology failed because a
    /// port was matched on a wildcard switch.
    #[error("Physical Error: {0}")]
    PhysicalError(#[from] PhysicalError),
    /// VLAN tag assignment is infeasible for the given slice set.
    #[error("Vlan Error: {0}")]
    VlanError(#[from] VlanError),
    /// A slice failed its construction-time validation.
    #[error("Slice Error: {0}")]
    SliceError(#[from] SliceError),
    /// The topology collaborator rejected a request.
    #[error("Topology Error: {0}")]
    TopologyError(#[from] TopologyError),
    /// The SMT solver could not decide a query within its budget.
    #[error("Solver Error: {0}")]
    SolverError(#[from] SolverError),
}

/// Errors raised while mapping a virtual (logical) NetCore tree onto the physical topology.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PhysicalError {
    /// A `port` field was matched on a wildcard (`switch == 0`) location.
    #[error("cannot map a logical port ({port}) on a wildcard switch")]
    PortOnWildcardSwitch {
        /// The logical port that could not be mapped.
        port: u64,
    },
    /// A logical switch has no entry in the slice's switch map.
    #[error("logical switch {switch} has no physical mapping")]
    UnmappedSwitch {
        /// The unmapped logical switch.
        switch: u64,
    },
    /// A logical (switch, port) pair has no entry in the slice's port map.
    #[error("logical port ({switch}, {port}) has no physical mapping")]
    UnmappedPort {
        /// The logical switch of the unmapped port.
        switch: u64,
        /// The logical port that has no mapping.
        port: u64,
    },
}

/// Errors raised by the SMT-backed verifier.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SolverError {
    /// The solver returned `unknown` rather than `sat`/`unsat`. Never treat this as either
    /// outcome silently; surface it to the caller.
    #[error("the SMT solver could not decide the query ({context})")]
    Indeterminate {
        /// Which query produced the indeterminate result, for diagnostics.
        context: &'static str,
    },
    /// Building a `transfer` constraint needed a topology query that failed.
    #[error("topology error while building a verifier query: {0}")]
    Topology(#[from] TopologyError),
}
