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

#![deny(missing_docs)]

//! # Netslice: compiling and verifying isolated virtual network slices
//!
//! Given a shared physical switch topology and a set of independent virtual-network programs
//! (*slices*), this library compiles them into a single physical forwarding program that behaves,
//! for each slice, exactly as that slice's own program would on its own virtual topology — while
//! guaranteeing that no two slices ever observe or influence each other's packets.
//!
//! ## Structure
//!
//! - **[`netcore`]**: the algebraic language of packet predicates, actions and policies, with its
//!   normalization pass ([`netcore::policy::Policy::reduce`]) and virtual-to-physical rewrite.
//! - **[`topology`]**: the shared physical switch topology, built and queried by local port number.
//! - **[`slice`]**: the [`Slice`](slice::Slice) type tying a logical topology, a physical topology,
//!   and the maps between them together, with construction-time validation.
//! - **[`vlan`]**: VLAN tag assignment, either one tag per slice or one tag per slice *per physical
//!   edge*.
//! - **[`compiler`]**: the two slice compilers (global VLAN, and per-edge VLAN) that turn a set of
//!   `(Slice, Policy)` pairs into one physical [`Policy`](netcore::policy::Policy).
//! - **[`sat`]**: the SMT encoding of predicates/actions/policies over an uninterpreted packet
//!   sort, and the verifier queries built on top of it (simulation, isolation, well-formedness).
//!
//! ## Usage
//!
//! ```
//! use netslice::netcore::predicate::inport;
//! use netslice::netcore::action::forward;
//! use netslice::netcore::policy::Policy;
//!
//! // a one-line virtual policy: forward packets entering switch 2 port 2 out port 1
//! let policy = Policy::primitive(inport(2, vec![2]), vec![forward(2, vec![1])]);
//! let reduced = policy.reduce(None);
//! assert!(!matches!(reduced, Policy::Bottom));
//! ```

pub mod error;
pub mod netcore;
pub mod topology;

pub mod compiler;
pub mod sat;
pub mod slice;
pub mod vlan;

mod stopper;
#[cfg(test)]
mod test;

pub use error::Error;
pub use stopper::Stopper;
