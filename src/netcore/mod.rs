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

//! # NetCore
//!
//! The algebraic language of packet predicates, forwarding actions and policies: construction,
//! structural equality, normalization (`reduce`), the virtual-to-physical rewrite, and a concrete
//! simulator used for testing.

pub mod action;
pub mod packet;
pub mod policy;
pub mod predicate;
pub mod simulate;

pub use action::{forward, Action, Label, LabelAllocator};
pub use packet::{Field, Packet};
pub use policy::Policy;
pub use predicate::{header, inport, nary_intersection, nary_union, on_port, Predicate};
pub use simulate::simulate;
