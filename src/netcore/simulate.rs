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

//! # Concrete simulation
//!
//! Exact-valued executable semantics for a policy against one located packet, used by tests and
//! by hand-checking examples. The compiler itself never calls this; it exists so the algebra's
//! meaning can be checked independently of the SAT encoding.

use super::action::Label;
use super::packet::Packet;
use super::policy::Policy;
use std::collections::BTreeSet;

/// Apply `policy` to `packet` entering at `loc`, returning every resulting located packet and the
/// union of every observation label emitted.
pub fn simulate(
    policy: &Policy,
    packet: &Packet,
    loc: (u64, u64),
) -> (BTreeSet<(Packet, (u64, u64))>, BTreeSet<Label>) {
    let actions = policy.get_actions(packet, loc);
    let mut packets = BTreeSet::new();
    let mut obs = BTreeSet::new();
    for action in &actions {
        obs.extend(action.obs.iter().copied());
        packets.extend(action.modify_packet(packet));
    }
    (packets, obs)
}
