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

//! # Per-edge VLAN slice compiler
//!
//! Rather than a single VLAN per slice, every internal physical edge gets its own per-slice tag
//! (see [`crate::vlan::edge_optimal`]). Each compiled clause is a strictly local rewrite: one
//! input port, one output port, one incoming tag, one outgoing tag — the "observable policy"
//! property the verifier's `one_per_edge` check relies on.

use crate::error::PhysicalError;
use crate::netcore::{header, inport, Field, Policy, Predicate};
use crate::slice::Slice;
use crate::topology::{NodeId, PortId};
use std::collections::HashMap;

fn vlan_eq(value: u64) -> Predicate {
    header([(Field::Vlan, value)])
}

/// `(s1,p1) -> (s2,p2)` directed logical edge tag map, symmetrized so both orientations resolve
/// to the same tag. Only internal (switch-to-switch) edges of this slice's logical topology
/// appear here.
pub type EdgeVlan = HashMap<((NodeId, PortId), (NodeId, PortId)), u64>;

/// Compile one `(slice, policy)` pair against its per-edge tag map, producing the physical policy
/// fragment for that slice alone.
pub fn compile_slice(slice: &Slice, policy: &Policy, edge_vlan: &EdgeVlan) -> Result<Policy, PhysicalError> {
    let mut clauses = Vec::new();

    for s1 in slice.logical_topology.switches() {
        let ports = match slice.logical_topology.port_map(s1) {
            Ok(p) => p,
            Err(_) => continue,
        };
        for (&p1, &(s2, p2)) in ports {
            if !slice.logical_topology.is_switch(s2) {
                continue;
            }
            let tag_in = match edge_vlan.get(&((s1, p1), (s2, p2))) {
                Some(t) => *t,
                None => continue,
            };
            for (&p_out, &(neighbor, neighbor_port)) in ports {
                let tag_out = if slice.logical_topology.is_switch(neighbor) {
                    *edge_vlan.get(&((s1, p_out), (neighbor, neighbor_port))).unwrap_or(&0)
                } else {
                    0
                };
                let guard = inport(s1, std::iter::once(p1)).intersection(vlan_eq(tag_in));
                let clause = policy
                    .clone()
                    .restrict(guard)
                    .retag_on_port(s1, p_out, Field::Vlan, tag_out)
                    .reduce(None);
                clauses.push(clause);
            }
        }
    }

    for (&(s, p), q) in &slice.edge_policy {
        let ports = match slice.logical_topology.port_map(s) {
            Ok(p) => p,
            Err(_) => continue,
        };
        for (&p_out, &(neighbor, neighbor_port)) in ports {
            let guard = inport(s, std::iter::once(p)).intersection(q.clone()).intersection(vlan_eq(0));
            if slice.logical_topology.is_switch(neighbor) {
                let tag_out = *edge_vlan.get(&((s, p_out), (neighbor, neighbor_port))).unwrap_or(&0);
                let clause = policy
                    .clone()
                    .restrict(guard)
                    .retag_on_port(s, p_out, Field::Vlan, tag_out)
                    .reduce(None);
                clauses.push(clause);
            } else {
                let clause = policy.clone().restrict(guard).reduce(None);
                clauses.push(clause);
            }
        }
    }

    let logical = clauses
        .into_iter()
        .filter(|c| *c != Policy::Bottom)
        .fold(Policy::Bottom, |acc, c| acc.union(c))
        .reduce(None);

    logical.get_physical_rep(&slice.switch_map, &slice.port_map)
}

/// Compile every `(slice, policy, edge_vlan)` triple and union the results into one physical
/// policy.
pub fn compile(slices: &[(Slice, Policy, EdgeVlan)]) -> Result<Policy, PhysicalError> {
    let mut out = Policy::Bottom;
    for (slice, policy, edge_vlan) in slices {
        out = out.union(compile_slice(slice, policy, edge_vlan)?);
    }
    Ok(out.reduce(None))
}
