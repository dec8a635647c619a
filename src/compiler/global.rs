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

//! # Global-VLAN slice compiler
//!
//! Each slice is assigned a single VLAN tag valid everywhere on the physical network. A compiled
//! slice's policy: admits fresh untagged packets at its external ports (tagging them with its
//! own VLAN), passes through packets already carrying its tag, strips the tag again at external
//! egress, and is mapped onto the physical topology.

use crate::error::PhysicalError;
use crate::netcore::{header, inport, nary_union, Field, Policy, Predicate};
use crate::slice::Slice;
use log::info;

fn vlan_eq(value: u64) -> Predicate {
    header([(Field::Vlan, value)])
}

/// Compile one `(slice, policy)` pair given its already-assigned VLAN tag, producing the physical
/// policy fragment for that slice alone.
pub fn compile_slice(slice: &Slice, policy: &Policy, tag: u64) -> Result<Policy, PhysicalError> {
    let safe = policy.clone().restrict(vlan_eq(tag));

    let ingress_admission = nary_union(
        slice
            .edge_policy
            .iter()
            .map(|(&(s, p), q)| inport(s, std::iter::once(p)).intersection(q.clone()))
            .collect(),
    );
    let tagged = policy.map_actions(&|a| a.with_modify(Field::Vlan, tag));
    let ingress = tagged.restrict(ingress_admission.intersection(vlan_eq(0)));

    let mut admitted = ingress.union(safe);
    for &(s, p) in slice.edge_policy.keys() {
        admitted = admitted.retag_on_port(s, p, Field::Vlan, 0);
    }

    let reduced = admitted.reduce(None);
    let physical = reduced.get_physical_rep(&slice.switch_map, &slice.port_map)?;
    info!("compiled slice (tag {}) to a physical policy", tag);
    Ok(physical)
}

/// Compile every `(slice, policy, tag)` triple and union the results into one physical policy.
pub fn compile(slices: &[(Slice, Policy, u64)]) -> Result<Policy, PhysicalError> {
    let mut out = Policy::Bottom;
    for (slice, policy, tag) in slices {
        out = out.union(compile_slice(slice, policy, *tag)?);
    }
    Ok(out.reduce(None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netcore::{forward, simulate, Packet};
    use crate::topology::Topology;
    use std::collections::HashMap;

    fn trivial_slice() -> Slice {
        let mut topo = Topology::new();
        topo.add_switch(2).unwrap();
        topo.add_host(9).unwrap();
        topo.add_link(2, 9).unwrap();
        topo.finalize().unwrap();

        let switch_map: HashMap<u64, u64> = std::iter::once((2u64, 2u64)).collect();
        let mut port_map = HashMap::new();
        let mut external_port = None;
        for (&local, &(neighbor, _)) in topo.port_map(2).unwrap() {
            port_map.insert((2, local), (2, local));
            if neighbor == 9 {
                external_port = Some(local);
            }
        }
        let external_port = external_port.unwrap();
        let mut edge_policy = HashMap::new();
        edge_policy.insert((2, external_port), Predicate::Top);

        Slice::new(topo.clone(), topo, switch_map, port_map, edge_policy, false).unwrap()
    }

    #[test]
    fn compiled_policy_is_equivalent_under_simulation_up_to_vlan() {
        let slice = trivial_slice();
        let external_port = *slice.edge_policy.keys().next().unwrap();
        let original =
            Policy::primitive(inport(2, vec![external_port.1]), vec![forward(2, vec![external_port.1])]);
        let compiled = compile_slice(&slice, &original, 2).unwrap();

        // An untagged packet entering the external port is admitted, tagged, and (since it also
        // immediately leaves via the same external port) stripped back to untagged again.
        let mut packet = Packet::new();
        packet.set(Field::Vlan, 0);
        let (out, _) = simulate(&compiled, &packet, (2, external_port.1));
        assert!(!out.is_empty());
        assert!(out.iter().all(|(pkt, _)| pkt.get(Field::Vlan).unwrap_or(0) == 0));
    }
}
