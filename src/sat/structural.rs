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

//! # Structural (non-SAT) checks
//!
//! A handful of isolation-adjacent properties never need a solver: they're plain set operations
//! over a policy's observation labels or a slice's node mappings. Kept separate from [`super::verify`]
//! so a caller who only needs these never pays for a `Context`.

use crate::netcore::{Label, Policy};
use crate::slice::Slice;
use std::collections::BTreeSet;

/// Every observation label `policy` can emit, anywhere in its tree.
pub fn observations(policy: &Policy) -> BTreeSet<Label> {
    match policy {
        Policy::Bottom => BTreeSet::new(),
        Policy::Primitive(_, actions) => actions.iter().flat_map(|a| a.obs.iter().copied()).collect(),
        Policy::Union(l, r) => observations(l).union(&observations(r)).copied().collect(),
        Policy::Restriction(p, _) => observations(p),
    }
}

/// Do `a` and `b` emit no observation label in common?
pub fn disjoint_observations(a: &Policy, b: &Policy) -> bool {
    observations(a).is_disjoint(&observations(b))
}

/// Do `a` and `b` map onto no common physical switch? Purely a check over `switch_map`'s value
/// sets; two slices can still fail [`slice_node_isolated`] below (over end hosts too) while
/// passing this one.
pub fn slice_switch_isolated(a: &Slice, b: &Slice) -> bool {
    let switches_a: BTreeSet<u64> = a.switch_map.values().copied().collect();
    let switches_b: BTreeSet<u64> = b.switch_map.values().copied().collect();
    switches_a.is_disjoint(&switches_b)
}

/// Do `a` and `b` map onto no common physical node at all, switch or end host? Broader than
/// [`slice_switch_isolated`]: it also catches two slices sharing a physical host.
pub fn slice_node_isolated(a: &Slice, b: &Slice) -> bool {
    let nodes_a: BTreeSet<u64> = a
        .switch_map
        .values()
        .copied()
        .chain(a.port_map.values().map(|&(node, _)| node))
        .collect();
    let nodes_b: BTreeSet<u64> = b
        .switch_map
        .values()
        .copied()
        .chain(b.port_map.values().map(|&(node, _)| node))
        .collect();
    nodes_a.is_disjoint(&nodes_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netcore::{forward, Predicate};
    use crate::topology::Topology;
    use std::collections::HashMap;

    fn single_switch_slice(switch: u64) -> Slice {
        let mut topo = Topology::new();
        topo.add_switch(switch).unwrap();
        topo.add_host(switch + 100).unwrap();
        topo.add_link(switch, switch + 100).unwrap();
        topo.finalize().unwrap();

        let switch_map: HashMap<u64, u64> = std::iter::once((switch, switch)).collect();
        let mut port_map = HashMap::new();
        let mut external_port = None;
        for (&local, &(neighbor, _)) in topo.port_map(switch).unwrap() {
            port_map.insert((switch, local), (switch, local));
            if neighbor == switch + 100 {
                external_port = Some(local);
            }
        }
        let mut edge_policy = HashMap::new();
        edge_policy.insert((switch, external_port.unwrap()), Predicate::Top);

        Slice::new(topo.clone(), topo, switch_map, port_map, edge_policy, false).unwrap()
    }

    #[test]
    fn slices_on_distinct_switches_are_switch_isolated() {
        let a = single_switch_slice(1);
        let b = single_switch_slice(2);
        assert!(slice_switch_isolated(&a, &b));
        assert!(slice_node_isolated(&a, &b));
    }

    #[test]
    fn slices_sharing_a_switch_are_not_isolated() {
        let a = single_switch_slice(1);
        let b = single_switch_slice(1);
        assert!(!slice_switch_isolated(&a, &b));
        assert!(!slice_node_isolated(&a, &b));
    }

    #[test]
    fn disjoint_observations_holds_when_label_sets_dont_intersect() {
        let mut action_a = forward(1, vec![1]);
        action_a.obs.insert(1);
        let mut action_b = forward(2, vec![1]);
        action_b.obs.insert(2);
        let a = Policy::primitive(Predicate::Top, vec![action_a]);
        let b = Policy::primitive(Predicate::Top, vec![action_b]);
        assert!(disjoint_observations(&a, &b));
    }

    #[test]
    fn shared_observation_label_is_detected() {
        let mut action_a = forward(1, vec![1]);
        action_a.obs.insert(9);
        let mut action_b = forward(2, vec![1]);
        action_b.obs.insert(9);
        let a = Policy::primitive(Predicate::Top, vec![action_a]);
        let b = Policy::primitive(Predicate::Top, vec![action_b]);
        assert!(!disjoint_observations(&a, &b));
    }
}
