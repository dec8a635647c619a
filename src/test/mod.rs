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

//! # End-to-end scenarios
//!
//! Integration tests over the whole pipeline: topology + slice + policy in, compiled physical
//! policy out, checked against the original with the SAT verifier. Each test here grounds one of
//! the crate's documented correctness properties in a concrete, literal scenario, rather than
//! exercising one module's algebra in isolation (that coverage already lives next to the code in
//! `netcore`/`vlan`/`slice`).

use crate::compiler::{edge, global};
use crate::netcore::{forward, inport, Field, Policy, Predicate};
use crate::sat;
use crate::slice::Slice;
use crate::topology::Topology;
use std::collections::HashMap;

fn identity_maps(topo: &Topology) -> (HashMap<u64, u64>, HashMap<(u64, u64), (u64, u64)>) {
    let switch_map: HashMap<u64, u64> = topo.switches().map(|s| (s, s)).collect();
    let mut port_map = HashMap::new();
    for s in topo.switches() {
        for (&local, _) in topo.port_map(s).unwrap() {
            port_map.insert((s, local), (s, local));
        }
    }
    (switch_map, port_map)
}

/// One switch with one attached host: `switch` <-> `host`.
fn single_switch_topology(switch: u64, host: u64) -> Topology {
    let mut topo = Topology::new();
    topo.add_switch(switch).unwrap();
    topo.add_host(host).unwrap();
    topo.add_link(switch, host).unwrap();
    topo.finalize().unwrap();
    topo
}

fn external_port(topo: &Topology, switch: u64, host: u64) -> u64 {
    *topo.port_map(switch).unwrap().iter().find(|(_, (n, _))| *n == host).unwrap().0
}

/// A trivial full-access slice over `single_switch_topology`: the external port admits everything,
/// and the only policy is "forward whatever comes in on the external port straight back out".
fn pass_through_slice(switch: u64, host: u64) -> (Slice, Policy, u64) {
    let topo = single_switch_topology(switch, host);
    let ext = external_port(&topo, switch, host);
    let (switch_map, port_map) = identity_maps(&topo);
    let mut edge_policy = HashMap::new();
    edge_policy.insert((switch, ext), Predicate::Top);
    let slice = Slice::new(topo.clone(), topo, switch_map, port_map, edge_policy, false).unwrap();
    let policy = Policy::primitive(inport(switch, vec![ext]), vec![forward(switch, vec![ext])]);
    (slice, policy, ext)
}

// -- Scenario 1: a one-hop forward is equivalent to itself. --------------------------------------

#[test]
fn scenario_forward_is_equivalent_to_itself() {
    let policy = Policy::primitive(inport(2, vec![2]), vec![forward(2, vec![1])]);
    assert!(sat::not_empty(&policy, None).unwrap().is_some());
    assert!(sat::equivalent(&policy, &policy, None).unwrap().is_none());
}

// -- Scenario 2: tagging every action with a vlan is a simulation-preserving change, but not a --
// -- literal `equivalent` one (the vlan field itself now differs). -------------------------------

#[test]
fn scenario_vlan_tagging_simulates_but_is_not_literally_equivalent() {
    let untagged = Policy::primitive(inport(2, vec![2]), vec![forward(2, vec![1])]);
    let tagged = untagged.map_actions(&|a| a.with_modify(Field::Vlan, 7));

    assert!(sat::equivalent(&untagged, &tagged, None).unwrap().is_some());
    assert!(sat::simulates_forwards(&untagged, &tagged, Field::Vlan, None).unwrap().is_none());
    assert!(sat::simulates_forwards(&tagged, &untagged, Field::Vlan, None).unwrap().is_none());
}

// -- Scenario 3: forwarding to a different port is a real, detectable difference. ----------------

#[test]
fn scenario_mismatched_output_port_is_not_equivalent() {
    let forwards_to_1 = Policy::primitive(inport(2, vec![2]), vec![forward(2, vec![1])]);
    let forwards_to_3 = Policy::primitive(inport(2, vec![2]), vec![forward(2, vec![3])]);
    assert!(sat::equivalent(&forwards_to_1, &forwards_to_3, None).unwrap().is_some());
    assert!(sat::simulates_forwards(&forwards_to_1, &forwards_to_3, Field::Vlan, None).unwrap().is_some());
}

// -- Scenario 4: two pass-through slices on two separate switches, globally compiled with --------
// -- distinct vlan tags, are isolated and each is a correct compilation of its own slice. ---------

#[test]
fn scenario_two_slices_are_isolated_after_global_compile() {
    let (slice_a, policy_a, _) = pass_through_slice(1, 10);
    let (slice_b, policy_b, _) = pass_through_slice(2, 20);

    let compiled_a = global::compile_slice(&slice_a, &policy_a, 1).unwrap();
    let compiled_b = global::compile_slice(&slice_b, &policy_b, 2).unwrap();

    let mut physical = Topology::new();
    physical.add_switch(1).unwrap();
    physical.add_switch(2).unwrap();
    physical.finalize().unwrap();

    assert!(sat::isolated(&physical, &compiled_a, &compiled_b, None).unwrap());
    assert!(sat::disjoint_observations(&compiled_a, &compiled_b));
    // A slice is never isolated from itself: it always shares io with its own traffic.
    assert!(!sat::isolated(&physical, &compiled_a, &compiled_a, None).unwrap());
}

// -- Scenario 5: two slices that *share* a physical link are not isolated under a naive global ---
// -- tag collision, but become isolated once the edge-optimal compiler assigns them distinct -----
// -- per-edge tags on that shared link. -----------------------------------------------------------

fn linear3_slice(hosts_at: (u64, u64)) -> (Slice, Policy, HashMap<((u64, u64), (u64, u64)), u64>) {
    // Switches 0 - 1 - 2, with a host hanging off whichever end `hosts_at` is not carrying.
    let mut topo = Topology::new();
    topo.add_switch(0).unwrap();
    topo.add_switch(1).unwrap();
    topo.add_switch(2).unwrap();
    topo.add_host(hosts_at.0).unwrap();
    topo.add_host(hosts_at.1).unwrap();
    topo.add_link(hosts_at.0, 0).unwrap();
    topo.add_link(0, 1).unwrap();
    topo.add_link(1, 2).unwrap();
    topo.add_link(2, hosts_at.1).unwrap();
    topo.finalize().unwrap();

    let (switch_map, port_map) = identity_maps(&topo);
    let ext0 = external_port(&topo, 0, hosts_at.0);
    let ext2 = external_port(&topo, 2, hosts_at.1);
    let mut edge_policy = HashMap::new();
    edge_policy.insert((0, ext0), Predicate::Top);
    edge_policy.insert((2, ext2), Predicate::Top);
    let slice = Slice::new(topo.clone(), topo.clone(), switch_map, port_map, edge_policy, false).unwrap();

    let policy = Policy::primitive(inport(0, vec![ext0]), vec![forward(0, vec![1])])
        .union(Policy::primitive(
            inport(1, vec![topo.ports_map(1).unwrap()[&0]]),
            vec![forward(1, vec![topo.ports_map(1).unwrap()[&2]])],
        ))
        .union(Policy::primitive(
            inport(2, vec![topo.ports_map(2).unwrap()[&1]]),
            vec![forward(2, vec![ext2])],
        ));

    let p01 = topo.ports_map(0).unwrap()[&1];
    let p10 = topo.ports_map(1).unwrap()[&0];
    let p12 = topo.ports_map(1).unwrap()[&2];
    let p21 = topo.ports_map(2).unwrap()[&1];
    let mut edge_vlan = HashMap::new();
    edge_vlan.insert(((0, p01), (1, p10)), 0);
    edge_vlan.insert(((1, p10), (0, p01)), 0);
    edge_vlan.insert(((1, p12), (2, p21)), 0);
    edge_vlan.insert(((2, p21), (1, p12)), 0);

    (slice, policy, edge_vlan)
}

#[test]
fn scenario_shared_link_becomes_isolated_with_distinct_per_edge_tags() {
    let (slice_a, policy_a, mut edge_vlan_a) = linear3_slice((10, 11));
    let (slice_b, policy_b, mut edge_vlan_b) = linear3_slice((20, 21));

    // Both slices traverse the same physical middle link 0-1-2. With the SAME tag on that link,
    // the verifier should find a shared-io witness: nothing distinguishes their traffic in transit.
    for v in edge_vlan_a.values_mut() {
        *v = 9;
    }
    for v in edge_vlan_b.values_mut() {
        *v = 9;
    }
    let same_tag_a = edge::compile_slice(&slice_a, &policy_a, &edge_vlan_a).unwrap();
    let same_tag_b = edge::compile_slice(&slice_b, &policy_b, &edge_vlan_b).unwrap();
    assert!(sat::shared_io(&slice_a.physical_topology, &same_tag_a, &same_tag_b, None).unwrap().is_some());

    // With edge-optimal distinct tags, the compiled policies no longer hand packets off to each
    // other at the shared link.
    for v in edge_vlan_a.values_mut() {
        *v = 1;
    }
    for v in edge_vlan_b.values_mut() {
        *v = 2;
    }
    let distinct_a = edge::compile_slice(&slice_a, &policy_a, &edge_vlan_a).unwrap();
    let distinct_b = edge::compile_slice(&slice_b, &policy_b, &edge_vlan_b).unwrap();
    assert!(sat::isolated(&slice_a.physical_topology, &distinct_a, &distinct_b, None).unwrap());
}

// -- Scenario 6: a small ring of four switches (K4-like connectivity is overkill for the hand- ---
// -- built topology here; four switches in a ring with cross-links at opposite corners already ---
// -- gives every switch more than one neighbor) carrying four single-hop slices, each pinned to --
// -- a different switch, stay mutually isolated after a per-edge compile. -------------------------

#[test]
fn scenario_four_slices_on_a_shared_ring_stay_mutually_isolated() {
    let mut physical = Topology::new();
    for s in 0..4u64 {
        physical.add_switch(s).unwrap();
    }
    physical.add_link(0, 1).unwrap();
    physical.add_link(1, 2).unwrap();
    physical.add_link(2, 3).unwrap();
    physical.add_link(3, 0).unwrap();
    physical.add_link(0, 2).unwrap();
    physical.finalize().unwrap();

    // Four independent pass-through slices, one per switch, each with its own host.
    let mut compiled = Vec::new();
    for switch in 0..4u64 {
        let host = 100 + switch;
        let mut logical = Topology::new();
        logical.add_switch(switch).unwrap();
        logical.add_host(host).unwrap();
        logical.add_link(switch, host).unwrap();
        logical.finalize().unwrap();

        let ext = external_port(&logical, switch, host);
        let switch_map: HashMap<u64, u64> = std::iter::once((switch, switch)).collect();
        let port_map: HashMap<(u64, u64), (u64, u64)> =
            std::iter::once(((switch, ext), (switch, ext))).collect();
        let mut edge_policy = HashMap::new();
        edge_policy.insert((switch, ext), Predicate::Top);
        let slice =
            Slice::new(logical, physical.clone(), switch_map, port_map, edge_policy, false).unwrap();
        let policy = Policy::primitive(inport(switch, vec![ext]), vec![forward(switch, vec![ext])]);
        compiled.push(global::compile_slice(&slice, &policy, switch + 1).unwrap());
    }

    for i in 0..compiled.len() {
        for j in (i + 1)..compiled.len() {
            assert!(sat::isolated(&physical, &compiled[i], &compiled[j], None).unwrap());
        }
    }
}

// -- Compiler-correctness property: the global compiler's output simulates, and is simulated by, -
// -- the original slice policy (modulo vlan), and never collides two packets at the same edge. ---

#[test]
fn global_compiler_output_is_a_correct_compilation() {
    let (slice, policy, _) = pass_through_slice(5, 50);
    let compiled = global::compile_slice(&slice, &policy, 3).unwrap();
    assert!(sat::compiled_correctly(&slice.physical_topology, &policy, &compiled, Field::Vlan, None).unwrap());
}
