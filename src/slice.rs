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

//! # Slice
//!
//! A [`Slice`] ties a logical (virtual) topology, a shared physical topology, and the maps
//! between them together. Construction validates every invariant up front — a `Slice` that
//! exists is guaranteed well-formed, the way `snowcap::netsim::config::Config` is validated at
//! `add`/`apply_patch` time rather than at use time.

use crate::netcore::Predicate;
use crate::topology::{NodeId, PortId, Topology};
use log::debug;
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised while constructing a [`Slice`]; every variant names the offending key so a user
/// can locate the malformed input without a debugger.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SliceError {
    /// `switch_map`'s domain does not equal the logical topology's nodes (or switches, depending
    /// on `map_end_hosts`).
    #[error("switch_map does not cover logical node {node}")]
    UnmappedSwitch {
        /// The logical node missing from `switch_map`.
        node: NodeId,
    },
    /// `port_map`'s domain does not equal the logical topology's (switch, port) pairs.
    #[error("port_map does not cover logical port ({0}, {1})")]
    UnmappedPort(NodeId, PortId),
    /// `switch_map` is not injective: two logical nodes map to the same physical node.
    #[error("switch_map is not injective: physical node {physical} is the image of more than one logical node")]
    NonInjectiveSwitchMap {
        /// The physical node two logical nodes collapsed onto.
        physical: NodeId,
    },
    /// `port_map` is not injective: two logical ports map to the same physical port.
    #[error("port_map is not injective: physical port {0:?} is the image of more than one logical port")]
    NonInjectivePortMap((NodeId, PortId)),
    /// An external (host-facing) logical port has no entry in `edge_policy`.
    #[error("edge_policy has no predicate for external port ({0}, {1})")]
    MissingEdgePolicy(NodeId, PortId),
}

/// A virtual network: a logical topology, its placement onto a shared physical topology, and the
/// admission predicate guarding each of its external (host-facing) ports.
#[derive(Debug, Clone)]
pub struct Slice {
    /// The slice's own virtual topology.
    pub logical_topology: Topology,
    /// The physical topology this slice is placed onto.
    pub physical_topology: Topology,
    /// Logical switch -> physical switch. Injective.
    pub switch_map: HashMap<NodeId, NodeId>,
    /// Logical `(switch, port)` -> physical `(switch, port)`. Injective.
    pub port_map: HashMap<(NodeId, PortId), (NodeId, PortId)>,
    /// Admission predicate for each external (host-facing) logical port.
    pub edge_policy: HashMap<(NodeId, PortId), Predicate>,
    /// Whether `switch_map` is expected to also cover end hosts (not just switches).
    pub map_end_hosts: bool,
}

impl Slice {
    /// Construct and validate a slice. Returns every invariant violation found, wrapped in the
    /// first [`SliceError`] encountered (validation stops at the first failure, mirroring the
    /// original implementation's fail-fast assertions).
    pub fn new(
        logical_topology: Topology,
        physical_topology: Topology,
        switch_map: HashMap<NodeId, NodeId>,
        port_map: HashMap<(NodeId, PortId), (NodeId, PortId)>,
        edge_policy: HashMap<(NodeId, PortId), Predicate>,
        map_end_hosts: bool,
    ) -> Result<Slice, SliceError> {
        let nodes: Vec<NodeId> = if map_end_hosts {
            logical_topology.nodes().collect()
        } else {
            logical_topology.switches().collect()
        };
        for node in &nodes {
            if !switch_map.contains_key(node) {
                return Err(SliceError::UnmappedSwitch { node: *node });
            }
        }
        assert_injective_switch(&switch_map)?;

        let mut required_ports = Vec::new();
        for switch in logical_topology.switches() {
            for port in logical_topology
                .port_map(switch)
                .map_err(|_| SliceError::UnmappedSwitch { node: switch })?
                .keys()
            {
                if *port != 0 || map_end_hosts {
                    required_ports.push((switch, *port));
                }
            }
        }
        for key in &required_ports {
            if !port_map.contains_key(key) {
                return Err(SliceError::UnmappedPort(key.0, key.1));
            }
        }
        assert_injective_port(&port_map)?;

        for switch in logical_topology
            .edge_switches()
            .map_err(|_| SliceError::UnmappedSwitch { node: 0 })?
        {
            for port in logical_topology
                .edge_ports(switch)
                .map_err(|_| SliceError::UnmappedSwitch { node: switch })?
            {
                if !edge_policy.contains_key(&(switch, port)) {
                    return Err(SliceError::MissingEdgePolicy(switch, port));
                }
            }
        }

        debug!("validated slice with {} logical switches", logical_topology.switches().count());
        Ok(Slice { logical_topology, physical_topology, switch_map, port_map, edge_policy, map_end_hosts })
    }

    /// The physical edges this slice's logical topology is mapped onto: `((s1,p1),(s2,p2))` pairs
    /// in the physical topology, oriented however the logical topology enumerated them.
    pub fn physical_edges(&self) -> Vec<((NodeId, PortId), (NodeId, PortId))> {
        let mut out = Vec::new();
        for switch in self.logical_topology.switches() {
            let ports = match self.logical_topology.port_map(switch) {
                Ok(p) => p,
                Err(_) => continue,
            };
            for (&local, &(neighbor, their_port)) in ports {
                if their_port == 0 {
                    continue;
                }
                if let (Some(&(ps1, pp1)), Some(&(ps2, pp2))) =
                    (self.port_map.get(&(switch, local)), self.port_map.get(&(neighbor, their_port)))
                {
                    out.push(((ps1, pp1), (ps2, pp2)));
                }
            }
        }
        out
    }
}

fn assert_injective_switch(map: &HashMap<NodeId, NodeId>) -> Result<(), SliceError> {
    let mut seen = std::collections::HashSet::new();
    for value in map.values() {
        if !seen.insert(*value) {
            return Err(SliceError::NonInjectiveSwitchMap { physical: *value });
        }
    }
    Ok(())
}

fn assert_injective_port(
    map: &HashMap<(NodeId, PortId), (NodeId, PortId)>,
) -> Result<(), SliceError> {
    let mut seen = std::collections::HashSet::new();
    for value in map.values() {
        if !seen.insert(*value) {
            return Err(SliceError::NonInjectivePortMap(*value));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear4() -> Topology {
        let mut t = Topology::new();
        for s in 0..4u64 {
            t.add_switch(s).unwrap();
        }
        t.add_link(0, 1).unwrap();
        t.add_link(1, 2).unwrap();
        t.add_link(2, 3).unwrap();
        t.finalize().unwrap();
        t
    }

    #[test]
    fn identity_slice_validates() {
        let topo = linear4();
        let switch_map: HashMap<NodeId, NodeId> = topo.switches().map(|s| (s, s)).collect();
        let mut port_map = HashMap::new();
        for s in topo.switches() {
            for (&local, _) in topo.port_map(s).unwrap() {
                port_map.insert((s, local), (s, local));
            }
        }
        // Linear path: switches 0 and 3 have one external port each (port 1), not present since
        // there are no hosts in this topology -- so edge_policy can be empty.
        let slice = Slice::new(topo.clone(), topo, switch_map, port_map, HashMap::new(), false);
        assert!(slice.is_ok());
    }

    #[test]
    fn missing_switch_mapping_is_rejected() {
        let topo = linear4();
        let slice = Slice::new(
            topo.clone(),
            topo,
            HashMap::new(),
            HashMap::new(),
            HashMap::new(),
            false,
        );
        assert!(matches!(slice, Err(SliceError::UnmappedSwitch { .. })));
    }

    #[test]
    fn non_injective_switch_map_is_rejected() {
        let topo = linear4();
        let switch_map: HashMap<NodeId, NodeId> = topo.switches().map(|s| (s, 0)).collect();
        let mut port_map = HashMap::new();
        for s in topo.switches() {
            for (&local, _) in topo.port_map(s).unwrap() {
                port_map.insert((s, local), (0, local));
            }
        }
        let slice = Slice::new(topo.clone(), topo, switch_map, port_map, HashMap::new(), false);
        assert!(matches!(slice, Err(SliceError::NonInjectiveSwitchMap { .. })));
    }

    #[test]
    fn missing_edge_policy_is_rejected() {
        let mut topo = Topology::new();
        topo.add_switch(0).unwrap();
        topo.add_host(1).unwrap();
        topo.add_link(0, 1).unwrap();
        topo.finalize().unwrap();
        let switch_map: HashMap<NodeId, NodeId> = std::iter::once((0u64, 0u64)).collect();
        let mut port_map = HashMap::new();
        for (&local, _) in topo.port_map(0).unwrap() {
            port_map.insert((0, local), (0, local));
        }
        let slice = Slice::new(topo.clone(), topo, switch_map, port_map, HashMap::new(), false);
        assert!(matches!(slice, Err(SliceError::MissingEdgePolicy(..))));
    }
}
