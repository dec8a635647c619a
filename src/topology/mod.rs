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

//! # Topology
//!
//! The physical (and logical) switch topology shared by all slices, mirroring the role
//! `snowcap::netsim::Network` plays for its own IGP graph: the interesting algorithms (compilation,
//! verification) live elsewhere and only consume the small surface exposed here (`switches`,
//! `hosts`, `nodes`, `edges`, per-node port maps, `subgraph`, `finalize`).
//!
//! A topology is *built* by adding switches, hosts and links, then [`Topology::finalize`] assigns
//! local port numbers and freezes it. Port 0 is reserved: it never denotes a real switch port, and
//! is used by [`crate::netcore`] as the wildcard location value.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;

/// Identifier for a switch or host, shared by both logical and physical topologies.
pub type NodeId = u64;
/// A local port number on a switch. `0` is reserved as the wildcard/end-host marker.
pub type PortId = u64;

/// Errors raised while building, finalizing, or querying a [`Topology`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopologyError {
    /// A node id was added twice.
    #[error("node {0} was already added to this topology")]
    DuplicateNode(NodeId),
    /// A link end isn't a known node.
    #[error("node {0} is not part of this topology")]
    UnknownNode(NodeId),
    /// An operation that requires a finalized topology was called before `finalize`.
    #[error("topology has not been finalized yet")]
    NotFinalized,
    /// `finalize` was called twice.
    #[error("topology was already finalized")]
    AlreadyFinalized,
    /// A query referenced a port that does not exist on the given node.
    #[error("node {0} has no port {1}")]
    UnknownPort(NodeId, PortId),
}

#[derive(Debug, Clone, Default)]
struct FinalizedPorts {
    /// node -> local_port -> (neighbor, their_port)
    port: HashMap<NodeId, BTreeMap<PortId, (NodeId, PortId)>>,
    /// node -> neighbor -> local_port (inverse of `port`)
    ports: HashMap<NodeId, HashMap<NodeId, PortId>>,
}

/// The shared switch topology: switches, hosts, and the links between them.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    switches: BTreeSet<NodeId>,
    hosts: BTreeSet<NodeId>,
    links: Vec<(NodeId, NodeId)>,
    finalized: Option<FinalizedPorts>,
}

impl Topology {
    /// Create an empty, unfinalized topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a switch node. Errors if `id` was already added (as either a switch or a host).
    pub fn add_switch(&mut self, id: NodeId) -> Result<(), TopologyError> {
        self.check_new(id)?;
        self.switches.insert(id);
        Ok(())
    }

    /// Add a host node. Errors if `id` was already added (as either a switch or a host).
    pub fn add_host(&mut self, id: NodeId) -> Result<(), TopologyError> {
        self.check_new(id)?;
        self.hosts.insert(id);
        Ok(())
    }

    fn check_new(&self, id: NodeId) -> Result<(), TopologyError> {
        if self.switches.contains(&id) || self.hosts.contains(&id) {
            Err(TopologyError::DuplicateNode(id))
        } else {
            Ok(())
        }
    }

    /// Add an undirected link between two already-added nodes. Port numbers are assigned later,
    /// by [`Topology::finalize`].
    pub fn add_link(&mut self, a: NodeId, b: NodeId) -> Result<(), TopologyError> {
        if !self.switches.contains(&a) && !self.hosts.contains(&a) {
            return Err(TopologyError::UnknownNode(a));
        }
        if !self.switches.contains(&b) && !self.hosts.contains(&b) {
            return Err(TopologyError::UnknownNode(b));
        }
        self.links.push((a, b));
        Ok(())
    }

    /// Assign local port numbers to every switch-incident link end, in link-insertion order, and
    /// freeze the topology. Host-facing neighbor entries record `their_port == 0`, since hosts do
    /// not have numbered ports in this model.
    pub fn finalize(&mut self) -> Result<(), TopologyError> {
        if self.finalized.is_some() {
            return Err(TopologyError::AlreadyFinalized);
        }
        let mut next_port: HashMap<NodeId, PortId> = HashMap::new();
        let mut port: HashMap<NodeId, BTreeMap<PortId, (NodeId, PortId)>> = HashMap::new();
        let mut ports: HashMap<NodeId, HashMap<NodeId, PortId>> = HashMap::new();

        // First pass: assign each switch end of each link the next free local port number.
        let mut assigned: Vec<(NodeId, PortId, NodeId)> = Vec::new();
        for &(a, b) in &self.links {
            if self.switches.contains(&a) {
                let p = *next_port.entry(a).or_insert(1);
                next_port.insert(a, p + 1);
                assigned.push((a, p, b));
            }
            if self.switches.contains(&b) {
                let p = *next_port.entry(b).or_insert(1);
                next_port.insert(b, p + 1);
                assigned.push((b, p, a));
            }
        }

        // Second pass: now that both ends (if both are switches) have their own local port
        // number, fill in `their_port` for each direction.
        let local_port_of = |node: NodeId, peer: NodeId, assigned: &[(NodeId, PortId, NodeId)]| {
            assigned
                .iter()
                .find(|(n, _, p)| *n == node && *p == peer)
                .map(|(_, port, _)| *port)
        };
        for &(node, local, peer) in &assigned {
            let their_port = if self.switches.contains(&peer) {
                local_port_of(peer, node, &assigned).unwrap_or(0)
            } else {
                0
            };
            port.entry(node).or_default().insert(local, (peer, their_port));
            ports.entry(node).or_default().insert(peer, local);
        }

        self.finalized = Some(FinalizedPorts { port, ports });
        Ok(())
    }

    fn finalized(&self) -> Result<&FinalizedPorts, TopologyError> {
        self.finalized.as_ref().ok_or(TopologyError::NotFinalized)
    }

    /// All switch node ids.
    pub fn switches(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.switches.iter().copied()
    }

    /// All host node ids.
    pub fn hosts(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.hosts.iter().copied()
    }

    /// All node ids (switches and hosts).
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.switches.iter().chain(self.hosts.iter()).copied()
    }

    /// `true` if `id` is a switch (as opposed to a host, or unknown).
    pub fn is_switch(&self, id: NodeId) -> bool {
        self.switches.contains(&id)
    }

    /// Each undirected link between two switches, once per edge (`a < b`).
    pub fn edges(&self) -> Result<Vec<(NodeId, NodeId)>, TopologyError> {
        self.finalized()?;
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for &(a, b) in &self.links {
            if self.switches.contains(&a) && self.switches.contains(&b) {
                let key = if a < b { (a, b) } else { (b, a) };
                if seen.insert(key) {
                    out.push(key);
                }
            }
        }
        Ok(out)
    }

    /// `node[id]['port']`: local port number -> (neighbor id, neighbor's local port).
    pub fn port_map(&self, node: NodeId) -> Result<&BTreeMap<PortId, (NodeId, PortId)>, TopologyError> {
        static EMPTY: once_empty::Lazy = once_empty::Lazy::new();
        let f = self.finalized()?;
        Ok(f.port.get(&node).unwrap_or_else(|| EMPTY.get()))
    }

    /// `node[id]['ports']`: neighbor id -> local port number (the inverse of [`Topology::port_map`]).
    pub fn ports_map(&self, node: NodeId) -> Result<&HashMap<NodeId, PortId>, TopologyError> {
        static EMPTY: once_empty::LazyHash = once_empty::LazyHash::new();
        let f = self.finalized()?;
        Ok(f.ports.get(&node).unwrap_or_else(|| EMPTY.get()))
    }

    /// Resolve the neighbor reached from `(node, port)`, and the port they see us on.
    pub fn neighbor(&self, node: NodeId, port: PortId) -> Result<(NodeId, PortId), TopologyError> {
        let f = self.finalized()?;
        f.port
            .get(&node)
            .and_then(|m| m.get(&port))
            .copied()
            .ok_or(TopologyError::UnknownPort(node, port))
    }

    /// Switches with at least one external (host-facing) port.
    pub fn edge_switches(&self) -> Result<BTreeSet<NodeId>, TopologyError> {
        let f = self.finalized()?;
        Ok(f.port
            .iter()
            .filter(|(_, ports)| ports.values().any(|(peer, _)| self.hosts.contains(peer)))
            .map(|(n, _)| *n)
            .collect())
    }

    /// The external (host-facing) local ports of `switch`.
    pub fn edge_ports(&self, switch: NodeId) -> Result<Vec<PortId>, TopologyError> {
        let f = self.finalized()?;
        Ok(f.port
            .get(&switch)
            .into_iter()
            .flat_map(|m| m.iter())
            .filter(|(_, (peer, _))| self.hosts.contains(peer))
            .map(|(p, _)| *p)
            .collect())
    }

    /// The induced subgraph over `nodes`: ports not incident to a retained neighbor are dropped,
    /// but every retained port keeps its original number from the parent topology.
    pub fn subgraph(&self, nodes: &BTreeSet<NodeId>) -> Result<Topology, TopologyError> {
        let f = self.finalized()?;
        let switches: BTreeSet<NodeId> = self.switches.intersection(nodes).copied().collect();
        let hosts: BTreeSet<NodeId> = self.hosts.intersection(nodes).copied().collect();
        let links: Vec<(NodeId, NodeId)> = self
            .links
            .iter()
            .copied()
            .filter(|(a, b)| nodes.contains(a) && nodes.contains(b))
            .collect();

        let mut port: HashMap<NodeId, BTreeMap<PortId, (NodeId, PortId)>> = HashMap::new();
        let mut ports: HashMap<NodeId, HashMap<NodeId, PortId>> = HashMap::new();
        for &n in &switches {
            if let Some(m) = f.port.get(&n) {
                let trimmed: BTreeMap<PortId, (NodeId, PortId)> =
                    m.iter().filter(|(_, (peer, _))| nodes.contains(peer)).map(|(k, v)| (*k, *v)).collect();
                let trimmed_inv: HashMap<NodeId, PortId> =
                    trimmed.iter().map(|(port, (peer, _))| (*peer, *port)).collect();
                port.insert(n, trimmed);
                ports.insert(n, trimmed_inv);
            }
        }

        Ok(Topology { switches, hosts, links, finalized: Some(FinalizedPorts { port, ports }) })
    }
}

/// Tiny helper module providing a `'static` empty collection to return by reference from
/// [`Topology::port_map`]/[`Topology::ports_map`] when a node has no finalized ports, without
/// allocating on every call.
mod once_empty {
    use super::*;
    use std::sync::OnceLock;

    pub struct Lazy(OnceLock<BTreeMap<PortId, (NodeId, PortId)>>);
    impl Lazy {
        pub const fn new() -> Self {
            Self(OnceLock::new())
        }
        pub fn get(&self) -> &BTreeMap<PortId, (NodeId, PortId)> {
            self.0.get_or_init(BTreeMap::new)
        }
    }

    pub struct LazyHash(OnceLock<HashMap<NodeId, PortId>>);
    impl LazyHash {
        pub const fn new() -> Self {
            Self(OnceLock::new())
        }
        pub fn get(&self) -> &HashMap<NodeId, PortId> {
            self.0.get_or_init(HashMap::new)
        }
    }
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
    fn finalize_assigns_symmetric_ports() {
        let t = linear4();
        let (peer, their_port) = t.neighbor(1, 1).unwrap();
        assert_eq!(peer, 0);
        let (back, _) = t.neighbor(0, their_port).unwrap();
        assert_eq!(back, 1);
    }

    #[test]
    fn edges_reports_each_edge_once() {
        let t = linear4();
        let mut edges = t.edges().unwrap();
        edges.sort();
        assert_eq!(edges, vec![(0, 1), (1, 2), (2, 3)]);
    }

    #[test]
    fn subgraph_preserves_port_numbers() {
        let t = linear4();
        let keep: BTreeSet<NodeId> = [1u64, 2].iter().copied().collect();
        let sub = t.subgraph(&keep).unwrap();
        assert_eq!(sub.switches().collect::<BTreeSet<_>>(), keep);
        // port number on switch 1 towards switch 2 is unchanged from the parent topology
        let parent_port = t.ports_map(1).unwrap()[&2];
        let sub_port = sub.ports_map(1).unwrap()[&2];
        assert_eq!(parent_port, sub_port);
        // but switch 1's link to switch 0 is gone
        assert!(!sub.ports_map(1).unwrap().contains_key(&0));
    }

    #[test]
    fn duplicate_node_rejected() {
        let mut t = Topology::new();
        t.add_switch(0).unwrap();
        assert!(t.add_switch(0).is_err());
        assert!(t.add_host(0).is_err());
    }
}
