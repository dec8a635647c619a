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

//! # Action
//!
//! An action fires a located packet out one or more ports on a fixed target switch, optionally
//! overlaying header fields and emitting observation labels.

use super::packet::{Field, Packet};
use crate::error::PhysicalError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// An observation label, emitted when an action fires. Allocated through a [`LabelAllocator`]
/// rather than a global counter, so that label generation stays a pure, explicit value.
pub type Label = u64;

/// Hands out fresh, strictly increasing observation labels. Replaces the `next_label` global
/// counter of the original implementation with an explicit value threaded through the compiler.
#[derive(Debug, Clone, Default)]
pub struct LabelAllocator(Label);

impl LabelAllocator {
    /// A fresh allocator starting at label `0`.
    pub fn new() -> Self {
        Self(0)
    }

    /// Hand out the next label.
    pub fn next(&mut self) -> Label {
        let label = self.0;
        self.0 += 1;
        label
    }
}

/// A forwarding action: fire a located packet, with `modify` overlaid, out each port in `ports`
/// on `switch`, emitting every label in `obs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// The switch this action's ports live on. A primitive policy only fires an action when the
    /// input packet's own `switch` field equals this value.
    pub switch: u64,
    /// Output ports. An action with no ports drops the packet (it fires, but produces nothing).
    pub ports: BTreeSet<u64>,
    /// Header fields to overlay onto the output packet.
    pub modify: BTreeMap<Field, u64>,
    /// Observation labels emitted whenever this action fires.
    pub obs: BTreeSet<Label>,
}

/// Construct a plain forwarding action (no modification, no observations) out `ports` on `switch`.
pub fn forward(switch: u64, ports: impl IntoIterator<Item = u64>) -> Action {
    Action { switch, ports: ports.into_iter().collect(), modify: BTreeMap::new(), obs: BTreeSet::new() }
}

impl Action {
    /// Apply this action's `modify` map to `packet`, returning one output located packet per
    /// output port.
    pub fn modify_packet(&self, packet: &Packet) -> Vec<(Packet, (u64, u64))> {
        let modified = packet.with_overlay(&self.modify);
        self.ports
            .iter()
            .map(|&port| {
                let mut out = modified.clone();
                out.set(Field::Switch, self.switch);
                out.set(Field::Port, port);
                (out, (self.switch, port))
            })
            .collect()
    }

    /// Rewrite this action's `switch`/`ports` to their physical counterparts.
    pub fn get_physical_rep(
        &self,
        switch_map: &std::collections::HashMap<u64, u64>,
        port_map: &std::collections::HashMap<(u64, u64), (u64, u64)>,
    ) -> Result<Action, PhysicalError> {
        let phys_switch = switch_map
            .get(&self.switch)
            .copied()
            .ok_or(PhysicalError::UnmappedSwitch { switch: self.switch })?;
        let mut phys_ports = BTreeSet::new();
        for &p in &self.ports {
            if p == 0 {
                phys_ports.insert(0);
                continue;
            }
            let (_, phys_p) = port_map
                .get(&(self.switch, p))
                .copied()
                .ok_or(PhysicalError::UnmappedPort { switch: self.switch, port: p })?;
            phys_ports.insert(phys_p);
        }
        Ok(Action { switch: phys_switch, ports: phys_ports, modify: self.modify.clone(), obs: self.obs.clone() })
    }

    /// Restrict this action's output to a single port, keeping every other field the same. Used
    /// to split a multi-port action so only the packet leaving via one specific port gets
    /// retagged/stripped, per the slice/edge compilers.
    pub fn restrict_to_port(&self, port: u64) -> Option<Action> {
        if !self.ports.contains(&port) {
            return None;
        }
        Some(Action {
            switch: self.switch,
            ports: std::iter::once(port).collect(),
            modify: self.modify.clone(),
            obs: self.obs.clone(),
        })
    }

    /// Restrict this action's output to every port except `port`.
    pub fn without_port(&self, port: u64) -> Option<Action> {
        let remaining: BTreeSet<u64> = self.ports.iter().copied().filter(|&p| p != port).collect();
        if remaining.is_empty() {
            None
        } else {
            Some(Action { switch: self.switch, ports: remaining, modify: self.modify.clone(), obs: self.obs.clone() })
        }
    }

    /// Return a copy of this action with `field` set to `value` in `modify`.
    pub fn with_modify(&self, field: Field, value: u64) -> Action {
        let mut modify = self.modify.clone();
        modify.insert(field, value);
        Action { modify, ..self.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modify_packet_overlays_fields_and_sets_location() {
        let action = forward(2, vec![1, 3]).with_modify(Field::Vlan, 7);
        let packet = Packet::new();
        let outputs = action.modify_packet(&packet);
        assert_eq!(outputs.len(), 2);
        for (pkt, loc) in &outputs {
            assert_eq!(pkt.get(Field::Vlan), Some(7));
            assert_eq!(loc.0, 2);
        }
    }

    #[test]
    fn empty_ports_drops_everything() {
        let action = Action { switch: 1, ports: BTreeSet::new(), modify: BTreeMap::new(), obs: BTreeSet::new() };
        assert!(action.modify_packet(&Packet::new()).is_empty());
    }

    #[test]
    fn restrict_to_port_keeps_only_that_port() {
        let action = forward(2, vec![1, 3]);
        let restricted = action.restrict_to_port(1).unwrap();
        assert_eq!(restricted.ports, std::iter::once(1).collect());
        assert!(action.restrict_to_port(99).is_none());
    }

    #[test]
    fn label_allocator_is_strictly_increasing() {
        let mut alloc = LabelAllocator::new();
        let a = alloc.next();
        let b = alloc.next();
        assert!(b > a);
    }
}
