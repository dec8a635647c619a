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

//! # Packet
//!
//! A located packet is a header field map plus a `(switch, port)` location. `0` is the wildcard
//! value on both `switch` and `port`: a header field is never stored as `0`, since absence already
//! models "unconstrained" (see [`Field`]).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The closed set of packet header fields. `Switch` and `Port` jointly denote the packet's
/// location; every other variant is ordinary packet content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Field {
    /// The switch a located packet currently sits at.
    Switch,
    /// The port a located packet currently sits at.
    Port,
    /// Ethernet source address.
    SrcMac,
    /// Ethernet destination address.
    DstMac,
    /// EtherType.
    EthType,
    /// IP source address.
    SrcIp,
    /// IP destination address.
    DstIp,
    /// The VLAN tag. Reserved by the system to carry slice identity; `0` means untagged.
    Vlan,
    /// IP protocol number.
    Protocol,
    /// Transport-layer source port.
    SrcPort,
    /// Transport-layer destination port.
    DstPort,
}

impl Field {
    /// All eleven header fields, in a fixed order (used by the SAT encoding to declare one
    /// uninterpreted function per field).
    pub const ALL: [Field; 11] = [
        Field::Switch,
        Field::Port,
        Field::SrcMac,
        Field::DstMac,
        Field::EthType,
        Field::SrcIp,
        Field::DstIp,
        Field::Vlan,
        Field::Protocol,
        Field::SrcPort,
        Field::DstPort,
    ];
}

/// A fully concrete, located packet: every field that matters for a particular test or simulation
/// step, with the rest left unconstrained (absent from the map).
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Packet(BTreeMap<Field, u64>);

impl Packet {
    /// An empty packet: every field unconstrained.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a packet from an explicit field map.
    pub fn from_fields(fields: BTreeMap<Field, u64>) -> Self {
        Self(fields)
    }

    /// Read a field's value, or `None` if it is unconstrained.
    pub fn get(&self, field: Field) -> Option<u64> {
        self.0.get(&field).copied()
    }

    /// Set a field's value, returning the previous value if any.
    pub fn set(&mut self, field: Field, value: u64) -> Option<u64> {
        self.0.insert(field, value)
    }

    /// This packet's location, defaulting unconstrained fields to the wildcard value `0`.
    pub fn location(&self) -> (u64, u64) {
        (self.get(Field::Switch).unwrap_or(0), self.get(Field::Port).unwrap_or(0))
    }

    /// A copy of this packet with `fields` overlaid (later entries win on conflicting keys).
    pub fn with_overlay(&self, fields: &BTreeMap<Field, u64>) -> Self {
        let mut out = self.0.clone();
        out.extend(fields.iter().map(|(k, v)| (*k, *v)));
        Self(out)
    }

    /// Iterate over the fields that are actually set on this packet.
    pub fn iter(&self) -> impl Iterator<Item = (Field, u64)> + '_ {
        self.0.iter().map(|(f, v)| (*f, *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_keeps_unmentioned_fields() {
        let mut p = Packet::new();
        p.set(Field::Switch, 2);
        p.set(Field::Port, 3);
        let overlay: BTreeMap<Field, u64> = [(Field::Vlan, 7)].into_iter().collect();
        let q = p.with_overlay(&overlay);
        assert_eq!(q.get(Field::Switch), Some(2));
        assert_eq!(q.get(Field::Vlan), Some(7));
    }

    #[test]
    fn location_defaults_to_wildcard() {
        let p = Packet::new();
        assert_eq!(p.location(), (0, 0));
    }
}
