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

//! # Policy
//!
//! A policy maps a located packet to a multiset of `(packet, observation)` pairs. [`Policy::reduce`]
//! pushes every [`Policy::Restriction`] into the primitives it guards (via intersection) and
//! eliminates it, leaving a policy built only from `Bottom`/`Primitive`/`Union`.

use super::action::Action;
use super::predicate::Predicate;
use crate::error::PhysicalError;
use crate::stopper::{check_cooperative, Stopper, NODE_BUDGET};
use std::cell::Cell;

/// A static forwarding program: a function from located packets to the actions it fires.
#[derive(Debug, Clone, PartialEq)]
pub enum Policy {
    /// Drops every packet.
    Bottom,
    /// Fires every action in the list when `predicate` matches the input location and content.
    Primitive(Predicate, Vec<Action>),
    /// The union (combined output) of two policies.
    Union(Box<Policy>, Box<Policy>),
    /// `policy`, but only where `predicate` additionally matches the input.
    Restriction(Box<Policy>, Predicate),
}

impl Policy {
    /// Construct a `Primitive` policy over `predicate` and `actions`.
    pub fn primitive(predicate: Predicate, actions: Vec<Action>) -> Policy {
        Policy::Primitive(predicate, actions)
    }

    /// `self | other` as a `Union` node (not reduced).
    pub fn union(self, other: Policy) -> Policy {
        Policy::Union(Box::new(self), Box::new(other))
    }

    /// `self % predicate` as a `Restriction` node (not reduced).
    pub fn restrict(self, predicate: Predicate) -> Policy {
        Policy::Restriction(Box::new(self), predicate)
    }

    /// Push `predicate` into every primitive of this policy via intersection, eliminating any
    /// `Restriction` this policy itself contains. This is the `restrict` helper `reduce` calls to
    /// discharge `Restriction` nodes; it does not recurse through an outer `Restriction` on the
    /// receiver (the caller handles that by calling `restrict` on the inner policy).
    pub fn restricted(&self, predicate: &Predicate) -> Policy {
        match self {
            Policy::Bottom => Policy::Bottom,
            Policy::Primitive(p, actions) => {
                Policy::Primitive(p.clone().intersection(predicate.clone()), actions.clone())
            }
            Policy::Union(l, r) => Policy::Union(
                Box::new(l.restricted(predicate)),
                Box::new(r.restricted(predicate)),
            ),
            Policy::Restriction(p, q) => {
                Policy::Restriction(Box::new(p.restricted(predicate)), q.clone())
            }
        }
    }

    /// Normalize this policy to a fixed point: eliminate `Restriction`, collapse `Primitive([])`
    /// and `Primitive(Bottom, _)` and absorb `Bottom` in `Union`, reducing every predicate in the
    /// process.
    ///
    /// `stop`, if given, is polled roughly every [`NODE_BUDGET`] rewrite nodes; once it signals a
    /// stop, the fixed-point loop returns whatever has been rewritten so far instead of
    /// continuing to completion. Pass `None` to always run to completion.
    pub fn reduce(&self, stop: Option<&Stopper>) -> Policy {
        let budget = Cell::new(NODE_BUDGET);
        let mut current = self.clone();
        loop {
            if check_cooperative(stop, &budget) {
                return current;
            }
            let next = current.reduce_step(stop, &budget);
            if next == current {
                return next;
            }
            current = next;
        }
    }

    fn reduce_step(&self, stop: Option<&Stopper>, budget: &Cell<usize>) -> Policy {
        if check_cooperative(stop, budget) {
            return self.clone();
        }
        match self {
            Policy::Bottom => Policy::Bottom,
            Policy::Primitive(pred, actions) => {
                let pred = pred.reduce(stop);
                if actions.is_empty() || pred == Predicate::Bottom {
                    Policy::Bottom
                } else {
                    Policy::Primitive(pred, actions.clone())
                }
            }
            Policy::Union(l, r) => {
                let l = l.reduce_step(stop, budget);
                let r = r.reduce_step(stop, budget);
                match (l, r) {
                    (Policy::Bottom, x) | (x, Policy::Bottom) => x,
                    (l, r) => Policy::Union(Box::new(l), Box::new(r)),
                }
            }
            Policy::Restriction(p, q) => p.restricted(&q.reduce(stop)).reduce_step(stop, budget),
        }
    }

    /// Rewrite every logical header/action to its physical counterpart via the slice's maps.
    pub fn get_physical_rep(
        &self,
        switch_map: &std::collections::HashMap<u64, u64>,
        port_map: &std::collections::HashMap<(u64, u64), (u64, u64)>,
    ) -> Result<Policy, PhysicalError> {
        match self {
            Policy::Bottom => Ok(Policy::Bottom),
            Policy::Primitive(pred, actions) => {
                let pred = pred.get_physical_predicate(switch_map, port_map)?;
                let actions = actions
                    .iter()
                    .map(|a| a.get_physical_rep(switch_map, port_map))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Policy::Primitive(pred, actions))
            }
            Policy::Union(l, r) => Ok(Policy::Union(
                Box::new(l.get_physical_rep(switch_map, port_map)?),
                Box::new(r.get_physical_rep(switch_map, port_map)?),
            )),
            Policy::Restriction(p, q) => Ok(Policy::Restriction(
                Box::new(p.get_physical_rep(switch_map, port_map)?),
                q.get_physical_predicate(switch_map, port_map)?,
            )),
        }
    }

    /// Apply `f` to every action of every `Primitive` in this policy, leaving predicates and tree
    /// shape untouched. Used by the slice compilers to tag every outgoing action with a VLAN value
    /// on ingress.
    pub fn map_actions(&self, f: &dyn Fn(&Action) -> Action) -> Policy {
        match self {
            Policy::Bottom => Policy::Bottom,
            Policy::Primitive(p, actions) => {
                Policy::Primitive(p.clone(), actions.iter().map(|a| f(a)).collect())
            }
            Policy::Union(l, r) => {
                Policy::Union(Box::new(l.map_actions(f)), Box::new(r.map_actions(f)))
            }
            Policy::Restriction(p, q) => Policy::Restriction(Box::new(p.map_actions(f)), q.clone()),
        }
    }

    /// Rewrite the field `field` to `value` only on the sub-action that leaves `(switch, port)`,
    /// splitting any action that also forwards out other ports so the rest keep their original
    /// fields. Used by the slice/edge compilers to strip or retag a VLAN value on one specific
    /// egress port without touching a multi-port action's other outputs.
    pub fn retag_on_port(&self, switch: u64, port: u64, field: super::packet::Field, value: u64) -> Policy {
        match self {
            Policy::Bottom => Policy::Bottom,
            Policy::Primitive(p, actions) => {
                let mut out = Vec::new();
                for action in actions {
                    if action.switch == switch && action.ports.contains(&port) {
                        if let Some(on_port) = action.restrict_to_port(port) {
                            out.push(on_port.with_modify(field, value));
                        }
                        if let Some(rest) = action.without_port(port) {
                            out.push(rest);
                        }
                    } else {
                        out.push(action.clone());
                    }
                }
                Policy::Primitive(p.clone(), out)
            }
            Policy::Union(l, r) => Policy::Union(
                Box::new(l.retag_on_port(switch, port, field, value)),
                Box::new(r.retag_on_port(switch, port, field, value)),
            ),
            Policy::Restriction(p, q) => {
                Policy::Restriction(Box::new(p.retag_on_port(switch, port, field, value)), q.clone())
            }
        }
    }

    /// Collect every action this policy fires for the located packet `(packet, loc)`, filtering
    /// by the input location's switch (the simulator's half of the documented open-question
    /// resolution — the SAT encoding enforces the same filter via `switch(p_in) = action.switch`).
    pub fn get_actions(&self, packet: &super::packet::Packet, loc: (u64, u64)) -> Vec<Action> {
        match self {
            Policy::Bottom => Vec::new(),
            Policy::Primitive(pred, actions) => {
                if pred.matches(packet, loc) {
                    actions.iter().filter(|a| a.switch == loc.0).cloned().collect()
                } else {
                    Vec::new()
                }
            }
            Policy::Union(l, r) => {
                let mut out = l.get_actions(packet, loc);
                out.extend(r.get_actions(packet, loc));
                out
            }
            Policy::Restriction(p, q) => {
                if q.matches(packet, loc) {
                    p.get_actions(packet, loc)
                } else {
                    Vec::new()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netcore::action::forward;
    use crate::netcore::packet::{Field, Packet};
    use crate::netcore::predicate::{inport, on_port};

    #[test]
    fn primitive_with_no_actions_collapses_to_bottom() {
        let p = Policy::primitive(Predicate::Top, vec![]);
        assert_eq!(p.reduce(None), Policy::Bottom);
    }

    #[test]
    fn primitive_with_bottom_predicate_collapses() {
        let p = Policy::primitive(Predicate::Bottom, vec![forward(2, vec![1])]);
        assert_eq!(p.reduce(None), Policy::Bottom);
    }

    #[test]
    fn union_absorbs_bottom() {
        let p = Policy::primitive(inport(2, vec![2]), vec![forward(2, vec![1])]);
        let u = p.clone().union(Policy::Bottom);
        assert_eq!(u.reduce(None), p.reduce(None));
    }

    #[test]
    fn restriction_is_eliminated_by_reduce() {
        let p = Policy::primitive(Predicate::Top, vec![forward(2, vec![1])]);
        let restricted = p.restrict(on_port(2, 2));
        let reduced = restricted.reduce(None);
        assert!(!matches!(reduced, Policy::Restriction(..)));
    }

    #[test]
    fn get_actions_filters_by_input_switch() {
        let p = Policy::primitive(Predicate::Top, vec![forward(2, vec![1])]);
        let packet = Packet::new();
        assert_eq!(p.get_actions(&packet, (2, 2)).len(), 1);
        assert_eq!(p.get_actions(&packet, (5, 2)).len(), 0);
    }

    #[test]
    fn reduce_is_deterministic_and_idempotent() {
        let p = Policy::primitive(inport(2, vec![1, 2]), vec![forward(2, vec![3])])
            .union(Policy::Bottom)
            .restrict(Predicate::Header(
                [(Field::Vlan, 0)].into_iter().collect(),
            ));
        let once = p.reduce(None);
        let twice = once.reduce(None);
        assert_eq!(once, twice);
    }
}
