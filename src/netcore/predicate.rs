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

//! # Predicate
//!
//! A predicate denotes a set of located packets. The variants form an immutable value tree with
//! structural equality; [`Predicate::reduce`] normalizes a tree to a fixed point and
//! [`Predicate::get_physical_predicate`] rewrites virtual (logical) header values to their
//! physical counterparts.

use super::packet::{Field, Packet};
use crate::error::PhysicalError;
use crate::stopper::{check_cooperative, Stopper, NODE_BUDGET};
use std::cell::Cell;
use std::collections::BTreeMap;

#[cfg(feature = "trace-reduce")]
use log::trace;

/// A set of located packets, built from the primitive `Top`/`Bottom`/`Header` predicates and the
/// usual set combinators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Matches every located packet.
    Top,
    /// Matches no located packet.
    Bottom,
    /// Matches iff every listed field equals the given value; omitted fields are unconstrained.
    /// `Field::Switch`/`Field::Port` entries denote location, every other field packet content.
    Header(BTreeMap<Field, u64>),
    /// Union of two predicates.
    Union(Box<Predicate>, Box<Predicate>),
    /// Intersection of two predicates.
    Intersection(Box<Predicate>, Box<Predicate>),
    /// Set difference: `left` but not `right`.
    Difference(Box<Predicate>, Box<Predicate>),
}

/// Construct `Header{switch: s, port: p}` for a single port.
pub fn on_port(switch: u64, port: u64) -> Predicate {
    header([(Field::Switch, switch), (Field::Port, port)])
}

/// Construct a predicate matching packets entering `switch` on any of `ports`.
pub fn inport(switch: u64, ports: impl IntoIterator<Item = u64>) -> Predicate {
    nary_union(ports.into_iter().map(|p| on_port(switch, p)).collect())
}

/// Construct a `Header` predicate from an explicit field/value list.
pub fn header(fields: impl IntoIterator<Item = (Field, u64)>) -> Predicate {
    Predicate::Header(fields.into_iter().collect())
}

/// Fold a list of predicates with `Union`, identity `Bottom`.
pub fn nary_union(predicates: Vec<Predicate>) -> Predicate {
    predicates.into_iter().fold(Predicate::Bottom, |acc, p| acc.union(p))
}

/// Fold a list of predicates with `Intersection`, identity `Top`.
pub fn nary_intersection(predicates: Vec<Predicate>) -> Predicate {
    predicates.into_iter().fold(Predicate::Top, |acc, p| acc.intersection(p))
}

impl Predicate {
    /// `self | other` as a `Union` node (not reduced).
    pub fn union(self, other: Predicate) -> Predicate {
        Predicate::Union(Box::new(self), Box::new(other))
    }

    /// `self & other` as an `Intersection` node (not reduced).
    pub fn intersection(self, other: Predicate) -> Predicate {
        Predicate::Intersection(Box::new(self), Box::new(other))
    }

    /// `self - other` as a `Difference` node (not reduced).
    pub fn difference(self, other: Predicate) -> Predicate {
        Predicate::Difference(Box::new(self), Box::new(other))
    }

    /// Does this predicate match the located packet `(switch, port)` with content `packet`?
    pub fn matches(&self, packet: &Packet, loc: (u64, u64)) -> bool {
        match self {
            Predicate::Top => true,
            Predicate::Bottom => false,
            Predicate::Header(fields) => fields.iter().all(|(field, value)| match field {
                Field::Switch => loc.0 == *value,
                Field::Port => loc.1 == *value,
                other => packet.get(*other) == Some(*value),
            }),
            Predicate::Union(l, r) => l.matches(packet, loc) || r.matches(packet, loc),
            Predicate::Intersection(l, r) => l.matches(packet, loc) && r.matches(packet, loc),
            Predicate::Difference(l, r) => l.matches(packet, loc) && !r.matches(packet, loc),
        }
    }

    /// Normalize this predicate to a fixed point, bottom-up, applying the rewrite rules
    /// documented on the crate's algebra (constant folding, header intersection, limited
    /// distribution of intersection over union, wildcard-difference collapsing).
    ///
    /// `stop`, if given, is polled roughly every [`NODE_BUDGET`] rewrite nodes; once it signals a
    /// stop, the fixed-point loop returns whatever has been rewritten so far instead of
    /// continuing to completion. Pass `None` to always run to completion.
    pub fn reduce(&self, stop: Option<&Stopper>) -> Predicate {
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
            #[cfg(feature = "trace-reduce")]
            trace!("predicate rewrite: {:?} -> {:?}", current, next);
            current = next;
        }
    }

    fn reduce_step(&self, stop: Option<&Stopper>, budget: &Cell<usize>) -> Predicate {
        if check_cooperative(stop, budget) {
            return self.clone();
        }
        match self {
            Predicate::Top | Predicate::Bottom | Predicate::Header(_) => self.clone(),
            Predicate::Union(l, r) => {
                let l = l.reduce_step(stop, budget);
                let r = r.reduce_step(stop, budget);
                match (&l, &r) {
                    (Predicate::Top, _) | (_, Predicate::Top) => Predicate::Top,
                    (Predicate::Bottom, x) | (x, Predicate::Bottom) => x.clone(),
                    _ => Predicate::Union(Box::new(l), Box::new(r)),
                }
            }
            Predicate::Intersection(l, r) => {
                let l = l.reduce_step(stop, budget);
                let r = r.reduce_step(stop, budget);
                reduce_intersection(l, r)
            }
            Predicate::Difference(l, r) => {
                let l = l.reduce_step(stop, budget);
                let r = r.reduce_step(stop, budget);
                reduce_difference(l, r)
            }
        }
    }

    /// Rewrite every `Header` field according to `switch_map`/`port_map`, translating a logical
    /// (virtual) predicate into its physical counterpart. Fails if a `port` field is matched on a
    /// wildcard (`switch == 0`) location.
    pub fn get_physical_predicate(
        &self,
        switch_map: &std::collections::HashMap<u64, u64>,
        port_map: &std::collections::HashMap<(u64, u64), (u64, u64)>,
    ) -> Result<Predicate, PhysicalError> {
        match self {
            Predicate::Top => Ok(Predicate::Top),
            Predicate::Bottom => Ok(Predicate::Bottom),
            Predicate::Header(fields) => {
                let switch = fields.get(&Field::Switch).copied();
                let port = fields.get(&Field::Port).copied();
                let mut out = fields.clone();
                match (switch, port) {
                    (Some(0), Some(p)) => {
                        if p != 0 {
                            return Err(PhysicalError::PortOnWildcardSwitch { port: p });
                        }
                    }
                    (Some(s), Some(0)) => {
                        let phys_s = switch_map
                            .get(&s)
                            .copied()
                            .ok_or(PhysicalError::UnmappedSwitch { switch: s })?;
                        out.insert(Field::Switch, phys_s);
                    }
                    (Some(s), Some(p)) => {
                        let (_, phys_p) = port_map
                            .get(&(s, p))
                            .copied()
                            .ok_or(PhysicalError::UnmappedPort { switch: s, port: p })?;
                        let phys_s = switch_map
                            .get(&s)
                            .copied()
                            .ok_or(PhysicalError::UnmappedSwitch { switch: s })?;
                        out.insert(Field::Switch, phys_s);
                        out.insert(Field::Port, phys_p);
                    }
                    (Some(s), None) => {
                        let phys_s = switch_map
                            .get(&s)
                            .copied()
                            .ok_or(PhysicalError::UnmappedSwitch { switch: s })?;
                        out.insert(Field::Switch, phys_s);
                    }
                    _ => {}
                }
                Ok(Predicate::Header(out))
            }
            Predicate::Union(l, r) => Ok(Predicate::Union(
                Box::new(l.get_physical_predicate(switch_map, port_map)?),
                Box::new(r.get_physical_predicate(switch_map, port_map)?),
            )),
            Predicate::Intersection(l, r) => Ok(Predicate::Intersection(
                Box::new(l.get_physical_predicate(switch_map, port_map)?),
                Box::new(r.get_physical_predicate(switch_map, port_map)?),
            )),
            Predicate::Difference(l, r) => Ok(Predicate::Difference(
                Box::new(l.get_physical_predicate(switch_map, port_map)?),
                Box::new(r.get_physical_predicate(switch_map, port_map)?),
            )),
        }
    }
}

/// Combine two header field maps per-field: equal values survive, conflicting values collapse the
/// whole intersection to `Bottom`, and fields unique to either side are copied through.
fn intersect_headers(
    a: &BTreeMap<Field, u64>,
    b: &BTreeMap<Field, u64>,
) -> Option<BTreeMap<Field, u64>> {
    let mut out = a.clone();
    for (field, value) in b {
        match out.get(field) {
            Some(existing) if existing != value => return None,
            _ => {
                out.insert(*field, *value);
            }
        }
    }
    Some(out)
}

fn reduce_intersection(l: Predicate, r: Predicate) -> Predicate {
    match (l, r) {
        (Predicate::Bottom, _) | (_, Predicate::Bottom) => Predicate::Bottom,
        (Predicate::Top, x) | (x, Predicate::Top) => x,
        (Predicate::Header(a), Predicate::Header(b)) => match intersect_headers(&a, &b) {
            Some(fields) => Predicate::Header(fields),
            None => Predicate::Bottom,
        },
        // Distribute intersection over a single-level union when the other side is a Header:
        // never over two Unions, to avoid combinatorial blow-up.
        (Predicate::Union(ul, ur), h @ Predicate::Header(_)) => reduce_step_union(
            reduce_intersection(*ul, h.clone()),
            reduce_intersection(*ur, h),
        ),
        (h @ Predicate::Header(_), Predicate::Union(ul, ur)) => reduce_step_union(
            reduce_intersection(h.clone(), *ul),
            reduce_intersection(h, *ur),
        ),
        // Push a Header into a nested Intersection/Difference branch, when it doesn't increase
        // AST depth (both sub-branches are themselves Headers or already-flat constants).
        (h @ Predicate::Header(_), Predicate::Intersection(il, ir)) => {
            match (*il, *ir) {
                (Predicate::Header(a), rest) => {
                    reduce_intersection(reduce_intersection(h, Predicate::Header(a)), rest)
                }
                (rest, Predicate::Header(a)) => {
                    reduce_intersection(reduce_intersection(h, Predicate::Header(a)), rest)
                }
                (il, ir) => Predicate::Intersection(
                    Box::new(h),
                    Box::new(Predicate::Intersection(Box::new(il), Box::new(ir))),
                ),
            }
        }
        (l, r) => Predicate::Intersection(Box::new(l), Box::new(r)),
    }
}

fn reduce_step_union(l: Predicate, r: Predicate) -> Predicate {
    match (l, r) {
        (Predicate::Top, _) | (_, Predicate::Top) => Predicate::Top,
        (Predicate::Bottom, x) | (x, Predicate::Bottom) => x,
        (l, r) => Predicate::Union(Box::new(l), Box::new(r)),
    }
}

fn reduce_difference(l: Predicate, r: Predicate) -> Predicate {
    match (l, r) {
        (Predicate::Bottom, _) => Predicate::Bottom,
        (_, Predicate::Top) => Predicate::Bottom,
        (x, Predicate::Bottom) => x,
        (Predicate::Header(a), Predicate::Header(b)) => {
            // b "covers" a when every field in b is either absent from a or equal in a.
            let covers = b.iter().all(|(f, v)| a.get(f).map_or(true, |av| av == v));
            if covers {
                Predicate::Bottom
            } else {
                // Some field in b conflicts with a: b can never match what a matches.
                Predicate::Header(a)
            }
        }
        (l, r) => Predicate::Difference(Box::new(l), Box::new(r)),
    }
}
