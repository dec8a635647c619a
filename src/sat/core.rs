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

//! # SAT/SMT encoding
//!
//! Declares an uninterpreted `Packet` sort and, for every [`Field`], an uninterpreted function
//! `Field -> Int`. [`Encoder`] builds boolean constraints over those function applications: a
//! predicate becomes a constraint at one named packet constant, a policy a relation between an
//! input and an output packet constant.

use crate::netcore::{Action, Field, Policy, Predicate};
use crate::topology::{NodeId, PortId, Topology, TopologyError};
use std::collections::HashMap;
use z3::ast::{Ast, Bool, Dynamic, Int};
use z3::{Context, FuncDecl, Sort};

/// Builds SMT constraints over a single shared `Packet` sort and its header functions.
pub struct Encoder<'ctx> {
    ctx: &'ctx Context,
    packet_sort: Sort<'ctx>,
    headers: HashMap<Field, FuncDecl<'ctx>>,
}

impl<'ctx> Encoder<'ctx> {
    /// Declare the `Packet` sort and one uninterpreted `Field -> Int` function per header field.
    pub fn new(ctx: &'ctx Context) -> Self {
        let packet_sort = Sort::uninterpreted(ctx, "Packet".into());
        let headers = Field::ALL
            .iter()
            .map(|&field| {
                let name = format!("{:?}", field).to_lowercase();
                (field, FuncDecl::new(ctx, name, &[&packet_sort], &Sort::int(ctx)))
            })
            .collect();
        Encoder { ctx, packet_sort, headers }
    }

    /// A fresh, unconstrained packet constant.
    pub fn fresh_packet(&self, name: &str) -> Dynamic<'ctx> {
        Dynamic::fresh_const(self.ctx, name, &self.packet_sort)
    }

    /// The shared uninterpreted `Packet` sort, for callers that need to quantify their own fresh
    /// packet constants (the verifier's guarded-field relabeling).
    pub fn sort(&self) -> &Sort<'ctx> {
        &self.packet_sort
    }

    /// `field(pkt)` as a symbolic integer.
    pub fn header(&self, field: Field, pkt: &Dynamic<'ctx>) -> Int<'ctx> {
        self.headers[&field].apply(&[pkt]).as_int().expect("header functions are int-valued")
    }

    /// An integer constant equal to every non-location header being unchanged between `p_in` and
    /// `p_out`, except for the fields listed in `excluding`.
    fn equiv_modulo(&self, excluding: &[Field], a: &Dynamic<'ctx>, b: &Dynamic<'ctx>) -> Bool<'ctx> {
        let constraints: Vec<Bool> = Field::ALL
            .iter()
            .filter(|f| !excluding.contains(f))
            .map(|&f| self.header(f, a)._eq(&self.header(f, b)))
            .collect();
        nary_and(self.ctx, &constraints)
    }

    /// Build the constraint for `pred` matching `pkt`.
    pub fn match_predicate(&self, pred: &Predicate, pkt: &Dynamic<'ctx>) -> Bool<'ctx> {
        match pred {
            Predicate::Top => Bool::from_bool(self.ctx, true),
            Predicate::Bottom => Bool::from_bool(self.ctx, false),
            Predicate::Header(fields) => {
                let constraints: Vec<Bool> = fields
                    .iter()
                    .map(|(&field, &value)| {
                        self.header(field, pkt)._eq(&Int::from_u64(self.ctx, value))
                    })
                    .collect();
                nary_and(self.ctx, &constraints)
            }
            Predicate::Union(l, r) => {
                Bool::or(self.ctx, &[&self.match_predicate(l, pkt), &self.match_predicate(r, pkt)])
            }
            Predicate::Intersection(l, r) => {
                Bool::and(self.ctx, &[&self.match_predicate(l, pkt), &self.match_predicate(r, pkt)])
            }
            Predicate::Difference(l, r) => Bool::and(
                self.ctx,
                &[&self.match_predicate(l, pkt), &self.match_predicate(r, pkt).not()],
            ),
        }
    }

    /// Build the constraint for `action` turning `p_in` into `p_out`. An action with no output
    /// ports collapses to `false` (it fires, but drops).
    pub fn modify_packet(&self, action: &Action, p_in: &Dynamic<'ctx>, p_out: &Dynamic<'ctx>) -> Bool<'ctx> {
        if action.ports.is_empty() {
            return Bool::from_bool(self.ctx, false);
        }
        let mut constraints = vec![
            self.header(Field::Switch, p_in)._eq(&Int::from_u64(self.ctx, action.switch)),
            self.header(Field::Switch, p_out)._eq(&Int::from_u64(self.ctx, action.switch)),
        ];
        let port_options: Vec<Bool> = action
            .ports
            .iter()
            .map(|&p| self.header(Field::Port, p_out)._eq(&Int::from_u64(self.ctx, p)))
            .collect();
        constraints.push(nary_or(self.ctx, &port_options));
        for &field in &Field::ALL {
            if field == Field::Switch || field == Field::Port {
                continue;
            }
            if let Some(&value) = action.modify.get(&field) {
                constraints.push(self.header(field, p_out)._eq(&Int::from_u64(self.ctx, value)));
            }
        }
        let mut modified: Vec<Field> = action.modify.keys().copied().collect();
        modified.push(Field::Switch);
        modified.push(Field::Port);
        constraints.push(self.equiv_modulo(&modified, p_in, p_out));
        nary_and(self.ctx, &constraints)
    }

    /// Build the constraint for `policy` producing `p_out` from `p_in` in one hop.
    pub fn forwards(&self, policy: &Policy, p_in: &Dynamic<'ctx>, p_out: &Dynamic<'ctx>) -> Bool<'ctx> {
        match policy {
            Policy::Bottom => Bool::from_bool(self.ctx, false),
            Policy::Primitive(pred, actions) => {
                let action_constraints: Vec<Bool> =
                    actions.iter().map(|a| self.modify_packet(a, p_in, p_out)).collect();
                Bool::and(
                    self.ctx,
                    &[&self.match_predicate(pred, p_in), &nary_or(self.ctx, &action_constraints)],
                )
            }
            Policy::Union(l, r) => {
                Bool::or(self.ctx, &[&self.forwards(l, p_in, p_out), &self.forwards(r, p_in, p_out)])
            }
            Policy::Restriction(p, q) => {
                Bool::and(self.ctx, &[&self.forwards(p, p_in, p_out), &self.match_predicate(q, p_in)])
            }
        }
    }

    /// Build the constraint for `policy` emitting observation label `obs` while processing `pkt`.
    pub fn observes(&self, policy: &Policy, pkt: &Dynamic<'ctx>, obs: &Int<'ctx>) -> Bool<'ctx> {
        match policy {
            Policy::Bottom => Bool::from_bool(self.ctx, false),
            Policy::Primitive(pred, actions) => {
                let action_constraints: Vec<Bool> = actions
                    .iter()
                    .flat_map(|a| a.obs.iter().map(move |&label| (a, label)))
                    .map(|(_, label)| obs._eq(&Int::from_u64(self.ctx, label)))
                    .collect();
                Bool::and(
                    self.ctx,
                    &[&self.match_predicate(pred, pkt), &nary_or(self.ctx, &action_constraints)],
                )
            }
            Policy::Union(l, r) => {
                Bool::or(self.ctx, &[&self.observes(l, pkt, obs), &self.observes(r, pkt, obs)])
            }
            Policy::Restriction(p, q) => {
                Bool::and(self.ctx, &[&self.observes(p, pkt, obs), &self.match_predicate(q, pkt)])
            }
        }
    }

    /// Build the constraint for a packet crossing one physical link: `p_out`'s location maps to
    /// `p_in`'s location across some directed edge, and every non-location header is unchanged.
    pub fn transfer(
        &self,
        topo: &Topology,
        p_out: &Dynamic<'ctx>,
        p_in: &Dynamic<'ctx>,
    ) -> Result<Bool<'ctx>, TopologyError> {
        let mut options = Vec::new();
        for (s1, s2) in topo.edges()? {
            let p1 = topo.ports_map(s1)?[&s2];
            let p2 = topo.ports_map(s2)?[&s1];
            options.push(self.directed_transfer(s1, p1, s2, p2, p_out, p_in));
            options.push(self.directed_transfer(s2, p2, s1, p1, p_out, p_in));
        }
        let location = nary_or(self.ctx, &options);
        Ok(Bool::and(self.ctx, &[&location, &self.equiv_modulo(&[Field::Switch, Field::Port], p_out, p_in)]))
    }

    fn directed_transfer(
        &self,
        s1: NodeId,
        p1: PortId,
        s2: NodeId,
        p2: PortId,
        p_out: &Dynamic<'ctx>,
        p_in: &Dynamic<'ctx>,
    ) -> Bool<'ctx> {
        Bool::and(
            self.ctx,
            &[
                &self.header(Field::Switch, p_out)._eq(&Int::from_u64(self.ctx, s1)),
                &self.header(Field::Port, p_out)._eq(&Int::from_u64(self.ctx, p1)),
                &self.header(Field::Switch, p_in)._eq(&Int::from_u64(self.ctx, s2)),
                &self.header(Field::Port, p_in)._eq(&Int::from_u64(self.ctx, p2)),
            ],
        )
    }
}

fn nary_and<'ctx>(ctx: &'ctx Context, constraints: &[Bool<'ctx>]) -> Bool<'ctx> {
    if constraints.is_empty() {
        Bool::from_bool(ctx, true)
    } else {
        let refs: Vec<&Bool> = constraints.iter().collect();
        Bool::and(ctx, &refs)
    }
}

fn nary_or<'ctx>(ctx: &'ctx Context, constraints: &[Bool<'ctx>]) -> Bool<'ctx> {
    if constraints.is_empty() {
        Bool::from_bool(ctx, false)
    } else {
        let refs: Vec<&Bool> = constraints.iter().collect();
        Bool::or(ctx, &refs)
    }
}
