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

//! # Verifier queries
//!
//! Every query here is phrased as "does a counterexample exist": it asserts a SAT formula whose
//! models are exactly the witnesses of the property's *violation*, and returns
//! `Ok(Some(witness))` when one is found, `Ok(None)` when the solver proves none exists, and
//! `Err` when the solver can't decide either way within its configured resources. Treat
//! `Ok(None)` as "property holds" and never collapse `Err(Indeterminate)` into either outcome.

use super::core::Encoder;
use crate::error::SolverError;
use crate::netcore::{Field, Policy};
use crate::topology::Topology;
use std::collections::BTreeMap;
use std::fmt;
use z3::ast::{Ast, Bool, Dynamic, Int};
use z3::{Config, Context, Model, SatResult, Solver};

/// A concrete counterexample: the named packets the solver found, with their header values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Witness {
    /// `(name, fields)` for every packet constant named in the query, in query order.
    pub packets: Vec<(&'static str, BTreeMap<Field, u64>)>,
}

impl fmt::Display for Witness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, fields) in &self.packets {
            writeln!(f, "{}: {:?}", name, fields)?;
        }
        Ok(())
    }
}

fn explain(encoder: &Encoder, model: &Model, pkt: &Dynamic) -> BTreeMap<Field, u64> {
    let mut out = BTreeMap::new();
    for &field in &Field::ALL {
        let expr = encoder.header(field, pkt);
        if let Some(value) = model.eval(&expr, true).and_then(|v| v.as_i64()) {
            if value >= 0 {
                out.insert(field, value as u64);
            }
        }
    }
    out
}

/// Build a `Config` with `"timeout"` (milliseconds) set when `timeout_ms` is given. The solver
/// then surfaces a deadline it couldn't decide within as `SatResult::Unknown`, which [`decide`]
/// turns into [`SolverError::Indeterminate`] rather than blocking forever.
fn configured(timeout_ms: Option<u32>) -> Config {
    let mut cfg = Config::new();
    if let Some(ms) = timeout_ms {
        cfg.set_param_value("timeout", &ms.to_string());
    }
    cfg
}

/// Assert `constraint` and decide it: `Sat` yields a witness built from `named`,
/// `Unsat` yields `None`, `Unknown` surfaces as [`SolverError::Indeterminate`].
fn decide(
    ctx: &Context,
    encoder: &Encoder,
    constraint: &Bool,
    named: &[(&'static str, Dynamic)],
    context: &'static str,
) -> Result<Option<Witness>, SolverError> {
    let solver = Solver::new(ctx);
    solver.assert(constraint);
    match solver.check() {
        SatResult::Unsat => Ok(None),
        SatResult::Unknown => Err(SolverError::Indeterminate { context }),
        SatResult::Sat => {
            let model = solver.get_model().expect("sat result always has a model");
            let packets = named.iter().map(|(name, pkt)| (*name, explain(encoder, &model, pkt))).collect();
            Ok(Some(Witness { packets }))
        }
    }
}

/// Does `policy` forward at least one located packet somewhere? `timeout_ms`, if given, bounds
/// the solver call; exceeding it surfaces as [`SolverError::Indeterminate`].
pub fn not_empty(policy: &Policy, timeout_ms: Option<u32>) -> Result<Option<Witness>, SolverError> {
    let cfg = configured(timeout_ms);
    let ctx = Context::new(&cfg);
    let enc = Encoder::new(&ctx);
    let p_in = enc.fresh_packet("p_in");
    let p_out = enc.fresh_packet("p_out");
    let constraint = enc.forwards(policy, &p_in, &p_out);
    decide(&ctx, &enc, &constraint, &[("p_in", p_in.clone()), ("p_out", p_out.clone())], "not_empty")
}

/// The spec.md-documented under-approximation: `left` and `right` agree on every forwarding and
/// observation *except* where a guarded field's value can hide a real difference. Prefer
/// [`simulates_forwards`] + [`simulates_observes`] + [`simulates_forwards2`] + [`one_per_edge`]
/// for a correctness judgment that doesn't have this hole.
pub fn equivalent(
    left: &Policy,
    right: &Policy,
    timeout_ms: Option<u32>,
) -> Result<Option<Witness>, SolverError> {
    let cfg = configured(timeout_ms);
    let ctx = Context::new(&cfg);
    let enc = Encoder::new(&ctx);
    let p = enc.fresh_packet("p");
    let pp = enc.fresh_packet("pp");
    // Violation: some forwarding one side performs is not mirrored by the other.
    let left_only = Bool::and(&ctx, &[&enc.forwards(left, &p, &pp), &enc.forwards(right, &p, &pp).not()]);
    let right_only = Bool::and(&ctx, &[&enc.forwards(right, &p, &pp), &enc.forwards(left, &p, &pp).not()]);
    let constraint = Bool::or(&ctx, &[&left_only, &right_only]);
    decide(&ctx, &enc, &constraint, &[("p", p.clone()), ("pp", pp.clone())], "equivalent")
}

/// `base` with `field` replaced by the bound variable `value`, every other header held equal to
/// `base`. Used to existentially quantify away a guarded field (e.g. `vlan`) before comparing two
/// policies, so a difference in only that field is not reported as a real divergence.
fn relabeled<'ctx>(
    enc: &Encoder<'ctx>,
    ctx: &'ctx Context,
    base: &Dynamic<'ctx>,
    field: Field,
    relabel: &Dynamic<'ctx>,
    value: &Int<'ctx>,
) -> Bool<'ctx> {
    let mut constraints = vec![enc.header(field, relabel)._eq(value)];
    for &f in &Field::ALL {
        if f != field {
            constraints.push(enc.header(f, base)._eq(&enc.header(f, relabel)));
        }
    }
    let refs: Vec<&Bool> = constraints.iter().collect();
    Bool::and(ctx, &refs)
}

/// Does `a` forward some packet that `b` fails to forward anywhere, for any relabeling of
/// `field`? (The one-hop half of [`simulates`].)
pub fn simulates_forwards(
    a: &Policy,
    b: &Policy,
    field: Field,
    timeout_ms: Option<u32>,
) -> Result<Option<Witness>, SolverError> {
    let cfg = configured(timeout_ms);
    let ctx = Context::new(&cfg);
    let enc = Encoder::new(&ctx);
    let p = enc.fresh_packet("p");
    let pp = enc.fresh_packet("pp");
    let a_forwards = enc.forwards(a, &p, &pp);

    let p2 = Dynamic::fresh_const(&ctx, "p2", enc.sort());
    let pp2 = Dynamic::fresh_const(&ctx, "pp2", enc.sort());
    let v = Int::fresh_const(&ctx, "v");
    let vv = Int::fresh_const(&ctx, "vv");
    let guard = Bool::and(
        &ctx,
        &[&relabeled(&enc, &ctx, &p, field, &p2, &v), &relabeled(&enc, &ctx, &pp, field, &pp2, &vv)],
    );
    let body = guard.implies(&enc.forwards(b, &p2, &pp2).not());
    let forall = z3::ast::forall_const(&ctx, &[&p2, &pp2, &v, &vv], &[], &body);

    let constraint = Bool::and(&ctx, &[&a_forwards, &forall]);
    decide(&ctx, &enc, &constraint, &[("p", p.clone()), ("pp", pp.clone())], "simulates_forwards")
}

/// Does `a` observe some `(packet, label)` pair that `b` fails to observe for any relabeling of
/// `field`? (The observation half of [`simulates`].)
pub fn simulates_observes(
    a: &Policy,
    b: &Policy,
    field: Field,
    timeout_ms: Option<u32>,
) -> Result<Option<Witness>, SolverError> {
    let cfg = configured(timeout_ms);
    let ctx = Context::new(&cfg);
    let enc = Encoder::new(&ctx);
    let p = enc.fresh_packet("p");
    let label = Int::fresh_const(&ctx, "label");
    let a_observes = enc.observes(a, &p, &label);

    let p2 = Dynamic::fresh_const(&ctx, "p2", enc.sort());
    let v = Int::fresh_const(&ctx, "v");
    let guard = relabeled(&enc, &ctx, &p, field, &p2, &v);
    let body = guard.implies(&enc.observes(b, &p2, &label).not());
    let forall = z3::ast::forall_const(&ctx, &[&p2, &v], &[], &body);

    let constraint = Bool::and(&ctx, &[&a_observes, &forall]);
    decide(&ctx, &enc, &constraint, &[("p", p.clone())], "simulates_observes")
}

/// The two-hop extension of [`simulates_forwards`]: does `a` forward `p` to `pp`, then (after one
/// physical hop) forward the result `q` to `qq`, in a way `b` cannot replicate under any
/// relabeling of `field`?
pub fn simulates_forwards2(
    topo: &Topology,
    a: &Policy,
    b: &Policy,
    field: Field,
    timeout_ms: Option<u32>,
) -> Result<Option<Witness>, SolverError> {
    let cfg = configured(timeout_ms);
    let ctx = Context::new(&cfg);
    let enc = Encoder::new(&ctx);
    let p = enc.fresh_packet("p");
    let pp = enc.fresh_packet("pp");
    let q = enc.fresh_packet("q");
    let qq = enc.fresh_packet("qq");

    let first_hop = Bool::and(&ctx, &[&enc.forwards(a, &p, &pp), &enc.transfer(topo, &pp, &q)?]);
    let second_hop = enc.forwards(a, &q, &qq);
    let path = Bool::and(&ctx, &[&first_hop, &second_hop]);

    let p2 = Dynamic::fresh_const(&ctx, "p2", enc.sort());
    let pp2 = Dynamic::fresh_const(&ctx, "pp2", enc.sort());
    let q2 = Dynamic::fresh_const(&ctx, "q2", enc.sort());
    let qq2 = Dynamic::fresh_const(&ctx, "qq2", enc.sort());
    let v = Int::fresh_const(&ctx, "v");
    let vv = Int::fresh_const(&ctx, "vv");
    let vvv = Int::fresh_const(&ctx, "vvv");
    // `vv` is shared between `pp` and `q`: a physical hop preserves every non-location header.
    let guard = Bool::and(
        &ctx,
        &[
            &relabeled(&enc, &ctx, &p, field, &p2, &v),
            &relabeled(&enc, &ctx, &pp, field, &pp2, &vv),
            &relabeled(&enc, &ctx, &q, field, &q2, &vv),
            &relabeled(&enc, &ctx, &qq, field, &qq2, &vvv),
        ],
    );
    let b_replicates = Bool::and(&ctx, &[&enc.forwards(b, &p2, &pp2), &enc.forwards(b, &q2, &qq2)]);
    let body = guard.implies(&b_replicates.not());
    let forall = z3::ast::forall_const(&ctx, &[&p2, &pp2, &q2, &qq2, &v, &vv, &vvv], &[], &body);

    let constraint = Bool::and(&ctx, &[&path, &forall]);
    decide(
        &ctx,
        &enc,
        &constraint,
        &[("p", p.clone()), ("pp", pp.clone()), ("q", q.clone()), ("qq", qq.clone())],
        "simulates_forwards2",
    )
}

/// `a` simulates `b` w.r.t. `field`: every one-hop forwarding, every observation, and every
/// two-hop forwarding `a` performs is replicated by `b` modulo `field`.
pub fn simulates(
    topo: &Topology,
    a: &Policy,
    b: &Policy,
    field: Field,
    timeout_ms: Option<u32>,
) -> Result<bool, SolverError> {
    Ok(simulates_forwards(a, b, field, timeout_ms)?.is_none()
        && simulates_observes(a, b, field, timeout_ms)?.is_none()
        && simulates_forwards2(topo, a, b, field, timeout_ms)?.is_none())
}

/// Does `policy` forward two located packets to the same physical `(switch, port)` with distinct
/// `field` values? A compiled per-edge policy that fails this is ambiguous: a switch can't tell
/// which slice's tag to assign just from the output location.
pub fn one_per_edge(
    policy: &Policy,
    field: Field,
    timeout_ms: Option<u32>,
) -> Result<Option<Witness>, SolverError> {
    let cfg = configured(timeout_ms);
    let ctx = Context::new(&cfg);
    let enc = Encoder::new(&ctx);
    let p = enc.fresh_packet("p");
    let pp = enc.fresh_packet("pp");
    let q = enc.fresh_packet("q");
    let qq = enc.fresh_packet("qq");

    let constraint = Bool::and(
        &ctx,
        &[
            &enc.forwards(policy, &p, &pp),
            &enc.forwards(policy, &q, &qq),
            &enc.header(Field::Switch, &pp)._eq(&enc.header(Field::Switch, &qq)),
            &enc.header(Field::Port, &pp)._eq(&enc.header(Field::Port, &qq)),
            &enc.header(field, &pp)._eq(&enc.header(field, &qq)).not(),
        ],
    );
    decide(
        &ctx,
        &enc,
        &constraint,
        &[("p", p.clone()), ("pp", pp.clone()), ("q", q.clone()), ("qq", qq.clone())],
        "one_per_edge",
    )
}

/// `compiled` is a correct compilation of `orig`: both simulate each other modulo `field`, and
/// `compiled` never collides two slices' packets onto the same physical output with distinct
/// `field` values.
pub fn compiled_correctly(
    topo: &Topology,
    orig: &Policy,
    compiled: &Policy,
    field: Field,
    timeout_ms: Option<u32>,
) -> Result<bool, SolverError> {
    Ok(simulates(topo, orig, compiled, field, timeout_ms)?
        && simulates(topo, compiled, orig, field, timeout_ms)?
        && one_per_edge(compiled, field, timeout_ms)?.is_none())
}

/// Does a packet leaving `a` reach, after exactly one physical hop, an input `b` forwards from?
/// This is the core one-hop isolation witness: direct I/O leakage from one slice into another.
pub fn shared_io(
    topo: &Topology,
    a: &Policy,
    b: &Policy,
    timeout_ms: Option<u32>,
) -> Result<Option<Witness>, SolverError> {
    let cfg = configured(timeout_ms);
    let ctx = Context::new(&cfg);
    let enc = Encoder::new(&ctx);
    let p1 = enc.fresh_packet("p1");
    let p2 = enc.fresh_packet("p2");
    let p3 = enc.fresh_packet("p3");
    let p4 = enc.fresh_packet("p4");
    let constraint = Bool::and(
        &ctx,
        &[&enc.forwards(a, &p1, &p2), &enc.transfer(topo, &p2, &p3)?, &enc.forwards(b, &p3, &p4)],
    );
    decide(
        &ctx,
        &enc,
        &constraint,
        &[("p1", p1.clone()), ("p2", p2.clone()), ("p3", p3.clone()), ("p4", p4.clone())],
        "shared_io",
    )
}

/// Alias for [`shared_io`]: the SAT model witnessing a leak from `a` into `b`.
pub fn isolated_model(
    topo: &Topology,
    a: &Policy,
    b: &Policy,
    timeout_ms: Option<u32>,
) -> Result<Option<Witness>, SolverError> {
    shared_io(topo, a, b, timeout_ms)
}

/// Are `a` and `b` isolated from each other (no one-hop I/O leak in either direction)?
pub fn isolated(
    topo: &Topology,
    a: &Policy,
    b: &Policy,
    timeout_ms: Option<u32>,
) -> Result<bool, SolverError> {
    Ok(shared_io(topo, a, b, timeout_ms)?.is_none() && shared_io(topo, b, a, timeout_ms)?.is_none())
}

/// A human-readable explanation of why `a` and `b` are not isolated, or `None` if they are.
pub fn isolated_diagnostic(
    topo: &Topology,
    a: &Policy,
    b: &Policy,
    timeout_ms: Option<u32>,
) -> Result<Option<String>, SolverError> {
    if let Some(w) = shared_io(topo, a, b, timeout_ms)? {
        return Ok(Some(format!("a forwards into b's input:\n{}", w)));
    }
    if let Some(w) = shared_io(topo, b, a, timeout_ms)? {
        return Ok(Some(format!("b forwards into a's input:\n{}", w)));
    }
    Ok(None)
}

/// Does the same located input packet get forwarded by both `a` and `b`?
pub fn shared_inputs(
    a: &Policy,
    b: &Policy,
    timeout_ms: Option<u32>,
) -> Result<Option<Witness>, SolverError> {
    let cfg = configured(timeout_ms);
    let ctx = Context::new(&cfg);
    let enc = Encoder::new(&ctx);
    let p = enc.fresh_packet("p");
    let pa = enc.fresh_packet("pa");
    let pb = enc.fresh_packet("pb");
    let constraint = Bool::and(&ctx, &[&enc.forwards(a, &p, &pa), &enc.forwards(b, &p, &pb)]);
    decide(
        &ctx,
        &enc,
        &constraint,
        &[("p", p.clone()), ("pa", pa.clone()), ("pb", pb.clone())],
        "shared_inputs",
    )
}

/// Do `a` and `b` both forward some (possibly different) input to the exact same output packet?
pub fn shared_outputs(
    a: &Policy,
    b: &Policy,
    timeout_ms: Option<u32>,
) -> Result<Option<Witness>, SolverError> {
    let cfg = configured(timeout_ms);
    let ctx = Context::new(&cfg);
    let enc = Encoder::new(&ctx);
    let pa = enc.fresh_packet("pa");
    let pb = enc.fresh_packet("pb");
    let out = enc.fresh_packet("out");
    let constraint = Bool::and(&ctx, &[&enc.forwards(a, &pa, &out), &enc.forwards(b, &pb, &out)]);
    decide(
        &ctx,
        &enc,
        &constraint,
        &[("pa", pa.clone()), ("pb", pb.clone()), ("out", out.clone())],
        "shared_outputs",
    )
}

/// Does a packet hand off between `a` and `b` at a physical hop in *either* direction? The
/// symmetric closure of [`shared_io`], used by [`separate`] alongside the input/output checks.
pub fn shared_transit(
    topo: &Topology,
    a: &Policy,
    b: &Policy,
    timeout_ms: Option<u32>,
) -> Result<Option<Witness>, SolverError> {
    if let Some(w) = shared_io(topo, a, b, timeout_ms)? {
        return Ok(Some(w));
    }
    shared_io(topo, b, a, timeout_ms)
}

/// `a` and `b` share no input, no output, and no physical hand-off in either direction: the
/// strongest notion of isolation this module offers.
pub fn separate(
    topo: &Topology,
    a: &Policy,
    b: &Policy,
    timeout_ms: Option<u32>,
) -> Result<bool, SolverError> {
    Ok(shared_io(topo, a, b, timeout_ms)?.is_none()
        && shared_io(topo, b, a, timeout_ms)?.is_none()
        && shared_inputs(a, b, timeout_ms)?.is_none()
        && shared_outputs(a, b, timeout_ms)?.is_none()
        && shared_transit(topo, a, b, timeout_ms)?.is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netcore::{forward, inport};

    #[test]
    fn not_empty_is_sat_for_a_real_forwarding() {
        let policy = Policy::primitive(inport(2, vec![2]), vec![forward(2, vec![1])]);
        assert!(not_empty(&policy, None).unwrap().is_some());
    }

    #[test]
    fn not_empty_is_unsat_for_bottom() {
        assert!(not_empty(&Policy::Bottom, None).unwrap().is_none());
    }

    #[test]
    fn equivalent_policies_have_no_witness() {
        let p = Policy::primitive(inport(2, vec![2]), vec![forward(2, vec![1])]);
        assert!(equivalent(&p, &p, None).unwrap().is_none());
    }

    #[test]
    fn equivalent_detects_a_missing_forwarding() {
        let p = Policy::primitive(inport(2, vec![2]), vec![forward(2, vec![1])]);
        let q = Policy::Bottom;
        assert!(equivalent(&p, &q, None).unwrap().is_some());
    }

    #[test]
    fn simulates_forwards_holds_for_identical_policies_modulo_vlan() {
        let p = Policy::primitive(inport(2, vec![2]), vec![forward(2, vec![1])]);
        assert!(simulates_forwards(&p, &p, Field::Vlan, None).unwrap().is_none());
    }

    #[test]
    fn simulates_forwards_detects_a_policy_that_drops_everything() {
        let p = Policy::primitive(inport(2, vec![2]), vec![forward(2, vec![1])]);
        assert!(simulates_forwards(&p, &Policy::Bottom, Field::Vlan, None).unwrap().is_some());
    }

    #[test]
    fn one_per_edge_holds_for_a_single_clause_policy() {
        let p = Policy::primitive(inport(2, vec![2]), vec![forward(2, vec![1])]);
        assert!(one_per_edge(&p, Field::Vlan, None).unwrap().is_none());
    }

    #[test]
    fn shared_io_is_empty_for_disjoint_policies_on_a_disconnected_topology() {
        let mut topo = Topology::new();
        topo.add_switch(1).unwrap();
        topo.add_switch(2).unwrap();
        topo.finalize().unwrap();
        let a = Policy::primitive(inport(1, vec![1]), vec![forward(1, vec![2])]);
        let b = Policy::primitive(inport(2, vec![1]), vec![forward(2, vec![2])]);
        assert!(shared_io(&topo, &a, &b, None).unwrap().is_none());
    }

    #[test]
    fn not_empty_respects_a_timeout_budget() {
        let policy = Policy::primitive(inport(2, vec![2]), vec![forward(2, vec![1])]);
        assert!(not_empty(&policy, Some(1000)).unwrap().is_some());
    }
}
