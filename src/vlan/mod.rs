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

//! # VLAN assignment
//!
//! Three ways to turn a set of slices into tags: [`sequential`] (naive, one tag each),
//! [`slice_optimal`] (graph-color the per-slice conflict graph), and [`edge_optimal`] (assign
//! tags independently on each physical edge, bounded by the number of slices that actually cross
//! it). VLAN tags live in `[1, 255]`; `0` means untagged.

use log::debug;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::Hash;
use thiserror::Error;

/// Maximum usable VLAN tag: the field is 8 bits wide and `0` is reserved for "untagged".
pub const MAX_VLAN: u64 = 255;

/// A physical edge, canonicalized `(min_switch, max_switch)` with port numbers preserved on each
/// side: `((switch_a, port_a), (switch_b, port_b))`, oriented so `switch_a <= switch_b`.
pub type Edge = ((u64, u64), (u64, u64));

/// Errors raised while assigning VLAN tags.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VlanError {
    /// More slices overlap than fit in the `[1, 255]` tag space.
    #[error("cannot assign vlans: {count} overlapping slices exceed the 255-tag budget")]
    TooManySlices {
        /// How many slices were asked to share the tag space.
        count: usize,
    },
    /// The conflict graph has no valid coloring within the given color budget.
    #[error("no feasible vlan coloring within {budget} colors for {nodes} slices")]
    Infeasible {
        /// The color budget that was exceeded.
        budget: usize,
        /// How many slices were being colored.
        nodes: usize,
    },
}

/// Assign slices tags `1, 2, 3, ...` in iteration order. Fails once more than 255 slices need a
/// tag, since `0` is reserved for untagged traffic and the field is 8 bits wide.
pub fn sequential<T: Clone + Eq + Hash>(slices: &[T]) -> Result<HashMap<T, u64>, VlanError> {
    if slices.len() > MAX_VLAN as usize {
        return Err(VlanError::TooManySlices { count: slices.len() });
    }
    Ok(slices.iter().cloned().zip(1u64..).collect())
}

/// A pluggable minimizer for the VLAN-count optimization problem (spec's external
/// ILP/SAT-solver collaborator). The default [`GreedyColoring`] always produces a valid
/// assignment (when one exists within the budget) without minimizing the color count.
pub trait ColoringStrategy<T: Clone + Eq + Hash + Ord> {
    /// Color `nodes` such that no two nodes joined by an edge in `conflicts` share a color, using
    /// at most `budget` distinct colors numbered `1..=budget`.
    fn color(
        &self,
        nodes: &[T],
        conflicts: &HashSet<(T, T)>,
        budget: usize,
    ) -> Result<HashMap<T, u64>, VlanError>;
}

/// Largest-degree-first greedy coloring (Welsh-Powell). Does not guarantee the minimum chromatic
/// number; true minimization is explicitly out of scope and left to an external optimizer
/// pluggable through [`ColoringStrategy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyColoring;

impl<T: Clone + Eq + Hash + Ord> ColoringStrategy<T> for GreedyColoring {
    fn color(
        &self,
        nodes: &[T],
        conflicts: &HashSet<(T, T)>,
        budget: usize,
    ) -> Result<HashMap<T, u64>, VlanError> {
        let conflicts_idx: HashSet<(usize, usize)> = (0..nodes.len())
            .flat_map(|i| (0..nodes.len()).map(move |j| (i, j)))
            .filter(|&(i, j)| i != j && conflicts.contains(&canonical(&nodes[i], &nodes[j])))
            .collect();
        let adjacency: Vec<HashSet<usize>> = (0..nodes.len())
            .map(|i| (0..nodes.len()).filter(|&j| conflicts_idx.contains(&(i, j))).collect())
            .collect();

        let mut order: Vec<usize> = (0..nodes.len()).collect();
        order.sort_by_key(|&i| std::cmp::Reverse(adjacency[i].len()));

        let mut colors: HashMap<usize, u64> = HashMap::new();
        for idx in order {
            let used: HashSet<u64> =
                adjacency[idx].iter().filter_map(|n| colors.get(n).copied()).collect();
            let color = (1..=budget as u64)
                .find(|c| !used.contains(c))
                .ok_or(VlanError::Infeasible { budget, nodes: nodes.len() })?;
            colors.insert(idx, color);
        }
        Ok(colors.into_iter().map(|(i, c)| (nodes[i].clone(), c)).collect())
    }
}

fn canonical<'a, T: Ord>(a: &'a T, b: &'a T) -> (&'a T, &'a T) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Return the minimum per-slice VLAN assignment: build the conflict graph from shared physical
/// edges and color it, using `strategy` (defaults to [`GreedyColoring`] when callers have no
/// external optimizer to plug in).
pub fn slice_optimal<T: Clone + Eq + Hash + Ord>(
    slices: &[T],
    physical_edges: &HashMap<T, BTreeSet<Edge>>,
    strategy: &impl ColoringStrategy<T>,
) -> Result<HashMap<T, u64>, VlanError> {
    let mut conflicts = HashSet::new();
    for i in 0..slices.len() {
        for j in (i + 1)..slices.len() {
            let (a, b) = (&slices[i], &slices[j]);
            let empty = BTreeSet::new();
            let a_edges = physical_edges.get(a).unwrap_or(&empty);
            let b_edges = physical_edges.get(b).unwrap_or(&empty);
            if a_edges.intersection(b_edges).next().is_some() {
                let (x, y) = canonical(a, b);
                conflicts.insert((x.clone(), y.clone()));
                debug!("vlan conflict: slices share a physical edge");
            }
        }
    }
    let budget = MAX_VLAN.min(slices.len().max(1) as u64) as usize;
    strategy.color(slices, &conflicts, budget).map_err(|e| match e {
        VlanError::Infeasible { nodes, .. } => VlanError::TooManySlices { count: nodes },
        other => other,
    })
}

/// For every physical edge, assign each slice that uses it a distinct tag in `[1, |slices on
/// edge|]`. External edges are not tagged. The result is symmetrized: both `(edge.0, edge.1)` and
/// `(edge.1, edge.0)` orientations resolve to the same per-slice tag map.
pub fn edge_optimal<T: Clone + Eq + Hash + Ord>(
    edge_uses: &HashMap<Edge, BTreeSet<T>>,
) -> HashMap<Edge, HashMap<T, u64>> {
    let mut out = HashMap::new();
    for (edge, slices) in edge_uses {
        let mut ordered: Vec<&T> = slices.iter().collect();
        ordered.sort();
        let tags: HashMap<T, u64> =
            ordered.into_iter().cloned().zip(1u64..).collect();
        let reversed = (edge.1, edge.0);
        out.insert(*edge, tags.clone());
        out.insert(reversed, tags);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_assigns_distinct_tags() {
        let slices = vec!["a", "b", "c"];
        let assignment = sequential(&slices).unwrap();
        let mut tags: Vec<u64> = assignment.values().copied().collect();
        tags.sort();
        assert_eq!(tags, vec![1, 2, 3]);
    }

    #[test]
    fn sequential_rejects_too_many_slices() {
        let slices: Vec<u64> = (0..300).collect();
        assert!(sequential(&slices).is_err());
    }

    #[test]
    fn slice_optimal_colors_conflicting_slices_differently() {
        let slices = vec![1u64, 2, 3];
        let shared_edge: Edge = ((1, 1), (2, 1));
        let mut edges = HashMap::new();
        edges.insert(1u64, BTreeSet::from([shared_edge]));
        edges.insert(2u64, BTreeSet::from([shared_edge]));
        edges.insert(3u64, BTreeSet::new());
        let assignment = slice_optimal(&slices, &edges, &GreedyColoring).unwrap();
        assert_ne!(assignment[&1], assignment[&2]);
    }

    #[test]
    fn edge_optimal_is_symmetrized() {
        let edge: Edge = ((1, 1), (2, 1));
        let mut edge_uses = HashMap::new();
        edge_uses.insert(edge, BTreeSet::from(["a", "b"]));
        let assignment = edge_optimal(&edge_uses);
        let fwd = &assignment[&edge];
        let back = &assignment[&(edge.1, edge.0)];
        assert_eq!(fwd, back);
        assert_ne!(fwd["a"], fwd["b"]);
    }
}
