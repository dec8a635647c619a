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

//! Cooperative cancellation handle consulted by the reducer.
//!
//! The SAT verifier's unbounded-latency operation is the solver's own `check()` call, which is
//! cancelled by a per-call deadline passed straight to z3 (see `sat::verify`'s `Config` setup)
//! rather than through this handle.

use std::cell::Cell;
use std::sync::{Arc, RwLock};

/// `Predicate::reduce`/`Policy::reduce` poll a `Stopper` roughly every this many recursive
/// rewrite steps, via [`check_cooperative`].
pub const NODE_BUDGET: usize = 8;

/// Stopper, to check when to stop, or to send the stop command.
///
/// `Predicate::reduce` and `Policy::reduce` consult this every [`NODE_BUDGET`] rewrite nodes
/// (through [`check_cooperative`]), returning the best rewrite reached so far once `send_stop`
/// has been called.
#[derive(Clone, Debug)]
pub struct Stopper {
    b: Arc<RwLock<bool>>,
    c: usize,
}

impl Default for Stopper {
    fn default() -> Self {
        Self::new()
    }
}

impl Stopper {
    /// Create a new stopper.
    pub fn new() -> Self {
        Self { b: Arc::new(RwLock::new(false)), c: 0 }
    }

    /// Send the stop command. This function will block until the write lock can be acquired.
    pub fn send_stop(&self) {
        *self.b.write().unwrap() = true;
    }

    /// Checks if the stop flag is set. This function will not block, just continue if the
    /// read-lock cannot be acquired. Only actually polls the lock every 9th call, so that callers
    /// can check cheaply on every rewrite node without contending on the lock each time.
    pub fn try_is_stop(&mut self) -> Option<bool> {
        self.c += 1;
        if self.c >= 9 {
            self.c = 0;
            self.b.try_read().map(|x| *x).ok()
        } else {
            None
        }
    }

    /// Checks if the stop flag is set. This function will block until the read lock can be
    /// acquired.
    pub fn is_stop(&self) -> bool {
        *self.b.read().unwrap()
    }
}

/// The cooperative-cancellation check threaded through a recursive reduction: decrements
/// `budget` on every call, and only actually consults `stop` (blocking on the read lock) once
/// `budget` reaches zero, resetting it to [`NODE_BUDGET`] afterwards. `stop == None` never stops.
pub fn check_cooperative(stop: Option<&Stopper>, budget: &Cell<usize>) -> bool {
    let stopper = match stop {
        Some(s) => s,
        None => return false,
    };
    if budget.get() == 0 {
        budget.set(NODE_BUDGET);
        stopper.is_stop()
    } else {
        budget.set(budget.get() - 1);
        false
    }
}
