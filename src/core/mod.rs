/*!

The machinery of the checker, bottom up: terms and environments, the weak-head reduction
machine, the regular-tree library with its recarg instantiation, the subterm lattice, the
recargs-tree builder for nested inductives, and finally the checker itself (subterm inference
plus the guarded-recursion walk).

Everything here is pure: a check is a function of the global environment, a local context, and
a fixpoint block. The only shared state is the [`Budget`], an interior-mutability step counter
threaded through every recursive routine. Subterm inference and the walk re-enter themselves
after reducing matches and constants, so neither is structurally recursive; the budget is what
bounds them.

*/

use std::cell::Cell;

use crate::api::error::{CheckError, CheckResult};

pub mod checker;
pub mod environment;
pub mod recarg;
pub mod recargs_builder;
pub mod reduce;
pub mod rtree;
pub mod subterm;
pub mod term;

/// Enough for any reasonable definition; re-entrant reduction loops hit it instead of
/// diverging.
pub const DEFAULT_STEP_BUDGET: u64 = 1_000_000;

/// A shared, decrement-only step counter. Each recursive entry of the core routines and each
/// reduction machine step consumes one unit; exhaustion surfaces as a `Timeout` error.
#[derive(Debug)]
pub struct Budget {
  steps: Cell<u64>,
}

impl Budget {
  pub fn new(steps: u64) -> Self {
    Budget { steps: Cell::new(steps) }
  }

  pub fn remaining(&self) -> u64 {
    self.steps.get()
  }

  #[inline]
  pub fn consume(&self, location: &str) -> CheckResult<()> {
    let left = self.steps.get();
    if left == 0 {
      Err(CheckError::timeout(location))
    } else {
      self.steps.set(left - 1);
      Ok(())
    }
  }
}

impl Default for Budget {
  fn default() -> Self {
    Budget::new(DEFAULT_STEP_BUDGET)
  }
}
