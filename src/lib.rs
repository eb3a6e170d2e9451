/*!

`guardck` is a guardedness checker for mutual fixpoints over a dependently-typed lambda
calculus with inductive and coinductive types, pattern matching, nested fixpoints, and
primitive projections. Given a fixpoint block, [`api::check_fix`] decides whether every
recursive call is made on a structurally smaller argument, which is what guarantees strong
normalization of the definition.

The crate is a library with no I/O: callers supply the global environment (inductive blocks
with their positivity-checker trees, transparent constants) and get back `Ok` or a classified
error. See the `api` module for the public surface.

*/

pub mod abstractions;
pub mod api;
mod core;

// We re-export abstractions that are meant to be used publicly.
pub use abstractions::{log, IString};
