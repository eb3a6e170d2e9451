/*!

The subterm lattice and the environments the guarded-recursion walk carries.

A `SubtermSpec` is the checker's knowledge about one value: `DeadCode` for values produced in an
absurd branch, `NotSubterm` when nothing smaller can be claimed, and `Subterm(size, tree)` when
the value is a subterm of the recursive argument — `Loose` for the argument itself (or an equal
term), `Strict` for a proper subterm. The `tree` refines the claim: it tells which constructor
arguments of the value are again subterms, which is what makes recursion through nested
inductives work.

Branch analysis combines specs with a greatest lower bound: `DeadCode` is the top (identity),
`NotSubterm` the bottom (absorbing), and two `Subterm`s meet pointwise — sizes by `size_glb`,
trees by intersection, which can fail on incompatible trees.

A `GuardEnv` assigns a spec to every de Bruijn index: `guarded[0]` is the innermost binder and
indices beyond the list are `NotSubterm`. `rel_min_fix` tracks where the fixpoints of the block
under scrutiny sit; every push moves them one further out. The `Stack` holds deferred
applicants: terms (with the environment they must be read in) that *would* be applied to the
term under scrutiny once enclosing matches reduce.

*/

use std::fmt::{Display, Formatter};

use crate::{
  abstractions::join_string,
  api::error::{CheckError, CheckResult},
  core::{
    environment::Context,
    recarg::{eq_wf_paths, inter_wf_paths, mk_norec, WfPaths},
    term::{Name, RecDecl, Term},
  },
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Size {
  Loose,
  Strict,
}

/// `Strict` only survives a meet when both sides are strict.
pub fn size_glb(a: Size, b: Size) -> Size {
  match (a, b) {
    (Size::Strict, Size::Strict) => Size::Strict,
    _ => Size::Loose,
  }
}

impl Display for Size {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Size::Loose  => write!(f, "loose"),
      Size::Strict => write!(f, "strict"),
    }
  }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SubtermSpec {
  /// Produced only by absurd branches (a match with no branches). Identity of the glb.
  DeadCode,
  /// Unknown, or known not to be smaller. Absorbing for the glb.
  NotSubterm,
  Subterm(Size, WfPaths),
}

impl Display for SubtermSpec {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      SubtermSpec::DeadCode           => write!(f, "dead-code"),
      SubtermSpec::NotSubterm         => write!(f, "not-subterm"),
      SubtermSpec::Subterm(size, tree) => write!(f, "subterm({}, {})", size, tree),
    }
  }
}

/// A tree's worth of strict-subterm knowledge. A `Norec` tree carries none, so it maps to
/// `NotSubterm`; this keeps the invariant that a stored `Subterm` never holds `mk_norec`.
pub fn spec_of_tree(tree: &WfPaths) -> SubtermSpec {
  if eq_wf_paths(tree, &mk_norec()) {
    SubtermSpec::NotSubterm
  } else {
    SubtermSpec::Subterm(Size::Strict, tree.clone())
  }
}

/// Binary greatest lower bound. Fails only when two `Subterm` trees are incompatible.
pub fn spec_glb2(a: SubtermSpec, b: SubtermSpec) -> CheckResult<SubtermSpec> {
  match (a, b) {
    (a, SubtermSpec::DeadCode) => Ok(a),
    (SubtermSpec::DeadCode, b) => Ok(b),
    (SubtermSpec::NotSubterm, _) | (_, SubtermSpec::NotSubterm) => Ok(SubtermSpec::NotSubterm),
    (SubtermSpec::Subterm(s1, t1), SubtermSpec::Subterm(s2, t2)) => {
      match inter_wf_paths(&t1, &t2) {
        Some(tree) => Ok(SubtermSpec::Subterm(size_glb(s1, s2), tree)),
        None => Err(CheckError::other(
          "spec_glb2",
          format!("incompatible recursive-argument trees {} and {}", t1, t2),
        )),
      }
    }
  }
}

/// Glb of a list of specs. The empty list is `DeadCode`: a match with no branches proves
/// anything.
pub fn spec_glb(specs: impl IntoIterator<Item = SubtermSpec>) -> CheckResult<SubtermSpec> {
  let mut acc = SubtermSpec::DeadCode;
  for spec in specs {
    acc = spec_glb2(acc, spec)?;
  }
  Ok(acc)
}

// region Guard environment

#[derive(Clone, Debug)]
pub struct GuardEnv {
  /// The local context the terms under scrutiny live in.
  pub ctx: Context,
  /// The de Bruijn index of the *last* fixpoint of the block under scrutiny; an `n`-block
  /// occupies `rel_min_fix .. rel_min_fix + n`.
  pub rel_min_fix: usize,
  /// Specs for in-scope binders, innermost first. Indices past the end are `NotSubterm`.
  pub guarded: Vec<SubtermSpec>,
}

impl GuardEnv {
  /// The environment for checking one fix body, entered from under `rec_arg_index + 1` lambdas:
  /// the innermost binder is the recursive argument, a loose subterm of itself with the
  /// inductive's full tree.
  pub fn for_fix_body(ctx: Context, rec_arg_index: usize, tree: WfPaths) -> Self {
    GuardEnv {
      ctx,
      rel_min_fix: rec_arg_index + 1,
      guarded: vec![SubtermSpec::Subterm(Size::Loose, tree)],
    }
  }

  pub fn lookup_subterm(&self, i: usize) -> SubtermSpec {
    self.guarded.get(i).cloned().unwrap_or(SubtermSpec::NotSubterm)
  }

  pub fn push_var(&self, name: Name, ty: Term, spec: SubtermSpec) -> Self {
    let mut next = self.clone();
    next.ctx.push_assum(name, ty);
    next.rel_min_fix += 1;
    next.guarded.insert(0, spec);
    next
  }

  pub fn push_var_nonrec(&self, name: Name, ty: Term) -> Self {
    self.push_var(name, ty, SubtermSpec::NotSubterm)
  }

  pub fn push_let(&self, name: Name, value: Term, ty: Term, spec: SubtermSpec) -> Self {
    let mut next = self.clone();
    next.ctx.push_def(name, value, ty);
    next.rel_min_fix += 1;
    next.guarded.insert(0, spec);
    next
  }

  /// Pushes the binders of a nested (co)fixpoint block, none of them subterms.
  pub fn push_fix_block(&self, decls: &RecDecl) -> Self {
    let mut next = self.clone();
    next.ctx.push_rec_types(decls);
    next.rel_min_fix += decls.len();
    for _ in 0..decls.len() {
      next.guarded.insert(0, SubtermSpec::NotSubterm);
    }
    next
  }

  /// Overwrites the spec of an in-scope binder.
  pub fn set_spec(&mut self, i: usize, spec: SubtermSpec) {
    while self.guarded.len() <= i {
      self.guarded.push(SubtermSpec::NotSubterm);
    }
    self.guarded[i] = spec;
  }
}

impl Display for GuardEnv {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "{{fix@{}, [{}]}}",
      self.rel_min_fix,
      join_string(self.guarded.iter(), ", ")
    )
  }
}

// endregion

// region Deferred-application stack

/// One deferred applicant: either a term whose spec has not been computed yet, together with
/// the guard environment it must be read in, or an already-computed spec.
#[derive(Clone, Debug)]
pub enum StackElement {
  Closure(GuardEnv, Term),
  Arg(SubtermSpec),
}

/// Index 0 is the first pending argument.
pub type Stack = Vec<StackElement>;

/// Defers `args` (in application order) in front of `stack`, capturing the environment.
pub fn push_stack_closures(genv: &GuardEnv, args: &[Term], stack: &Stack) -> Stack {
  args
      .iter()
      .map(|arg| StackElement::Closure(genv.clone(), arg.clone()))
      .chain(stack.iter().cloned())
      .collect()
}

/// Prepends precomputed specs (in binder order) in front of `stack`.
pub fn push_stack_args(specs: Vec<SubtermSpec>, stack: &Stack) -> Stack {
  specs
      .into_iter()
      .map(StackElement::Arg)
      .chain(stack.iter().cloned())
      .collect()
}

// endregion
