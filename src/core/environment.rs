/*!

The global environment and the local de Bruijn context.

A `GlobalEnv` owns every constant and mutual inductive block in scope, keyed by kernel name. The
checker is a pure function of the environment, so there is no staging or mutation protocol: build
the environment, then check against it. The recargs tree stored with each inductive body is the
*full* tree produced by the positivity checker; this crate consumes those trees and instantiates
them for nested occurrences, it does not create them from scratch.

The local context is the usual telescope of assumptions and let-bindings, innermost last. The
decomposition helpers at the bottom strip products/lambdas/lets while weak-head reducing between
steps; they are the "environment helpers" the subterm machinery leans on.

*/

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use crate::{
  abstractions::IString,
  api::error::{CheckError, CheckResult},
  core::{
    recarg::WfPaths,
    reduce::{whd_all, whd_all_nolet},
    term::{IndRef, Name, RecDecl, Term},
    Budget,
  },
};

/// Whether a block is inductive (`Finite`), coinductive (`CoFinite`), or a non-recursive record
/// (`BiFinite`). Only `Finite` blocks are legal recursion targets for a fixpoint.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Finiteness {
  Finite,
  CoFinite,
  BiFinite,
}

pub struct ConstantBody {
  pub name: IString,
  pub ty: Term,
  /// `None` for axioms. Constants are assumed transparent: a body, if present, may be unfolded.
  pub body: Option<Term>,
}

pub struct OneInductive {
  pub name: IString,
  /// The closed type of the inductive: `∀ params indices, sort`.
  pub arity: Term,
  pub ctor_names: Vec<IString>,
  /// Constructor types in the context of the mutual block binders (body `j` of an `n`-block is
  /// `Rel(n - 1 - j)` from under the binders), parameters outermost.
  pub ctor_types: Vec<Term>,
  /// The recursive-argument tree of this body, as produced by the positivity checker.
  pub recargs: WfPaths,
}

pub struct MutualInductive {
  pub name: IString,
  pub finite: Finiteness,
  pub npars: usize,
  pub bodies: Vec<OneInductive>,
}

impl MutualInductive {
  pub fn ntypes(&self) -> usize {
    self.bodies.len()
  }
}

pub enum EnvEntry<'a> {
  Inductive(&'a MutualInductive),
  Constant(&'a ConstantBody),
  Missing,
}

#[derive(Default)]
pub struct GlobalEnv {
  constants: HashMap<IString, ConstantBody>,
  inductives: HashMap<IString, MutualInductive>,
}

impl GlobalEnv {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_constant(&mut self, cb: ConstantBody) {
    self.constants.insert(cb.name.clone(), cb);
  }

  pub fn add_inductive(&mut self, mib: MutualInductive) {
    self.inductives.insert(mib.name.clone(), mib);
  }

  /// The raw lookup of the external contract. The convenience lookups below fold the `Missing`
  /// case into an error.
  pub fn lookup_env(&self, kn: &IString) -> EnvEntry<'_> {
    if let Some(mib) = self.inductives.get(kn) {
      EnvEntry::Inductive(mib)
    } else if let Some(cb) = self.constants.get(kn) {
      EnvEntry::Constant(cb)
    } else {
      EnvEntry::Missing
    }
  }

  pub fn lookup_mind(&self, kn: &IString) -> CheckResult<&MutualInductive> {
    self.inductives.get(kn).ok_or_else(|| {
      CheckError::env("lookup_mind", kn.clone(), format!("no mutual inductive named {}", kn))
    })
  }

  /// The mutual block together with the addressed body.
  pub fn lookup_mind_specif(&self, ind: &IndRef) -> CheckResult<(&MutualInductive, &OneInductive)> {
    let mib = self.lookup_mind(&ind.mind)?;
    let body = mib.bodies.get(ind.index).ok_or_else(|| {
      CheckError::index(
        "lookup_mind_specif",
        ind.index,
        format!("{} has {} bodies, no body {}", ind.mind, mib.ntypes(), ind.index),
      )
    })?;
    Ok((mib, body))
  }

  pub fn lookup_constant(&self, kn: &IString) -> CheckResult<&ConstantBody> {
    self.constants.get(kn).ok_or_else(|| {
      CheckError::env("lookup_constant", kn.clone(), format!("no constant named {}", kn))
    })
  }

  /// The recargs tree of `ind`, cloned out of the block.
  pub fn lookup_paths(&self, ind: &IndRef) -> CheckResult<WfPaths> {
    let (_, body) = self.lookup_mind_specif(ind)?;
    Ok(body.recargs.clone())
  }
}

// region Local context

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Declaration {
  Assum(Name, Term),
  /// `Def(x, v, ty)` is a let-binding `x : ty := v`.
  Def(Name, Term, Term),
}

impl Declaration {
  pub fn name(&self) -> &Name {
    match self {
      Declaration::Assum(name, _) | Declaration::Def(name, _, _) => name,
    }
  }

  pub fn ty(&self) -> &Term {
    match self {
      Declaration::Assum(_, ty) | Declaration::Def(_, _, ty) => ty,
    }
  }

  pub fn value(&self) -> Option<&Term> {
    match self {
      Declaration::Assum(..) => None,
      Declaration::Def(_, value, _) => Some(value),
    }
  }
}

/// A telescope of declarations, innermost *last*, so `lookup_rel(0)` is the most recent binder.
/// Looked-up types and values are expressed in the context *above* their binder; callers lift by
/// `i + 1` before using them below it.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Context {
  decls: Vec<Declaration>,
}

impl Context {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.decls.len()
  }

  pub fn is_empty(&self) -> bool {
    self.decls.is_empty()
  }

  pub fn lookup_rel(&self, i: usize) -> Option<&Declaration> {
    if i < self.decls.len() {
      self.decls.get(self.decls.len() - 1 - i)
    } else {
      None
    }
  }

  pub fn push(&mut self, decl: Declaration) {
    self.decls.push(decl);
  }

  pub fn push_assum(&mut self, name: Name, ty: Term) {
    self.push(Declaration::Assum(name, ty));
  }

  pub fn push_def(&mut self, name: Name, value: Term, ty: Term) {
    self.push(Declaration::Def(name, value, ty));
  }

  /// Pushes the binders of a (co)fixpoint block, lifting each type past the ones before it.
  pub fn push_rec_types(&mut self, decls: &RecDecl) {
    for (j, (name, ty)) in decls.names.iter().zip(decls.types.iter()).enumerate() {
      self.push_assum(name.clone(), ty.lift(j));
    }
  }

  /// A copy of this context extended with a decomposition fragment (outermost first).
  pub fn extended(&self, fragment: &[Declaration]) -> Context {
    let mut ctx = self.clone();
    for decl in fragment {
      ctx.push(decl.clone());
    }
    ctx
  }
}

impl Display for Context {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "[")?;
    for (i, decl) in self.decls.iter().enumerate() {
      if i > 0 {
        write!(f, ", ")?;
      }
      match decl {
        Declaration::Assum(name, ty) => write!(f, "{}:{}", name, ty)?,
        Declaration::Def(name, value, ty) => write!(f, "{}:{} := {}", name, ty, value)?,
      }
    }
    write!(f, "]")
  }
}

// endregion

// region Decomposition under reduction

/// Strips all outer products, weak-head reducing between steps. Returns the stripped binders
/// (outermost first) and the head that remains.
pub fn dest_prod(
  budget: &Budget,
  genv: &GlobalEnv,
  ctx: &Context,
  ty: &Term,
) -> CheckResult<(Vec<Declaration>, Term)> {
  let mut fragment: Vec<Declaration> = Vec::new();
  let mut ctx = ctx.clone();
  let mut head = ty.clone();
  loop {
    head = whd_all(budget, genv, &ctx, head)?;
    match head {
      Term::Prod(x, a, b) => {
        ctx.push_assum(x.clone(), (*a).clone());
        fragment.push(Declaration::Assum(x, *a));
        head = *b;
      }
      other => return Ok((fragment, other)),
    }
  }
}

/// Strips outer products *and lets* without reducing the lets away. When the head is neither,
/// tries the stronger reduction once more; only a head that survives `whd_all` unchanged stops
/// the loop.
pub fn dest_prod_assum(
  budget: &Budget,
  genv: &GlobalEnv,
  ctx: &Context,
  ty: &Term,
) -> CheckResult<(Vec<Declaration>, Term)> {
  let mut fragment: Vec<Declaration> = Vec::new();
  let mut ctx = ctx.clone();
  let mut head = ty.clone();
  loop {
    head = whd_all_nolet(budget, genv, &ctx, head)?;
    match head {
      Term::Prod(x, a, b) => {
        ctx.push_assum(x.clone(), (*a).clone());
        fragment.push(Declaration::Assum(x, *a));
        head = *b;
      }
      Term::LetIn(x, v, a, b) => {
        ctx.push_def(x.clone(), (*v).clone(), (*a).clone());
        fragment.push(Declaration::Def(x, *v, *a));
        head = *b;
      }
      other => {
        let harder = whd_all(budget, genv, &ctx, other.clone())?;
        if harder == other {
          return Ok((fragment, other));
        }
        head = harder;
      }
    }
  }
}

/// Strips outer lambdas and lets syntactically (dropping casts). The return-type function of a
/// match is already in this shape, so no reduction is involved.
pub fn dest_lambda_assum(ty: &Term) -> (Vec<Declaration>, Term) {
  let mut fragment: Vec<Declaration> = Vec::new();
  let mut head = ty.clone();
  loop {
    match head {
      Term::Lambda(x, a, b) => {
        fragment.push(Declaration::Assum(x, *a));
        head = *b;
      }
      Term::LetIn(x, v, a, b) => {
        fragment.push(Declaration::Def(x, *v, *a));
        head = *b;
      }
      Term::Cast(c, _) => {
        head = *c;
      }
      other => return (fragment, other),
    }
  }
}

/// Strips exactly `n` outer lambdas, syntactically. Lets between the lambdas are collected but
/// do not count toward `n`, and casts are dropped; the innermost declaration returned is the
/// `n`-th lambda itself.
pub fn decompose_lambda_n_assum(t: &Term, n: usize) -> CheckResult<(Vec<Declaration>, Term)> {
  let mut fragment: Vec<Declaration> = Vec::new();
  let mut remaining = n;
  let mut head = t.clone();
  while remaining > 0 {
    match head {
      Term::Lambda(x, a, b) => {
        fragment.push(Declaration::Assum(x, *a));
        remaining -= 1;
        head = *b;
      }
      Term::LetIn(x, v, a, b) => {
        fragment.push(Declaration::Def(x, *v, *a));
        head = *b;
      }
      Term::Cast(c, _) => {
        head = *c;
      }
      other => {
        return Err(CheckError::other(
          "decompose_lambda_n_assum",
          format!("expected {} more abstractions, found {}", remaining, other),
        ));
      }
    }
  }
  Ok((fragment, head))
}

/// Applies a product type to actual arguments: for each argument, reduce to a product and
/// substitute. Fails with an `Other` error if the type runs out of products.
pub fn hnf_prod_apps(
  budget: &Budget,
  genv: &GlobalEnv,
  ctx: &Context,
  ty: &Term,
  args: &[Term],
) -> CheckResult<Term> {
  let mut head = ty.clone();
  for arg in args {
    head = whd_all(budget, genv, ctx, head)?;
    match head {
      Term::Prod(_, _, b) => {
        head = b.subst1(arg);
      }
      other => {
        return Err(CheckError::other(
          "hnf_prod_apps",
          format!("expected a product to apply, found {}", other),
        ));
      }
    }
  }
  Ok(head)
}

// endregion
