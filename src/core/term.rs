/*!

The term language of the calculus: a de Bruijn representation of dependently-typed lambda terms
with inductive types, pattern matching, (co)fixpoints, and primitive projections.

Indices are 0-based: `Rel(0)` is the innermost binder. The checker never evaluates terms; the
only operations it needs are lifting, simultaneous substitution, application (de)composition,
and occurrence queries, all of which live here.

`App` maintains two invariants: its head is never itself an `App`, and its argument vector is
non-empty. Use [`mk_app`] instead of constructing `App` directly.

*/

use std::fmt::{Display, Formatter};

use crate::abstractions::{IString, NatSet, join_string};

pub type BxTerm = Box<Term>;

/// A reference to one inductive type of a mutual block: the kernel name of the block and the
/// position of the body within it.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct IndRef {
  pub mind: IString,
  pub index: usize,
}

impl IndRef {
  pub fn new(mind: impl Into<IString>, index: usize) -> Self {
    IndRef { mind: mind.into(), index }
  }
}

impl Display for IndRef {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}#{}", self.mind, self.index)
  }
}

/// Binder names are cosmetic. They survive into guard environments only so that error messages
/// and traces can name things.
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub enum Name {
  #[default]
  Anonymous,
  Named(IString),
}

impl Name {
  pub fn named(name: impl Into<IString>) -> Self {
    Name::Named(name.into())
  }
}

impl Display for Name {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Name::Anonymous   => write!(f, "_"),
      Name::Named(name) => write!(f, "{}", name),
    }
  }
}

/// Universe levels play no role in guardedness, so sorts are just their family.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SortKind {
  SProp,
  Prop,
  Set,
  Type,
}

impl Display for SortKind {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      SortKind::SProp => write!(f, "SProp"),
      SortKind::Prop  => write!(f, "Prop"),
      SortKind::Set   => write!(f, "Set"),
      SortKind::Type  => write!(f, "Type"),
    }
  }
}

/// Static data attached to a `Case` node: the inductive being matched and its parameter count.
/// Branches are lambda-abstracted over the constructor's non-parameter arguments only.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CaseInfo {
  pub ind: IndRef,
  pub npars: usize,
}

/// A primitive projection: the record inductive, its parameter count, and which argument of the
/// single constructor is projected (0-based among non-parameter arguments).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Projection {
  pub name: IString,
  pub ind: IndRef,
  pub npars: usize,
  pub arg: usize,
}

impl Display for Projection {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.name)
  }
}

/// The shared declaration block of `Fix`/`CoFix`. The three vectors are parallel. Every body
/// sees the entire block: in an `n`-body block, body text refers to fix `j` as
/// `Rel(n - 1 - j)` at binder depth 0.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecDecl {
  pub names: Vec<Name>,
  pub types: Vec<Term>,
  pub bodies: Vec<Term>,
}

impl RecDecl {
  pub fn len(&self) -> usize {
    self.bodies.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bodies.is_empty()
  }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Term {
  /// A bound variable, 0-based.
  Rel(usize),
  /// A named free variable. The checker does not support these and reports them as such.
  Var(IString),
  Sort(SortKind),
  Cast(BxTerm, BxTerm),
  /// `Prod(x, a, b)` is `∀ x : a, b`.
  Prod(Name, BxTerm, BxTerm),
  Lambda(Name, BxTerm, BxTerm),
  /// `LetIn(x, v, a, b)` is `let x : a := v in b`.
  LetIn(Name, BxTerm, BxTerm, BxTerm),
  App(BxTerm, Vec<Term>),
  Const(IString),
  Ind(IndRef),
  /// `Construct(ind, k)` is the `k`-th constructor (0-based) of `ind`.
  Construct(IndRef, usize),
  /// `Case(info, rtf, discriminant, branches)`. The return-type function `rtf` is
  /// lambda-abstracted over the inductive's indices and the matched value.
  Case(CaseInfo, BxTerm, BxTerm, Vec<Term>),
  /// `Fix(rec_args, which, decls)`: `rec_args[j]` is the 0-based index of body `j`'s
  /// structurally decreasing argument.
  Fix(Vec<usize>, usize, RecDecl),
  CoFix(usize, RecDecl),
  Proj(Projection, BxTerm),
  Evar(usize),
}

/// Application smart constructor: flattens nested `App`s and never builds a nullary one.
pub fn mk_app(head: Term, mut args: Vec<Term>) -> Term {
  if args.is_empty() {
    return head;
  }
  match head {
    Term::App(inner_head, mut inner_args) => {
      inner_args.append(&mut args);
      Term::App(inner_head, inner_args)
    }
    head => Term::App(Box::new(head), args),
  }
}

impl Term {
  /// Splits a term into its head and the (possibly empty) vector of arguments applied to it.
  pub fn decompose_app(self) -> (Term, Vec<Term>) {
    match self {
      Term::App(head, args) => (*head, args),
      t => (t, Vec::new()),
    }
  }

  /// Shifts every free `Rel` by `n`.
  pub fn lift(&self, n: usize) -> Term {
    self.lift_from(0, n)
  }

  /// Shifts every free `Rel` whose external index is at least `k` by `n`.
  pub fn lift_from(&self, k: usize, n: usize) -> Term {
    if n == 0 {
      return self.clone();
    }
    map_free_rels(self, 0, &mut |depth, i| {
      if i - depth >= k {
        Term::Rel(i + n)
      } else {
        Term::Rel(i)
      }
    })
  }

  /// Simultaneous substitution: free `Rel(i)` with `i < subs.len()` becomes `subs[i]` (lifted
  /// past the binders crossed on the way down), and remaining free rels are shifted down by
  /// `subs.len()`.
  pub fn subst(&self, subs: &[Term]) -> Term {
    if subs.is_empty() {
      return self.clone();
    }
    map_free_rels(self, 0, &mut |depth, i| {
      let ext = i - depth;
      if ext < subs.len() {
        subs[ext].lift(depth)
      } else {
        Term::Rel(i - subs.len())
      }
    })
  }

  pub fn subst1(&self, value: &Term) -> Term {
    self.subst(std::slice::from_ref(value))
  }

  /// True when no free `Rel` with external index in `[k, k + n)` occurs in the term. This is
  /// the fast path of the guarded-recursion walk, so it allocates nothing.
  pub fn noccur_between(&self, k: usize, n: usize) -> bool {
    fn check(t: &Term, depth: usize, k: usize, n: usize) -> bool {
      match t {
        Term::Rel(i) => *i < depth || !(*i - depth >= k && *i - depth < k + n),

        Term::Var(_) | Term::Sort(_) | Term::Const(_) | Term::Ind(_)
        | Term::Construct(..) | Term::Evar(_) => true,

        Term::Cast(c, ty) => check(c, depth, k, n) && check(ty, depth, k, n),

        Term::Prod(_, a, b) | Term::Lambda(_, a, b) => {
          check(a, depth, k, n) && check(b, depth + 1, k, n)
        }

        Term::LetIn(_, v, a, b) => {
          check(v, depth, k, n) && check(a, depth, k, n) && check(b, depth + 1, k, n)
        }

        Term::App(head, args) => {
          check(head, depth, k, n) && args.iter().all(|arg| check(arg, depth, k, n))
        }

        Term::Case(_, rtf, discr, branches) => {
          check(rtf, depth, k, n)
              && check(discr, depth, k, n)
              && branches.iter().all(|branch| check(branch, depth, k, n))
        }

        Term::Fix(_, _, decls) | Term::CoFix(_, decls) => {
          let inner = depth + decls.len();
          decls.types.iter().all(|ty| check(ty, depth, k, n))
              && decls.bodies.iter().all(|body| check(body, inner, k, n))
        }

        Term::Proj(_, c) => check(c, depth, k, n),
      }
    }
    check(self, 0, k, n)
  }

  /// The set of free de Bruijn indices, as external indices.
  pub fn free_rels(&self) -> NatSet {
    fn collect(t: &Term, depth: usize, set: &mut NatSet) {
      match t {
        Term::Rel(i) => {
          if *i >= depth {
            set.insert(*i - depth);
          }
        }

        Term::Var(_) | Term::Sort(_) | Term::Const(_) | Term::Ind(_)
        | Term::Construct(..) | Term::Evar(_) => {}

        Term::Cast(c, ty) => {
          collect(c, depth, set);
          collect(ty, depth, set);
        }

        Term::Prod(_, a, b) | Term::Lambda(_, a, b) => {
          collect(a, depth, set);
          collect(b, depth + 1, set);
        }

        Term::LetIn(_, v, a, b) => {
          collect(v, depth, set);
          collect(a, depth, set);
          collect(b, depth + 1, set);
        }

        Term::App(head, args) => {
          collect(head, depth, set);
          for arg in args {
            collect(arg, depth, set);
          }
        }

        Term::Case(_, rtf, discr, branches) => {
          collect(rtf, depth, set);
          collect(discr, depth, set);
          for branch in branches {
            collect(branch, depth, set);
          }
        }

        Term::Fix(_, _, decls) | Term::CoFix(_, decls) => {
          for ty in &decls.types {
            collect(ty, depth, set);
          }
          for body in &decls.bodies {
            collect(body, depth + decls.len(), set);
          }
        }

        Term::Proj(_, c) => collect(c, depth, set),
      }
    }
    let mut set = NatSet::new();
    collect(self, 0, &mut set);
    set
  }

  /// Head-applies `args`, beta-contracting as many leading lambdas as there are arguments.
  pub fn beta_apply(self, args: Vec<Term>) -> Term {
    let mut lambdas = Vec::new();
    let mut body = self;
    let mut args_iter = args.into_iter();
    let mut rest = Vec::new();

    loop {
      match (body, args_iter.next()) {
        (Term::Lambda(_, _, inner), Some(arg)) => {
          lambdas.push(arg);
          body = *inner;
        }
        (t, Some(arg)) => {
          body = t;
          rest.push(arg);
          rest.extend(args_iter);
          break;
        }
        (t, None) => {
          body = t;
          break;
        }
      }
    }

    // The innermost lambda binds the last consumed argument.
    lambdas.reverse();
    mk_app(body.subst(&lambdas), rest)
  }
}

/// Structural map that rebuilds the term, replacing every *free* `Rel(i)` (at binder depth
/// `depth`, freeness means `i >= depth`) by `f(depth, i)`.
fn map_free_rels(t: &Term, depth: usize, f: &mut impl FnMut(usize, usize) -> Term) -> Term {
  match t {
    Term::Rel(i) => {
      if *i >= depth {
        f(depth, *i)
      } else {
        Term::Rel(*i)
      }
    }

    Term::Var(_) | Term::Sort(_) | Term::Const(_) | Term::Ind(_)
    | Term::Construct(..) | Term::Evar(_) => t.clone(),

    Term::Cast(c, ty) => Term::Cast(
      Box::new(map_free_rels(c, depth, f)),
      Box::new(map_free_rels(ty, depth, f)),
    ),

    Term::Prod(x, a, b) => Term::Prod(
      x.clone(),
      Box::new(map_free_rels(a, depth, f)),
      Box::new(map_free_rels(b, depth + 1, f)),
    ),

    Term::Lambda(x, a, b) => Term::Lambda(
      x.clone(),
      Box::new(map_free_rels(a, depth, f)),
      Box::new(map_free_rels(b, depth + 1, f)),
    ),

    Term::LetIn(x, v, a, b) => Term::LetIn(
      x.clone(),
      Box::new(map_free_rels(v, depth, f)),
      Box::new(map_free_rels(a, depth, f)),
      Box::new(map_free_rels(b, depth + 1, f)),
    ),

    Term::App(head, args) => mk_app(
      map_free_rels(head, depth, f),
      args.iter().map(|arg| map_free_rels(arg, depth, f)).collect(),
    ),

    Term::Case(info, rtf, discr, branches) => Term::Case(
      info.clone(),
      Box::new(map_free_rels(rtf, depth, f)),
      Box::new(map_free_rels(discr, depth, f)),
      branches.iter().map(|branch| map_free_rels(branch, depth, f)).collect(),
    ),

    Term::Fix(rec_args, which, decls) => Term::Fix(
      rec_args.clone(),
      *which,
      map_rec_decl(decls, depth, f),
    ),

    Term::CoFix(which, decls) => Term::CoFix(*which, map_rec_decl(decls, depth, f)),

    Term::Proj(p, c) => Term::Proj(p.clone(), Box::new(map_free_rels(c, depth, f))),
  }
}

fn map_rec_decl(decls: &RecDecl, depth: usize, f: &mut impl FnMut(usize, usize) -> Term) -> RecDecl {
  let inner = depth + decls.len();
  RecDecl {
    names: decls.names.clone(),
    types: decls.types.iter().map(|ty| map_free_rels(ty, depth, f)).collect(),
    bodies: decls.bodies.iter().map(|body| map_free_rels(body, inner, f)).collect(),
  }
}

impl Display for Term {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Term::Rel(i)           => write!(f, "#{}", i),
      Term::Var(name)        => write!(f, "{}", name),
      Term::Sort(kind)       => write!(f, "{}", kind),
      Term::Cast(c, ty)      => write!(f, "({} : {})", c, ty),
      Term::Prod(x, a, b)    => write!(f, "∀{}:{}. {}", x, a, b),
      Term::Lambda(x, a, b)  => write!(f, "λ{}:{}. {}", x, a, b),
      Term::LetIn(x, v, a, b) => write!(f, "let {}:{} := {} in {}", x, a, v, b),
      Term::App(head, args)  => write!(f, "({} {})", head, join_string(args.iter(), " ")),
      Term::Const(name)      => write!(f, "{}", name),
      Term::Ind(ind)         => write!(f, "{}", ind),
      Term::Construct(ind, k) => write!(f, "{}.ctor{}", ind, k),
      Term::Case(info, rtf, discr, branches) => {
        write!(
          f,
          "match {} in {} return {} with [{}]",
          discr,
          info.ind,
          rtf,
          join_string(branches.iter(), " | ")
        )
      }
      Term::Fix(rec_args, which, decls) => {
        write!(
          f,
          "fix<{}/{}> {{{}}}",
          which,
          rec_args[*which],
          join_string(
            decls.names.iter().zip(decls.bodies.iter()).map(|(x, b)| format!("{} := {}", x, b)),
            "; "
          )
        )
      }
      Term::CoFix(which, decls) => {
        write!(
          f,
          "cofix<{}> {{{}}}",
          which,
          join_string(
            decls.names.iter().zip(decls.bodies.iter()).map(|(x, b)| format!("{} := {}", x, b)),
            "; "
          )
        )
      }
      Term::Proj(p, c) => write!(f, "{}.({})", c, p),
      Term::Evar(n)    => write!(f, "?e{}", n),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn lam(body: Term) -> Term {
    Term::Lambda(Name::Anonymous, Box::new(Term::Sort(SortKind::Set)), Box::new(body))
  }

  #[test]
  fn lift_skips_bound_rels() {
    // λ_. (#0 #1): #0 is bound, #1 is free (external index 0).
    let t = lam(mk_app(Term::Rel(0), vec![Term::Rel(1)]));
    let lifted = t.lift(2);
    assert_eq!(lifted, lam(mk_app(Term::Rel(0), vec![Term::Rel(3)])));
  }

  #[test]
  fn lift_from_threshold() {
    let t = mk_app(Term::Rel(0), vec![Term::Rel(3)]);
    assert_eq!(
      t.lift_from(2, 10),
      mk_app(Term::Rel(0), vec![Term::Rel(13)])
    );
  }

  #[test]
  fn subst_shifts_remaining_rels() {
    // (#0 #1 #2)[#0 := c] = (c #0 #1)
    let t = mk_app(Term::Rel(0), vec![Term::Rel(1), Term::Rel(2)]);
    let c = Term::Const(IString::from("c"));
    assert_eq!(
      t.subst1(&c),
      mk_app(c.clone(), vec![Term::Rel(0), Term::Rel(1)])
    );
  }

  #[test]
  fn subst_lifts_past_binders() {
    // (λ_. #1)[#0 := #5] = λ_. #6
    let t = lam(Term::Rel(1));
    assert_eq!(t.subst1(&Term::Rel(5)), lam(Term::Rel(6)));
  }

  #[test]
  fn beta_apply_binds_in_order() {
    // (λx. λy. (x y)) a b → (a b)
    let t = lam(lam(mk_app(Term::Rel(1), vec![Term::Rel(0)])));
    let a = Term::Const(IString::from("a"));
    let b = Term::Const(IString::from("b"));
    assert_eq!(
      t.beta_apply(vec![a.clone(), b.clone()]),
      mk_app(a, vec![b])
    );
  }

  #[test]
  fn mk_app_flattens() {
    let t = mk_app(mk_app(Term::Rel(0), vec![Term::Rel(1)]), vec![Term::Rel(2)]);
    match &t {
      Term::App(head, args) => {
        assert_eq!(**head, Term::Rel(0));
        assert_eq!(args.len(), 2);
      }
      other => panic!("expected App, got {}", other),
    }
  }

  #[test]
  fn occurrence_queries() {
    let t = lam(mk_app(Term::Rel(0), vec![Term::Rel(1), Term::Rel(4)]));
    assert!(t.noccur_between(1, 2));      // external 1 and 2 do not occur
    assert!(!t.noccur_between(0, 1));     // external 0 occurs
    assert!(!t.noccur_between(3, 1));     // external 3 occurs
    let frees: Vec<usize> = t.free_rels().iter().collect();
    assert_eq!(frees, vec![0, 3]);
  }

  #[test]
  fn fix_bodies_sit_under_block_binders() {
    // A 2-body block: free #0 inside a body is the second fix, external index 0 outside only
    // if it escapes both block binders.
    let decls = RecDecl {
      names: vec![Name::named("f"), Name::named("g")],
      types: vec![Term::Sort(SortKind::Set), Term::Sort(SortKind::Set)],
      bodies: vec![Term::Rel(1), Term::Rel(2)],
    };
    let t = Term::Fix(vec![0, 0], 0, decls);
    assert!(t.noccur_between(1, 4));
    let frees: Vec<usize> = t.free_rels().iter().collect();
    assert_eq!(frees, vec![0]); // only body 1's Rel(2) escapes: 2 - 2 = 0
  }
}
