/*!

A fueled weak-head reduction machine with selectable strengths.

The machine keeps a head term and a stack of pending arguments (top of stack = first argument)
and fires only the rules its flag set enables:

| flag    | rule |
|:--------|:-----|
| `Beta`  | `(λx. b) a ⇒ b[x := a]` |
| `Match` | `match C(args) with … ⇒ branch @ non-parameter args` |
| `Fix`   | unfold a fixpoint whose decreasing argument heads a constructor |
| `CoFix` | unfold a cofixpoint forced by a match |
| `Zeta`  | `let x := v in b ⇒ b[x := v]` |
| `Delta` | unfold constants with bodies and let-bound rels |

Casts are dropped unconditionally. Projections are *never* reduced here; the checker treats
projection reduction as out of scope and its projection handling documents that. Every machine
step consumes one unit of the shared step budget, so a cofixpoint that keeps reproducing itself
under a match ends in `Timeout` instead of divergence.

*/

use enumflags2::{bitflags, BitFlags};

use crate::{
  api::error::CheckResult,
  core::{
    environment::{Declaration, Context, EnvEntry, GlobalEnv},
    term::{mk_app, RecDecl, Term},
    Budget,
  },
};

#[bitflags]
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum RedFlag {
  Beta,
  Match,
  Fix,
  CoFix,
  Zeta,
  Delta,
}

pub type RedFlags = BitFlags<RedFlag, u8>;

/// Full weak-head normalization: β, ι (match/fix/cofix), ζ, δ.
pub fn whd_all(budget: &Budget, genv: &GlobalEnv, ctx: &Context, t: Term) -> CheckResult<Term> {
  whd(budget, genv, ctx, RedFlags::all(), t)
}

/// β, ι, ζ only; constants and let-bound rels stay folded.
pub fn whd_betaiotazeta(budget: &Budget, genv: &GlobalEnv, ctx: &Context, t: Term) -> CheckResult<Term> {
  whd(budget, genv, ctx, !RedFlag::Delta, t)
}

/// Full weak-head normalization except ζ: a `let` at the head is left standing.
pub fn whd_all_nolet(budget: &Budget, genv: &GlobalEnv, ctx: &Context, t: Term) -> CheckResult<Term> {
  whd(budget, genv, ctx, !RedFlag::Zeta, t)
}

/// The machine itself. Reduces until no enabled rule applies, then reassembles head and stack.
pub fn whd(
  budget: &Budget,
  genv: &GlobalEnv,
  ctx: &Context,
  flags: RedFlags,
  t: Term,
) -> CheckResult<Term> {
  let mut head = t;
  // Pending arguments; the top of the stack is the first argument.
  let mut stack: Vec<Term> = Vec::new();

  loop {
    budget.consume("whd")?;
    match head {
      Term::Cast(c, _) => {
        head = *c;
      }

      Term::App(f, args) => {
        stack.extend(args.into_iter().rev());
        head = *f;
      }

      Term::Lambda(_, _, body) if flags.contains(RedFlag::Beta) && !stack.is_empty() => {
        let arg = stack.pop().unwrap();
        head = body.subst1(&arg);
      }

      Term::LetIn(_, v, _, body) if flags.contains(RedFlag::Zeta) => {
        head = body.subst1(&v);
      }

      Term::Rel(i) if flags.contains(RedFlag::Delta) => {
        match ctx.lookup_rel(i).and_then(Declaration::value) {
          Some(value) => {
            head = value.lift(i + 1);
          }
          None => {
            head = Term::Rel(i);
            break;
          }
        }
      }

      Term::Const(kn) if flags.contains(RedFlag::Delta) => {
        match genv.lookup_env(&kn) {
          EnvEntry::Constant(cb) if cb.body.is_some() => {
            head = cb.body.clone().unwrap();
          }
          _ => {
            // An axiom, an inductive-shadowing name, or a missing constant: stuck either way.
            head = Term::Const(kn);
            break;
          }
        }
      }

      Term::Case(info, rtf, discr, branches) if flags.contains(RedFlag::Match) => {
        let reduced = whd(budget, genv, ctx, flags, *discr)?;
        let (dhead, dargs) = reduced.decompose_app();
        match dhead {
          Term::Construct(_, k) if k < branches.len() => {
            let real_args = dargs.into_iter().skip(info.npars).collect();
            head = branches[k].clone().beta_apply(real_args);
          }
          Term::CoFix(which, decls) if flags.contains(RedFlag::CoFix) => {
            let unfolded = contract_cofix(which, &decls);
            head = Term::Case(info, rtf, Box::new(mk_app(unfolded, dargs)), branches);
          }
          stuck => {
            head = Term::Case(info, rtf, Box::new(mk_app(stuck, dargs)), branches);
            break;
          }
        }
      }

      Term::Fix(rec_args, which, decls) if flags.contains(RedFlag::Fix) => {
        let decr = rec_args[which];
        if stack.len() > decr {
          let slot = stack.len() - 1 - decr;
          let arg = std::mem::replace(&mut stack[slot], Term::Rel(0));
          let arg = whd(budget, genv, ctx, flags, arg)?;
          let unfold = constructor_headed(&arg);
          stack[slot] = arg;
          if unfold {
            head = contract_fix(&rec_args, which, &decls);
          } else {
            head = Term::Fix(rec_args, which, decls);
            break;
          }
        } else {
          head = Term::Fix(rec_args, which, decls);
          break;
        }
      }

      stuck => {
        head = stuck;
        break;
      }
    }
  }

  stack.reverse();
  Ok(mk_app(head, stack))
}

pub fn constructor_headed(t: &Term) -> bool {
  match t {
    Term::Construct(..) => true,
    Term::App(head, _) => matches!(**head, Term::Construct(..)),
    _ => false,
  }
}

/// Replaces the block binders of body `which` with the fixpoints themselves. Body text refers
/// to fix `j` of an `n`-block as `Rel(n - 1 - j)`, so the substitution vector at position `i`
/// carries fix `n - 1 - i`.
pub fn contract_fix(rec_args: &[usize], which: usize, decls: &RecDecl) -> Term {
  let n = decls.len();
  let subs: Vec<Term> = (0..n)
      .map(|i| Term::Fix(rec_args.to_vec(), n - 1 - i, decls.clone()))
      .collect();
  decls.bodies[which].subst(&subs)
}

pub fn contract_cofix(which: usize, decls: &RecDecl) -> Term {
  let n = decls.len();
  let subs: Vec<Term> = (0..n).map(|i| Term::CoFix(n - 1 - i, decls.clone())).collect();
  decls.bodies[which].subst(&subs)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::abstractions::IString;
  use crate::core::environment::ConstantBody;
  use crate::core::term::{CaseInfo, IndRef, Name, SortKind};

  fn set() -> Term {
    Term::Sort(SortKind::Set)
  }

  fn genv_with_id() -> GlobalEnv {
    let mut genv = GlobalEnv::new();
    genv.add_constant(ConstantBody {
      name: IString::from("id"),
      ty: set(),
      body: Some(Term::Lambda(Name::named("x"), Box::new(set()), Box::new(Term::Rel(0)))),
    });
    genv.add_constant(ConstantBody {
      name: IString::from("ax"),
      ty: set(),
      body: None,
    });
    genv
  }

  #[test]
  fn beta_fires() {
    let budget = Budget::default();
    let genv = GlobalEnv::new();
    let ctx = Context::new();
    let t = mk_app(
      Term::Lambda(Name::Anonymous, Box::new(set()), Box::new(Term::Rel(0))),
      vec![Term::Const(IString::from("c"))],
    );
    assert_eq!(
      whd_betaiotazeta(&budget, &genv, &ctx, t).unwrap(),
      Term::Const(IString::from("c"))
    );
  }

  #[test]
  fn delta_selectivity() {
    let budget = Budget::default();
    let genv = genv_with_id();
    let ctx = Context::new();
    let call = mk_app(Term::Const(IString::from("id")), vec![Term::Const(IString::from("c"))]);

    // With δ the constant unfolds and the redex fires.
    assert_eq!(
      whd_all(&budget, &genv, &ctx, call.clone()).unwrap(),
      Term::Const(IString::from("c"))
    );
    // Without δ the application is stuck.
    assert_eq!(whd_betaiotazeta(&budget, &genv, &ctx, call.clone()).unwrap(), call);
    // Axioms never unfold.
    let axiom = Term::Const(IString::from("ax"));
    assert_eq!(whd_all(&budget, &genv, &ctx, axiom.clone()).unwrap(), axiom);
  }

  #[test]
  fn zeta_selectivity() {
    let budget = Budget::default();
    let genv = GlobalEnv::new();
    let ctx = Context::new();
    let t = Term::LetIn(
      Name::named("x"),
      Box::new(Term::Const(IString::from("v"))),
      Box::new(set()),
      Box::new(Term::Rel(0)),
    );
    assert_eq!(
      whd_all(&budget, &genv, &ctx, t.clone()).unwrap(),
      Term::Const(IString::from("v"))
    );
    assert_eq!(whd_all_nolet(&budget, &genv, &ctx, t.clone()).unwrap(), t);
  }

  #[test]
  fn match_on_constructor_selects_branch() {
    let budget = Budget::default();
    let genv = GlobalEnv::new();
    let ctx = Context::new();
    let nat = IndRef::new("nat", 0);
    // match S c with 0 ⇒ a | S p ⇒ p
    let t = Term::Case(
      CaseInfo { ind: nat.clone(), npars: 0 },
      Box::new(set()),
      Box::new(mk_app(
        Term::Construct(nat.clone(), 1),
        vec![Term::Const(IString::from("c"))],
      )),
      vec![
        Term::Const(IString::from("a")),
        Term::Lambda(Name::named("p"), Box::new(Term::Ind(nat)), Box::new(Term::Rel(0))),
      ],
    );
    assert_eq!(
      whd_all(&budget, &genv, &ctx, t).unwrap(),
      Term::Const(IString::from("c"))
    );
  }

  #[test]
  fn rel_def_unfolds_under_delta() {
    let budget = Budget::default();
    let genv = GlobalEnv::new();
    let mut ctx = Context::new();
    ctx.push_def(Name::named("x"), Term::Const(IString::from("v")), set());
    ctx.push_assum(Name::named("y"), set());
    assert_eq!(
      whd_all(&budget, &genv, &ctx, Term::Rel(1)).unwrap(),
      Term::Const(IString::from("v"))
    );
    assert_eq!(
      whd_betaiotazeta(&budget, &genv, &ctx, Term::Rel(1)).unwrap(),
      Term::Rel(1)
    );
  }

  #[test]
  fn fuel_exhaustion_times_out() {
    let budget = Budget::new(8);
    let mut genv = GlobalEnv::new();
    // loop := loop, a δ-cycle.
    genv.add_constant(ConstantBody {
      name: IString::from("loop"),
      ty: set(),
      body: Some(Term::Const(IString::from("loop"))),
    });
    let ctx = Context::new();
    let err = whd_all(&budget, &genv, &ctx, Term::Const(IString::from("loop"))).unwrap_err();
    assert!(!err.is_recoverable());
  }
}
