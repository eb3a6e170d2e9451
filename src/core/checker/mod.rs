/*!

The fixpoint entry point.

`check_fix` takes a mutual fixpoint block and decides whether every recursive call in every body
is made on a structurally smaller argument. The work splits in two: `inductive_of_mutfix` walks
each body down to its decreasing argument, checking shape constraints and extracting the
inductive type recursion happens on; the walker then verifies the calls, with the recursive
argument seeded as a loose subterm of itself carrying the inductive's full recargs tree.

*/

pub(crate) mod inference;
pub(crate) mod walker;

#[cfg(test)]
mod tests;

use crate::{
  api::error::{CheckError, CheckResult},
  core::{
    checker::walker::RecCheck,
    environment::{Context, Finiteness, GlobalEnv},
    reduce::whd_all,
    subterm::GuardEnv,
    term::{IndRef, RecDecl, Term},
    Budget,
  },
  debug,
};

/// Checks a mutual fixpoint block for guardedness. `rec_args[i]` is the 0-based position of
/// body `i`'s structurally decreasing argument; `decls` holds the names, types, and bodies of
/// the block as they appear in a `Term::Fix`.
pub fn check_fix(
  genv: &GlobalEnv,
  ctx: &Context,
  rec_args: &[usize],
  decls: &RecDecl,
  budget: &Budget,
) -> CheckResult<()> {
  let nbfix = decls.len();
  if nbfix == 0
      || decls.types.len() != nbfix
      || decls.names.len() != nbfix
      || rec_args.len() != nbfix
  {
    return Err(CheckError::programming(
      "check_fix",
      "ill-formed mutual fixpoint block".to_string(),
    ));
  }
  debug!(1, "check_fix: block of {} bodies", nbfix);

  let recursive_inductives = inductive_of_mutfix(budget, genv, ctx, rec_args, decls)?;

  let mut trees = Vec::with_capacity(nbfix);
  for (ind, _) in &recursive_inductives {
    let tree = genv.lookup_paths(ind)?;
    if !tree.is_closed() {
      return Err(CheckError::programming(
        "check_fix",
        format!("the declared recargs tree of {} has dangling back-references", ind),
      ));
    }
    trees.push(tree);
  }

  let rec_check = RecCheck {
    budget,
    genv,
    rec_args: rec_args.to_vec(),
    trees,
  };
  for (i, (ind, (body_ctx, body))) in recursive_inductives.iter().enumerate() {
    debug!(1, "check_fix: body {} recurses on {}", i, ind);
    let guard_env = GuardEnv::for_fix_body(
      body_ctx.clone(),
      rec_args[i],
      rec_check.trees[i].clone(),
    );
    rec_check.check_rec_call(&guard_env, &Vec::new(), body)?;
  }
  debug!(1, "check_fix: block accepted");
  Ok(())
}

/// Convenience wrapper accepting the `Term::Fix` node itself.
pub fn check_fix_term(
  genv: &GlobalEnv,
  ctx: &Context,
  t: &Term,
  budget: &Budget,
) -> CheckResult<()> {
  match t {
    Term::Fix(rec_args, _, decls) => check_fix(genv, ctx, rec_args, decls, budget),
    other => Err(CheckError::other(
      "check_fix_term",
      format!("expected a fixpoint, found {}", other),
    )),
  }
}

/// Walks each body under its leading lambdas up to and including the decreasing argument,
/// verifying that (a) no argument type mentions a sibling fixpoint, (b) the decreasing
/// argument's type is an inductive of a `Finite` block, and returning that inductive together
/// with the context under the recursive lambda and the remaining body.
fn inductive_of_mutfix(
  budget: &Budget,
  genv: &GlobalEnv,
  ctx: &Context,
  rec_args: &[usize],
  decls: &RecDecl,
) -> CheckResult<Vec<(IndRef, (Context, Term))>> {
  let nbfix = decls.len();
  let mut body_ctx = ctx.clone();
  body_ctx.push_rec_types(decls);

  let mut result = Vec::with_capacity(nbfix);
  for (i, body) in decls.bodies.iter().enumerate() {
    let mut env = body_ctx.clone();
    let mut def = body.clone();
    let k = rec_args[i];
    let mut found = None;

    for j in 0..=k {
      def = whd_all(budget, genv, &env, def)?;
      let (name, arg_ty, rest) = match def {
        Term::Lambda(ref name, ref arg_ty, ref rest) => (name, arg_ty, rest),
        _ => {
          return Err(CheckError::guard(
            "inductive_of_mutfix",
            format!("body {} has fewer abstractions than its decreasing argument index {}", i, k),
          ));
        }
      };
      // From under `j` lambdas the fixpoints of the block sit at indices j .. j + nbfix.
      if !arg_ty.noccur_between(j, nbfix) {
        return Err(CheckError::programming(
          "inductive_of_mutfix",
          format!("recursive call in the type of argument {} of body {}", j, i),
        ));
      }
      if j == k {
        let (head, _) = whd_all(budget, genv, &env, (**arg_ty).clone())?.decompose_app();
        let ind = match head {
          Term::Ind(ind) => ind,
          other => {
            return Err(CheckError::guard(
              "inductive_of_mutfix",
              format!("body {} does not recurse on an inductive type but on {}", i, other),
            ));
          }
        };
        let (mib, _) = genv.lookup_mind_specif(&ind)?;
        if mib.finite != Finiteness::Finite {
          return Err(CheckError::guard(
            "inductive_of_mutfix",
            format!("body {} recurses on {}, which is not a well-founded inductive", i, ind),
          ));
        }
        env.push_assum(name.clone(), (**arg_ty).clone());
        found = Some((ind, (env.clone(), (**rest).clone())));
      } else {
        env.push_assum(name.clone(), (**arg_ty).clone());
        def = (**rest).clone();
      }
    }

    match found {
      Some(entry) => result.push(entry),
      // `0..=k` always reaches `j == k`.
      None => {
        return Err(CheckError::programming(
          "inductive_of_mutfix",
          "the recursive-argument walk ended without a verdict".to_string(),
        ));
      }
    }
  }
  Ok(result)
}
