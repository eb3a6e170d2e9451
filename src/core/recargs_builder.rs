/*!

Building recursive-argument trees for nested inductive occurrences.

Matching on a value of `list (rtree A)` must tell the checker that the elements of the list are
subterms of the enclosing `rtree`. The positivity checker only stored a tree for `list` in terms
of `list` itself; this module re-derives ("approximates") that tree with the outer type's seed
tree substituted into the element positions, turning `Mrec(list)` into `Imbr(list)` and
re-pointing the inner back-references.

The derivation walks the container's constructor types, instantiated with the *uniform* prefix
of its parameters; any non-uniform parameter cannot carry recursion and its product is skipped
as `Norec`. The uniform count is computed here too, from the constructor conclusions: the
longest prefix of conclusion arguments that are plain references to parameter binders, minimized
across constructors and bodies.

*/

use crate::{
  api::error::{CheckError, CheckResult},
  core::{
    environment::{hnf_prod_apps, Context, GlobalEnv, MutualInductive},
    recarg::{dest_recarg, dest_subterms, eq_wf_paths, mk_norec, mk_paths, Recarg, WfPaths},
    reduce::whd_all,
    rtree::Rtree,
    term::{IndRef, Name, SortKind, Term},
    Budget,
  },
};

/// The number of uniform parameters of the block: the length of the prefix of parameters that
/// every constructor conclusion passes through untouched, capped at `npars`.
pub fn num_uniform_params(mib: &MutualInductive) -> usize {
  let mut uniform = mib.npars;
  for body in &mib.bodies {
    for ctype in &body.ctor_types {
      let (nbinders, conclusion) = strip_binders(ctype);
      let (_, args) = conclusion.clone().decompose_app();
      let mut prefix = 0;
      for arg in args.iter().take(mib.npars) {
        // Parameter binders are the outermost `npars` of the constructor's context.
        match arg {
          Term::Rel(r) if *r + mib.npars >= nbinders && *r < nbinders => prefix += 1,
          _ => break,
        }
      }
      uniform = uniform.min(prefix);
    }
  }
  uniform
}

/// Counts the outer products and lets of a constructor type, syntactically.
fn strip_binders(ty: &Term) -> (usize, &Term) {
  let mut count = 0;
  let mut head = ty;
  loop {
    match head {
      Term::Prod(_, _, b) => {
        count += 1;
        head = b.as_ref();
      }
      Term::LetIn(_, _, _, b) => {
        count += 1;
        head = b.as_ref();
      }
      Term::Cast(c, _) => {
        head = c.as_ref();
      }
      _ => return (count, head),
    }
  }
}

/// The local context paired with a parallel recargs assignment: `ra_env[i]` is the label and
/// tree of the binder at de Bruijn index `i`.
#[derive(Clone)]
struct RaContext {
  ctx: Context,
  ra_env: Vec<(Recarg, WfPaths)>,
}

impl RaContext {
  fn push_var(&self, name: Name, ty: Term) -> Self {
    let mut next = self.clone();
    next.ctx.push_assum(name, ty);
    next.ra_env.insert(0, (Recarg::Norec, mk_norec()));
    next
  }
}

/// Entry point: approximates the recargs tree of `ind` applied to `args`, pruned by the seed
/// `tree`. Starting with an empty recargs assignment is safe because any out-of-range `Rel` is
/// assigned `Norec`.
pub fn get_recargs_approx(
  budget: &Budget,
  genv: &GlobalEnv,
  ctx: &Context,
  tree: &WfPaths,
  ind: &IndRef,
  args: &[Term],
) -> CheckResult<WfPaths> {
  let ienv = RaContext { ctx: ctx.clone(), ra_env: Vec::new() };
  build_recargs_nested(budget, genv, &ienv, tree, ind, args)
}

/// One argument type of a constructor: dispatch on its weak-head form.
fn build_recargs(
  budget: &Budget,
  genv: &GlobalEnv,
  ienv: &RaContext,
  tree: &WfPaths,
  ty: &Term,
) -> CheckResult<WfPaths> {
  budget.consume("build_recargs")?;
  let reduced = whd_all(budget, genv, &ienv.ctx, ty.clone())?;
  let (head, largs) = reduced.decompose_app();
  match head {
    Term::Prod(name, a, b) => {
      if !largs.is_empty() {
        return Err(CheckError::other(
          "build_recargs",
          "an applied product survived weak-head reduction".to_string(),
        ));
      }
      let inner = ienv.push_var(name, (*a).clone());
      build_recargs(budget, genv, &inner, tree, &b)
    }

    // Free variables are allowed and assigned Norec.
    Term::Rel(k) => Ok(
      ienv
          .ra_env
          .get(k)
          .map(|(_, t)| t.clone())
          .unwrap_or_else(mk_norec),
    ),

    Term::Ind(ind) => {
      // Only when the seed tree expects this inductive is it a candidate nested occurrence.
      match dest_recarg(tree) {
        Recarg::Mrec(i) | Recarg::Imbr(i) if i == ind => {
          build_recargs_nested(budget, genv, ienv, tree, &ind, &largs)
        }
        _ => Ok(mk_norec()),
      }
    }

    _ => Ok(mk_norec()),
  }
}

/// Instantiates the container `ind`'s tree family with the given uniform parameters, using the
/// seed's constructor sub-trees as the recursion limit.
fn build_recargs_nested(
  budget: &Budget,
  genv: &GlobalEnv,
  ienv: &RaContext,
  tree: &WfPaths,
  ind: &IndRef,
  largs: &[Term],
) -> CheckResult<WfPaths> {
  budget.consume("build_recargs_nested")?;

  // If the seed already disallows recursion, no need to go further.
  if eq_wf_paths(tree, &mk_norec()) {
    return Ok(tree.clone());
  }

  let mib = genv.lookup_mind(&ind.mind)?;
  let auxntyp = mib.ntypes();
  let auxnpar = num_uniform_params(mib);
  let nonrecpar = mib.npars - auxnpar;
  if largs.len() < auxnpar {
    return Err(CheckError::other(
      "build_recargs_nested",
      format!("{} expects {} uniform parameters, got {} arguments", ind, auxnpar, largs.len()),
    ));
  }
  let lpar = &largs[..auxnpar];

  // Extend the context with one assumption per sibling body, instantiated with the uniform
  // parameters, and the recargs assignment with back-references into the family being built.
  let ienv = ienv_push_inductive(budget, genv, ienv, mib, lpar)?;

  // Parameters expressed under the new binders.
  let lpar_lifted: Vec<Term> = lpar.iter().map(|p| p.lift(auxntyp)).collect();

  // Recursion limits per body and constructor. For a mutual container we fall back on the
  // statically computed trees; nested inductives with mutually recursive containers are not
  // supported, so the seed only ever describes a single body.
  let limits: Vec<Vec<Vec<WfPaths>>> = if auxntyp == 1 {
    vec![dest_subterms(tree)?]
  } else {
    mib
        .bodies
        .iter()
        .map(|body| dest_subterms(&body.recargs))
        .collect::<CheckResult<Vec<_>>>()?
  };

  let mut family = Vec::with_capacity(auxntyp);
  for (j, body) in mib.bodies.iter().enumerate() {
    let abstracted = abstract_mind_lc(auxntyp, auxnpar, &body.ctor_types);
    let mut ctor_paths = Vec::with_capacity(abstracted.len());
    for (k, ctype) in abstracted.iter().enumerate() {
      let applied = hnf_prod_apps(budget, genv, &ienv.ctx, ctype, &lpar_lifted)?;
      // Non-uniform parameters may not carry recursion; skip them as plain binders.
      let (ienv_k, stripped) = ienv_decompose_prod(budget, genv, &ienv, nonrecpar, applied)?;
      let seeds = limits[j].get(k).ok_or_else(|| {
        CheckError::index(
          "build_recargs_nested",
          k,
          format!("recursion limit tree of {} lacks constructor {}", ind, k),
        )
      })?;
      ctor_paths.push(build_recargs_constructors(budget, genv, &ienv_k, seeds, stripped)?);
    }
    family.push(mk_paths(Recarg::Imbr(IndRef::new(mib.name.clone(), j)), ctor_paths));
  }

  let mut tied = Rtree::mk_rec(family);
  if ind.index >= tied.len() {
    return Err(CheckError::index(
      "build_recargs_nested",
      ind.index,
      format!("{} has no body {}", ind.mind, ind.index),
    ));
  }
  Ok(tied.swap_remove(ind.index))
}

/// Walks the argument products of one constructor left to right, consuming one recursion-limit
/// sub-tree per argument.
fn build_recargs_constructors(
  budget: &Budget,
  genv: &GlobalEnv,
  ienv: &RaContext,
  seeds: &[WfPaths],
  ctype: Term,
) -> CheckResult<Vec<WfPaths>> {
  let mut ienv = ienv.clone();
  let mut seeds = seeds.iter();
  let mut collected = Vec::new();
  let mut head = ctype;
  loop {
    budget.consume("build_recargs_constructors")?;
    let reduced = whd_all(budget, genv, &ienv.ctx, head)?;
    match reduced {
      Term::Prod(name, a, b) => {
        let seed = seeds.next().ok_or_else(|| {
          CheckError::other(
            "build_recargs_constructors",
            "cannot resolve recursive parameters of a nested inductive".to_string(),
          )
        })?;
        collected.push(build_recargs(budget, genv, &ienv, seed, &a)?);
        ienv = ienv.push_var(name, *a);
        head = *b;
      }
      _ => return Ok(collected),
    }
  }
}

/// Pushes the bodies of `mib` (body 0 outermost), each instantiated with the uniform
/// parameters, and prepends matching `Imbr` back-references to the recargs assignment. Existing
/// assignments are lifted past the new binders.
fn ienv_push_inductive(
  budget: &Budget,
  genv: &GlobalEnv,
  ienv: &RaContext,
  mib: &MutualInductive,
  lpar: &[Term],
) -> CheckResult<RaContext> {
  let ntypes = mib.ntypes();
  let mut ctx = ienv.ctx.clone();
  for (j, body) in mib.bodies.iter().enumerate() {
    let ty = hnf_prod_apps(budget, genv, &ienv.ctx, &body.arity, lpar)?;
    ctx.push_assum(Name::Anonymous, ty.lift(j));
  }

  // Binder at de Bruijn index k is body ntypes - 1 - k.
  let ra_env = (0..ntypes)
      .map(|k| {
        let j = ntypes - 1 - k;
        (Recarg::Imbr(IndRef::new(mib.name.clone(), j)), Rtree::Param(0, j))
      })
      .chain(ienv.ra_env.iter().map(|(r, t)| (r.clone(), t.lift(ntypes))))
      .collect();

  Ok(RaContext { ctx, ra_env })
}

/// Moves `n` outer products into the context as `Norec` entries.
fn ienv_decompose_prod(
  budget: &Budget,
  genv: &GlobalEnv,
  ienv: &RaContext,
  n: usize,
  ty: Term,
) -> CheckResult<(RaContext, Term)> {
  let mut ienv = ienv.clone();
  let mut head = ty;
  for _ in 0..n {
    head = whd_all(budget, genv, &ienv.ctx, head)?;
    match head {
      Term::Prod(name, a, b) => {
        ienv = ienv.push_var(name, *a);
        head = *b;
      }
      other => {
        return Err(CheckError::other(
          "ienv_decompose_prod",
          format!("expected {} more products, found {}", n, other),
        ));
      }
    }
  }
  Ok((ienv, head))
}

/// Replaces the mutual-body references of a constructor type with parameter-absorbing lambdas,
/// so that instantiating the type with parameters leaves sibling references bare.
fn abstract_mind_lc(ntypes: usize, npars: usize, ctor_types: &[Term]) -> Vec<Term> {
  if npars == 0 {
    return ctor_types.to_vec();
  }
  let subs: Vec<Term> = (0..ntypes).map(|i| lambda_implicit_lift(npars, Term::Rel(i))).collect();
  ctor_types.iter().map(|ctype| ctype.subst(&subs)).collect()
}

fn lambda_implicit_lift(n: usize, t: Term) -> Term {
  let mut wrapped = t.lift(n);
  for _ in 0..n {
    wrapped = Term::Lambda(Name::Anonymous, Box::new(Term::Sort(SortKind::Prop)), Box::new(wrapped));
  }
  wrapped
}
