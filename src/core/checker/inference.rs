/*!

Subterm inference: given a term and a stack of deferred applicants, compute what the checker
may claim about the term's size relative to the recursive argument.

Strictness is *born* in `branches_specif`: the binders of a match branch on a discriminant with
spec `Subterm(_, t)` receive `Subterm(Strict, sub)` for the sub-trees of `t`, which is what
lets recursion descend through a `match` even when the discriminant itself is only loose.

The restriction functions at the bottom guard against dependent matches laundering size
information through their return type: whenever the return-type function determines the type of
the result (or of a later argument), the claimed tree is intersected with a freshly built
approximation of that type's recargs tree.

*/

use crate::{
  api::error::{CheckError, CheckResult},
  core::{
    environment::{decompose_lambda_n_assum, dest_lambda_assum, dest_prod, dest_prod_assum,
                  Context, Declaration, GlobalEnv},
    recarg::{dest_recarg, dest_subterms, inter_wf_paths, match_inductive},
    recargs_builder::get_recargs_approx,
    reduce::whd_all,
    subterm::{push_stack_args, push_stack_closures, spec_glb, spec_of_tree, GuardEnv, Size,
              Stack, StackElement, SubtermSpec},
    term::{CaseInfo, Term},
    Budget,
  },
  trace,
};

/// Forces the spec of one stack element. A closure is inferred with an empty stack: the
/// deferred arguments of the *outer* term do not apply to its arguments.
pub fn stack_element_specif(
  budget: &Budget,
  genv: &GlobalEnv,
  element: &StackElement,
) -> CheckResult<SubtermSpec> {
  match element {
    StackElement::Closure(guard_env, term) => {
      subterm_specif(budget, genv, guard_env, &Vec::new(), term)
    }
    StackElement::Arg(spec) => Ok(spec.clone()),
  }
}

/// Pops the head of the stack as a spec; an empty stack yields `NotSubterm`.
pub fn extract_stack(
  budget: &Budget,
  genv: &GlobalEnv,
  stack: &Stack,
) -> CheckResult<(SubtermSpec, Stack)> {
  match stack.first() {
    None => Ok((SubtermSpec::NotSubterm, Vec::new())),
    Some(element) => Ok((stack_element_specif(budget, genv, element)?, stack[1..].to_vec())),
  }
}

/// Infers a subterm spec for `t` under `guard_env`, with `stack` holding what would be applied
/// to `t` after the surrounding matches reduce.
pub fn subterm_specif(
  budget: &Budget,
  genv: &GlobalEnv,
  guard_env: &GuardEnv,
  stack: &Stack,
  t: &Term,
) -> CheckResult<SubtermSpec> {
  budget.consume("subterm_specif")?;
  let reduced = whd_all(budget, genv, &guard_env.ctx, t.clone())?;
  let (head, largs) = reduced.decompose_app();

  match head {
    // An application does not lose subterm status, so the stack is irrelevant here.
    Term::Rel(k) => Ok(guard_env.lookup_subterm(k)),

    Term::Case(info, rtf, discr, branches) => {
      let stack = push_stack_closures(guard_env, &largs, stack);
      let discr_spec = subterm_specif(budget, genv, guard_env, &Vec::new(), &discr)?;
      let binder_specs = branches_specif(genv, &discr_spec, &info)?;
      if binder_specs.len() != branches.len() {
        return Err(CheckError::programming(
          "subterm_specif",
          format!("match on {} has {} branches for {} constructors", info.ind, branches.len(), binder_specs.len()),
        ));
      }
      let mut branch_results = Vec::with_capacity(branches.len());
      for (specs, branch) in binder_specs.into_iter().zip(branches.iter()) {
        let stack_br = push_stack_args(specs, &stack);
        branch_results.push(subterm_specif(budget, genv, guard_env, &stack_br, branch)?);
      }
      let spec = spec_glb(branch_results)?;
      restrict_spec_for_match(budget, genv, &guard_env.ctx, spec, &rtf)
    }

    // A nested fixpoint applied to a strict subterm produces strict subterms, provided it
    // recurses on an argument of the same inductive. The fix itself is temporarily marked as a
    // strict subterm so that its own recursive calls are recognized as decreasing.
    Term::Fix(rec_args, which, decls) => {
      let (fragment, codomain) = dest_prod(budget, genv, &guard_env.ctx, &decls.types[which])?;
      let codomain_ctx = guard_env.ctx.extended(&fragment);
      let (cod_head, _) = whd_all(budget, genv, &codomain_ctx, codomain)?.decompose_app();
      let ind = match cod_head {
        Term::Ind(ind) => ind,
        // Happens when the fix is polymorphic in its result.
        _ => return Ok(SubtermSpec::NotSubterm),
      };
      let tree = genv.lookup_paths(&ind)?;
      let nbfix = decls.len();
      let decr = rec_args[which];

      let mut inner_env = guard_env.push_fix_block(&decls);
      inner_env.set_spec(nbfix - 1 - which, SubtermSpec::Subterm(Size::Strict, tree));

      let (sign, stripped_body) = decompose_lambda_n_assum(&decls.bodies[which], decr + 1)?;
      let stack = push_stack_closures(guard_env, &largs, stack);
      for decl in &sign {
        inner_env = match decl {
          Declaration::Assum(name, ty) => inner_env.push_var_nonrec(name.clone(), ty.clone()),
          Declaration::Def(name, value, ty) => inner_env.push_let(
            name.clone(),
            value.clone(),
            ty.clone(),
            SubtermSpec::NotSubterm,
          ),
        };
      }
      if stack.len() >= decr + 1 {
        let arg_spec = stack_element_specif(budget, genv, &stack[decr])?;
        inner_env.set_spec(0, arg_spec);
      }
      subterm_specif(budget, genv, &inner_env, &Vec::new(), &stripped_body)
    }

    Term::Lambda(name, ty, body) => {
      if !largs.is_empty() {
        return Err(CheckError::programming(
          "subterm_specif",
          "applied lambda survived weak-head reduction".to_string(),
        ));
      }
      let (spec, rest) = extract_stack(budget, genv, stack)?;
      subterm_specif(budget, genv, &guard_env.push_var(name, *ty, spec), &rest, &body)
    }

    // The projected argument's tree is a sub-tree of the record's single constructor. The
    // incoming stack is deliberately reused for the inner term.
    Term::Proj(proj, inner) => {
      match subterm_specif(budget, genv, guard_env, stack, &inner)? {
        SubtermSpec::DeadCode => Ok(SubtermSpec::DeadCode),
        SubtermSpec::NotSubterm => Ok(SubtermSpec::NotSubterm),
        SubtermSpec::Subterm(_, tree) => {
          let ctors = dest_subterms(&tree)?;
          if ctors.len() != 1 {
            return Err(CheckError::programming(
              "subterm_specif",
              format!("projection {} from a type with {} constructors", proj, ctors.len()),
            ));
          }
          let arg_tree = ctors[0].get(proj.arg).ok_or_else(|| {
            CheckError::index(
              "subterm_specif",
              proj.arg,
              format!("projection {} addresses argument {} of {} fields", proj, proj.arg, ctors[0].len()),
            )
          })?;
          Ok(spec_of_tree(arg_tree))
        }
      }
    }

    Term::Evar(n) => Err(CheckError::other(
      "subterm_specif",
      format!("existential variable ?e{} is not supported", n),
    )),

    _ => Ok(SubtermSpec::NotSubterm),
  }
}

/// Per-branch, per-binder specs for a match on a discriminant with spec `discr_spec`.
/// Constructor arities come from the statically declared tree, so the shape is right even when
/// the discriminant's spec says nothing about this inductive.
pub fn branches_specif(
  genv: &GlobalEnv,
  discr_spec: &SubtermSpec,
  info: &CaseInfo,
) -> CheckResult<Vec<Vec<SubtermSpec>>> {
  let declared = genv.lookup_paths(&info.ind)?;
  let arities: Vec<usize> = dest_subterms(&declared)?.iter().map(|args| args.len()).collect();

  arities
      .iter()
      .enumerate()
      .map(|(i, &arity)| match discr_spec {
        SubtermSpec::Subterm(_, tree) if match_inductive(&info.ind, &dest_recarg(tree)) => {
          let args = dest_subterms(tree)?;
          let ctor_args = &args[i];
          if ctor_args.len() != arity {
            return Err(CheckError::programming(
              "branches_specif",
              format!(
                "constructor {} of {} has {} arguments but its tree lists {}",
                i, info.ind, arity, ctor_args.len()
              ),
            ));
          }
          Ok(ctor_args.iter().map(spec_of_tree).collect())
        }
        SubtermSpec::DeadCode => Ok(vec![SubtermSpec::DeadCode; arity]),
        _ => Ok(vec![SubtermSpec::NotSubterm; arity]),
      })
      .collect()
}

/// Restricts a spec inferred for a whole match by its return-type function: if the rtf is
/// dependent and lands in an inductive type, the spec's tree may not claim more than the
/// recargs approximation of that type.
pub fn restrict_spec_for_match(
  budget: &Budget,
  genv: &GlobalEnv,
  ctx: &Context,
  spec: SubtermSpec,
  rtf: &Term,
) -> CheckResult<SubtermSpec> {
  if spec == SubtermSpec::NotSubterm {
    return Ok(spec);
  }
  let (abs_fragment, body) = dest_lambda_assum(rtf);
  // A non-dependent return type restricts nothing.
  if body.noccur_between(0, abs_fragment.len()) {
    return Ok(spec);
  }
  let ctx = ctx.extended(&abs_fragment);
  let (arg_fragment, codomain) = dest_prod_assum(budget, genv, &ctx, &body)?;
  let ctx = ctx.extended(&arg_fragment);
  let (head, args) = whd_all(budget, genv, &ctx, codomain)?.decompose_app();
  match head {
    Term::Ind(ind) => match spec {
      SubtermSpec::DeadCode => Ok(SubtermSpec::DeadCode),
      SubtermSpec::Subterm(size, tree) => {
        let approx = get_recargs_approx(budget, genv, &ctx, &tree, &ind, &args)?;
        match inter_wf_paths(&tree, &approx) {
          Some(restricted) => Ok(SubtermSpec::Subterm(size, restricted)),
          None => Err(CheckError::other(
            "restrict_spec_for_match",
            format!("tree {} is incompatible with the match return type's tree {}", tree, approx),
          )),
        }
      }
      SubtermSpec::NotSubterm => Ok(SubtermSpec::NotSubterm),
    },
    _ => Ok(SubtermSpec::NotSubterm),
  }
}

/// Restricts every stack entry by the corresponding argument type of the (dependent) return
/// type function. Entries aligned with a product whose domain lands in an inductive keep a
/// restricted spec; anything else loses its information, as do entries beyond the rtf's arity.
pub fn filter_stack_domain(
  budget: &Budget,
  genv: &GlobalEnv,
  ctx: &Context,
  rtf: &Term,
  stack: Stack,
) -> CheckResult<Stack> {
  let (abs_fragment, body) = dest_lambda_assum(rtf);
  if body.noccur_between(0, abs_fragment.len()) {
    return Ok(stack);
  }
  let mut ctx = ctx.extended(&abs_fragment);
  let mut remaining = body;
  let mut filtered: Stack = Vec::with_capacity(stack.len());
  let mut elements = stack.into_iter();

  while let Some(element) = elements.next() {
    let whd_body = whd_all(budget, genv, &ctx, remaining)?;
    let (binder_name, domain, codomain) = match whd_body {
      Term::Prod(name, domain, codomain) => (name, domain, codomain),
      _ => {
        // The rtf ran out of products: no spec survives from here on.
        filtered.push(StackElement::Arg(SubtermSpec::NotSubterm));
        filtered.extend(elements.map(|_| StackElement::Arg(SubtermSpec::NotSubterm)));
        return Ok(filtered);
      }
    };

    let (domain_fragment, domain_head) = dest_prod_assum(budget, genv, &ctx, &domain)?;
    let domain_ctx = ctx.extended(&domain_fragment);
    let (ty_head, ty_args) = whd_all(budget, genv, &domain_ctx, domain_head)?.decompose_app();
    let element = match ty_head {
      Term::Ind(ind) => match stack_element_specif(budget, genv, &element)? {
        SubtermSpec::NotSubterm | SubtermSpec::DeadCode => element,
        SubtermSpec::Subterm(size, path) => {
          let approx = get_recargs_approx(budget, genv, &domain_ctx, &path, &ind, &ty_args)?;
          match inter_wf_paths(&path, &approx) {
            Some(restricted) => StackElement::Arg(SubtermSpec::Subterm(size, restricted)),
            None => {
              return Err(CheckError::other(
                "filter_stack_domain",
                format!("stack entry tree {} is incompatible with its argument type", path),
              ));
            }
          }
        }
      },
      _ => StackElement::Arg(SubtermSpec::NotSubterm),
    };
    trace!(4, "filter_stack_domain kept entry as {:?}", element);
    filtered.push(element);
    ctx.push_assum(binder_name, (*domain).clone());
    remaining = *codomain;
  }
  Ok(filtered)
}
