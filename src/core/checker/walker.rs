/*!

The guarded-recursion walk.

`RecCheck` carries what is fixed for the whole check of one mutual block: the decreasing
argument position and the declared recargs tree of every fixpoint. `check_rec_call` then walks a
body, maintaining a guard environment and a stack of deferred applicants, and verifies every
occurrence of a tracked fixpoint.

Error recovery is deliberately narrow. Four places catch a recoverable failure and retry after
reducing further: a match (reduce the discriminant to a constructor), a nested fix (reduce its
decreasing argument to a constructor), a constant application (unfold the constant), and a
projection (which reduces but cannot retry, projection reduction being unimplemented).
`Programming` and `Timeout` errors pass through all of these.

*/

use crate::{
  api::error::{CheckError, CheckResult},
  core::{
    checker::inference::{branches_specif, extract_stack, filter_stack_domain,
                         stack_element_specif, subterm_specif},
    environment::{EnvEntry, GlobalEnv},
    recarg::{incl_wf_paths, WfPaths},
    reduce::{constructor_headed, whd_all, whd_betaiotazeta},
    subterm::{push_stack_closures, push_stack_args, GuardEnv, Size, Stack, StackElement,
              SubtermSpec},
    term::{mk_app, Term},
    Budget,
  },
  debug, trace,
};

/// Does `spec` prove a decrease against the declared tree of the called fixpoint?
pub fn check_is_subterm(spec: &SubtermSpec, declared: &WfPaths) -> bool {
  match spec {
    SubtermSpec::Subterm(Size::Strict, tree) => incl_wf_paths(declared, tree),
    SubtermSpec::DeadCode => true,
    _ => false,
  }
}

pub(crate) struct RecCheck<'a> {
  pub budget: &'a Budget,
  pub genv: &'a GlobalEnv,
  /// Decreasing argument position of each fixpoint of the block.
  pub rec_args: Vec<usize>,
  /// Declared recargs tree of each fixpoint's recursive inductive.
  pub trees: Vec<WfPaths>,
}

impl<'a> RecCheck<'a> {
  fn num_fixes(&self) -> usize {
    self.rec_args.len()
  }

  fn check_args(&self, guard_env: &GuardEnv, args: &[Term]) -> CheckResult<()> {
    for arg in args {
      self.check_rec_call(guard_env, &Vec::new(), arg)?;
    }
    Ok(())
  }

  /// Verifies every call to a tracked fixpoint inside `t`.
  pub fn check_rec_call(&self, guard_env: &GuardEnv, stack: &Stack, t: &Term) -> CheckResult<()> {
    self.budget.consume("check_rec_call")?;
    let nbfix = self.num_fixes();

    // Fast path: a term that cannot mention the fixpoints is guarded.
    if t.noccur_between(guard_env.rel_min_fix, nbfix) {
      return Ok(());
    }

    let reduced = whd_betaiotazeta(self.budget, self.genv, &guard_env.ctx, t.clone())?;
    let (head, largs) = reduced.decompose_app();

    match head {
      Term::Rel(p) => {
        if p >= guard_env.rel_min_fix && p < guard_env.rel_min_fix + nbfix {
          self.check_args(guard_env, &largs)?;
          // The block is bound with fix 0 outermost, so the de Bruijn index inverts.
          let which = guard_env.rel_min_fix + nbfix - 1 - p;
          let decr = self.rec_args[which];
          let stack = push_stack_closures(guard_env, &largs, stack);
          if stack.len() <= decr {
            return Err(CheckError::guard(
              "check_rec_call",
              format!(
                "the recursive call to fix {} is applied to {} arguments, its decreasing argument is number {}",
                which, stack.len(), decr + 1
              ),
            ));
          }
          let element = &stack[decr];
          let spec = stack_element_specif(self.budget, self.genv, element)?;
          if !check_is_subterm(&spec, &self.trees[which]) {
            return Err(match element {
              StackElement::Closure(_, arg) => CheckError::guard(
                "check_rec_call",
                format!(
                  "the recursive call to fix {} is on {} with spec {}, which is not a strict subterm of the decreasing argument",
                  which, arg, spec
                ),
              ),
              StackElement::Arg(_) => CheckError::guard(
                "check_rec_call",
                format!(
                  "no argument is actually applied at the decreasing position of the recursive call to fix {} (spec {})",
                  which, spec
                ),
              ),
            });
          }
          trace!(3, "recursive call to fix {} accepted with spec {}", which, spec);
          Ok(())
        } else {
          self.check_args(guard_env, &largs)
        }
      }

      Term::Case(info, rtf, discr, branches) => {
        let attempt = (|| -> CheckResult<()> {
          self.check_rec_call(guard_env, &Vec::new(), &rtf)?;
          self.check_rec_call(guard_env, &Vec::new(), &discr)?;
          self.check_args(guard_env, &largs)?;
          let discr_spec = subterm_specif(self.budget, self.genv, guard_env, &Vec::new(), &discr)?;
          let binder_specs = branches_specif(self.genv, &discr_spec, &info)?;
          let stack = push_stack_closures(guard_env, &largs, stack);
          let stack = filter_stack_domain(self.budget, self.genv, &guard_env.ctx, &rtf, stack)?;
          for (specs, branch) in binder_specs.into_iter().zip(branches.iter()) {
            let stack_br = push_stack_args(specs, &stack);
            self.check_rec_call(guard_env, &stack_br, branch)?;
          }
          Ok(())
        })();
        match attempt {
          Err(err) if err.is_recoverable() => {
            // Try hard to make the match disappear: if the discriminant reduces to a
            // constructor the whole redex can be rechecked in reduced position.
            let discr = whd_all(self.budget, self.genv, &guard_env.ctx, (*discr).clone())?;
            if constructor_headed(&discr) {
              debug!(2, "retrying a match after reducing its discriminant to {}", discr);
              let rebuilt = mk_app(Term::Case(info, rtf, Box::new(discr), branches), largs);
              self.check_rec_call(guard_env, stack, &rebuilt)
            } else {
              Err(err)
            }
          }
          other => other,
        }
      }

      // A nested fixpoint g inside the body of the checked one: if g is applied to a subterm
      // at its own decreasing position, then inside g's body that argument keeps its subterm
      // spec, so calls of the outer fix through g's recursion remain checkable.
      Term::Fix(inner_rec_args, which, decls) => {
        let inner_decr = inner_rec_args[which];
        let attempt = (|| -> CheckResult<()> {
          self.check_args(guard_env, &largs)?;
          for ty in &decls.types {
            self.check_rec_call(guard_env, &Vec::new(), ty)?;
          }
          let inner_env = guard_env.push_fix_block(&decls);
          let stack = push_stack_closures(guard_env, &largs, stack);
          for (j, body) in decls.bodies.iter().enumerate() {
            if j == which && stack.len() > inner_decr {
              let spec = stack_element_specif(self.budget, self.genv, &stack[inner_decr])?;
              self.check_nested_fix_body(&inner_env, inner_decr + 1, spec, body)?;
            } else {
              self.check_rec_call(&inner_env, &Vec::new(), body)?;
            }
          }
          Ok(())
        })();
        match attempt {
          Err(err) if err.is_recoverable() && largs.len() > inner_decr => {
            let arg = whd_all(self.budget, self.genv, &guard_env.ctx, largs[inner_decr].clone())?;
            if constructor_headed(&arg) {
              debug!(2, "retrying a nested fix after reducing its decreasing argument");
              let mut largs = largs;
              largs[inner_decr] = arg;
              let rebuilt = mk_app(Term::Fix(inner_rec_args, which, decls), largs);
              self.check_rec_call(guard_env, stack, &rebuilt)
            } else {
              Err(err)
            }
          }
          other => other,
        }
      }

      Term::Const(kn) => {
        match self.check_args(guard_env, &largs) {
          Ok(()) => Ok(()),
          Err(err) if err.is_recoverable() => match self.genv.lookup_env(&kn) {
            EnvEntry::Constant(cb) if cb.body.is_some() => {
              debug!(2, "retrying after unfolding constant {}", kn);
              let unfolded = mk_app(cb.body.clone().unwrap(), largs);
              self.check_rec_call(guard_env, stack, &unfolded)
            }
            _ => Err(err),
          },
          Err(err) => Err(err),
        }
      }

      Term::Lambda(name, ty, body) => {
        if !largs.is_empty() {
          return Err(CheckError::programming(
            "check_rec_call",
            "applied lambda survived βιζ reduction".to_string(),
          ));
        }
        self.check_rec_call(guard_env, &Vec::new(), &ty)?;
        let (spec, rest) = extract_stack(self.budget, self.genv, stack)?;
        self.check_rec_call(&guard_env.push_var(name, *ty, spec), &rest, &body)
      }

      Term::Prod(name, ty, body) => {
        if !largs.is_empty() || !stack.is_empty() {
          return Err(CheckError::programming(
            "check_rec_call",
            "a product cannot be applied".to_string(),
          ));
        }
        self.check_rec_call(guard_env, &Vec::new(), &ty)?;
        self.check_rec_call(&guard_env.push_var_nonrec(name, *ty), &Vec::new(), &body)
      }

      Term::CoFix(_, decls) => {
        self.check_args(guard_env, &largs)?;
        for ty in &decls.types {
          self.check_rec_call(guard_env, &Vec::new(), ty)?;
        }
        let inner_env = guard_env.push_fix_block(&decls);
        for body in &decls.bodies {
          self.check_rec_call(&inner_env, &Vec::new(), body)?;
        }
        Ok(())
      }

      Term::Ind(_) | Term::Construct(..) => self.check_args(guard_env, &largs),

      Term::Proj(proj, inner) => {
        let attempt = (|| -> CheckResult<()> {
          self.check_args(guard_env, &largs)?;
          self.check_rec_call(guard_env, &Vec::new(), &inner)
        })();
        match attempt {
          Err(err) if err.is_recoverable() => {
            let inner = whd_all(self.budget, self.genv, &guard_env.ctx, (*inner).clone())?;
            if constructor_headed(&inner) {
              // Projection reduction is not implemented, so even a constructor-headed record
              // cannot be projected away; the original failure stands.
              debug!(
                2,
                "projection {} has a constructor-headed argument but cannot be reduced", proj
              );
            }
            Err(err)
          }
          other => other,
        }
      }

      Term::Var(name) => Err(CheckError::other(
        "check_rec_call",
        format!("free named variable {} is not supported", name),
      )),

      Term::Evar(n) => Err(CheckError::other(
        "check_rec_call",
        format!("existential variable ?e{} is not supported", n),
      )),

      Term::Sort(_) => {
        if largs.is_empty() {
          Ok(())
        } else {
          Err(CheckError::programming(
            "check_rec_call",
            "a sort cannot be applied".to_string(),
          ))
        }
      }

      Term::App(..) | Term::LetIn(..) | Term::Cast(..) => Err(CheckError::programming(
        "check_rec_call",
        "β ι ζ weak-head reduction left an application, let or cast at the head".to_string(),
      )),
    }
  }

  /// Enters `decr` lambdas of a nested fix body, all non-recursive except the last, which
  /// receives `spec`; then resumes the normal walk.
  fn check_nested_fix_body(
    &self,
    guard_env: &GuardEnv,
    decr: usize,
    spec: SubtermSpec,
    body: &Term,
  ) -> CheckResult<()> {
    self.budget.consume("check_nested_fix_body")?;
    if decr == 0 {
      let mut guard_env = guard_env.clone();
      guard_env.set_spec(0, spec);
      return self.check_rec_call(&guard_env, &Vec::new(), body);
    }
    match body {
      Term::Lambda(name, ty, inner) => {
        self.check_rec_call(guard_env, &Vec::new(), ty)?;
        let guard_env = guard_env.push_var_nonrec(name.clone(), (**ty).clone());
        self.check_nested_fix_body(&guard_env, decr - 1, spec, inner)
      }
      _ => Err(CheckError::programming(
        "check_nested_fix_body",
        "not enough abstractions in fix body".to_string(),
      )),
    }
  }
}
