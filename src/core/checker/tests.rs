/*!

Scenario tests for the whole checker, over hand-built environments.

The environment carries the usual suspects: `nat`, `list` (one parameter), rose trees nested
through `list`, `bool`-free `empty`, and a coinductive `stream`. Recargs trees are written down
the way the positivity checker would produce them, back-references and all; the builders below
are shared by every test.

*/

use crate::{
  api::error::{CheckResult, ErrorKind},
  core::{
    checker::{check_fix, inference::{branches_specif, subterm_specif}},
    environment::{ConstantBody, Context, Finiteness, GlobalEnv, MutualInductive, OneInductive},
    recarg::{eq_wf_paths, inter_wf_paths, mk_norec, mk_paths, Recarg, WfPaths},
    recargs_builder::{get_recargs_approx, num_uniform_params},
    rtree::Rtree,
    subterm::{GuardEnv, Size, SubtermSpec},
    term::{mk_app, CaseInfo, IndRef, Name, RecDecl, SortKind, Term},
    Budget,
  },
};

// region Term and environment builders

fn set() -> Term {
  Term::Sort(SortKind::Set)
}

fn rel(i: usize) -> Term {
  Term::Rel(i)
}

fn app(head: Term, args: Vec<Term>) -> Term {
  mk_app(head, args)
}

fn lam(name: &str, ty: Term, body: Term) -> Term {
  Term::Lambda(Name::named(name), Box::new(ty), Box::new(body))
}

fn prod(name: &str, ty: Term, body: Term) -> Term {
  Term::Prod(Name::named(name), Box::new(ty), Box::new(body))
}

fn ind(name: &str) -> IndRef {
  IndRef::new(name, 0)
}

fn tind(name: &str) -> Term {
  Term::Ind(ind(name))
}

fn ctor(name: &str, k: usize) -> Term {
  Term::Construct(ind(name), k)
}

fn case(on: &str, npars: usize, rtf: Term, discr: Term, branches: Vec<Term>) -> Term {
  Term::Case(
    CaseInfo { ind: ind(on), npars },
    Box::new(rtf),
    Box::new(discr),
    branches,
  )
}

fn nat_tree() -> WfPaths {
  let body = mk_paths(Recarg::Mrec(ind("nat")), vec![vec![], vec![Rtree::Param(0, 0)]]);
  Rtree::mk_rec(vec![body]).pop().unwrap()
}

fn list_tree() -> WfPaths {
  let body = mk_paths(
    Recarg::Mrec(ind("list")),
    vec![vec![], vec![mk_norec(), Rtree::Param(0, 0)]],
  );
  Rtree::mk_rec(vec![body]).pop().unwrap()
}

/// The `list (rtree A)` component inside the rose-tree family: `Param(1, 0)` reaches out to
/// the enclosing `rtree` binder, `Param(0, 0)` is the list itself.
fn rose_tree() -> WfPaths {
  let inner_list = Rtree::Rec(
    0,
    vec![Rtree::Node(
      Recarg::Imbr(ind("list")),
      vec![
        Rtree::Node(Recarg::Norec, vec![]),
        Rtree::Node(Recarg::Norec, vec![Rtree::Param(1, 0), Rtree::Param(0, 0)]),
      ],
    )],
  );
  let body = mk_paths(Recarg::Mrec(ind("rtree")), vec![vec![inner_list]]);
  Rtree::mk_rec(vec![body]).pop().unwrap()
}

fn empty_tree() -> WfPaths {
  Rtree::mk_rec(vec![mk_paths(Recarg::Mrec(ind("empty")), vec![])]).pop().unwrap()
}

fn stream_tree() -> WfPaths {
  let body = mk_paths(
    Recarg::Mrec(ind("stream")),
    vec![vec![mk_norec(), Rtree::Param(0, 0)]],
  );
  Rtree::mk_rec(vec![body]).pop().unwrap()
}

fn scenario_env() -> GlobalEnv {
  let mut genv = GlobalEnv::new();

  genv.add_inductive(MutualInductive {
    name: "nat".into(),
    finite: Finiteness::Finite,
    npars: 0,
    bodies: vec![OneInductive {
      name: "nat".into(),
      arity: set(),
      ctor_names: vec!["O".into(), "S".into()],
      ctor_types: vec![rel(0), prod("_", rel(0), rel(1))],
      recargs: nat_tree(),
    }],
  });

  genv.add_inductive(MutualInductive {
    name: "list".into(),
    finite: Finiteness::Finite,
    npars: 1,
    bodies: vec![OneInductive {
      name: "list".into(),
      arity: prod("A", set(), set()),
      ctor_names: vec!["nil".into(), "cons".into()],
      ctor_types: vec![
        prod("A", set(), app(rel(1), vec![rel(0)])),
        prod(
          "A",
          set(),
          prod("x", rel(0), prod("t", app(rel(2), vec![rel(1)]), app(rel(3), vec![rel(2)]))),
        ),
      ],
      recargs: list_tree(),
    }],
  });

  genv.add_inductive(MutualInductive {
    name: "rtree".into(),
    finite: Finiteness::Finite,
    npars: 1,
    bodies: vec![OneInductive {
      name: "rtree".into(),
      arity: prod("A", set(), set()),
      ctor_names: vec!["rnode".into()],
      ctor_types: vec![prod(
        "A",
        set(),
        prod(
          "l",
          app(tind("list"), vec![app(rel(1), vec![rel(0)])]),
          app(rel(2), vec![rel(1)]),
        ),
      )],
      recargs: rose_tree(),
    }],
  });

  genv.add_inductive(MutualInductive {
    name: "empty".into(),
    finite: Finiteness::Finite,
    npars: 0,
    bodies: vec![OneInductive {
      name: "empty".into(),
      arity: set(),
      ctor_names: vec![],
      ctor_types: vec![],
      recargs: empty_tree(),
    }],
  });

  genv.add_inductive(MutualInductive {
    name: "stream".into(),
    finite: Finiteness::CoFinite,
    npars: 0,
    bodies: vec![OneInductive {
      name: "stream".into(),
      arity: set(),
      ctor_names: vec!["scons".into()],
      ctor_types: vec![prod("_", tind("nat"), prod("_", rel(1), rel(2)))],
      recargs: stream_tree(),
    }],
  });

  // succ_of x = S x, a constant the βιζ reducer cannot see through.
  genv.add_constant(ConstantBody {
    name: "succ_of".into(),
    ty: prod("_", tind("nat"), tind("nat")),
    body: Some(lam("x", tind("nat"), app(ctor("nat", 1), vec![rel(0)]))),
  });

  // apply f x = f x.
  genv.add_constant(ConstantBody {
    name: "apply".into(),
    ty: prod("_", prod("_", tind("nat"), tind("nat")), prod("_", tind("nat"), tind("nat"))),
    body: Some(lam(
      "f",
      prod("_", tind("nat"), tind("nat")),
      lam("x", tind("nat"), app(rel(1), vec![rel(0)])),
    )),
  });

  genv
}

fn run_check(rec_args: &[usize], decls: &RecDecl) -> CheckResult<()> {
  let genv = scenario_env();
  let budget = Budget::default();
  check_fix(&genv, &Context::new(), rec_args, decls, &budget)
}

fn list_nat() -> Term {
  app(tind("list"), vec![tind("nat")])
}

// endregion

// region Fixpoint builders

/// `fix len (l : list nat) := match l with nil ⇒ O | cons _ t ⇒ S (len ARG)` where `ARG` is
/// `t` (the structural call) or `l` (the cheating one).
fn len_fix(call_arg: Term) -> (Vec<usize>, RecDecl) {
  let body = lam(
    "l",
    list_nat(),
    case(
      "list",
      1,
      lam("_", list_nat(), tind("nat")),
      rel(0),
      vec![
        ctor("nat", 0),
        lam(
          "h",
          tind("nat"),
          lam(
            "t",
            list_nat(),
            app(ctor("nat", 1), vec![app(rel(3), vec![call_arg])]),
          ),
        ),
      ],
    ),
  );
  (
    vec![0],
    RecDecl {
      names: vec![Name::named("len")],
      types: vec![prod("l", list_nat(), tind("nat"))],
      bodies: vec![body],
    },
  )
}

/// `fix ack (m n : nat) {struct m} := …` with the inner call on `m'` (guarded) or on `m`
/// itself (not guarded).
fn ack_fix(inner_on_smaller: bool) -> (Vec<usize>, RecDecl) {
  let nat = tind("nat");
  // Innermost context of the inner S-branch: n' = #0, m' = #1, n = #2, m = #3, ack = #4.
  let inner_arg = if inner_on_smaller { rel(1) } else { rel(3) };
  let one = app(ctor("nat", 1), vec![ctor("nat", 0)]);
  let match_on_n = case(
    "nat",
    0,
    lam("_", nat.clone(), nat.clone()),
    rel(1),
    vec![
      app(rel(3), vec![rel(0), one]),
      lam(
        "n'",
        nat.clone(),
        app(rel(4), vec![rel(1), app(rel(4), vec![inner_arg, rel(0)])]),
      ),
    ],
  );
  let body = lam(
    "m",
    nat.clone(),
    lam(
      "n",
      nat.clone(),
      case(
        "nat",
        0,
        lam("_", nat.clone(), nat.clone()),
        rel(1),
        vec![
          app(ctor("nat", 1), vec![rel(0)]),
          lam("m'", nat.clone(), match_on_n),
        ],
      ),
    ),
  );
  (
    vec![0],
    RecDecl {
      names: vec![Name::named("ack")],
      types: vec![prod("m", nat.clone(), prod("n", nat.clone(), nat))],
      bodies: vec![body],
    },
  )
}

/// `fix f (t : rtree nat) := match t with rnode l ⇒ (fix map (l2 : list (rtree nat)) :=
/// match l2 with nil ⇒ nil | cons x t2 ⇒ cons (f x) (map t2)) l`.
fn rose_map_fix() -> (Vec<usize>, RecDecl) {
  let rt = app(tind("rtree"), vec![tind("nat")]);
  let list_rt = app(tind("list"), vec![rt.clone()]);
  // Innermost context of the cons branch: t2 = #0, x = #1, l2 = #2, map = #3, l = #4,
  // t = #5, f = #6.
  let inner_body = lam(
    "l2",
    list_rt.clone(),
    case(
      "list",
      1,
      lam("_", list_rt.clone(), list_rt.clone()),
      rel(0),
      vec![
        app(ctor("list", 0), vec![rt.clone()]),
        lam(
          "x",
          rt.clone(),
          lam(
            "t2",
            list_rt.clone(),
            app(
              ctor("list", 1),
              vec![rt.clone(), app(rel(6), vec![rel(1)]), app(rel(3), vec![rel(0)])],
            ),
          ),
        ),
      ],
    ),
  );
  let inner_fix = Term::Fix(
    vec![0],
    0,
    RecDecl {
      names: vec![Name::named("map")],
      types: vec![prod("l2", list_rt.clone(), list_rt.clone())],
      bodies: vec![inner_body],
    },
  );
  let body = lam(
    "t",
    rt.clone(),
    case(
      "rtree",
      1,
      lam("_", rt.clone(), list_rt.clone()),
      rel(0),
      vec![lam("l", list_rt.clone(), app(inner_fix, vec![rel(0)]))],
    ),
  );
  (
    vec![0],
    RecDecl {
      names: vec![Name::named("f")],
      types: vec![prod("t", rt, list_rt)],
      bodies: vec![body],
    },
  )
}

// endregion

#[test]
fn structural_len_is_accepted() {
  let (rec_args, decls) = len_fix(rel(0));
  assert_eq!(run_check(&rec_args, &decls), Ok(()));
}

#[test]
fn len_on_itself_is_rejected() {
  // `S (len l)`: at the call site l = #2, and l is only a loose subterm of itself.
  let (rec_args, decls) = len_fix(rel(2));
  let err = run_check(&rec_args, &decls).unwrap_err();
  assert_eq!(err.kind, ErrorKind::Guard);
}

#[test]
fn match_binder_specs_come_from_the_discriminant_tree() {
  let genv = scenario_env();
  let loose = SubtermSpec::Subterm(Size::Loose, list_tree());
  let specs = branches_specif(&genv, &loose, &CaseInfo { ind: ind("list"), npars: 1 }).unwrap();
  assert_eq!(specs.len(), 2);
  assert!(specs[0].is_empty());
  // cons binds the element (no recursion there) and the tail (a strict subterm).
  assert_eq!(specs[1][0], SubtermSpec::NotSubterm);
  match &specs[1][1] {
    SubtermSpec::Subterm(Size::Strict, tree) => assert!(eq_wf_paths(tree, &list_tree())),
    other => panic!("tail spec should be strict, got {}", other),
  }
}

#[test]
fn rose_tree_map_is_accepted() {
  let (rec_args, decls) = rose_map_fix();
  assert_eq!(run_check(&rec_args, &decls), Ok(()));
}

#[test]
fn ack_on_predecessor_is_accepted() {
  let (rec_args, decls) = ack_fix(true);
  assert_eq!(run_check(&rec_args, &decls), Ok(()));
}

#[test]
fn ack_on_own_argument_is_rejected() {
  let (rec_args, decls) = ack_fix(false);
  let err = run_check(&rec_args, &decls).unwrap_err();
  assert_eq!(err.kind, ErrorKind::Guard);
}

#[test]
fn recursion_on_a_coinductive_is_rejected_early() {
  // fix f (s : stream) := f s
  let body = lam("s", tind("stream"), app(rel(1), vec![rel(0)]));
  let decls = RecDecl {
    names: vec![Name::named("f")],
    types: vec![prod("s", tind("stream"), tind("stream"))],
    bodies: vec![body],
  };
  let err = run_check(&[0], &decls).unwrap_err();
  assert_eq!(err.kind, ErrorKind::Guard);
  assert_eq!(err.location, "inductive_of_mutfix");
}

#[test]
fn dead_code_from_an_empty_match_passes_the_guard() {
  // fix f (n : nat) := λ e : empty. f (match e with end)
  let body = lam(
    "n",
    tind("nat"),
    lam(
      "e",
      tind("empty"),
      app(
        rel(2),
        vec![case("empty", 0, lam("_", tind("empty"), tind("nat")), rel(0), vec![])],
      ),
    ),
  );
  let decls = RecDecl {
    names: vec![Name::named("f")],
    types: vec![prod("n", tind("nat"), prod("e", tind("empty"), tind("nat")))],
    bodies: vec![body],
  };
  assert_eq!(run_check(&[0], &decls), Ok(()));
}

#[test]
fn match_recovery_reduces_an_opaque_discriminant() {
  // fix half (n : nat) := match n with 0 ⇒ 0 | S p ⇒ match succ_of p with 0 ⇒ 0 | S q ⇒
  // half q. The inner discriminant only shows a constructor after δ, so the direct path gives
  // q no spec and the walker must retry on the reduced match.
  let nat = tind("nat");
  let inner = case(
    "nat",
    0,
    lam("_", nat.clone(), nat.clone()),
    app(Term::Const("succ_of".into()), vec![rel(0)]),
    vec![
      ctor("nat", 0),
      lam("q", nat.clone(), app(rel(3), vec![rel(0)])),
    ],
  );
  let body = lam(
    "n",
    nat.clone(),
    case(
      "nat",
      0,
      lam("_", nat.clone(), nat.clone()),
      rel(0),
      vec![ctor("nat", 0), lam("p", nat.clone(), inner)],
    ),
  );
  let decls = RecDecl {
    names: vec![Name::named("half")],
    types: vec![prod("n", nat.clone(), nat)],
    bodies: vec![body],
  };
  assert_eq!(run_check(&[0], &decls), Ok(()));
}

#[test]
fn constant_recovery_unfolds_a_higher_order_wrapper() {
  // fix g (n : nat) := match n with 0 ⇒ 0 | S p ⇒ apply g p. Passing g unapplied trips the
  // partial-application guard; unfolding `apply` exposes the well-guarded call g p.
  let nat = tind("nat");
  let body = lam(
    "n",
    nat.clone(),
    case(
      "nat",
      0,
      lam("_", nat.clone(), nat.clone()),
      rel(0),
      vec![
        ctor("nat", 0),
        lam("p", nat.clone(), app(Term::Const("apply".into()), vec![rel(2), rel(0)])),
      ],
    ),
  );
  let decls = RecDecl {
    names: vec![Name::named("g")],
    types: vec![prod("n", nat.clone(), nat)],
    bodies: vec![body],
  };
  assert_eq!(run_check(&[0], &decls), Ok(()));
}

#[test]
fn check_fix_is_idempotent() {
  let (rec_args, decls) = len_fix(rel(0));
  assert_eq!(run_check(&rec_args, &decls), run_check(&rec_args, &decls));

  let (rec_args, decls) = len_fix(rel(2));
  assert_eq!(run_check(&rec_args, &decls), run_check(&rec_args, &decls));
}

#[test]
fn subterm_inference_agrees_with_beta_iota_reduction() {
  // In an environment where l : list nat is the recursive argument, the match
  //   match l with nil ⇒ l | cons h t ⇒ t
  // infers the glb of a loose l and a strict t. Replacing the discriminant by an actual
  // constructor application reduces the match away, and inference on the reduced selection
  // must agree with looking up the substituted argument.
  let genv = scenario_env();
  let budget = Budget::default();
  let mut ctx = Context::new();
  ctx.push_assum(Name::named("l"), list_nat());
  let guard_env = GuardEnv::for_fix_body(ctx, 0, list_tree());

  let through_match = case(
    "list",
    1,
    lam("_", list_nat(), list_nat()),
    rel(0),
    vec![rel(0), lam("h", tind("nat"), lam("t", list_nat(), rel(0)))],
  );
  let spec = subterm_specif(&budget, &genv, &guard_env, &Vec::new(), &through_match).unwrap();
  match &spec {
    SubtermSpec::Subterm(Size::Loose, tree) => assert!(eq_wf_paths(tree, &list_tree())),
    other => panic!("expected a loose subterm, got {}", other),
  }

  // match (cons nat h0 l) with … cons h t ⇒ t  reduces to l.
  let reduced_selection = case(
    "list",
    1,
    lam("_", list_nat(), list_nat()),
    app(ctor("list", 1), vec![tind("nat"), ctor("nat", 0), rel(0)]),
    vec![rel(0), lam("h", tind("nat"), lam("t", list_nat(), rel(0)))],
  );
  let after = subterm_specif(&budget, &genv, &guard_env, &Vec::new(), &reduced_selection).unwrap();
  let direct = subterm_specif(&budget, &genv, &guard_env, &Vec::new(), &rel(0)).unwrap();
  assert_eq!(after, direct);
}

#[test]
fn recargs_approximation_matches_the_declared_nesting() {
  // The instantiated `list (rtree nat)` tree stored inside the rose tree, rebuilt from
  // scratch by the approximation, intersects with the stored one without loss, and the
  // approximation is idempotent when fed back as its own seed.
  let genv = scenario_env();
  let budget = Budget::default();
  let ctx = Context::new();
  let stored = crate::core::recarg::dest_subterms(&rose_tree()).unwrap()[0][0].clone();
  let rt_nat = app(tind("rtree"), vec![tind("nat")]);

  let approx =
      get_recargs_approx(&budget, &genv, &ctx, &stored, &ind("list"), &[rt_nat.clone()]).unwrap();
  assert!(approx.is_closed());

  let met = inter_wf_paths(&stored, &approx).expect("stored and approximated trees agree");
  assert!(eq_wf_paths(&met, &stored));

  let again =
      get_recargs_approx(&budget, &genv, &ctx, &approx, &ind("list"), &[rt_nat]).unwrap();
  assert!(eq_wf_paths(&approx, &again));
}

#[test]
fn uniform_parameter_counting() {
  let genv = scenario_env();
  assert_eq!(num_uniform_params(genv.lookup_mind(&"list".into()).unwrap()), 1);
  assert_eq!(num_uniform_params(genv.lookup_mind(&"nat".into()).unwrap()), 0);

  // A two-parameter block whose constructor instantiates the second parameter with a concrete
  // type in its conclusion: only the first parameter is uniform.
  let skewed = MutualInductive {
    name: "skewed".into(),
    finite: Finiteness::Finite,
    npars: 2,
    bodies: vec![OneInductive {
      name: "skewed".into(),
      arity: prod("A", set(), prod("B", set(), set())),
      ctor_names: vec!["mk".into()],
      // ∀ A B, skewed A nat — conclusion: #2 applied to [#1, nat].
      ctor_types: vec![prod(
        "A",
        set(),
        prod("B", set(), app(rel(2), vec![rel(1), tind("nat")])),
      )],
      recargs: mk_norec(),
    }],
  };
  assert_eq!(num_uniform_params(&skewed), 1);
}

#[test]
fn exhausted_budget_is_a_timeout() {
  let genv = scenario_env();
  let budget = Budget::new(10);
  let (rec_args, decls) = rose_map_fix();
  let err = check_fix(&genv, &Context::new(), &rec_args, &decls, &budget).unwrap_err();
  assert_eq!(err.kind, ErrorKind::Timeout);
}
