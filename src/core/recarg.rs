/*!

Recursive-argument labels and the trees built from them.

A `WfPaths` tree describes, per constructor of an inductive type, at which argument positions
further structural recursion may happen. The shape for one body is

```text
Mrec(ind)[ Norec[arg trees of ctor 0], Norec[arg trees of ctor 1], … ]
```

tied into a `Rec` family for a mutual block. Nested occurrences of some other inductive inside
an argument tree carry `Imbr` labels, with back-references pointing at the enclosing container.
A `Norec` leaf (`mk_norec`) marks a position where recursion is impossible.

*/

use std::fmt::{Display, Formatter};

use crate::{
  api::error::{CheckError, CheckResult},
  core::{rtree::Rtree, term::IndRef},
};

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Recarg {
  /// Non-recursive position.
  Norec,
  /// Direct occurrence of a body of the mutual block under scrutiny.
  Mrec(IndRef),
  /// Nested ("imbricated") occurrence inside another inductive.
  Imbr(IndRef),
}

impl Display for Recarg {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Recarg::Norec     => write!(f, "Norec"),
      Recarg::Mrec(ind) => write!(f, "Mrec({})", ind),
      Recarg::Imbr(ind) => write!(f, "Imbr({})", ind),
    }
  }
}

/// Label intersection. `Mrec` beats `Imbr` on the same inductive; distinct inductives (or a
/// recursive label against `Norec`) have no intersection.
pub fn inter_recarg(a: &Recarg, b: &Recarg) -> Option<Recarg> {
  match (a, b) {
    (Recarg::Norec, Recarg::Norec) => Some(Recarg::Norec),
    (Recarg::Mrec(i), Recarg::Mrec(j))
    | (Recarg::Imbr(i), Recarg::Imbr(j))
    | (Recarg::Mrec(i), Recarg::Imbr(j)) => {
      if i == j {
        Some(a.clone())
      } else {
        None
      }
    }
    (Recarg::Imbr(i), Recarg::Mrec(j)) => {
      if i == j {
        Some(b.clone())
      } else {
        None
      }
    }
    _ => None,
  }
}

pub type WfPaths = Rtree<Recarg>;

pub fn mk_norec() -> WfPaths {
  Rtree::node(Recarg::Norec, vec![])
}

/// Assembles one body's tree from its per-constructor argument trees.
pub fn mk_paths(label: Recarg, ctor_arg_trees: Vec<Vec<WfPaths>>) -> WfPaths {
  Rtree::node(
    label,
    ctor_arg_trees
        .into_iter()
        .map(|args| Rtree::node(Recarg::Norec, args))
        .collect(),
  )
}

/// Equality up to expansion.
pub fn eq_wf_paths(t: &WfPaths, u: &WfPaths) -> bool {
  t.equiv(u, &|a, b| a == b)
}

/// Partial intersection: `None` when some aligned pair of labels is incompatible.
pub fn inter_wf_paths(t: &WfPaths, u: &WfPaths) -> Option<WfPaths> {
  t.inter(u, &inter_recarg)
}

/// `t ≤ u` in the tree lattice, with `mk_norec` as the bottom element.
pub fn incl_wf_paths(t: &WfPaths, u: &WfPaths) -> bool {
  t.incl(u, &inter_recarg, &Recarg::Norec)
}

/// The label at the (expanded) root.
pub fn dest_recarg(t: &WfPaths) -> Recarg {
  match t.expand() {
    Rtree::Node(label, _) => label,
    _ => Recarg::Norec,
  }
}

/// Splits a body tree into per-constructor argument trees. The root must carry a recursive
/// label and each child must be a constructor wrapper; anything else means a malformed tree.
pub fn dest_subterms(t: &WfPaths) -> CheckResult<Vec<Vec<WfPaths>>> {
  match t.expand() {
    Rtree::Node(Recarg::Norec, _) => Err(CheckError::programming(
      "dest_subterms",
      format!("tried to take constructor subterms of a non-recursive tree {}", t),
    )),
    Rtree::Node(_, ctors) => ctors
        .into_iter()
        .map(|ctor| match ctor {
          Rtree::Node(_, args) => Ok(args),
          other => Err(CheckError::programming(
            "dest_subterms",
            format!("constructor wrapper is not a node: {}", other),
          )),
        })
        .collect(),
    other => Err(CheckError::programming(
      "dest_subterms",
      format!("expanded tree has no root node: {}", other),
    )),
  }
}

/// Does this label claim (direct or nested) recursion through `ind`?
pub fn match_inductive(ind: &IndRef, label: &Recarg) -> bool {
  match label {
    Recarg::Mrec(i) | Recarg::Imbr(i) => i == ind,
    Recarg::Norec => false,
  }
}
