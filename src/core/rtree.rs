/*!

Possibly-cyclic regular trees.

A tree is either a `Node` with a label and children, a `Rec` binder tying the knot over a family
of mutually recursive definitions, or a `Param(depth, index)` back-reference selecting the
`index`-th definition of the `depth`-th enclosing `Rec`. Cycles are therefore never materialized;
`expand` unfolds one `Rec` step by substituting the family into the selected body.

Comparisons (`equiv`, `incl`, `inter`) are bisimulations: a pair of trees already under
comparison is assumed related, which is what makes the cyclic case terminate. The history is
keyed structurally; the set of subtrees reachable by expansion of a regular tree is finite, so
membership eventually hits.

Every tree handled by the checker is closed: all `Param`s resolve within the tree (`is_closed`).
`expand` assumes this and assumes every `Rec` body introduces a `Node`; the recargs-tree builder
and the positivity checker both guarantee it.

*/

use std::fmt::{Display, Formatter};

use crate::abstractions::join_string;

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Rtree<L> {
  /// Back-reference into the `depth`-th enclosing `Rec`, picking its `index`-th body.
  Param(usize, usize),
  Node(L, Vec<Rtree<L>>),
  Rec(usize, Vec<Rtree<L>>),
}

impl<L: Clone + Eq> Rtree<L> {
  pub fn node(label: L, children: Vec<Rtree<L>>) -> Self {
    Rtree::Node(label, children)
  }

  /// `n` fresh back-references into the `Rec` about to be built around them.
  pub fn mk_rec_calls(n: usize) -> Vec<Self> {
    (0..n).map(|j| Rtree::Param(0, j)).collect()
  }

  /// Ties the knot: each component of the family becomes a closed tree selecting its own body.
  pub fn mk_rec(defs: Vec<Self>) -> Vec<Self> {
    (0..defs.len()).map(|j| Rtree::Rec(j, defs.clone())).collect()
  }

  /// Shifts every free `Param` past `n` new enclosing `Rec` binders.
  pub fn lift(&self, n: usize) -> Self {
    if n == 0 {
      self.clone()
    } else {
      self.lift_rec(0, n)
    }
  }

  fn lift_rec(&self, depth: usize, n: usize) -> Self {
    match self {
      Rtree::Param(i, j) => {
        if *i < depth {
          Rtree::Param(*i, *j)
        } else {
          Rtree::Param(*i + n, *j)
        }
      }
      Rtree::Node(label, children) => Rtree::Node(
        label.clone(),
        children.iter().map(|child| child.lift_rec(depth, n)).collect(),
      ),
      Rtree::Rec(which, defs) => Rtree::Rec(
        *which,
        defs.iter().map(|def| def.lift_rec(depth + 1, n)).collect(),
      ),
    }
  }

  /// Substitutes a `Rec` family for the back-references at the substitution frontier; deeper
  /// free `Param`s shift down by one.
  pub fn subst(&self, defs: &[Self]) -> Self {
    self.subst_rec(0, defs)
  }

  fn subst_rec(&self, depth: usize, defs: &[Self]) -> Self {
    match self {
      Rtree::Param(i, j) => {
        if *i < depth {
          Rtree::Param(*i, *j)
        } else if *i == depth {
          Rtree::Rec(*j, defs.to_vec()).lift(depth)
        } else {
          Rtree::Param(*i - 1, *j)
        }
      }
      Rtree::Node(label, children) => Rtree::Node(
        label.clone(),
        children.iter().map(|child| child.subst_rec(depth, defs)).collect(),
      ),
      Rtree::Rec(which, inner) => Rtree::Rec(
        *which,
        inner.iter().map(|def| def.subst_rec(depth + 1, defs)).collect(),
      ),
    }
  }

  /// Unfolds `Rec` binders at the root until a `Node` (or a free `Param`) appears.
  pub fn expand(&self) -> Self {
    let mut tree = self.clone();
    loop {
      match tree {
        Rtree::Rec(which, defs) => {
          tree = defs[which].subst(&defs);
        }
        other => return other,
      }
    }
  }

  /// All `Param`s resolve to an enclosing `Rec` body: invariant of every tree stored in a spec.
  pub fn is_closed(&self) -> bool {
    fn check<L>(tree: &Rtree<L>, frames: &mut Vec<usize>) -> bool {
      match tree {
        Rtree::Param(i, j) => *i < frames.len() && *j < frames[frames.len() - 1 - *i],
        Rtree::Node(_, children) => children.iter().all(|child| check(child, frames)),
        Rtree::Rec(which, defs) => {
          *which < defs.len() && {
            frames.push(defs.len());
            let ok = defs.iter().all(|def| check(def, frames));
            frames.pop();
            ok
          }
        }
      }
    }
    check(self, &mut Vec::new())
  }

  /// Equality up to expansion: bisimilarity with labels compared by `cmp`.
  pub fn equiv(&self, other: &Self, cmp: &impl Fn(&L, &L) -> bool) -> bool {
    fn compare<L: Clone + Eq>(
      histo: &mut Vec<(Rtree<L>, Rtree<L>)>,
      t: &Rtree<L>,
      u: &Rtree<L>,
      cmp: &impl Fn(&L, &L) -> bool,
    ) -> bool {
      if histo.iter().any(|(a, b)| a == t && b == u) {
        return true;
      }
      match (t.expand(), u.expand()) {
        (Rtree::Node(x, v), Rtree::Node(y, w)) => {
          cmp(&x, &y) && v.len() == w.len() && {
            histo.push((t.clone(), u.clone()));
            let ok = v.iter().zip(w.iter()).all(|(a, b)| compare(histo, a, b, cmp));
            histo.pop();
            ok
          }
        }
        _ => false,
      }
    }
    compare(&mut Vec::new(), self, other, cmp)
  }

  /// Inclusion: bisimulation where a bare `Node(bottom, [])` is below anything and labels are
  /// ordered by "intersection keeps the left label".
  pub fn incl(
    &self,
    other: &Self,
    inter_label: &impl Fn(&L, &L) -> Option<L>,
    bottom: &L,
  ) -> bool {
    fn compare<L: Clone + Eq>(
      histo: &mut Vec<(Rtree<L>, Rtree<L>)>,
      t: &Rtree<L>,
      u: &Rtree<L>,
      inter_label: &impl Fn(&L, &L) -> Option<L>,
      bottom: &L,
    ) -> bool {
      if histo.iter().any(|(a, b)| a == t && b == u) {
        return true;
      }
      match t.expand() {
        Rtree::Node(x, v) if x == *bottom && v.is_empty() => true,
        Rtree::Node(x, v) => match u.expand() {
          Rtree::Node(y, w) => {
            matches!(inter_label(&x, &y), Some(met) if met == x) && v.len() == w.len() && {
              histo.push((t.clone(), u.clone()));
              let ok = v
                  .iter()
                  .zip(w.iter())
                  .all(|(a, b)| compare(histo, a, b, inter_label, bottom));
              histo.pop();
              ok
            }
          }
          _ => false,
        },
        _ => false,
      }
    }
    compare(&mut Vec::new(), self, other, inter_label, bottom)
  }

  /// Componentwise intersection. `None` means the trees are incompatible: some aligned pair of
  /// labels has no intersection, or the shapes disagree. When both sides are `Rec` of the same
  /// arity the shape is preserved; otherwise mutual recursion degrades to a nested single-body
  /// `Rec`, with the history emitting back-references for pairs already under construction.
  pub fn inter(&self, other: &Self, inter_label: &impl Fn(&L, &L) -> Option<L>) -> Option<Self> {
    fn go<L: Clone + Eq>(
      t: &Rtree<L>,
      u: &Rtree<L>,
      n: usize,
      histo: &mut Vec<((Rtree<L>, Rtree<L>), (usize, usize))>,
      inter_label: &impl Fn(&L, &L) -> Option<L>,
    ) -> Option<Rtree<L>> {
      if let Some((m, j)) = histo
          .iter()
          .find(|((a, b), _)| a == t && b == u)
          .map(|(_, at)| *at)
      {
        return Some(Rtree::Param(n - m - 1, j));
      }
      match (t, u) {
        (Rtree::Param(i, j), Rtree::Param(i2, j2)) => {
          if i == i2 && j == j2 {
            Some(t.clone())
          } else {
            None
          }
        }
        (Rtree::Node(x, v), Rtree::Node(y, w)) => {
          let label = inter_label(x, y)?;
          if v.len() != w.len() {
            return None;
          }
          let children = v
              .iter()
              .zip(w.iter())
              .map(|(a, b)| go(a, b, n, histo, inter_label))
              .collect::<Option<Vec<_>>>()?;
          Some(Rtree::Node(label, children))
        }
        (Rtree::Rec(i, v), Rtree::Rec(i2, w)) => {
          if i == i2 && v.len() == w.len() {
            // Shape-preserving case.
            histo.push(((t.clone(), u.clone()), (n, *i)));
            let defs = v
                .iter()
                .zip(w.iter())
                .map(|(a, b)| go(a, b, n + 1, histo, inter_label))
                .collect::<Option<Vec<_>>>();
            histo.pop();
            Some(Rtree::Rec(*i, defs?))
          } else {
            // Mutually recursive families of different shapes become a nested tree.
            histo.push(((t.clone(), u.clone()), (n, 0)));
            let inner = go(&t.expand(), &u.expand(), n + 1, histo, inter_label);
            histo.pop();
            Some(Rtree::Rec(0, vec![inner?]))
          }
        }
        (Rtree::Rec(..), _) => go(&t.expand(), u, n, histo, inter_label),
        (_, Rtree::Rec(..)) => go(t, &u.expand(), n, histo, inter_label),
        _ => None,
      }
    }
    go(self, other, 0, &mut Vec::new(), inter_label)
  }
}

impl<L: Display> Display for Rtree<L> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Rtree::Param(i, j) => write!(f, "%{}.{}", i, j),
      Rtree::Node(label, children) => {
        if children.is_empty() {
          write!(f, "{}", label)
        } else {
          write!(f, "{}[{}]", label, join_string(children.iter(), ", "))
        }
      }
      Rtree::Rec(which, defs) => {
        write!(f, "rec{}{{{}}}", which, join_string(defs.iter(), "; "))
      }
    }
  }
}
