use std::fmt::Display;
use std::iter::once;

/**
Join an iterator of things, interleaving a separator computed from the following element. (C.f.
`Vec::join(…)`, which does not exist for iterators in the stdlib.)

Usage:

```ignore
let iter = ["Hello", "World"].iter().cloned();
println!("{:?}", join_iter(iter, |_| ", ").collect::<String>());
// "Hello, World"
```
 */
pub fn join_iter<T>(mut iter: impl Iterator<Item = T>, sep: impl Fn(&T) -> T)
                    -> impl Iterator<Item = T>
{
  iter
      .next()
      .into_iter()
      .chain(iter.flat_map(move |s| once(sep(&s)).chain(once(s))))
}

/// Join a list of things that can be displayed as a string with a given separator.
///
/// This is a convenience function that defers to `join_iter`.
pub fn join_string<T: Display>(iter: impl Iterator<Item = T>, sep: &str) -> String {
  join_iter(iter.map(|t| t.to_string()), |_| sep.to_string()).collect::<String>()
}

#[cfg(test)]
mod tests {
  use super::{join_iter, join_string};

  #[test]
  fn join_iter_interleaves() {
    let iter = [1, 3, 5, 7, 9].iter().cloned();
    let joined = join_iter(iter, |v| v - 1).collect::<Vec<_>>();
    assert_eq!(joined, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
  }

  #[test]
  fn join_string_with_separator() {
    let list = ["Rel(0)", "Rel(1)", "Rel(2)"];
    assert_eq!(join_string(list.iter(), " "), "Rel(0) Rel(1) Rel(2)");
    assert_eq!(join_string(std::iter::empty::<usize>(), ", "), "");
  }
}
