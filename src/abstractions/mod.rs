/*!

Types/type aliases that abstract over the implementing backing type.

A motivating example is the `IString` type, an interned string type used here for the kernel
names of constants and mutual inductive blocks. A number of external crates could provide this
functionality. This module redirects to whatever chosen implementation we want. To use the
[`string_cache` crate](https://crates.io/crates/string_cache), we just define `IString` as an
alias for `string_cache::DefaultAtom`:

```ignore
pub use string_cache::DefaultAtom as IString;
```

For infrastructure with very different possible backing implementations, we define an
abstraction layer over the implementation. The `log` module, for example, could sit on any of a
number of logging frameworks; its (crate) public interface consists only of
`set_global_logging_threshold()`/`get_global_logging_threshold()` and the level macros, while
the backing implementation stays encapsulated in the `log` module.

*/

mod nat_set;
mod string_join;

// Logging
pub mod log;

// Interned string. `DefaultAtom` is a global cache that can be used across threads.
pub use string_cache::DefaultAtom as IString;

// region Items meant to be used only internally

// A set of (small) natural numbers. Used for sets of free de Bruijn indices.
pub(crate) use nat_set::NatSet;

// Join sequences with a separator
pub(crate) use string_join::join_string;

// endregion
