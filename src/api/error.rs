/*!

The one error type of the checker.

Errors carry a `kind` that callers dispatch on, a `location` naming the routine that raised the
error, and a human-readable `detail`. Four of the kinds matter semantically (see the walker):

 - `Programming` is an invariant violation. Never caught.
 - `Env`/`Index` are lookup failures, fatal except at the walker's reduction-retry points.
 - `Other` is the recoverable class: a term of the wrong shape, a refusal to reduce further.
 - `Guard` is the user-facing verdict that a recursive call is not manifestly on a smaller
   argument.

`Timeout` means the shared step budget ran out and is likewise never caught.

*/

use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

use crate::abstractions::IString;

pub type CheckResult<T> = Result<T, CheckError>;

#[derive(Clone, Eq, PartialEq)]
pub enum ErrorKind {
  /// An internal invariant was violated: malformed tree, unreachable branch.
  Programming,
  /// A global-environment lookup failed for the given kernel name.
  Env(IString),
  /// A positional lookup (inductive body, constructor, de Bruijn index) was out of range.
  Index(usize),
  /// A term had the wrong shape for the operation. Recoverable by reducing further.
  Other,
  /// A recursive call that is not provably on a structurally smaller argument.
  Guard,
  /// The step budget is exhausted.
  Timeout,
}

impl Display for ErrorKind {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      ErrorKind::Programming => write!(f, "programming error"),
      ErrorKind::Env(kn)     => write!(f, "environment error ({})", kn),
      ErrorKind::Index(i)    => write!(f, "index error ({})", i),
      ErrorKind::Other       => write!(f, "error"),
      ErrorKind::Guard       => write!(f, "guardedness error"),
      ErrorKind::Timeout     => write!(f, "timeout"),
    }
  }
}

impl Debug for ErrorKind {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    Display::fmt(self, f)
  }
}

#[derive(Clone, Eq, PartialEq)]
pub struct CheckError {
  pub kind: ErrorKind,
  /// The routine that raised the error.
  pub location: String,
  pub detail: String,
}

impl CheckError {
  pub fn new(kind: ErrorKind, location: impl Into<String>, detail: impl Into<String>) -> Self {
    CheckError {
      kind,
      location: location.into(),
      detail: detail.into(),
    }
  }

  pub fn programming(location: impl Into<String>, detail: impl Into<String>) -> Self {
    Self::new(ErrorKind::Programming, location, detail)
  }

  pub fn env(location: impl Into<String>, kn: IString, detail: impl Into<String>) -> Self {
    Self::new(ErrorKind::Env(kn), location, detail)
  }

  pub fn index(location: impl Into<String>, index: usize, detail: impl Into<String>) -> Self {
    Self::new(ErrorKind::Index(index), location, detail)
  }

  pub fn other(location: impl Into<String>, detail: impl Into<String>) -> Self {
    Self::new(ErrorKind::Other, location, detail)
  }

  pub fn guard(location: impl Into<String>, detail: impl Into<String>) -> Self {
    Self::new(ErrorKind::Guard, location, detail)
  }

  pub fn timeout(location: impl Into<String>) -> Self {
    Self::new(ErrorKind::Timeout, location, "step budget exhausted")
  }

  /// Whether the walker's reduction-retry points may catch this error. `Programming` means the
  /// checker itself is broken, and `Timeout` means the budget is gone; neither is ever caught.
  pub fn is_recoverable(&self) -> bool {
    !matches!(self.kind, ErrorKind::Programming | ErrorKind::Timeout)
  }

  pub fn is_guard_violation(&self) -> bool {
    matches!(self.kind, ErrorKind::Guard)
  }
}

impl Display for CheckError {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{} in {}: {}", self.kind, self.location, self.detail)
  }
}

impl Debug for CheckError {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    Display::fmt(self, f)
  }
}

impl Error for CheckError {}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn recoverability() {
    assert!(CheckError::guard("w", "d").is_recoverable());
    assert!(CheckError::other("w", "d").is_recoverable());
    assert!(CheckError::env("w", IString::from("k"), "d").is_recoverable());
    assert!(CheckError::index("w", 3, "d").is_recoverable());
    assert!(!CheckError::programming("w", "d").is_recoverable());
    assert!(!CheckError::timeout("w").is_recoverable());
  }

  #[test]
  fn display_includes_location() {
    let err = CheckError::guard("check_rec_call", "call on a loose subterm");
    assert_eq!(
      err.to_string(),
      "guardedness error in check_rec_call: call on a loose subterm"
    );
  }
}
