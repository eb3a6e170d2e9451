/*!

The public API of the library.

The crate exposes one operation, [`check_fix`]: given a global environment, a local context,
and a mutual fixpoint block, decide whether every recursive call is made on a structurally
smaller argument. Everything a caller needs to build the inputs and read the outcome is
re-exported here, so `core` never has to be named directly.

*/

pub mod error;

pub use error::{CheckError, CheckResult, ErrorKind};

pub use crate::core::{
  checker::{check_fix, check_fix_term},
  environment::{
    ConstantBody, Context, Declaration, EnvEntry, Finiteness, GlobalEnv, MutualInductive,
    OneInductive,
  },
  recarg::{mk_norec, mk_paths, Recarg, WfPaths},
  rtree::Rtree,
  subterm::{Size, SubtermSpec},
  term::{mk_app, BxTerm, CaseInfo, IndRef, Name, Projection, RecDecl, SortKind, Term},
  Budget, DEFAULT_STEP_BUDGET,
};
