/*!

# Overview

The `log` module provides logging with a global verbosity threshold. Individual log entries are
logged "at" a given threshold and are only emitted if that threshold is at most the global
threshold. A message with threshold 0 is always emitted. This is the checker's opt-in trace
side-channel: leave the global threshold at its default and the checker is silent; raise it and
the walk narrates itself.

```ignore
use guardck::log::*;

set_global_logging_threshold(1);

error!(2, "not emitted");
info!(1, "emitted");
trace!(0, "emitted");
```

# Macros

The macros are `critical!`, `error!`, `warning!`, `info!`, `debug!`, and `trace!`, with syntax

```ignore
level!(threshold, "format string", args...);
level!("format string", args...);   // threshold 0, always emitted
```

Messages of a particular level are prefixed with the level name. The macros initialize the
logging backend on first use; no explicit initialization is required, and the global threshold
is an atomic, so the module is thread safe.

*/
mod formatter;
mod macros;
mod threshold_filter;

use std::sync::atomic::{AtomicU8, Ordering};

use once_cell::sync::Lazy;
use tracing_subscriber::{fmt, layer::SubscriberExt, Registry};

use formatter::ThresholdFieldFormatter;
use threshold_filter::ThresholdFilterLayer;
pub use macros::*;

/// Used for implicit initialization.
static INIT_LOGGER: Lazy<()> = Lazy::new(|| {
  let subscriber = Registry::default()
      .with(ThresholdFilterLayer)
      .with(
        fmt::layer()
            .fmt_fields(ThresholdFieldFormatter)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr),
      );

  // Failure means a subscriber is already installed, e.g. by a host application. That is fine;
  // our events flow into it instead.
  let _ = tracing::subscriber::set_global_default(subscriber);
});

/// This does not need to be called directly. Initializes the logging system.
pub fn init_logger() {
  Lazy::force(&INIT_LOGGER);
}

static GLOBAL_LOGGING_THRESHOLD: AtomicU8 = AtomicU8::new(0);

/// Sets the global threshold. Messages logged at a threshold above this value are not emitted.
pub fn set_global_logging_threshold(new_threshold: u8) {
  GLOBAL_LOGGING_THRESHOLD.store(new_threshold, Ordering::SeqCst);
}

/// Retrieves the global threshold.
pub fn get_global_logging_threshold() -> u8 {
  GLOBAL_LOGGING_THRESHOLD.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn threshold_round_trip() {
    set_global_logging_threshold(3);
    assert_eq!(get_global_logging_threshold(), 3);

    // Emitted: 2 <= 3.
    info!(2, "visible at threshold {}", 2);
    // Not emitted: 4 > 3.
    debug!(4, "not emitted");
    // No explicit threshold means 0, always emitted.
    warning!("always emitted");

    set_global_logging_threshold(0);
    assert_eq!(get_global_logging_threshold(), 0);
  }
}
