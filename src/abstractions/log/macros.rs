//! Macros for generating log messages at each level, with an optional leading threshold.
//!
//! The six level macros are thin shells over [`emit_log!`], which attaches the threshold and
//! the criticality marker as event fields; the filtering layer reads the former and the field
//! formatter turns the latter into a `[CRITICAL]` prefix (and drops it when false).

/// The one place an event is actually emitted. Not for direct use: call `error!`, `debug!`,
/// and friends instead.
#[doc(hidden)]
#[macro_export]
macro_rules! emit_log {
  ($level:expr, $critical:expr, $threshold:expr, $($arg:tt)+) => {
    {
      $crate::log::init_logger();
      tracing::event!(
        $level,
        critical = $critical,
        threshold = $threshold,
        message = format_args!($($arg)+)
      );
    }
  };
}

#[macro_export]
macro_rules! critical {
  ($threshold:expr, $($arg:tt)+) => {
    $crate::emit_log!(tracing::Level::ERROR, true, $threshold, $($arg)+)
  };
  ($($arg:tt)+) => {
    $crate::emit_log!(tracing::Level::ERROR, true, 0, $($arg)+)
  };
}

#[macro_export]
macro_rules! error {
  ($threshold:expr, $($arg:tt)+) => {
    $crate::emit_log!(tracing::Level::ERROR, false, $threshold, $($arg)+)
  };
  ($($arg:tt)+) => {
    $crate::emit_log!(tracing::Level::ERROR, false, 0, $($arg)+)
  };
}

#[macro_export]
macro_rules! warning {
  ($threshold:expr, $($arg:tt)+) => {
    $crate::emit_log!(tracing::Level::WARN, false, $threshold, $($arg)+)
  };
  ($($arg:tt)+) => {
    $crate::emit_log!(tracing::Level::WARN, false, 0, $($arg)+)
  };
}

#[macro_export]
macro_rules! info {
  ($threshold:expr, $($arg:tt)+) => {
    $crate::emit_log!(tracing::Level::INFO, false, $threshold, $($arg)+)
  };
  ($($arg:tt)+) => {
    $crate::emit_log!(tracing::Level::INFO, false, 0, $($arg)+)
  };
}

#[macro_export]
macro_rules! debug {
  ($threshold:expr, $($arg:tt)+) => {
    $crate::emit_log!(tracing::Level::DEBUG, false, $threshold, $($arg)+)
  };
  ($($arg:tt)+) => {
    $crate::emit_log!(tracing::Level::DEBUG, false, 0, $($arg)+)
  };
}

#[macro_export]
macro_rules! trace {
  ($threshold:expr, $($arg:tt)+) => {
    $crate::emit_log!(tracing::Level::TRACE, false, $threshold, $($arg)+)
  };
  ($($arg:tt)+) => {
    $crate::emit_log!(tracing::Level::TRACE, false, 0, $($arg)+)
  };
}


// The following makes the macros importable directly from the `log` module.
pub use {critical, debug, error, info, trace, warning};
