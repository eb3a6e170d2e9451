use tracing::{
  field::{Field, Visit},
  Event,
  Subscriber
};
use tracing_subscriber::{layer::Context, registry::LookupSpan, Layer};

use super::get_global_logging_threshold;

/// A `tracing` layer that drops any event whose `threshold` field exceeds the global logging
/// threshold. Events without the field pass unconditionally.
pub(crate) struct ThresholdFilterLayer;

impl<S> Layer<S> for ThresholdFilterLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
  fn event_enabled(&self, event: &Event<'_>, _ctx: Context<'_, S>) -> bool {
    let mut gate = ThresholdGate::against(get_global_logging_threshold());
    event.record(&mut gate);
    gate.enabled
  }
}

/// Decides the verdict while the event's fields stream past, which is how the `tracing` crate
/// exposes them. The verdict starts at "emit": an event that never records a threshold is
/// unconditional, and a threshold that does not fit in a `u8` is more verbose than any limit.
struct ThresholdGate {
  limit: u8,
  enabled: bool,
}

impl ThresholdGate {
  fn against(limit: u8) -> Self {
    ThresholdGate { limit, enabled: true }
  }

  fn admit(&mut self, threshold: u64) {
    self.enabled = match u8::try_from(threshold) {
      Ok(threshold) => threshold <= self.limit,
      Err(_) => false,
    };
  }
}

impl Visit for ThresholdGate {
  fn record_u64(&mut self, field: &Field, value: u64) {
    if field.name() == "threshold" {
      self.admit(value);
    }
  }

  fn record_i64(&mut self, field: &Field, value: i64) {
    if field.name() == "threshold" {
      self.admit(u64::try_from(value).unwrap_or(u64::MAX));
    }
  }

  fn record_debug(&mut self, _field: &Field, _value: &dyn std::fmt::Debug) {
    // The level macros only attach numeric thresholds; other fields are not ours to filter on.
  }
}
