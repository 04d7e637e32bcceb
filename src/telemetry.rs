//! Telemetry contracts and built-in event sinks.

pub mod event;

pub use event::*;

// self
use crate::_prelude::*;

/// Process-wide sink for operation telemetry events.
///
/// Implementations must be cheap and non-blocking. The executor treats emission as
/// fire-and-forget: a sink failure, including a panic, never alters an operation's
/// outcome.
pub trait TelemetryEmitter
where
	Self: Send + Sync,
{
	/// Records one event.
	fn emit(&self, event: &TelemetryEvent);
}

/// Sink that discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopTelemetry;
impl TelemetryEmitter for NoopTelemetry {
	fn emit(&self, _event: &TelemetryEvent) {}
}

/// Thread-safe sink that keeps events in-process, for local development and tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryTelemetry(Arc<RwLock<Vec<TelemetryEvent>>>);
impl MemoryTelemetry {
	/// Creates an empty in-memory sink.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns a snapshot of every recorded event, in emission order.
	pub fn events(&self) -> Vec<TelemetryEvent> {
		self.0.read().clone()
	}

	/// Returns the recorded events matching the provided kind, in emission order.
	pub fn events_of(&self, kind: TelemetryEventKind) -> Vec<TelemetryEvent> {
		self.0.read().iter().filter(|event| event.kind == kind).cloned().collect()
	}

	/// Number of recorded events.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns true if no event has been recorded.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	/// Drops every recorded event.
	pub fn clear(&self) {
		self.0.write().clear();
	}
}
impl TelemetryEmitter for MemoryTelemetry {
	fn emit(&self, event: &TelemetryEvent) {
		self.0.write().push(event.clone());
	}
}
