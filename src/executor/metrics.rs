//! Executor-local counters, available without any metrics backend.

// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing executor activity.
#[derive(Debug, Default)]
pub struct ExecutorMetrics {
	operations: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	fallback: AtomicU64,
}
impl ExecutorMetrics {
	/// Returns the total number of `execute` calls.
	pub fn operations(&self) -> u64 {
		self.operations.load(Ordering::Relaxed)
	}

	/// Returns the number of calls that reached a success outcome.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of calls that ended in an error.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns the number of transport attempts abandoned for a communication failure.
	pub fn fallbacks(&self) -> u64 {
		self.fallback.load(Ordering::Relaxed)
	}

	pub(crate) fn record_operation(&self) {
		self.operations.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_fallback(&self) {
		self.fallback.fetch_add(1, Ordering::Relaxed);
	}
}
