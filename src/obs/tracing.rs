// self
use crate::{_prelude::*, error::CommunicationError, ipc::TransportKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOperation<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOperation<F> = F;

/// A span builder wrapped around one operation execution.
#[derive(Clone, Debug)]
pub struct OperationSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OperationSpan {
	/// Creates a new span tagged with the operation name.
	pub fn new(operation: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("broker_dispatch.operation", operation);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = operation;

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOperation<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Traces one transport attempt inside an operation.
pub fn trace_transport_attempt(operation: &'static str, transport: TransportKind) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(operation, transport = transport.as_str(), "Attempting broker transport.");
	}

	#[cfg(not(feature = "tracing"))]
	{
		let _ = (operation, transport);
	}
}

/// Traces a communication failure absorbed by transport fallback.
pub fn trace_communication_failure(operation: &'static str, cause: &CommunicationError) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			operation,
			transport = cause.transport.as_str(),
			category = cause.category.as_str(),
			"Transport failed to reach the broker; trying the next one."
		);
	}

	#[cfg(not(feature = "tracing"))]
	{
		let _ = (operation, cause);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn operation_span_noop_without_tracing() {
		// Compile-time smoke test ensures the helpers exist even when tracing is disabled.
		let span = OperationSpan::new("hello");
		let _clone = span.clone();

		trace_transport_attempt("hello", TransportKind::InProcess);
		trace_communication_failure(
			"hello",
			&CommunicationError::connection(TransportKind::InProcess, "Handler is offline"),
		);
	}

	#[cfg(feature = "tracing")]
	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = OperationSpan::new("instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
