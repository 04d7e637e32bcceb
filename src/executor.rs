//! Operation execution across prioritized IPC transports.
//!
//! [`OperationExecutor::execute`] drives one [`BrokerOperation`] over the configured
//! transport list in priority order. A communication failure is remembered and the
//! next transport is tried; an application failure or a success is terminal. When
//! every transport fails to reach the broker, the call ends with
//! [`ConfigError::BrokerUnreachable`] carrying the per-transport failures in attempt
//! order. Start/end telemetry is recorded exactly once around the whole call when the
//! operation carries a telemetry API id.

mod metrics;
pub use metrics::ExecutorMetrics;

// std
use std::panic::{self, AssertUnwindSafe};
// self
use crate::{
	_prelude::*,
	bundle::{OperationBundle, ResponseBundle},
	context::RequestContext,
	error::{ConfigError, OperationError},
	ipc::IpcTransport,
	obs::{self, OperationOutcome, OperationSpan},
	telemetry::{ApiId, TelemetryEmitter, TelemetryEvent},
};

/// Boxed future returned by [`BrokerOperation::prerequisite`].
pub type PrerequisiteFuture<'a> =
	Pin<Box<dyn Future<Output = Result<(), OperationError>> + 'a + Send>>;

/// One logical broker request, independent of the transport that carries it.
///
/// Implementations describe how to build the outbound request, how to parse the
/// response, and which telemetry identifier to report under. The hook methods default
/// to no-ops; override only what the operation needs.
pub trait BrokerOperation
where
	Self: Send + Sync,
{
	/// Typed result extracted from the broker response.
	type Output;

	/// Transport-specific setup run before the request is sent, such as a protocol
	/// handshake. A failure here surfaces exactly as if the main request had failed
	/// on this transport.
	fn prerequisite<'a>(&'a self, transport: &'a dyn IpcTransport) -> PrerequisiteFuture<'a> {
		let _ = transport;

		Box::pin(async { Ok(()) })
	}

	/// Builds the outbound request payload.
	fn request(&self) -> OperationBundle;

	/// Extracts the typed result from an optional response payload.
	///
	/// `None` means the broker answered without a payload; operations that require
	/// one should map it to [`ApplicationError::EmptyResponse`](crate::error::ApplicationError::EmptyResponse)
	/// rather than a communication failure, since the broker was in fact reached.
	fn parse_response(
		&self,
		response: Option<ResponseBundle>,
	) -> Result<Self::Output, OperationError>;

	/// Operation name used in logs, error reports, and telemetry.
	fn name(&self) -> &'static str;

	/// Telemetry API identifier; `None` disables telemetry for this operation.
	fn telemetry_id(&self) -> Option<ApiId> {
		None
	}

	/// Enriches a success end event with operation-specific properties.
	fn record_success(&self, _event: &mut TelemetryEvent, _output: &Self::Output) {}
}

/// Drives broker operations across an ordered transport list with fallback.
///
/// The executor holds an immutable transport list, an injected telemetry sink, and
/// shared counters. It takes no locks of its own, so one instance (or clones of it)
/// can serve concurrent callers; transport attempts within a single call are strictly
/// sequential.
#[derive(Clone)]
pub struct OperationExecutor {
	/// Shared counters describing executor activity.
	pub metrics: Arc<ExecutorMetrics>,
	transports: Arc<[Arc<dyn IpcTransport>]>,
	telemetry: Arc<dyn TelemetryEmitter>,
}
impl OperationExecutor {
	/// Creates an executor over the provided transports, in priority order, reporting
	/// to the injected telemetry sink.
	pub fn new(
		transports: Vec<Arc<dyn IpcTransport>>,
		telemetry: Arc<dyn TelemetryEmitter>,
	) -> Self {
		Self { metrics: Default::default(), transports: transports.into(), telemetry }
	}

	/// Transports in priority order.
	pub fn transports(&self) -> &[Arc<dyn IpcTransport>] {
		&self.transports
	}

	/// Executes one operation, falling back across transports on communication
	/// failures.
	///
	/// Every call produces exactly one terminal outcome: the first parsed success,
	/// the first application-level failure, or a configuration error when no
	/// transport could reach the broker. `parameters` only enriches telemetry; it is
	/// never sent to the broker.
	pub async fn execute<O>(
		&self,
		parameters: Option<&RequestContext>,
		operation: &O,
	) -> Result<O::Output>
	where
		O: BrokerOperation,
	{
		let span = OperationSpan::new(operation.name());

		obs::record_operation_outcome(operation.name(), OperationOutcome::Attempt);
		self.metrics.record_operation();

		let result = span.instrument(self.execute_inner(parameters, operation)).await;

		match &result {
			Ok(_) => {
				self.metrics.record_success();
				obs::record_operation_outcome(operation.name(), OperationOutcome::Success);
			},
			Err(_) => {
				self.metrics.record_failure();
				obs::record_operation_outcome(operation.name(), OperationOutcome::Failure);
			},
		}

		result
	}

	async fn execute_inner<O>(
		&self,
		parameters: Option<&RequestContext>,
		operation: &O,
	) -> Result<O::Output>
	where
		O: BrokerOperation,
	{
		self.emit_start(operation, parameters);

		if self.transports.is_empty() {
			return Err(self.fail(operation, parameters, ConfigError::NoTransports.into()));
		}

		let mut causes = Vec::new();

		for transport in self.transports.iter() {
			match self.perform(transport.as_ref(), operation).await {
				Ok(output) => {
					self.emit_success(operation, parameters, &output);

					return Ok(output);
				},
				Err(OperationError::Communication(cause)) => {
					obs::trace_communication_failure(operation.name(), &cause);
					self.metrics.record_fallback();
					causes.push(cause);
				},
				Err(OperationError::Application(error)) =>
					return Err(self.fail(operation, parameters, error.into())),
			}
		}

		Err(self.fail(operation, parameters, ConfigError::BrokerUnreachable { causes }.into()))
	}

	async fn perform<O>(
		&self,
		transport: &dyn IpcTransport,
		operation: &O,
	) -> Result<O::Output, OperationError>
	where
		O: BrokerOperation,
	{
		obs::trace_transport_attempt(operation.name(), transport.kind());
		operation.prerequisite(transport).await?;

		let request = operation.request();
		let response = transport.communicate(&request).await?;

		operation.parse_response(response)
	}

	/// Emits failure telemetry for a terminal error and hands the error back.
	fn fail<O>(&self, operation: &O, parameters: Option<&RequestContext>, error: Error) -> Error
	where
		O: BrokerOperation,
	{
		self.emit_failure(operation, parameters, &error);

		error
	}

	fn emit_start<O>(&self, operation: &O, parameters: Option<&RequestContext>)
	where
		O: BrokerOperation,
	{
		let Some(api_id) = operation.telemetry_id() else { return };

		self.emit_guarded(|| {
			let mut event = TelemetryEvent::start(api_id, operation.name());

			if let Some(context) = parameters {
				event = event.with_context(context);
			}

			event
		});
	}

	fn emit_success<O>(
		&self,
		operation: &O,
		parameters: Option<&RequestContext>,
		output: &O::Output,
	) where
		O: BrokerOperation,
	{
		let Some(api_id) = operation.telemetry_id() else { return };

		self.emit_guarded(|| {
			let mut event = TelemetryEvent::end(api_id, operation.name()).with_success(true);

			if let Some(context) = parameters {
				event = event.with_context(context);
			}

			operation.record_success(&mut event, output);

			event
		});
	}

	fn emit_failure<O>(&self, operation: &O, parameters: Option<&RequestContext>, error: &Error)
	where
		O: BrokerOperation,
	{
		let Some(api_id) = operation.telemetry_id() else { return };

		self.emit_guarded(|| {
			let mut event = TelemetryEvent::end(api_id, operation.name())
				.with_success(false)
				.with_error(error.label(), error.to_string());

			if let Some(context) = parameters {
				event = event.with_context(context);
			}

			event
		});
	}

	// A telemetry sink must never alter the operation outcome, even by panicking.
	fn emit_guarded(&self, build: impl FnOnce() -> TelemetryEvent) {
		let _ = panic::catch_unwind(AssertUnwindSafe(|| self.telemetry.emit(&build())));
	}
}
impl Debug for OperationExecutor {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OperationExecutor")
			.field("transports", &self.transports.iter().map(|t| t.kind()).collect::<Vec<_>>())
			.field("metrics", &self.metrics)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::build_test_executor,
		error::ApplicationError,
		ipc::{LoopbackTransport, TransportKind},
	};

	struct EchoOperation;
	impl BrokerOperation for EchoOperation {
		type Output = String;

		fn request(&self) -> OperationBundle {
			OperationBundle::new("probe.echo").with("payload", "ping")
		}

		fn parse_response(
			&self,
			response: Option<ResponseBundle>,
		) -> Result<Self::Output, OperationError> {
			let response =
				response.ok_or(ApplicationError::EmptyResponse { operation: "echo" })?;

			response
				.text("echo")
				.map(ToOwned::to_owned)
				.ok_or_else(|| ApplicationError::MissingEntry { operation: "echo", key: "echo" }.into())
		}

		fn name(&self) -> &'static str {
			"echo"
		}
	}

	#[tokio::test]
	async fn empty_transport_list_is_a_config_error() {
		let (executor, telemetry) = build_test_executor(Vec::new());

		let error = executor
			.execute(None, &EchoOperation)
			.await
			.expect_err("An executor without transports should have failed.");

		assert!(matches!(error, Error::Config(ConfigError::NoTransports)));
		// No telemetry id on the operation, so no events either.
		assert!(telemetry.is_empty());
	}

	#[tokio::test]
	async fn default_hooks_answer_through_a_single_transport() {
		let transport = Arc::new(LoopbackTransport::new(|request| {
			assert_eq!(request.payload.text("payload"), Some("ping"));

			Ok(Some(ResponseBundle::new().with("echo", "pong")))
		}));
		let (executor, _) = build_test_executor(vec![transport.clone()]);

		let output = executor
			.execute(None, &EchoOperation)
			.await
			.expect("A healthy transport should have answered.");

		assert_eq!(output, "pong");
		assert_eq!(transport.calls(), 1);
		assert_eq!(executor.metrics.operations(), 1);
		assert_eq!(executor.metrics.successes(), 1);
		assert_eq!(executor.metrics.failures(), 0);
		assert_eq!(executor.metrics.fallbacks(), 0);
	}

	#[tokio::test]
	async fn clones_share_transports_and_metrics() {
		let transport = Arc::new(LoopbackTransport::new(|_| {
			Ok(Some(ResponseBundle::new().with("echo", "pong")))
		}));
		let (executor, _) = build_test_executor(vec![transport]);
		let clone = executor.clone();

		clone.execute(None, &EchoOperation).await.expect("The clone should have executed.");

		assert_eq!(executor.metrics.operations(), 1);
		assert_eq!(executor.transports()[0].kind(), TransportKind::InProcess);
	}
}
