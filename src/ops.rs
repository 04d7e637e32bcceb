//! Built-in broker operations and the high-level client facade.

pub mod envelope;

pub mod accounts;
pub use accounts::*;

pub mod hello;
pub use hello::*;

// self
use crate::{
	_prelude::*,
	context::RequestContext,
	executor::{BrokerOperation, OperationExecutor},
	ipc::IpcTransport,
	telemetry::TelemetryEmitter,
};

/// Request payload key carrying the caller's correlation identifier.
pub const CORRELATION_KEY: &str = "correlation_id";

/// High-level client for the built-in broker operations.
///
/// The client owns an executor, a context template (every call mints a fresh
/// correlation id from it), the advertised protocol range, and the hello cache shared
/// by the account operations' prerequisites.
#[derive(Clone, Debug)]
pub struct BrokerClient {
	/// Executor driving every operation issued by this client.
	pub executor: OperationExecutor,
	context: RequestContext,
	range: ProtocolRange,
	hello_cache: Arc<HelloCache>,
}
impl BrokerClient {
	/// Creates a client over the provided transports and telemetry sink.
	pub fn new(
		transports: Vec<Arc<dyn IpcTransport>>,
		telemetry: Arc<dyn TelemetryEmitter>,
	) -> Self {
		Self::with_executor(OperationExecutor::new(transports, telemetry))
	}

	/// Creates a client around an existing executor.
	pub fn with_executor(executor: OperationExecutor) -> Self {
		Self {
			executor,
			context: RequestContext::new(),
			range: ProtocolRange::default(),
			hello_cache: Default::default(),
		}
	}

	/// Replaces the context template used for every call.
	pub fn with_context(mut self, context: RequestContext) -> Self {
		self.context = context;

		self
	}

	/// Replaces the advertised protocol range.
	pub fn with_protocol_range(mut self, range: ProtocolRange) -> Self {
		self.range = range;

		self
	}

	/// Protocol versions negotiated so far, by transport kind.
	pub fn hello_cache(&self) -> &HelloCache {
		&self.hello_cache
	}

	/// Runs the protocol handshake as a first-class operation, with telemetry.
	///
	/// The per-transport memoization used by account prerequisites is maintained
	/// independently; this call reports the negotiation outcome itself.
	pub async fn hello(&self) -> Result<ProtocolVersion> {
		let context = self.context.refreshed();
		let operation = HelloOperation::new(self.range).with_context(&context);

		self.executor.execute(Some(&context), &operation).await
	}

	/// Lists the accounts the broker holds for this client.
	pub async fn get_accounts(&self) -> Result<Vec<AccountRecord>> {
		let context = self.context.refreshed();
		let operation =
			GetAccountsOperation::new(context.clone(), self.range, self.hello_cache.clone());

		self.executor.execute(Some(&context), &operation).await
	}

	/// Removes one account from the broker; returns whether anything was removed.
	pub async fn remove_account(&self, account_id: impl Into<String>) -> Result<bool> {
		let context = self.context.refreshed();
		let operation = RemoveAccountOperation::new(
			context.clone(),
			self.range,
			self.hello_cache.clone(),
			account_id,
		);

		self.executor.execute(Some(&context), &operation).await
	}

	/// Runs a caller-provided operation under a fresh correlation context.
	pub async fn execute<O>(&self, operation: &O) -> Result<O::Output>
	where
		O: BrokerOperation,
	{
		let context = self.context.refreshed();

		self.executor.execute(Some(&context), operation).await
	}
}
