//! In-process [`IpcTransport`] for local development and tests.

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// self
use crate::{
	_prelude::*,
	bundle::{OperationBundle, ResponseBundle},
	error::CommunicationError,
	ipc::{IpcTransport, TransportFuture, TransportKind},
};

type Handler =
	Box<dyn Fn(&OperationBundle) -> Result<Option<ResponseBundle>, CommunicationError> + Send + Sync>;

/// Transport that answers requests through a caller-supplied handler, in-process.
///
/// Every `communicate` call is counted, so tests can assert which transports an
/// executor actually attempted.
pub struct LoopbackTransport {
	kind: TransportKind,
	handler: Handler,
	calls: AtomicUsize,
}
impl LoopbackTransport {
	/// Creates an in-process transport backed by the provided handler.
	pub fn new<F>(handler: F) -> Self
	where
		F: Fn(&OperationBundle) -> Result<Option<ResponseBundle>, CommunicationError>
			+ Send
			+ Sync
			+ 'static,
	{
		Self::with_kind(TransportKind::InProcess, handler)
	}

	/// Creates an in-process transport reporting a custom kind label.
	pub fn labeled<F>(label: &'static str, handler: F) -> Self
	where
		F: Fn(&OperationBundle) -> Result<Option<ResponseBundle>, CommunicationError>
			+ Send
			+ Sync
			+ 'static,
	{
		Self::with_kind(TransportKind::Custom(label), handler)
	}

	/// Creates a transport that fails every request with a connection-category error.
	pub fn unreachable(label: &'static str, message: impl Into<String>) -> Self {
		let kind = TransportKind::Custom(label);
		let message = message.into();

		Self::with_kind(kind, move |_| Err(CommunicationError::connection(kind, message.clone())))
	}

	/// Number of `communicate` calls served so far.
	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::Relaxed)
	}

	fn with_kind<F>(kind: TransportKind, handler: F) -> Self
	where
		F: Fn(&OperationBundle) -> Result<Option<ResponseBundle>, CommunicationError>
			+ Send
			+ Sync
			+ 'static,
	{
		Self { kind, handler: Box::new(handler), calls: AtomicUsize::new(0) }
	}
}
impl IpcTransport for LoopbackTransport {
	fn kind(&self) -> TransportKind {
		self.kind
	}

	fn communicate<'a>(&'a self, request: &'a OperationBundle) -> TransportFuture<'a> {
		self.calls.fetch_add(1, Ordering::Relaxed);

		let result = (self.handler)(request);

		Box::pin(async move { result })
	}
}
impl Debug for LoopbackTransport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoopbackTransport")
			.field("kind", &self.kind)
			.field("calls", &self.calls())
			.finish()
	}
}
