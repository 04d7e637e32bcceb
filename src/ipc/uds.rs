//! Unix-domain-socket [`IpcTransport`] speaking length-prefixed JSON frames.
//!
//! Each `communicate` call opens one connection to the broker socket, writes a single
//! `u32` big-endian length-prefixed JSON frame holding the [`OperationBundle`], and
//! reads one frame back. A zero-length response frame means the broker answered
//! without a payload. Calls are serialized through an internal guard so at most one
//! connection is open per transport instance.

// std
use std::{io, time::Duration};
// crates.io
use tokio::{
	io::{AsyncReadExt, AsyncWriteExt},
	net::UnixStream,
	time,
};
// self
use crate::{
	_prelude::*,
	bundle::{OperationBundle, ResponseBundle},
	error::{CommunicationCategory, CommunicationError},
	ipc::{BrokerEndpoint, IpcTransport, TransportFuture, TransportKind},
};

/// Upper bound for a single request or response frame.
pub const MAX_FRAME_LEN: usize = 4 * 1024 * 1024;

/// Transport that reaches the broker over its Unix domain socket.
#[derive(Debug)]
pub struct UnixSocketTransport {
	endpoint: BrokerEndpoint,
	connect_timeout: Option<Duration>,
	connection_guard: AsyncMutex<()>,
}
impl UnixSocketTransport {
	/// Creates a transport for the provided broker endpoint.
	pub fn new(endpoint: BrokerEndpoint) -> Self {
		Self { endpoint, connect_timeout: None, connection_guard: AsyncMutex::new(()) }
	}

	/// Bounds how long a connection attempt may take.
	pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
		self.connect_timeout = Some(timeout);

		self
	}

	/// Returns the configured broker endpoint.
	pub fn endpoint(&self) -> &BrokerEndpoint {
		&self.endpoint
	}

	async fn connect(&self) -> Result<UnixStream, CommunicationError> {
		let pending = UnixStream::connect(self.endpoint.socket_path());
		let connected = match self.connect_timeout {
			Some(timeout) => time::timeout(timeout, pending).await.map_err(|_| {
				CommunicationError::connection(
					TransportKind::UnixSocket,
					format!("Connection to {} timed out after {timeout:?}", self.endpoint),
				)
			})?,
			None => pending.await,
		};

		connected.map_err(|e| {
			CommunicationError::connection(
				TransportKind::UnixSocket,
				format!("Failed to connect to {}", self.endpoint),
			)
			.with_source(e)
		})
	}

	async fn round_trip(
		&self,
		request: &OperationBundle,
	) -> Result<Option<ResponseBundle>, CommunicationError> {
		let frame = serde_json::to_vec(request).map_err(|e| {
			CommunicationError::new(
				CommunicationCategory::UnsupportedByClient,
				TransportKind::UnixSocket,
				format!("Failed to encode the {} request frame", request.operation),
			)
			.with_source(e)
		})?;

		if frame.len() > MAX_FRAME_LEN {
			return Err(CommunicationError::new(
				CommunicationCategory::UnsupportedByClient,
				TransportKind::UnixSocket,
				format!(
					"Request frame of {} bytes for {} exceeds the {MAX_FRAME_LEN} byte limit",
					frame.len(),
					request.operation
				),
			));
		}

		let _serialized = self.connection_guard.lock().await;
		let mut stream = self.connect().await?;

		stream
			.write_all(&(frame.len() as u32).to_be_bytes())
			.await
			.map_err(|e| io_failure("write the request frame length", e))?;
		stream.write_all(&frame).await.map_err(|e| io_failure("write the request frame", e))?;
		stream.flush().await.map_err(|e| io_failure("flush the request frame", e))?;

		let mut len_buf = [0_u8; 4];

		stream
			.read_exact(&mut len_buf)
			.await
			.map_err(|e| io_failure("read the response frame length", e))?;

		let len = u32::from_be_bytes(len_buf) as usize;

		if len == 0 {
			return Ok(None);
		}
		if len > MAX_FRAME_LEN {
			return Err(CommunicationError::connection(
				TransportKind::UnixSocket,
				format!("Response frame of {len} bytes exceeds the {MAX_FRAME_LEN} byte limit"),
			));
		}

		let mut body = vec![0_u8; len];

		stream.read_exact(&mut body).await.map_err(|e| io_failure("read the response frame", e))?;

		let response = serde_json::from_slice::<ResponseBundle>(&body).map_err(|e| {
			CommunicationError::connection(
				TransportKind::UnixSocket,
				"Broker returned an undecodable response frame",
			)
			.with_source(e)
		})?;

		Ok(Some(response))
	}
}
impl IpcTransport for UnixSocketTransport {
	fn kind(&self) -> TransportKind {
		TransportKind::UnixSocket
	}

	fn communicate<'a>(&'a self, request: &'a OperationBundle) -> TransportFuture<'a> {
		Box::pin(self.round_trip(request))
	}
}

fn io_failure(action: &str, e: io::Error) -> CommunicationError {
	CommunicationError::connection(TransportKind::UnixSocket, format!("Failed to {action}"))
		.with_source(e)
}
