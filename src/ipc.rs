//! IPC transport contracts and broker endpoint addressing.

pub mod loopback;
pub use loopback::LoopbackTransport;

#[cfg(all(unix, feature = "tokio"))] pub mod uds;
#[cfg(all(unix, feature = "tokio"))] pub use uds::UnixSocketTransport;

// std
use std::path::{Path, PathBuf};
// self
use crate::{
	_prelude::*,
	bundle::{OperationBundle, ResponseBundle},
	error::CommunicationError,
};

/// Boxed future returned by [`IpcTransport::communicate`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<Option<ResponseBundle>, CommunicationError>> + 'a + Send>>;

/// One mechanism for exchanging request/response bundles with the broker process.
///
/// Transports differ in availability and failure characteristics; the executor tries
/// them in priority order. Returning `Ok(None)` means the broker answered without a
/// payload - whether that is acceptable is decided by the operation's response
/// parser, not by the transport.
pub trait IpcTransport
where
	Self: Send + Sync,
{
	/// Identifies the transport for logs, metrics, and error reports.
	fn kind(&self) -> TransportKind;

	/// Delivers the request bundle to the broker and awaits an optional response.
	fn communicate<'a>(&'a self, request: &'a OperationBundle) -> TransportFuture<'a>;
}

/// Transport mechanism labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransportKind {
	/// In-process handler, used by tests and demos.
	InProcess,
	/// Unix domain socket connection to the broker process.
	UnixSocket,
	/// Caller-defined mechanism identified by a static label.
	Custom(&'static str),
}
impl TransportKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			TransportKind::InProcess => "in_process",
			TransportKind::UnixSocket => "unix_socket",
			TransportKind::Custom(label) => label,
		}
	}
}
impl Display for TransportKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Errors emitted while validating broker endpoints.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum EndpointError {
	/// Endpoint string is not a valid URL.
	#[error("Endpoint is not a valid URL.")]
	Parse(#[from] url::ParseError),
	/// Endpoint URL does not use the `unix` scheme.
	#[error("Endpoint `{endpoint}` must use the unix scheme.")]
	NotUnixSocket {
		/// The offending endpoint.
		endpoint: String,
	},
	/// Endpoint URL carries no socket path.
	#[error("Endpoint `{endpoint}` is missing a socket path.")]
	MissingSocketPath {
		/// The offending endpoint.
		endpoint: String,
	},
}

/// Validated `unix://` address of the broker process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerEndpoint {
	url: Url,
	path: PathBuf,
}
impl BrokerEndpoint {
	/// Parses and validates a `unix://` endpoint URL.
	pub fn parse(endpoint: &str) -> Result<Self, EndpointError> {
		Self::from_url(Url::parse(endpoint)?)
	}

	/// Validates an already-parsed endpoint URL.
	pub fn from_url(url: Url) -> Result<Self, EndpointError> {
		if url.scheme() != "unix" {
			return Err(EndpointError::NotUnixSocket { endpoint: url.to_string() });
		}

		let path = PathBuf::from(url.path());

		if path.as_os_str().is_empty() {
			return Err(EndpointError::MissingSocketPath { endpoint: url.to_string() });
		}

		Ok(Self { url, path })
	}

	/// Returns the endpoint URL.
	pub fn url(&self) -> &Url {
		&self.url
	}

	/// Returns the socket path the broker listens on.
	pub fn socket_path(&self) -> &Path {
		&self.path
	}
}
impl FromStr for BrokerEndpoint {
	type Err = EndpointError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}
impl Display for BrokerEndpoint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		Display::fmt(&self.url, f)
	}
}
