//! Dispatch-level error types shared across the executor, transports, and operations.

// self
use crate::{
	_prelude::*,
	ipc::TransportKind,
	ops::{ProtocolRange, ProtocolVersion},
};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Type-erased source attached to transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical dispatch error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem, including transport exhaustion.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// The broker was reached and returned a defined failure.
	#[error(transparent)]
	Application(#[from] ApplicationError),
}
impl Error {
	/// Communication failures aggregated by the executor, when this error carries any.
	pub fn causes(&self) -> &[CommunicationError] {
		match self {
			Self::Config(e) => e.causes(),
			Self::Application(_) => &[],
		}
	}

	/// Returns a stable label suitable for telemetry properties.
	pub const fn label(&self) -> &'static str {
		match self {
			Self::Config(e) => e.label(),
			Self::Application(e) => e.label(),
		}
	}
}

/// Configuration and exhaustion failures raised by the executor.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// The executor was constructed with an empty transport list.
	#[error("No transport strategies are available to communicate with the broker.")]
	NoTransports,
	/// Every configured transport failed to reach the broker.
	#[error(
		"Unable to reach the broker through any of the {} configured transports.",
		causes.len()
	)]
	BrokerUnreachable {
		/// Per-transport communication failures, in attempt order.
		causes: Vec<CommunicationError>,
	},
	/// Broker endpoint URL failed validation.
	#[error("Broker endpoint is invalid.")]
	Endpoint(#[from] crate::ipc::EndpointError),
	/// Advertised protocol range failed validation.
	#[error("Client protocol range is invalid.")]
	ProtocolRange(#[from] crate::ops::ProtocolRangeError),
}
impl ConfigError {
	/// Communication failures gathered while exhausting the transport list.
	pub fn causes(&self) -> &[CommunicationError] {
		match self {
			Self::BrokerUnreachable { causes } => causes,
			_ => &[],
		}
	}

	/// Returns a stable label suitable for telemetry properties.
	pub const fn label(&self) -> &'static str {
		match self {
			Self::NoTransports => "no_transports",
			Self::BrokerUnreachable { .. } => "broker_unreachable",
			Self::Endpoint(_) => "invalid_endpoint",
			Self::ProtocolRange(_) => "invalid_protocol_range",
		}
	}
}

/// Defined failures returned by a reached broker.
///
/// These are terminal: once the broker answers with one of them, trying another
/// transport would only repeat the same answer.
#[derive(Debug, ThisError)]
pub enum ApplicationError {
	/// Broker processed the request and rejected it.
	#[error("Broker rejected the {operation} operation with code `{code}`: {message}.")]
	Rejected {
		/// Operation name for diagnostics.
		operation: &'static str,
		/// Broker-supplied error code.
		code: String,
		/// Broker-supplied error message.
		message: String,
	},
	/// Broker answered without a response payload where one is required.
	#[error("Broker returned no response payload for the {operation} operation.")]
	EmptyResponse {
		/// Operation name for diagnostics.
		operation: &'static str,
	},
	/// Broker response payload could not be decoded into the expected shape.
	#[error("Broker returned a malformed response payload for the {operation} operation.")]
	MalformedResponse {
		/// Operation name for diagnostics.
		operation: &'static str,
		/// Structured decoding failure carrying the offending key path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Broker response payload is missing a required entry.
	#[error("Broker response for the {operation} operation is missing the `{key}` entry.")]
	MissingEntry {
		/// Operation name for diagnostics.
		operation: &'static str,
		/// Missing payload key.
		key: &'static str,
	},
	/// Broker response entry is present but cannot be interpreted.
	#[error("Broker returned an uninterpretable `{key}` entry for the {operation} operation: {detail}.")]
	InvalidEntry {
		/// Operation name for diagnostics.
		operation: &'static str,
		/// Offending payload key.
		key: &'static str,
		/// Human-readable interpretation failure.
		detail: String,
	},
	/// Negotiated protocol version falls outside the advertised range.
	#[error("Broker negotiated protocol version {negotiated}, outside the advertised range {range}.")]
	UnsupportedProtocol {
		/// Version the broker selected.
		negotiated: ProtocolVersion,
		/// Range this client advertised.
		range: ProtocolRange,
	},
}
impl ApplicationError {
	/// Returns a stable label suitable for telemetry properties.
	pub const fn label(&self) -> &'static str {
		match self {
			Self::Rejected { .. } => "rejected",
			Self::EmptyResponse { .. } => "empty_response",
			Self::MalformedResponse { .. } => "malformed_response",
			Self::MissingEntry { .. } => "missing_entry",
			Self::InvalidEntry { .. } => "invalid_entry",
			Self::UnsupportedProtocol { .. } => "unsupported_protocol",
		}
	}
}

/// Failure to reach the broker through one specific transport.
///
/// Communication failures are recoverable by falling back to the next transport; they
/// reach callers only inside [`ConfigError::BrokerUnreachable`] once every transport
/// has been exhausted.
#[derive(Debug, ThisError)]
#[error("The {transport} transport could not reach the broker: {message}.")]
pub struct CommunicationError {
	/// Failure category used for diagnostics and log fields.
	pub category: CommunicationCategory,
	/// Transport that produced the failure.
	pub transport: TransportKind,
	/// Human-readable failure summary.
	pub message: String,
	/// Underlying transport failure, when available.
	#[source]
	pub source: Option<BoxError>,
}
impl CommunicationError {
	/// Creates a communication failure for the provided category and transport.
	pub fn new(
		category: CommunicationCategory,
		transport: TransportKind,
		message: impl Into<String>,
	) -> Self {
		Self { category, transport, message: message.into(), source: None }
	}

	/// Shorthand for a connection-category failure.
	pub fn connection(transport: TransportKind, message: impl Into<String>) -> Self {
		Self::new(CommunicationCategory::ConnectionFailure, transport, message)
	}

	/// Attaches the underlying transport failure.
	pub fn with_source(mut self, src: impl 'static + Send + Sync + StdError) -> Self {
		self.source = Some(Box::new(src));

		self
	}
}

/// Categories of broker communication failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommunicationCategory {
	/// The transport could not connect to the broker process.
	ConnectionFailure,
	/// This client cannot encode or carry the request over the transport.
	UnsupportedByClient,
	/// The broker does not speak this transport or operation.
	UnsupportedByBroker,
}
impl CommunicationCategory {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CommunicationCategory::ConnectionFailure => "connection_failure",
			CommunicationCategory::UnsupportedByClient => "unsupported_by_client",
			CommunicationCategory::UnsupportedByBroker => "unsupported_by_broker",
		}
	}
}
impl Display for CommunicationCategory {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Failure raised while performing one operation attempt on one transport.
///
/// The executor matches on this to decide between falling back to the next transport
/// and failing the whole call.
#[derive(Debug, ThisError)]
pub enum OperationError {
	/// The transport could not reach the broker; the executor may fall back.
	#[error(transparent)]
	Communication(#[from] CommunicationError),
	/// The broker was reached and returned a defined failure; fatal for the call.
	#[error(transparent)]
	Application(#[from] ApplicationError),
}
