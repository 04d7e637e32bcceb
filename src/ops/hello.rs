//! Protocol negotiation with the broker.
//!
//! Every broker conversation starts with a hello handshake: the client advertises the
//! protocol range it speaks and the broker answers with the version it selected. The
//! result is memoized per transport kind by [`HelloCache`], so account operations pay
//! for the handshake once per process rather than once per call.

// std
use std::num::ParseIntError;
// self
use crate::{
	_prelude::*,
	bundle::{OperationBundle, ResponseBundle},
	context::RequestContext,
	error::{ApplicationError, OperationError},
	executor::BrokerOperation,
	ipc::{IpcTransport, TransportKind},
	ops::envelope,
	telemetry::{ApiId, TelemetryEvent},
};

/// Errors emitted while parsing or validating protocol versions and ranges.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ProtocolRangeError {
	/// Version text is not in `major.minor` form.
	#[error("Protocol version `{text}` is not in major.minor form.")]
	Malformed {
		/// The offending version text.
		text: String,
	},
	/// Version component is not a number.
	#[error("Protocol version `{text}` contains a non-numeric component.")]
	NotNumeric {
		/// The offending version text.
		text: String,
		/// Underlying parse failure.
		#[source]
		source: ParseIntError,
	},
	/// Range minimum exceeds its preferred version.
	#[error("Protocol range minimum {minimum} exceeds the preferred version {preferred}.")]
	Inverted {
		/// Range minimum.
		minimum: ProtocolVersion,
		/// Range preferred version.
		preferred: ProtocolVersion,
	},
}

/// Broker protocol version in `major.minor` form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolVersion {
	/// Major version component.
	pub major: u16,
	/// Minor version component.
	pub minor: u16,
}
impl ProtocolVersion {
	/// Creates a version from its components.
	pub const fn new(major: u16, minor: u16) -> Self {
		Self { major, minor }
	}
}
impl Display for ProtocolVersion {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}.{}", self.major, self.minor)
	}
}
impl FromStr for ProtocolVersion {
	type Err = ProtocolRangeError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let Some((major, minor)) = s.split_once('.') else {
			return Err(ProtocolRangeError::Malformed { text: s.into() });
		};
		let parse = |component: &str| {
			component
				.parse::<u16>()
				.map_err(|source| ProtocolRangeError::NotNumeric { text: s.into(), source })
		};

		Ok(Self { major: parse(major)?, minor: parse(minor)? })
	}
}

/// Contiguous range of protocol versions this client speaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProtocolRange {
	/// Lowest version the client accepts.
	pub minimum: ProtocolVersion,
	/// Version the client asks for.
	pub preferred: ProtocolVersion,
}
impl ProtocolRange {
	/// Creates a validated range.
	pub fn new(
		minimum: ProtocolVersion,
		preferred: ProtocolVersion,
	) -> Result<Self, ProtocolRangeError> {
		if minimum > preferred {
			return Err(ProtocolRangeError::Inverted { minimum, preferred });
		}

		Ok(Self { minimum, preferred })
	}

	/// Range spanning exactly one version.
	pub const fn exact(version: ProtocolVersion) -> Self {
		Self { minimum: version, preferred: version }
	}

	/// Returns true if the provided version falls inside the range.
	pub fn accepts(self, version: ProtocolVersion) -> bool {
		self.minimum <= version && version <= self.preferred
	}
}
impl Default for ProtocolRange {
	fn default() -> Self {
		Self { minimum: ProtocolVersion::new(1, 0), preferred: ProtocolVersion::new(2, 0) }
	}
}
impl Display for ProtocolRange {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "[{}, {}]", self.minimum, self.preferred)
	}
}

/// Negotiates the protocol version spoken with the broker.
#[derive(Clone, Debug)]
pub struct HelloOperation {
	range: ProtocolRange,
	context: Option<RequestContext>,
}
impl HelloOperation {
	/// Operation name in the outbound bundle.
	pub const OPERATION: &'static str = "broker.hello";
	/// Request key carrying the lowest version the client accepts.
	pub const MINIMUM_KEY: &'static str = "protocol.minimum";
	/// Request key carrying the version the client asks for.
	pub const PREFERRED_KEY: &'static str = "protocol.preferred";
	/// Response key carrying the version the broker selected.
	pub const NEGOTIATED_KEY: &'static str = "protocol.negotiated";

	/// Creates a handshake advertising the provided range.
	pub fn new(range: ProtocolRange) -> Self {
		Self { range, context: None }
	}

	/// Attaches the caller context so its correlation id rides in the payload.
	pub fn with_context(mut self, context: &RequestContext) -> Self {
		self.context = Some(context.clone());

		self
	}

	/// The advertised range.
	pub fn range(&self) -> ProtocolRange {
		self.range
	}
}
impl BrokerOperation for HelloOperation {
	type Output = ProtocolVersion;

	fn request(&self) -> OperationBundle {
		let mut request = OperationBundle::new(Self::OPERATION)
			.with(Self::MINIMUM_KEY, self.range.minimum.to_string())
			.with(Self::PREFERRED_KEY, self.range.preferred.to_string());

		if let Some(context) = &self.context {
			request = request.with(super::CORRELATION_KEY, context.correlation_id.as_str());
		}

		request
	}

	fn parse_response(
		&self,
		response: Option<ResponseBundle>,
	) -> Result<Self::Output, OperationError> {
		let response = envelope::expect_payload(self.name(), response)?;

		negotiate(self.name(), &response, self.range)
	}

	fn name(&self) -> &'static str {
		"hello"
	}

	fn telemetry_id(&self) -> Option<ApiId> {
		Some(ApiId::HELLO)
	}

	fn record_success(&self, event: &mut TelemetryEvent, output: &Self::Output) {
		event.set_property("negotiated_protocol", output.to_string());
	}
}

/// Extracts and validates the negotiated version from a hello response payload.
fn negotiate(
	operation: &'static str,
	response: &ResponseBundle,
	range: ProtocolRange,
) -> Result<ProtocolVersion, OperationError> {
	let text = envelope::require_text(operation, response, HelloOperation::NEGOTIATED_KEY)?;
	let negotiated = text.parse::<ProtocolVersion>().map_err(|e| ApplicationError::InvalidEntry {
		operation,
		key: HelloOperation::NEGOTIATED_KEY,
		detail: e.to_string(),
	})?;

	if !range.accepts(negotiated) {
		return Err(ApplicationError::UnsupportedProtocol { negotiated, range }.into());
	}

	Ok(negotiated)
}

/// Memoized hello results, keyed by transport kind.
///
/// `ensure` runs the handshake directly against the given transport, bypassing the
/// executor: a prerequisite failing on one transport must surface on that transport
/// so the executor can fall back, and the nested handshake must not emit its own
/// start/end telemetry. Concurrent first calls share one handshake per transport
/// kind through a singleflight guard.
#[derive(Default)]
pub struct HelloCache {
	negotiated: RwLock<HashMap<TransportKind, ProtocolVersion>>,
	handshake_guards: Mutex<HashMap<TransportKind, Arc<AsyncMutex<()>>>>,
}
impl HelloCache {
	/// Creates an empty cache.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the memoized version for a transport kind, when negotiated before.
	pub fn negotiated(&self, kind: TransportKind) -> Option<ProtocolVersion> {
		self.negotiated.read().get(&kind).copied()
	}

	/// Returns the memoized version or performs the handshake, memoizing on success.
	pub async fn ensure(
		&self,
		transport: &dyn IpcTransport,
		range: ProtocolRange,
	) -> Result<ProtocolVersion, OperationError> {
		let kind = transport.kind();

		if let Some(version) = self.negotiated(kind) {
			return Ok(version);
		}

		let guard = self.handshake_guard(kind);
		let _singleflight = guard.lock().await;

		// A concurrent caller may have finished the handshake while this one awaited
		// the guard.
		if let Some(version) = self.negotiated(kind) {
			return Ok(version);
		}

		let operation = HelloOperation::new(range);
		let request = operation.request();
		let response = transport.communicate(&request).await?;
		let version = operation.parse_response(response)?;

		self.negotiated.write().insert(kind, version);

		Ok(version)
	}

	/// Drops the memoized version for one transport kind.
	pub fn forget(&self, kind: TransportKind) {
		self.negotiated.write().remove(&kind);
	}

	/// Drops every memoized version.
	pub fn clear(&self) {
		self.negotiated.write().clear();
	}

	fn handshake_guard(&self, kind: TransportKind) -> Arc<AsyncMutex<()>> {
		let mut guards = self.handshake_guards.lock();

		guards.entry(kind).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}
}
impl Debug for HelloCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HelloCache").field("negotiated", &*self.negotiated.read()).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::ipc::LoopbackTransport;

	fn hello_broker(answer: &'static str) -> LoopbackTransport {
		LoopbackTransport::new(move |request| {
			assert_eq!(request.operation, HelloOperation::OPERATION);

			Ok(Some(ResponseBundle::new().with(HelloOperation::NEGOTIATED_KEY, answer)))
		})
	}

	#[test]
	fn versions_parse_display_and_order() {
		let version = "5.12".parse::<ProtocolVersion>().expect("Failed to parse the version.");

		assert_eq!(version, ProtocolVersion::new(5, 12));
		assert_eq!(version.to_string(), "5.12");
		assert!(ProtocolVersion::new(5, 2) < ProtocolVersion::new(5, 12));
		assert!(ProtocolVersion::new(4, 99) < ProtocolVersion::new(5, 0));
		assert!(matches!(
			"5".parse::<ProtocolVersion>(),
			Err(ProtocolRangeError::Malformed { .. })
		));
		assert!(matches!(
			"5.x".parse::<ProtocolVersion>(),
			Err(ProtocolRangeError::NotNumeric { .. })
		));
	}

	#[test]
	fn ranges_validate_and_accept() {
		let range = ProtocolRange::new(ProtocolVersion::new(1, 0), ProtocolVersion::new(2, 0))
			.expect("Failed to build a valid range.");

		assert!(range.accepts(ProtocolVersion::new(1, 0)));
		assert!(range.accepts(ProtocolVersion::new(1, 7)));
		assert!(range.accepts(ProtocolVersion::new(2, 0)));
		assert!(!range.accepts(ProtocolVersion::new(0, 9)));
		assert!(!range.accepts(ProtocolVersion::new(2, 1)));
		assert!(matches!(
			ProtocolRange::new(ProtocolVersion::new(2, 0), ProtocolVersion::new(1, 0)),
			Err(ProtocolRangeError::Inverted { .. })
		));
		assert_eq!(range.to_string(), "[1.0, 2.0]");
	}

	#[test]
	fn negotiation_rejects_versions_outside_the_range() {
		let operation = HelloOperation::new(ProtocolRange::default());
		let response = ResponseBundle::new().with(HelloOperation::NEGOTIATED_KEY, "9.9");

		let error = operation
			.parse_response(Some(response))
			.expect_err("A version outside the range should be rejected.");

		assert!(matches!(
			error,
			OperationError::Application(ApplicationError::UnsupportedProtocol { .. })
		));

		let response = ResponseBundle::new().with(HelloOperation::NEGOTIATED_KEY, "two.zero");
		let error = operation
			.parse_response(Some(response))
			.expect_err("An unparseable version should be rejected.");

		assert!(matches!(
			error,
			OperationError::Application(ApplicationError::InvalidEntry { .. })
		));
	}

	#[tokio::test]
	async fn cache_memoizes_per_transport_kind() {
		let transport = hello_broker("1.5");
		let cache = HelloCache::new();
		let range = ProtocolRange::default();

		let first =
			cache.ensure(&transport, range).await.expect("The first handshake should succeed.");
		let second =
			cache.ensure(&transport, range).await.expect("The memoized handshake should succeed.");

		assert_eq!(first, ProtocolVersion::new(1, 5));
		assert_eq!(second, first);
		assert_eq!(transport.calls(), 1);
		assert_eq!(cache.negotiated(TransportKind::InProcess), Some(first));

		cache.forget(TransportKind::InProcess);

		assert_eq!(cache.negotiated(TransportKind::InProcess), None);

		cache.ensure(&transport, range).await.expect("The renewed handshake should succeed.");

		assert_eq!(transport.calls(), 2);
	}

	#[tokio::test]
	async fn failed_handshakes_are_not_memoized() {
		let transport = LoopbackTransport::new(|_| {
			Ok(Some(
				ResponseBundle::new()
					.with(envelope::STATUS_KEY, envelope::STATUS_ERROR)
					.with(envelope::ERROR_CODE_KEY, "hello_unsupported"),
			))
		});
		let cache = HelloCache::new();

		let error = cache
			.ensure(&transport, ProtocolRange::default())
			.await
			.expect_err("A rejected handshake should fail.");

		assert!(matches!(error, OperationError::Application(ApplicationError::Rejected { .. })));
		assert_eq!(cache.negotiated(TransportKind::InProcess), None);
	}
}
