//! Property-bag events recorded around operation execution.

// self
use crate::{_prelude::*, context::RequestContext};

/// Telemetry API identifier tied to one operation type.
///
/// Identifiers are stable wire-level strings; custom operations mint their own with
/// `ApiId("...")`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ApiId(pub &'static str);
impl ApiId {
	/// Protocol hello handshake.
	pub const HELLO: Self = Self("101");
	/// Account listing.
	pub const GET_ACCOUNTS: Self = Self("102");
	/// Account removal.
	pub const REMOVE_ACCOUNT: Self = Self("103");

	/// Returns the identifier text.
	pub const fn as_str(self) -> &'static str {
		self.0
	}
}
impl Display for ApiId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.0)
	}
}

/// Start/end classification for operation telemetry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryEventKind {
	/// Recorded once when an operation begins.
	OperationStart,
	/// Recorded once when an operation reaches a terminal outcome.
	OperationEnd,
}
impl TelemetryEventKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			TelemetryEventKind::OperationStart => "operation_start",
			TelemetryEventKind::OperationEnd => "operation_end",
		}
	}
}
impl Display for TelemetryEventKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// One telemetry event recorded around an operation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TelemetryEvent {
	/// Start/end classification.
	pub kind: TelemetryEventKind,
	/// Telemetry API identifier of the operation.
	pub api_id: ApiId,
	/// Operation name for diagnostics.
	pub operation: &'static str,
	/// Instant the event was recorded.
	pub occurred_at: OffsetDateTime,
	/// Ordered event properties.
	pub properties: BTreeMap<String, String>,
}
impl TelemetryEvent {
	/// Property key marking whether the operation succeeded.
	pub const PROP_SUCCESS: &'static str = "success";
	/// Property key carrying the terminal error label.
	pub const PROP_ERROR_KIND: &'static str = "error_kind";
	/// Property key carrying the terminal error description.
	pub const PROP_ERROR_MESSAGE: &'static str = "error_message";
	/// Property key carrying the caller's correlation identifier.
	pub const PROP_CORRELATION_ID: &'static str = "correlation_id";
	/// Property key carrying the calling application name.
	pub const PROP_APPLICATION_NAME: &'static str = "application_name";
	/// Property key carrying the calling application version.
	pub const PROP_APPLICATION_VERSION: &'static str = "application_version";
	/// Property key carrying the calling SDK version.
	pub const PROP_SDK_VERSION: &'static str = "sdk_version";

	/// Creates a start event for the provided API id and operation.
	pub fn start(api_id: ApiId, operation: &'static str) -> Self {
		Self::new(TelemetryEventKind::OperationStart, api_id, operation)
	}

	/// Creates an end event for the provided API id and operation.
	pub fn end(api_id: ApiId, operation: &'static str) -> Self {
		Self::new(TelemetryEventKind::OperationEnd, api_id, operation)
	}

	fn new(kind: TelemetryEventKind, api_id: ApiId, operation: &'static str) -> Self {
		Self {
			kind,
			api_id,
			operation,
			occurred_at: OffsetDateTime::now_utc(),
			properties: BTreeMap::new(),
		}
	}

	/// Adds one event property.
	pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.set_property(key, value);

		self
	}

	/// Adds one event property in place; used by success-enrichment hooks.
	pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.properties.insert(key.into(), value.into());
	}

	/// Copies the caller context onto the event.
	///
	/// Extra parameters are applied first, so the standard keys always win on
	/// collision.
	pub fn with_context(mut self, context: &RequestContext) -> Self {
		for (key, value) in &context.extra {
			self.properties.insert(key.clone(), value.clone());
		}

		self.properties
			.insert(Self::PROP_CORRELATION_ID.into(), context.correlation_id.as_str().into());

		if let Some(name) = &context.application_name {
			self.properties.insert(Self::PROP_APPLICATION_NAME.into(), name.clone());
		}
		if let Some(version) = &context.application_version {
			self.properties.insert(Self::PROP_APPLICATION_VERSION.into(), version.clone());
		}
		if let Some(version) = &context.sdk_version {
			self.properties.insert(Self::PROP_SDK_VERSION.into(), version.clone());
		}

		self
	}

	/// Marks the operation outcome.
	pub fn with_success(self, success: bool) -> Self {
		self.with_property(Self::PROP_SUCCESS, if success { "true" } else { "false" })
	}

	/// Records the terminal error label and description.
	pub fn with_error(self, label: &'static str, message: impl Into<String>) -> Self {
		self.with_property(Self::PROP_ERROR_KIND, label)
			.with_property(Self::PROP_ERROR_MESSAGE, message)
	}

	/// Returns the property stored under `key`.
	pub fn property(&self, key: &str) -> Option<&str> {
		self.properties.get(key).map(String::as_str)
	}
}
