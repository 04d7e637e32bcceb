//! Caller metadata attached to operations for telemetry enrichment.

// crates.io
use rand::Rng;
// self
use crate::_prelude::*;

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Random per-call identifier tying telemetry events to broker-side logs.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);
impl CorrelationId {
	/// Wraps an externally supplied identifier.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Mints a random 128-bit identifier in hyphenated hex form.
	pub fn random() -> Self {
		let bytes = rand::rng().random::<[u8; 16]>();
		let mut buf = String::with_capacity(36);

		for (i, byte) in bytes.iter().enumerate() {
			if matches!(i, 4 | 6 | 8 | 10) {
				buf.push('-');
			}

			buf.push(HEX[(byte >> 4) as usize] as char);
			buf.push(HEX[(byte & 0x0f) as usize] as char);
		}

		Self(buf)
	}

	/// Returns the identifier text.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Display for CorrelationId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// Caller-supplied parameters attached to one operation.
///
/// The executor reads the context only to enrich telemetry events; payload content
/// destined for the broker belongs to the operation itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
	/// Correlation identifier for this logical call.
	pub correlation_id: CorrelationId,
	/// Calling application name, when known.
	pub application_name: Option<String>,
	/// Calling application version, when known.
	pub application_version: Option<String>,
	/// SDK version embedded by the calling library, when known.
	pub sdk_version: Option<String>,
	/// Extra string parameters copied onto telemetry events.
	pub extra: BTreeMap<String, String>,
}
impl RequestContext {
	/// Creates a context with a freshly minted correlation id.
	pub fn new() -> Self {
		Self {
			correlation_id: CorrelationId::random(),
			application_name: None,
			application_version: None,
			sdk_version: None,
			extra: BTreeMap::new(),
		}
	}

	/// Sets the calling application name.
	pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
		self.application_name = Some(name.into());

		self
	}

	/// Sets the calling application version.
	pub fn with_application_version(mut self, version: impl Into<String>) -> Self {
		self.application_version = Some(version.into());

		self
	}

	/// Sets the calling SDK version.
	pub fn with_sdk_version(mut self, version: impl Into<String>) -> Self {
		self.sdk_version = Some(version.into());

		self
	}

	/// Adds one extra string parameter.
	pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.extra.insert(key.into(), value.into());

		self
	}

	/// Clones the context with a fresh correlation id, keeping the caller metadata.
	pub fn refreshed(&self) -> Self {
		let mut context = self.clone();

		context.correlation_id = CorrelationId::random();

		context
	}
}
impl Default for RequestContext {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn random_ids_use_hyphenated_hex_form() {
		let id = CorrelationId::random();
		let text = id.as_str();

		assert_eq!(text.len(), 36);

		for (i, c) in text.chars().enumerate() {
			if matches!(i, 8 | 13 | 18 | 23) {
				assert_eq!(c, '-');
			} else {
				assert!(c.is_ascii_hexdigit());
			}
		}

		assert_ne!(id, CorrelationId::random());
	}

	#[test]
	fn refreshed_context_keeps_metadata_and_changes_the_id() {
		let context = RequestContext::new()
			.with_application_name("outlook")
			.with_application_version("4.2.1")
			.with_sdk_version("11.0.0")
			.with_extra("tenant", "contoso");
		let refreshed = context.refreshed();

		assert_ne!(refreshed.correlation_id, context.correlation_id);
		assert_eq!(refreshed.application_name.as_deref(), Some("outlook"));
		assert_eq!(refreshed.application_version.as_deref(), Some("4.2.1"));
		assert_eq!(refreshed.sdk_version.as_deref(), Some("11.0.0"));
		assert_eq!(refreshed.extra.get("tenant").map(String::as_str), Some("contoso"));
	}
}
