//! Opaque request/response payloads exchanged with the broker.
//!
//! A [`Bundle`] is an ordered, string-keyed map of typed values with a canonical JSON
//! projection. Bundles routinely carry account identifiers, so `Debug` prints an
//! entry count and a content fingerprint instead of the values themselves.

// std
use std::collections::btree_map::Iter;
// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// Typed value stored under one bundle key.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum BundleValue {
	/// Boolean flag.
	Bool(bool),
	/// Signed integer.
	Int(i64),
	/// UTF-8 text.
	Text(String),
	/// Raw bytes; base64 in the serialized form.
	Bytes(#[serde(with = "bytes_base64")] Vec<u8>),
	/// Arbitrary JSON document.
	Json(serde_json::Value),
}
impl BundleValue {
	/// Plain JSON projection of the value; bytes become unpadded base64 text.
	pub fn to_json(&self) -> serde_json::Value {
		match self {
			Self::Bool(value) => serde_json::Value::Bool(*value),
			Self::Int(value) => serde_json::Value::from(*value),
			Self::Text(value) => serde_json::Value::String(value.clone()),
			Self::Bytes(value) => serde_json::Value::String(STANDARD_NO_PAD.encode(value)),
			Self::Json(value) => value.clone(),
		}
	}

	const fn kind_name(&self) -> &'static str {
		match self {
			Self::Bool(_) => "Bool",
			Self::Int(_) => "Int",
			Self::Text(_) => "Text",
			Self::Bytes(_) => "Bytes",
			Self::Json(_) => "Json",
		}
	}
}
impl Debug for BundleValue {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple(self.kind_name()).field(&"<redacted>").finish()
	}
}
impl From<bool> for BundleValue {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}
impl From<i64> for BundleValue {
	fn from(value: i64) -> Self {
		Self::Int(value)
	}
}
impl From<&str> for BundleValue {
	fn from(value: &str) -> Self {
		Self::Text(value.into())
	}
}
impl From<String> for BundleValue {
	fn from(value: String) -> Self {
		Self::Text(value)
	}
}
impl From<Vec<u8>> for BundleValue {
	fn from(value: Vec<u8>) -> Self {
		Self::Bytes(value)
	}
}
impl From<serde_json::Value> for BundleValue {
	fn from(value: serde_json::Value) -> Self {
		Self::Json(value)
	}
}

/// Ordered key/value payload exchanged with the broker.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bundle(BTreeMap<String, BundleValue>);
impl Bundle {
	/// Creates an empty bundle.
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of entries.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns true if the bundle holds no entries.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Inserts a value under `key`, replacing any previous entry.
	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<BundleValue>) {
		self.0.insert(key.into(), value.into());
	}

	/// Builder-style insert for request construction.
	pub fn with(mut self, key: impl Into<String>, value: impl Into<BundleValue>) -> Self {
		self.insert(key, value);

		self
	}

	/// Returns the raw value stored under `key`.
	pub fn get(&self, key: &str) -> Option<&BundleValue> {
		self.0.get(key)
	}

	/// Returns true if the bundle contains `key`.
	pub fn contains(&self, key: &str) -> bool {
		self.0.contains_key(key)
	}

	/// Returns the text stored under `key`, if that entry is a text value.
	pub fn text(&self, key: &str) -> Option<&str> {
		match self.0.get(key) {
			Some(BundleValue::Text(value)) => Some(value),
			_ => None,
		}
	}

	/// Returns the integer stored under `key`, if that entry is an integer value.
	pub fn int(&self, key: &str) -> Option<i64> {
		match self.0.get(key) {
			Some(BundleValue::Int(value)) => Some(*value),
			_ => None,
		}
	}

	/// Returns the flag stored under `key`, if that entry is a boolean value.
	pub fn flag(&self, key: &str) -> Option<bool> {
		match self.0.get(key) {
			Some(BundleValue::Bool(value)) => Some(*value),
			_ => None,
		}
	}

	/// Returns the bytes stored under `key`, if that entry is a bytes value.
	pub fn bytes(&self, key: &str) -> Option<&[u8]> {
		match self.0.get(key) {
			Some(BundleValue::Bytes(value)) => Some(value),
			_ => None,
		}
	}

	/// Returns the JSON document stored under `key`, if that entry is a JSON value.
	pub fn json(&self, key: &str) -> Option<&serde_json::Value> {
		match self.0.get(key) {
			Some(BundleValue::Json(value)) => Some(value),
			_ => None,
		}
	}

	/// Iterates entries in key order.
	pub fn iter(&self) -> Iter<'_, String, BundleValue> {
		self.0.iter()
	}

	/// Plain JSON projection of the whole bundle with lexicographically ordered keys.
	pub fn to_json(&self) -> serde_json::Value {
		serde_json::Value::Object(
			self.0.iter().map(|(key, value)| (key.clone(), value.to_json())).collect(),
		)
	}

	/// Deserializes the plain JSON projection into `T`, reporting the failing key path
	/// on error.
	pub fn decode<T>(&self) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
	where
		T: DeserializeOwned,
	{
		serde_path_to_error::deserialize(self.to_json())
	}

	/// Unpadded base64 SHA-256 digest of the canonical JSON projection.
	///
	/// Two bundles with equal content share a fingerprint regardless of insertion
	/// order; use it to correlate log lines without exposing entry values.
	pub fn fingerprint(&self) -> String {
		let mut hasher = Sha256::new();

		hasher.update(self.to_json().to_string().as_bytes());

		STANDARD_NO_PAD.encode(hasher.finalize())
	}
}
impl Debug for Bundle {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Bundle")
			.field("entries", &self.0.len())
			.field("fingerprint", &self.fingerprint())
			.finish()
	}
}
impl FromIterator<(String, BundleValue)> for Bundle {
	fn from_iter<I>(entries: I) -> Self
	where
		I: IntoIterator<Item = (String, BundleValue)>,
	{
		Self(entries.into_iter().collect())
	}
}

/// Outbound request payload addressed to one broker operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperationBundle {
	/// Operation name the broker dispatches on.
	pub operation: String,
	/// Opaque request payload.
	pub payload: Bundle,
}
impl OperationBundle {
	/// Creates an empty request bundle for the named operation.
	pub fn new(operation: impl Into<String>) -> Self {
		Self { operation: operation.into(), payload: Bundle::new() }
	}

	/// Builder-style payload entry insert.
	pub fn with(mut self, key: impl Into<String>, value: impl Into<BundleValue>) -> Self {
		self.payload.insert(key, value);

		self
	}
}

/// Response payload returned by the broker.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseBundle(Bundle);
impl ResponseBundle {
	/// Creates an empty response payload.
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder-style payload entry insert.
	pub fn with(mut self, key: impl Into<String>, value: impl Into<BundleValue>) -> Self {
		self.0.insert(key, value);

		self
	}

	/// Consumes the wrapper and returns the payload.
	pub fn into_inner(self) -> Bundle {
		self.0
	}
}
impl std::ops::Deref for ResponseBundle {
	type Target = Bundle;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl From<Bundle> for ResponseBundle {
	fn from(payload: Bundle) -> Self {
		Self(payload)
	}
}

mod bytes_base64 {
	// crates.io
	use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
	use serde::{Deserialize, Deserializer, Serializer, de::Error as DeError};

	pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&STANDARD_NO_PAD.encode(bytes))
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let encoded = String::deserialize(deserializer)?;

		STANDARD_NO_PAD.decode(encoded).map_err(DeError::custom)
	}
}
