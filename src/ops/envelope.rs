//! Response-envelope handling shared by broker operations.
//!
//! A reached broker reports defined failures inside the response payload itself:
//! `status = "error"` plus `error.code`/`error.message` entries. Helpers here
//! translate that envelope, and the common response shapes, into
//! [`ApplicationError`] values so individual operations stay small.

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	bundle::ResponseBundle,
	error::{ApplicationError, OperationError},
};

/// Response key carrying the broker's processing status.
pub const STATUS_KEY: &str = "status";
/// Status value marking a rejected request.
pub const STATUS_ERROR: &str = "error";
/// Response key carrying the broker's error code.
pub const ERROR_CODE_KEY: &str = "error.code";
/// Response key carrying the broker's error message.
pub const ERROR_MESSAGE_KEY: &str = "error.message";

/// Unwraps an optional response, translating the broker's error envelope.
///
/// Returns the payload when a response is present and does not carry
/// `status = "error"`; otherwise produces the matching application error.
pub fn expect_payload(
	operation: &'static str,
	response: Option<ResponseBundle>,
) -> Result<ResponseBundle, OperationError> {
	let Some(response) = response else {
		return Err(ApplicationError::EmptyResponse { operation }.into());
	};

	if response.text(STATUS_KEY) == Some(STATUS_ERROR) {
		let code = response.text(ERROR_CODE_KEY).unwrap_or("unknown").to_owned();
		let message =
			response.text(ERROR_MESSAGE_KEY).unwrap_or("The broker reported no details").to_owned();

		return Err(ApplicationError::Rejected { operation, code, message }.into());
	}

	Ok(response)
}

/// Decodes the JSON document stored under `key` into `T`, reporting the failing key
/// path on error.
pub fn decode_entry<T>(
	operation: &'static str,
	response: &ResponseBundle,
	key: &'static str,
) -> Result<T, OperationError>
where
	T: DeserializeOwned,
{
	let Some(document) = response.json(key) else {
		return Err(ApplicationError::MissingEntry { operation, key }.into());
	};

	serde_path_to_error::deserialize(document.clone())
		.map_err(|source| ApplicationError::MalformedResponse { operation, source }.into())
}

/// Returns the text entry stored under `key` or a missing-entry error.
pub fn require_text(
	operation: &'static str,
	response: &ResponseBundle,
	key: &'static str,
) -> Result<String, OperationError> {
	response
		.text(key)
		.map(ToOwned::to_owned)
		.ok_or_else(|| ApplicationError::MissingEntry { operation, key }.into())
}

/// Returns the flag entry stored under `key` or a missing-entry error.
pub fn require_flag(
	operation: &'static str,
	response: &ResponseBundle,
	key: &'static str,
) -> Result<bool, OperationError> {
	response.flag(key).ok_or_else(|| ApplicationError::MissingEntry { operation, key }.into())
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde::Deserialize;
	// self
	use super::*;

	#[test]
	fn absent_response_is_an_empty_response_error() {
		let error = expect_payload("probe", None).expect_err("An absent response should fail.");

		assert!(matches!(
			error,
			OperationError::Application(ApplicationError::EmptyResponse { operation: "probe" })
		));
	}

	#[test]
	fn error_envelope_translates_to_rejected() {
		let response = ResponseBundle::new()
			.with(STATUS_KEY, STATUS_ERROR)
			.with(ERROR_CODE_KEY, "unauthorized")
			.with(ERROR_MESSAGE_KEY, "Calling application is not allowed");

		let error = expect_payload("probe", Some(response))
			.expect_err("An error envelope should be rejected.");

		match error {
			OperationError::Application(ApplicationError::Rejected { operation, code, message }) => {
				assert_eq!(operation, "probe");
				assert_eq!(code, "unauthorized");
				assert_eq!(message, "Calling application is not allowed");
			},
			other => panic!("Expected a rejection, got {other:?}."),
		}
	}

	#[test]
	fn envelope_without_details_uses_placeholders() {
		let response = ResponseBundle::new().with(STATUS_KEY, STATUS_ERROR);

		let error = expect_payload("probe", Some(response))
			.expect_err("An error envelope should be rejected.");

		assert!(matches!(
			error,
			OperationError::Application(ApplicationError::Rejected { code, .. }) if code == "unknown"
		));
	}

	#[test]
	fn healthy_payload_passes_through() {
		let response = ResponseBundle::new().with(STATUS_KEY, "ok").with("value", 7_i64);
		let payload =
			expect_payload("probe", Some(response)).expect("A healthy payload should pass.");

		assert_eq!(payload.int("value"), Some(7));
	}

	#[test]
	fn decode_entry_reports_the_failing_path() {
		#[derive(Debug, Deserialize)]
		struct Row {
			#[allow(dead_code)]
			id: String,
		}

		let response =
			ResponseBundle::new().with("rows", serde_json::json!([{ "id": "a" }, { "id": 2 }]));

		let rows = decode_entry::<Vec<Row>>("probe", &response, "rows");
		let error = rows.expect_err("A mistyped row should fail to decode.");

		match error {
			OperationError::Application(ApplicationError::MalformedResponse { source, .. }) => {
				assert_eq!(source.path().to_string(), "[1].id");
			},
			other => panic!("Expected a malformed response, got {other:?}."),
		}
	}

	#[test]
	fn missing_entries_are_reported_by_key() {
		let response = ResponseBundle::new();

		assert!(matches!(
			require_text("probe", &response, "name").expect_err("Missing text should fail."),
			OperationError::Application(ApplicationError::MissingEntry { key: "name", .. })
		));
		assert!(matches!(
			require_flag("probe", &response, "removed").expect_err("Missing flag should fail."),
			OperationError::Application(ApplicationError::MissingEntry { key: "removed", .. })
		));
	}
}
