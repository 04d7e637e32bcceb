//! Built-in account operations carried over the broker.

// self
use crate::{
	_prelude::*,
	bundle::{OperationBundle, ResponseBundle},
	context::RequestContext,
	error::OperationError,
	executor::{BrokerOperation, PrerequisiteFuture},
	ipc::IpcTransport,
	ops::{
		envelope,
		hello::{HelloCache, HelloOperation, ProtocolRange},
	},
	telemetry::{ApiId, TelemetryEvent},
};

/// Minimal account projection returned by the broker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
	/// Broker-assigned account identifier.
	pub id: String,
	/// Account username.
	pub username: String,
	/// Identity environment the account belongs to, when reported.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub environment: Option<String>,
}

/// Lists the accounts the broker holds for this client.
#[derive(Clone, Debug)]
pub struct GetAccountsOperation {
	context: RequestContext,
	range: ProtocolRange,
	hello_cache: Arc<HelloCache>,
}
impl GetAccountsOperation {
	/// Operation name in the outbound bundle.
	pub const OPERATION: &'static str = "broker.get_accounts";
	/// Response key carrying the JSON account list.
	pub const ACCOUNTS_KEY: &'static str = "accounts";

	/// Creates a listing operation tied to the provided caller context.
	pub fn new(
		context: RequestContext,
		range: ProtocolRange,
		hello_cache: Arc<HelloCache>,
	) -> Self {
		Self { context, range, hello_cache }
	}
}
impl BrokerOperation for GetAccountsOperation {
	type Output = Vec<AccountRecord>;

	fn prerequisite<'a>(&'a self, transport: &'a dyn IpcTransport) -> PrerequisiteFuture<'a> {
		Box::pin(async move {
			self.hello_cache.ensure(transport, self.range).await?;

			Ok(())
		})
	}

	fn request(&self) -> OperationBundle {
		OperationBundle::new(Self::OPERATION)
			.with(super::CORRELATION_KEY, self.context.correlation_id.as_str())
			.with(HelloOperation::MINIMUM_KEY, self.range.minimum.to_string())
			.with(HelloOperation::PREFERRED_KEY, self.range.preferred.to_string())
	}

	fn parse_response(
		&self,
		response: Option<ResponseBundle>,
	) -> Result<Self::Output, OperationError> {
		let response = envelope::expect_payload(self.name(), response)?;

		envelope::decode_entry(self.name(), &response, Self::ACCOUNTS_KEY)
	}

	fn name(&self) -> &'static str {
		"get_accounts"
	}

	fn telemetry_id(&self) -> Option<ApiId> {
		Some(ApiId::GET_ACCOUNTS)
	}

	fn record_success(&self, event: &mut TelemetryEvent, output: &Self::Output) {
		event.set_property("accounts_count", output.len().to_string());
	}
}

/// Removes one account from the broker.
#[derive(Clone, Debug)]
pub struct RemoveAccountOperation {
	context: RequestContext,
	range: ProtocolRange,
	hello_cache: Arc<HelloCache>,
	account_id: String,
}
impl RemoveAccountOperation {
	/// Operation name in the outbound bundle.
	pub const OPERATION: &'static str = "broker.remove_account";
	/// Request key carrying the account to remove.
	pub const ACCOUNT_ID_KEY: &'static str = "account.id";
	/// Response key reporting whether anything was removed.
	pub const REMOVED_KEY: &'static str = "removed";

	/// Creates a removal operation for the provided account identifier.
	pub fn new(
		context: RequestContext,
		range: ProtocolRange,
		hello_cache: Arc<HelloCache>,
		account_id: impl Into<String>,
	) -> Self {
		Self { context, range, hello_cache, account_id: account_id.into() }
	}
}
impl BrokerOperation for RemoveAccountOperation {
	type Output = bool;

	fn prerequisite<'a>(&'a self, transport: &'a dyn IpcTransport) -> PrerequisiteFuture<'a> {
		Box::pin(async move {
			self.hello_cache.ensure(transport, self.range).await?;

			Ok(())
		})
	}

	fn request(&self) -> OperationBundle {
		OperationBundle::new(Self::OPERATION)
			.with(super::CORRELATION_KEY, self.context.correlation_id.as_str())
			.with(Self::ACCOUNT_ID_KEY, self.account_id.as_str())
	}

	fn parse_response(
		&self,
		response: Option<ResponseBundle>,
	) -> Result<Self::Output, OperationError> {
		let response = envelope::expect_payload(self.name(), response)?;

		envelope::require_flag(self.name(), &response, Self::REMOVED_KEY)
	}

	fn name(&self) -> &'static str {
		"remove_account"
	}

	fn telemetry_id(&self) -> Option<ApiId> {
		Some(ApiId::REMOVE_ACCOUNT)
	}

	fn record_success(&self, event: &mut TelemetryEvent, output: &Self::Output) {
		event.set_property("account_removed", output.to_string());
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{error::ApplicationError, ops::hello::ProtocolVersion};

	fn listing() -> GetAccountsOperation {
		GetAccountsOperation::new(
			RequestContext::new(),
			ProtocolRange::default(),
			Default::default(),
		)
	}

	#[test]
	fn listing_request_carries_the_correlation_id() {
		let operation = listing();
		let request = operation.request();

		assert_eq!(request.operation, GetAccountsOperation::OPERATION);
		assert_eq!(
			request.payload.text(crate::ops::CORRELATION_KEY),
			Some(operation.context.correlation_id.as_str())
		);
	}

	#[test]
	fn listing_request_advertises_the_protocol_range() {
		let range = ProtocolRange::new(ProtocolVersion::new(1, 0), ProtocolVersion::new(3, 2))
			.expect("The range should validate.");
		let operation = GetAccountsOperation::new(RequestContext::new(), range, Default::default());
		let request = operation.request();

		assert_eq!(request.payload.text(HelloOperation::MINIMUM_KEY), Some("1.0"));
		assert_eq!(request.payload.text(HelloOperation::PREFERRED_KEY), Some("3.2"));
	}

	#[test]
	fn listing_decodes_account_records() {
		let response = ResponseBundle::new().with(
			GetAccountsOperation::ACCOUNTS_KEY,
			serde_json::json!([
				{ "id": "acct-1", "username": "ada@contoso.example", "environment": "login.example.net" },
				{ "id": "acct-2", "username": "grace@contoso.example" },
			]),
		);

		let accounts = listing()
			.parse_response(Some(response))
			.expect("A well-formed listing should decode.");

		assert_eq!(accounts.len(), 2);
		assert_eq!(accounts[0].environment.as_deref(), Some("login.example.net"));
		assert_eq!(accounts[1].id, "acct-2");
		assert_eq!(accounts[1].environment, None);
	}

	#[test]
	fn listing_requires_the_accounts_entry() {
		let error = listing()
			.parse_response(Some(ResponseBundle::new()))
			.expect_err("A payload without accounts should fail.");

		assert!(matches!(
			error,
			OperationError::Application(ApplicationError::MissingEntry { key: "accounts", .. })
		));

		let error =
			listing().parse_response(None).expect_err("An absent payload should fail.");

		assert!(matches!(
			error,
			OperationError::Application(ApplicationError::EmptyResponse { .. })
		));
	}

	#[test]
	fn removal_round_trips_the_flag() {
		let operation = RemoveAccountOperation::new(
			RequestContext::new(),
			ProtocolRange::default(),
			Default::default(),
			"acct-1",
		);
		let request = operation.request();

		assert_eq!(request.operation, RemoveAccountOperation::OPERATION);
		assert_eq!(request.payload.text(RemoveAccountOperation::ACCOUNT_ID_KEY), Some("acct-1"));

		let removed = operation
			.parse_response(Some(ResponseBundle::new().with(RemoveAccountOperation::REMOVED_KEY, true)))
			.expect("A well-formed removal response should parse.");

		assert!(removed);
	}

	#[test]
	fn success_hooks_record_operation_dimensions() {
		let mut event = TelemetryEvent::end(ApiId::GET_ACCOUNTS, "get_accounts");

		listing().record_success(&mut event, &Vec::new());

		assert_eq!(event.property("accounts_count"), Some("0"));
	}
}
