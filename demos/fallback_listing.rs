//! Demonstrates transport fallback for the built-in account operations.
//!
//! Two channels are registered: a deliberately offline one standing in for a platform
//! channel whose companion app is missing, and an in-process fake broker. Every call
//! falls back to the healthy channel while telemetry keeps recording exactly one
//! start/end pair per operation.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
// self
use broker_dispatch::{
	bundle::ResponseBundle,
	context::RequestContext,
	error::{CommunicationCategory, CommunicationError},
	ipc::{IpcTransport, LoopbackTransport, TransportKind},
	ops::{BrokerClient, GetAccountsOperation, HelloOperation},
	serde_json::json,
	telemetry::{MemoryTelemetry, TelemetryEvent},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let flaky = Arc::new(LoopbackTransport::unreachable(
		"content_provider",
		"The companion app is not installed",
	));
	let healthy = Arc::new(LoopbackTransport::labeled("bound_service", |request| {
		match request.operation.as_str() {
			HelloOperation::OPERATION => {
				let negotiated =
					request.payload.text(HelloOperation::PREFERRED_KEY).unwrap_or("1.0").to_owned();

				Ok(Some(ResponseBundle::new().with(HelloOperation::NEGOTIATED_KEY, negotiated)))
			},
			GetAccountsOperation::OPERATION => Ok(Some(ResponseBundle::new().with(
				GetAccountsOperation::ACCOUNTS_KEY,
				json!([
					{ "id": "acct-1", "username": "ada@contoso.example" },
					{ "id": "acct-2", "username": "grace@contoso.example" },
				]),
			))),
			other => Err(CommunicationError::new(
				CommunicationCategory::UnsupportedByBroker,
				TransportKind::Custom("bound_service"),
				format!("The broker does not understand the {other} operation"),
			)),
		}
	}));
	let telemetry = MemoryTelemetry::new();
	let client = BrokerClient::new(
		vec![flaky.clone() as Arc<dyn IpcTransport>, healthy],
		Arc::new(telemetry.clone()),
	)
	.with_context(
		RequestContext::new()
			.with_application_name("com.contoso.mail")
			.with_application_version("5.4.1")
			.with_sdk_version(env!("CARGO_PKG_VERSION")),
	);
	let negotiated = client.hello().await?;

	println!("Negotiated broker protocol {negotiated}.");

	let accounts = client.get_accounts().await?;

	println!("The broker holds {} accounts:", accounts.len());

	for account in &accounts {
		println!("  - {} ({})", account.username, account.id);
	}

	println!(
		"The content_provider channel was tried {} times and never reached the broker.",
		flaky.calls()
	);

	for event in telemetry.events() {
		println!(
			"Telemetry: api={} kind={} success={}.",
			event.api_id,
			event.kind,
			event.property(TelemetryEvent::PROP_SUCCESS).unwrap_or("-")
		);
	}

	Ok(())
}
