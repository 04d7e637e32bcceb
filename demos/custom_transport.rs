//! Demonstrates wiring a custom platform channel and operation through the executor.
//!
//! 1. Implement [`IpcTransport`] for the channel, producing [`CommunicationError`]
//!    values the executor can fall back on.
//! 2. Implement [`BrokerOperation`] for the request/response pair the broker
//!    understands, opting into telemetry with an [`ApiId`].
//! 3. Hand both to an [`OperationExecutor`] and let it drive fallback, telemetry,
//!    and metrics.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
// self
use broker_dispatch::{
	bundle::{OperationBundle, ResponseBundle},
	error::{CommunicationCategory, CommunicationError, OperationError},
	executor::{BrokerOperation, OperationExecutor},
	ipc::{IpcTransport, TransportFuture, TransportKind},
	ops::envelope,
	telemetry::{ApiId, MemoryTelemetry, TelemetryEvent},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let telemetry = MemoryTelemetry::new();
	let executor = OperationExecutor::new(
		vec![
			Arc::new(MockChannel::new("wear_bridge", MockBehavior::ConnectionFailure)),
			Arc::new(MockChannel::new("bound_service", MockBehavior::Success)),
		],
		Arc::new(telemetry.clone()),
	);
	let echoed = executor.execute(None, &PingOperation::new("ping")).await?;

	println!("The broker echoed `{echoed}` after one fallback.");
	println!(
		"Executor metrics: {} operations, {} successes, {} failures, {} fallbacks.",
		executor.metrics.operations(),
		executor.metrics.successes(),
		executor.metrics.failures(),
		executor.metrics.fallbacks()
	);

	let rejecting = OperationExecutor::new(
		vec![Arc::new(MockChannel::new("bound_service", MockBehavior::Rejection))],
		Arc::new(telemetry.clone()),
	);

	match rejecting.execute(None, &PingOperation::new("ping")).await {
		Ok(_) => println!("The rejecting channel unexpectedly answered."),
		Err(e) => println!("Defined broker failures stop the fallback chain: {e}"),
	}

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

enum MockBehavior {
	Success,
	ConnectionFailure,
	Rejection,
}

struct MockChannel {
	label: &'static str,
	behavior: MockBehavior,
}
impl MockChannel {
	fn new(label: &'static str, behavior: MockBehavior) -> Self {
		Self { label, behavior }
	}
}
impl IpcTransport for MockChannel {
	fn kind(&self) -> TransportKind {
		TransportKind::Custom(self.label)
	}

	fn communicate<'a>(&'a self, request: &'a OperationBundle) -> TransportFuture<'a> {
		Box::pin(async move {
			match self.behavior {
				MockBehavior::Success => Ok(Some(
					ResponseBundle::new()
						.with("echo", request.payload.text("payload").unwrap_or_default()),
				)),
				MockBehavior::ConnectionFailure => Err(CommunicationError::new(
					CommunicationCategory::ConnectionFailure,
					self.kind(),
					"The companion device is out of range",
				)),
				MockBehavior::Rejection => Ok(Some(
					ResponseBundle::new()
						.with(envelope::STATUS_KEY, envelope::STATUS_ERROR)
						.with(envelope::ERROR_CODE_KEY, "ping_disabled")
						.with(envelope::ERROR_MESSAGE_KEY, "The broker refuses to play ping pong"),
				)),
			}
		})
	}
}

struct PingOperation {
	payload: String,
}
impl PingOperation {
	fn new(payload: impl Into<String>) -> Self {
		Self { payload: payload.into() }
	}
}
impl BrokerOperation for PingOperation {
	type Output = String;

	fn request(&self) -> OperationBundle {
		OperationBundle::new("broker.ping").with("payload", self.payload.as_str())
	}

	fn parse_response(
		&self,
		response: Option<ResponseBundle>,
	) -> Result<Self::Output, OperationError> {
		let response = envelope::expect_payload(self.name(), response)?;

		envelope::require_text(self.name(), &response, "echo")
	}

	fn name(&self) -> &'static str {
		"ping"
	}

	fn telemetry_id(&self) -> Option<ApiId> {
		Some(ApiId("900"))
	}
}
