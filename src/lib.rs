//! Broker operation dispatch for identity SDKs - drive operations across prioritized IPC
//! transports with fallback-aware error aggregation and exactly-once operation telemetry in one
//! crate built for production.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod bundle;
pub mod context;
pub mod error;
pub mod executor;
pub mod ipc;
pub mod obs;
pub mod ops;
pub mod telemetry;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test` crate
	//! feature.

	pub use crate::_prelude::*;

	// self
	use crate::{executor::OperationExecutor, ipc::IpcTransport, telemetry::MemoryTelemetry};

	/// Builds an executor over the provided transports with an attached in-memory telemetry log.
	pub fn build_test_executor(
		transports: Vec<Arc<dyn IpcTransport>>,
	) -> (OperationExecutor, MemoryTelemetry) {
		let telemetry = MemoryTelemetry::new();
		let executor = OperationExecutor::new(transports, Arc::new(telemetry.clone()));

		(executor, telemetry)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use serde_json;
pub use url;
#[cfg(test)] use color_eyre as _;
#[cfg(all(feature = "tokio", not(unix)))] use tokio as _;
