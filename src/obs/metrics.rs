// self
use crate::obs::OperationOutcome;

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_operation_outcome(operation: &'static str, outcome: OperationOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"broker_dispatch_operation_total",
			"operation" => operation,
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (operation, outcome);
	}
}
