// self
use crate::obs::{FlowKind, FlowOutcome};

/// Bumps `dwarna_broker_flow_total{flow, outcome}` when the `metrics` feature is enabled.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"dwarna_broker_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Bumps `dwarna_broker_backend_responses_total{class}` for every backend answer.
///
/// `class` is the status class (`2xx`, `4xx`, ...) so label cardinality stays bounded.
pub fn record_backend_status(status: u16) {
	let class = status_class(status);

	#[cfg(feature = "metrics")]
	{
		metrics::counter!("dwarna_broker_backend_responses_total", "class" => class).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = class;
	}
}

fn status_class(status: u16) -> &'static str {
	match status {
		100..=199 => "1xx",
		200..=299 => "2xx",
		300..=399 => "3xx",
		400..=499 => "4xx",
		500..=599 => "5xx",
		_ => "other",
	}
}
