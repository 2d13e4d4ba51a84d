//! Observability helpers shared by the token client, dispatcher, and card broker.
//!
//! Every operation runs inside a `dwarna_broker.flow` span carrying the `flow` and `stage`
//! fields. With the `metrics` feature enabled, the `dwarna_broker_flow_total` counter is bumped
//! for each attempt, retry, success, and failure, labeled by `flow` + `outcome`, and
//! `dwarna_broker_backend_responses_total` counts backend answers by status class.

mod metrics;
mod tracing;

pub use self::{metrics::*, tracing::*};

// self
use crate::_prelude::*;

/// Broker operations observed by spans and counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Token acquisition against the OAuth token endpoint.
	Token,
	/// Authenticated request dispatch with 401 recovery.
	Dispatch,
	/// Blockchain identity card operations.
	Card,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Token => "token",
			FlowKind::Dispatch => "dispatch",
			FlowKind::Card => "card",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a broker operation.
	Attempt,
	/// Second attempt after the backend rejected the cached token.
	Retry,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Retry => "retry",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
