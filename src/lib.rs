//! Session-scoped OAuth 2.0 token broker for the Dwarna biobank backend.
//!
//! The crate caches one bearer token per session, attaches it to backend requests, recovers
//! from a rejected token with exactly one forced refresh, and brokers the participant's
//! blockchain identity card.
//!
//! # Feature Flags
//!
//! - `reqwest` (default) provides [`http::ReqwestHttpClient`] and [`broker::ReqwestBroker`].
//! - `metrics` increments `dwarna_broker_flow_total` for every broker operation and
//!   `dwarna_broker_backend_responses_total` for every backend answer.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod broker;
pub mod card;
pub mod clock;
pub mod config;
pub mod cookie;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod request;
pub mod session;
pub mod store;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, BTreeSet, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tokio as _};
