//! Access token value types held by the session cache.

pub mod cached;
pub mod secret;
