//! Cached bearer token paired with its absolute expiry.

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret};

/// Access token as held in a session's token cache.
///
/// The token and its expiry are stored together, so a cache entry can never carry a token
/// without knowing when it stops being valid.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedToken {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Instant at which the token stops being valid.
	pub expires_at: OffsetDateTime,
}
impl CachedToken {
	/// Pairs a token with its absolute expiry.
	pub fn new(access_token: impl Into<String>, expires_at: OffsetDateTime) -> Self {
		Self { access_token: TokenSecret::new(access_token), expires_at }
	}

	/// Builds an entry that expires `expires_in` after `issued_at`.
	///
	/// Returns `None` when the expiry falls outside the representable date range.
	pub fn issued(
		access_token: impl Into<String>,
		issued_at: OffsetDateTime,
		expires_in: Duration,
	) -> Option<Self> {
		issued_at.checked_add(expires_in).map(|expires_at| Self::new(access_token, expires_at))
	}

	/// Returns `true` while `instant` is strictly before the expiry.
	pub fn is_valid_at(&self, instant: OffsetDateTime) -> bool {
		instant < self.expires_at
	}

	/// Time left before expiry at `instant`, clamped at zero.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		let remaining = self.expires_at - instant;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}
}
impl Debug for CachedToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CachedToken")
			.field("access_token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn validity_window_is_exclusive_at_expiry() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let token = CachedToken::issued("abc123", issued, Duration::seconds(3600))
			.expect("One hour should stay in range.");

		assert_eq!(token.expires_at, macros::datetime!(2025-01-01 01:00 UTC));
		assert!(token.is_valid_at(issued));
		assert!(token.is_valid_at(macros::datetime!(2025-01-01 00:59:59 UTC)));
		assert!(!token.is_valid_at(macros::datetime!(2025-01-01 01:00 UTC)));
	}

	#[test]
	fn remaining_is_clamped() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let token = CachedToken::issued("abc123", issued, Duration::minutes(10))
			.expect("Ten minutes should stay in range.");

		assert_eq!(token.remaining_at(issued), Duration::minutes(10));
		assert_eq!(token.remaining_at(issued + Duration::hours(1)), Duration::ZERO);
	}

	#[test]
	fn unrepresentable_expiry_is_rejected() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);

		assert!(CachedToken::issued("abc123", issued, Duration::seconds(i64::MAX)).is_none());
		assert!(
			CachedToken::issued("abc123", issued, Duration::seconds(10_000_000_000_000)).is_none()
		);
	}

	#[test]
	fn debug_redacts_the_secret() {
		let token = CachedToken::new("abc123", macros::datetime!(2025-01-01 00:00 UTC));

		assert!(!format!("{token:?}").contains("abc123"));
	}
}
