//! Blockchain-access cookie parsing.
//!
//! The blockchain identity service hands the browser a signed cookie of the form
//! `s:<token>.<signature>`. Only `<token>` is needed to talk to the service; the signature is
//! kept so callers that hold the signing secret can verify it themselves.

// crates.io
use base64::{
	Engine as _,
	engine::{
		DecodePaddingMode,
		general_purpose::{GeneralPurpose, GeneralPurposeConfig},
	},
};
// self
use crate::_prelude::*;

/// Name of the cookie set by the blockchain identity service.
pub const BLOCKCHAIN_COOKIE_NAME: &str = "access_token";

const SIGNED_PREFIX: &str = "s:";
const SIGNATURE_ENGINE: GeneralPurpose = GeneralPurpose::new(
	&base64::alphabet::STANDARD,
	GeneralPurposeConfig::new()
		.with_encode_padding(false)
		.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Errors produced while parsing a blockchain-access cookie.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CookieError {
	/// The value does not start with the `s:` signed-cookie prefix.
	#[error("Cookie value is not a signed cookie.")]
	Unsigned,
	/// The value has no `.` separating token and signature.
	#[error("Cookie value has no signature segment.")]
	MissingSignature,
	/// The token segment is empty.
	#[error("Cookie value has an empty token segment.")]
	EmptyToken,
	/// The signature is not valid base64.
	#[error("Cookie signature is not valid base64.")]
	InvalidSignature,
}

/// Parsed `s:<token>.<signature>` cookie.
#[derive(Clone, PartialEq, Eq)]
pub struct BlockchainCookie {
	token: String,
	signature: String,
}
impl BlockchainCookie {
	/// Parses the raw (already URL-decoded) cookie value.
	pub fn parse(raw: &str) -> Result<Self, CookieError> {
		let rest = raw.strip_prefix(SIGNED_PREFIX).ok_or(CookieError::Unsigned)?;
		let (token, signature) = rest.split_once('.').ok_or(CookieError::MissingSignature)?;

		if token.is_empty() {
			return Err(CookieError::EmptyToken);
		}

		Ok(Self { token: token.to_owned(), signature: signature.to_owned() })
	}

	/// Token segment used to authenticate against the blockchain identity service.
	pub fn token(&self) -> &str {
		&self.token
	}

	/// Raw signature segment.
	pub fn signature(&self) -> &str {
		&self.signature
	}

	/// Decodes the signature bytes (base64, padding optional).
	pub fn signature_bytes(&self) -> Result<Vec<u8>, CookieError> {
		SIGNATURE_ENGINE.decode(&self.signature).map_err(|_| CookieError::InvalidSignature)
	}
}
impl FromStr for BlockchainCookie {
	type Err = CookieError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}
impl Debug for BlockchainCookie {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BlockchainCookie")
			.field("token", &"<redacted>")
			.field("signature", &self.signature)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn token_is_the_segment_before_the_first_dot() {
		let cookie = BlockchainCookie::parse("s:AbCdEf123.c2lnbmF0dXJl.extra")
			.expect("Signed cookie should parse.");

		assert_eq!(cookie.token(), "AbCdEf123");
		assert_eq!(cookie.signature(), "c2lnbmF0dXJl.extra");
	}

	#[test]
	fn signature_decodes_with_or_without_padding() {
		let unpadded =
			BlockchainCookie::parse("s:tok.c2ln").expect("Unpadded signature should parse.");
		let padded =
			BlockchainCookie::parse("s:tok.c2lnbg==").expect("Padded signature should parse.");

		assert_eq!(unpadded.signature_bytes().expect("Signature should decode."), b"sig");
		assert_eq!(padded.signature_bytes().expect("Signature should decode."), b"sign");
		assert_eq!(
			BlockchainCookie::parse("s:tok.%%%")
				.expect("Cookie should parse.")
				.signature_bytes(),
			Err(CookieError::InvalidSignature)
		);
	}

	#[test]
	fn malformed_values_are_rejected() {
		assert_eq!(BlockchainCookie::parse("tok.sig"), Err(CookieError::Unsigned));
		assert_eq!(BlockchainCookie::parse("s:token-only"), Err(CookieError::MissingSignature));
		assert_eq!(BlockchainCookie::parse("s:.sig"), Err(CookieError::EmptyToken));
	}

	#[test]
	fn debug_hides_the_token() {
		let cookie = BlockchainCookie::from_str("s:secret-token.c2ln").expect("Cookie should parse.");

		assert!(!format!("{cookie:?}").contains("secret-token"));
	}
}
