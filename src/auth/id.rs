//! Strongly typed identifiers enforced across the broker domain.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal, $validate:path) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				$validate($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				$validate($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 128;
// WordPress caps `user_login` at 60 characters.
const USERNAME_MAX_LEN: usize = 60;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (session, username, role, study, capability).
		kind: &'static str,
	},
	/// The identifier contains whitespace where none is allowed.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (session, username, role, study, capability).
		kind: &'static str,
	},
	/// The identifier contains control characters.
	#[error("{kind} identifier contains control characters.")]
	ContainsControl {
		/// Kind of identifier (session, username, role, study, capability).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (session, username, role, study, capability).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { SessionId, "Server-side session identifier that keys the token cache.", "Session", validate_token_like }
def_id! { Username, "Login name of a WordPress principal.", "Username", validate_username }
def_id! { RoleName, "Role name used to select OAuth scopes (e.g. `participant`).", "Role", validate_token_like }
def_id! { StudyId, "Identifier of a biobank study.", "Study", validate_token_like }
def_id! { Capability, "Capability name granted to a principal by the host application.", "Capability", validate_token_like }

fn validate_token_like(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.chars().any(char::is_control) {
		return Err(IdentifierError::ContainsControl { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

// Usernames may contain inner spaces but never padding.
fn validate_username(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.trim() != view {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.chars().any(char::is_control) {
		return Err(IdentifierError::ContainsControl { kind });
	}
	if view.chars().count() > USERNAME_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: USERNAME_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_reject_padding_and_whitespace() {
		assert!(SessionId::new(" sess-1").is_err(), "Leading whitespace must be rejected.");
		assert!(StudyId::new("STUDY 1").is_err(), "Inner whitespace must be rejected.");

		let study = StudyId::new("STUDY1").expect("Study fixture should be considered valid.");

		assert_eq!(study.as_ref(), "STUDY1");
		assert!(RoleName::new("").is_err());
		assert!(Capability::new("biobank\tupdate").is_err());
	}

	#[test]
	fn usernames_allow_inner_spaces_only() {
		let name = Username::new("nicholas mamo").expect("Inner spaces should be accepted.");

		assert_eq!(name.to_string(), "nicholas mamo");
		assert!(Username::new(" padded").is_err());
		assert!(Username::new("padded ").is_err());
		assert!(Username::new("line\nbreak").is_err());
		assert!(Username::new("a".repeat(USERNAME_MAX_LEN + 1)).is_err());
		Username::new("a".repeat(USERNAME_MAX_LEN)).expect("Exact length should succeed.");
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let role: RoleName =
			serde_json::from_str("\"participant\"").expect("Role should deserialize successfully.");

		assert_eq!(role.as_ref(), "participant");
		assert!(serde_json::from_str::<RoleName>("\"with space\"").is_err());
		assert_eq!(
			serde_json::to_string(&role).expect("Role should serialize successfully."),
			"\"participant\""
		);
	}

	#[test]
	fn borrow_supports_fast_lookup() {
		let set: BTreeSet<Capability> = BTreeSet::from_iter([Capability::new(
			"biobank_update_consent",
		)
		.expect("Capability used for lookup should be valid.")]);

		assert!(set.contains("biobank_update_consent"));
		assert!(!set.contains("biobank_view_consent"));
	}
}
