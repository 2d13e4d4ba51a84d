//! Logged-in principal supplied by the host application.

// self
use crate::{
	_prelude::*,
	auth::{Capability, RoleName, Username},
};

/// Capability that gates every blockchain card operation.
pub const UPDATE_CONSENT_CAPABILITY: &str = "biobank_update_consent";

/// Identity of the logged-in user as reported by the host application.
///
/// The broker only reads the role (to pick OAuth scopes) and the capability names (to gate card
/// operations); how roles and capabilities are granted stays with the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
	/// Login name forwarded to the token endpoint as `user_id`.
	pub username: Username,
	/// Role used to look up OAuth scopes.
	pub role: RoleName,
	/// Capabilities granted to the principal.
	#[serde(default)]
	pub capabilities: BTreeSet<Capability>,
}
impl Principal {
	/// Creates a principal without capabilities.
	pub fn new(username: Username, role: RoleName) -> Self {
		Self { username, role, capabilities: BTreeSet::new() }
	}

	/// Grants an additional capability.
	pub fn with_capability(mut self, capability: Capability) -> Self {
		self.capabilities.insert(capability);

		self
	}

	/// Grants several capabilities at once.
	pub fn with_capabilities<I>(mut self, capabilities: I) -> Self
	where
		I: IntoIterator<Item = Capability>,
	{
		self.capabilities.extend(capabilities);

		self
	}

	/// Returns `true` if the principal holds the named capability.
	pub fn can(&self, capability: &str) -> bool {
		self.capabilities.contains(capability)
	}
}
