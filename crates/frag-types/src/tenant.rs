use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque tenant identifier, e.g. `t174774`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Wrap a tenant id as issued by the platform.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw tenant id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TenantId({})", self.0)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Service-user credentials for one tenant.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Credentials for a service user.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything needed to address one tenant's partition of the store.
///
/// Discovered by the subscription collaborator; the core only consumes it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantIdentity {
    pub tenant: TenantId,
    pub base_url: String,
    pub credentials: Credentials,
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl TenantIdentity {
    /// An identity without roles.
    pub fn new(tenant: TenantId, base_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            tenant,
            base_url: base_url.into(),
            credentials,
            roles: BTreeSet::new(),
        }
    }

    /// Grant a role to this identity (builder style).
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Whether the identity was granted `role`.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// The user name as presented to the store: `<tenant>/<user>`.
    pub fn qualified_user(&self) -> String {
        format!("{}/{}", self.tenant, self.credentials.username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> TenantIdentity {
        TenantIdentity::new(
            TenantId::new("t100"),
            "https://t100.example.com",
            Credentials::new("service_frag", "secret"),
        )
    }

    #[test]
    fn debug_redacts_password() {
        let text = format!("{:?}", identity());
        assert!(!text.contains("secret"));
        assert!(text.contains("<redacted>"));
    }

    #[test]
    fn roles() {
        let id = identity().with_role("ROLE_INVENTORY_READ");
        assert!(id.has_role("ROLE_INVENTORY_READ"));
        assert!(!id.has_role("ROLE_INVENTORY_ADMIN"));
    }

    #[test]
    fn qualified_user() {
        assert_eq!(identity().qualified_user(), "t100/service_frag");
    }

    #[test]
    fn tenant_id_display() {
        assert_eq!(TenantId::from("t1").to_string(), "t1");
        assert_eq!(format!("{:?}", TenantId::from("t1")), "TenantId(t1)");
    }
}
