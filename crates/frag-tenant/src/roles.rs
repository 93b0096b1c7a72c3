use crate::error::{TenantError, TenantResult};
use crate::scope::TenantScope;

/// Answers whether the caller holds a named role.
pub trait RoleChecker {
    fn has_role(&self, role: &str) -> bool;

    fn require_role(&self, role: &str) -> TenantResult<()> {
        if self.has_role(role) {
            Ok(())
        } else {
            Err(TenantError::MissingRole(role.to_string()))
        }
    }
}

/// Roles granted to the tenant's service user.
impl RoleChecker for TenantScope {
    fn has_role(&self, role: &str) -> bool {
        self.identity().has_role(role)
    }
}
