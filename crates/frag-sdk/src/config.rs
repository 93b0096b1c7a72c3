use std::collections::BTreeMap;
use std::path::Path;

use frag_codec::CodecMode;
use frag_types::{Credentials, TenantId, TenantIdentity};
use serde::{Deserialize, Serialize};

use crate::error::{PlatformError, PlatformResult};

pub const ENV_BASE_URL: &str = "FRAG_BASE_URL";
pub const ENV_PAGE_SIZE: &str = "FRAG_PAGE_SIZE";

/// Platform configuration, usually loaded from TOML.
///
/// ```toml
/// base_url = "https://tenant.example.com"
/// page_size = 10
/// codec_mode = "annotated"
///
/// [[tenants]]
/// id = "t100"
/// user = "service_cookbook"
/// password = "secret"
/// roles = ["ROLE_INVENTORY_READ"]
///
/// [options]
/// "greeting" = "hello"
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub base_url: String,
    /// Default page size for queries that do not set one.
    pub page_size: usize,
    pub codec_mode: CodecMode,
    /// Tenants subscribed at startup.
    pub tenants: Vec<TenantConfig>,
    /// Free-form settings exposed through `Platform::setting`.
    pub options: BTreeMap<String, String>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8111".into(),
            page_size: frag_store::DEFAULT_PAGE_SIZE,
            codec_mode: CodecMode::default(),
            tenants: Vec::new(),
            options: BTreeMap::new(),
        }
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantConfig {
    pub id: String,
    pub user: String,
    pub password: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl std::fmt::Debug for TenantConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantConfig")
            .field("id", &self.id)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("roles", &self.roles)
            .finish()
    }
}

impl PlatformConfig {
    pub fn from_toml_str(contents: &str) -> PlatformResult<Self> {
        let config: Self = toml::from_str(contents).map_err(|e| PlatformError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> PlatformResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Apply `FRAG_BASE_URL` and `FRAG_PAGE_SIZE` from the process
    /// environment.
    pub fn with_env_overrides(self) -> PlatformResult<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> PlatformResult<Self> {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(raw) = lookup(ENV_PAGE_SIZE) {
            self.page_size = raw
                .parse()
                .map_err(|_| PlatformError::Config(format!("{ENV_PAGE_SIZE} is not a number: {raw:?}")))?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> PlatformResult<()> {
        if self.base_url.is_empty() {
            return Err(PlatformError::Config("base_url must not be empty".into()));
        }
        if self.page_size == 0 {
            return Err(PlatformError::Config("page_size must be positive".into()));
        }
        let mut seen = std::collections::BTreeSet::new();
        for tenant in &self.tenants {
            if tenant.id.is_empty() {
                return Err(PlatformError::Config("tenant id must not be empty".into()));
            }
            if !seen.insert(tenant.id.as_str()) {
                return Err(PlatformError::Config(format!("duplicate tenant {:?}", tenant.id)));
            }
        }
        Ok(())
    }

    /// Identities for the configured tenants, addressed at `base_url`.
    pub fn identities(&self) -> Vec<TenantIdentity> {
        self.tenants
            .iter()
            .map(|tenant| {
                tenant.roles.iter().fold(
                    TenantIdentity::new(
                        TenantId::new(&tenant.id),
                        &self.base_url,
                        Credentials::new(&tenant.user, &tenant.password),
                    ),
                    |identity, role| identity.with_role(role),
                )
            })
            .collect()
    }
}
