//! Authentication and authorization utilities
//!
//! OpenRepo delegates authentication to a fronting SSO proxy; the gateway
//! trusts the `X-Remote-User` header the proxy sets. This module provides:
//! - the caller identity available to handlers and pipelines
//! - role/capability checks (site admin, harvest ingest)
//! - per-call object-store credentials, never cached globally

use crate::config::RepositoryConfig;
use crate::errors::{RepoError, Result};
use serde::{Deserialize, Serialize};

/// Capability required to ingest harvested records
pub const CAP_HARVEST_INGEST: &str = "harvest.ingest";

/// The identity a request acts as
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Login name; None for anonymous requests
    pub login: Option<String>,

    /// Display name, when the directory supplied one
    pub display_name: Option<String>,

    /// Site-admin authority
    pub admin: bool,

    /// Granted capabilities beyond ordinary authenticated access
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl Caller {
    /// An anonymous caller with no authority
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// An authenticated non-admin caller
    pub fn user(login: impl Into<String>) -> Self {
        Self {
            login: Some(login.into()),
            ..Self::default()
        }
    }

    /// A site administrator
    pub fn admin(login: impl Into<String>) -> Self {
        Self {
            login: Some(login.into()),
            admin: true,
            ..Self::default()
        }
    }

    /// Resolve admin flag and capabilities from repository configuration
    pub fn with_roles(mut self, config: &RepositoryConfig) -> Self {
        if let Some(login) = &self.login {
            if config.admin_users.iter().any(|u| u == login) {
                self.admin = true;
            }
            if config.harvest_users.iter().any(|u| u == login) {
                self.capabilities.push(CAP_HARVEST_INGEST.to_string());
            }
        }
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.login.is_none()
    }

    /// Login name, or an error for anonymous callers
    pub fn require_login(&self) -> Result<&str> {
        self.login.as_deref().ok_or_else(|| RepoError::Unauthorized {
            message: "login required".to_string(),
        })
    }

    /// Name used in provenance event details; falls back to the login
    pub fn event_name(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.login.as_deref())
            .unwrap_or("anonymous")
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.admin || self.capabilities.iter().any(|c| c == capability)
    }

    /// Require a capability, returning PermissionDenied if not granted
    pub fn require_capability(&self, capability: &str) -> Result<()> {
        if self.is_anonymous() {
            return Err(RepoError::Unauthorized {
                message: format!("{capability} requires login"),
            });
        }
        if self.has_capability(capability) {
            Ok(())
        } else {
            Err(RepoError::PermissionDenied {
                message: format!("missing required capability: {capability}"),
            })
        }
    }

    /// True when this caller is among the given object owners
    pub fn owns(&self, owners: &[String]) -> bool {
        match &self.login {
            Some(login) => owners.iter().any(|o| o == login),
            None => false,
        }
    }
}

/// Object store credentials, derived from the request and passed per call.
///
/// Mutating object-store operations are tagged with the acting user; the
/// store client never caches these globally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
}

impl Credentials {
    pub fn for_caller(caller: &Caller) -> Self {
        Self {
            username: caller
                .login
                .clone()
                .unwrap_or_else(|| "anonymous".to_string()),
        }
    }

    /// Service credentials for background jobs (reconciler, reindex)
    pub fn service() -> Self {
        Self {
            username: "openrepo-svc".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn test_admin_has_all_capabilities() {
        let caller = Caller::admin("sysadmin");
        assert!(caller.has_capability(CAP_HARVEST_INGEST));
        assert!(caller.require_capability(CAP_HARVEST_INGEST).is_ok());
    }

    #[test]
    fn test_plain_user_denied_harvest() {
        let caller = Caller::user("alice");
        let err = caller.require_capability(CAP_HARVEST_INGEST).unwrap_err();
        assert!(matches!(err, RepoError::PermissionDenied { .. }));
    }

    #[test]
    fn test_anonymous_gets_unauthorized() {
        let caller = Caller::anonymous();
        let err = caller.require_capability(CAP_HARVEST_INGEST).unwrap_err();
        assert!(matches!(err, RepoError::Unauthorized { .. }));
    }

    #[test]
    fn test_roles_from_config() {
        let mut config = AppConfig::default().repository;
        config.admin_users.push("root".to_string());
        config.harvest_users.push("bot".to_string());

        let admin = Caller::user("root").with_roles(&config);
        assert!(admin.admin);

        let bot = Caller::user("bot").with_roles(&config);
        assert!(!bot.admin);
        assert!(bot.has_capability(CAP_HARVEST_INGEST));
    }

    #[test]
    fn test_ownership() {
        let caller = Caller::user("alice");
        let owners = vec!["bob".to_string(), "alice".to_string()];
        assert!(caller.owns(&owners));
        assert!(!Caller::anonymous().owns(&owners));
    }
}
