//! Persistent identifier minting
//!
//! Articles are identified by ARKs (`ark:/<NAAN>/<NOID>`) minted against a
//! pidman-style REST service; the short-form pid `<pidspace>:<NOID>` is
//! derived from the minted noid. In development, a local fallback mints
//! UUID-based noids so the rest of the stack works without the service.

use crate::config::PidmanConfig;
use crate::errors::{RepoError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

/// Short-form persistent identifier: `<pidspace>:<noid>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pid {
    pidspace: String,
    noid: String,
}

impl Pid {
    pub fn new(pidspace: impl Into<String>, noid: impl Into<String>) -> Self {
        Self {
            pidspace: pidspace.into(),
            noid: noid.into(),
        }
    }

    /// Parse a `<pidspace>:<noid>` string
    pub fn parse(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((space, noid)) if !space.is_empty() && !noid.is_empty() => {
                Ok(Self::new(space, noid))
            }
            _ => Err(RepoError::InvalidFormat {
                message: format!("not a pid: {s:?}"),
            }),
        }
    }

    pub fn pidspace(&self) -> &str {
        &self.pidspace
    }

    pub fn noid(&self) -> &str {
        &self.noid
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.pidspace, self.noid)
    }
}

impl TryFrom<String> for Pid {
    type Error = RepoError;

    fn try_from(s: String) -> Result<Self> {
        Pid::parse(&s)
    }
}

impl From<Pid> for String {
    fn from(pid: Pid) -> Self {
        pid.to_string()
    }
}

/// Archival Resource Key: `ark:/<NAAN>/<NOID>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ark {
    naan: String,
    noid: String,
}

impl Ark {
    pub fn new(naan: impl Into<String>, noid: impl Into<String>) -> Self {
        Self {
            naan: naan.into(),
            noid: noid.into(),
        }
    }

    /// Parse an ark from either the bare `ark:/naan/noid` form or a
    /// resolver URI ending in it.
    pub fn parse(s: &str) -> Result<Self> {
        let idx = s.find("ark:/").ok_or_else(|| RepoError::InvalidFormat {
            message: format!("not an ark: {s:?}"),
        })?;
        let rest = &s[idx + "ark:/".len()..];
        match rest.split_once('/') {
            Some((naan, noid)) if !naan.is_empty() && !noid.is_empty() => {
                // strip any qualifier after the noid
                let noid = noid.split('/').next().unwrap_or(noid);
                Ok(Self::new(naan, noid))
            }
            _ => Err(RepoError::InvalidFormat {
                message: format!("not an ark: {s:?}"),
            }),
        }
    }

    pub fn naan(&self) -> &str {
        &self.naan
    }

    pub fn noid(&self) -> &str {
        &self.noid
    }

    /// Derive the short-form pid in the given pidspace
    pub fn to_pid(&self, pidspace: &str) -> Pid {
        Pid::new(pidspace, &self.noid)
    }

    /// OAI item identifier for a published article
    pub fn oai_item_id(&self) -> String {
        format!("oai:{self}")
    }
}

impl fmt::Display for Ark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ark:/{}/{}", self.naan, self.noid)
    }
}

impl TryFrom<String> for Ark {
    type Error = RepoError;

    fn try_from(s: String) -> Result<Self> {
        Ark::parse(&s)
    }
}

impl From<Ark> for String {
    fn from(ark: Ark) -> Self {
        ark.to_string()
    }
}

/// A freshly minted identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintedId {
    pub ark: Ark,
    /// Resolver URI returned by the minter (or constructed by the fallback)
    pub ark_uri: String,
}

#[derive(Serialize)]
struct MintRequest<'a> {
    domain: &'a str,
    target_uri: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Deserialize)]
struct MintResponse {
    uri: String,
}

/// Client for the identifier minting service
pub struct Minter {
    config: PidmanConfig,
    client: Option<reqwest::Client>,
}

impl Minter {
    /// Construct from configuration.
    ///
    /// Without a configured host this fails unless `dev_fallback` is set,
    /// in which case UUID-based local minting is used. Fail-fast behavior
    /// for an unreachable configured minter lives in [`Minter::verify`].
    pub fn new(config: PidmanConfig) -> Result<Self> {
        let client = match &config.host {
            Some(_) => Some(
                reqwest::Client::builder()
                    .timeout(Duration::from_secs(config.timeout_secs))
                    .build()
                    .map_err(|e| RepoError::Configuration {
                        message: format!("pidman client: {e}"),
                    })?,
            ),
            None if config.dev_fallback => {
                warn!("No pid minter configured; local UUID pid fallback in use");
                None
            }
            None => {
                return Err(RepoError::Configuration {
                    message: "pidman.host is required outside development".to_string(),
                })
            }
        };
        Ok(Self { config, client })
    }

    /// Startup check: the configured minter must answer, or startup fails
    /// fast. A dev-fallback minter always passes.
    pub async fn verify(&self) -> Result<()> {
        let (Some(client), Some(host)) = (&self.client, &self.config.host) else {
            return Ok(());
        };
        let op = || async {
            client
                .get(host)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| backoff::Error::transient(e))?;
            Ok(())
        };
        backoff::future::retry(startup_backoff(), op)
            .await
            .map_err(|e: reqwest::Error| {
                RepoError::unavailable("pidman", format!("minter unreachable at startup: {e}"))
            })?;
        info!(host = %host, "pid minter reachable");
        Ok(())
    }

    /// Mint a new ARK with the given resolver target and label.
    pub async fn mint(&self, target_url: &str, label: &str) -> Result<MintedId> {
        match (&self.client, &self.config.host) {
            (Some(client), Some(host)) => {
                let domain = self.config.domain.as_deref().unwrap_or("");
                let request = MintRequest {
                    domain,
                    target_uri: target_url,
                    name: (!label.is_empty()).then_some(label),
                };
                let response = client
                    .post(format!("{}/ark/", host.trim_end_matches('/')))
                    .json(&request)
                    .send()
                    .await?
                    .error_for_status()
                    .map_err(|e| RepoError::unavailable("pidman", e.to_string()))?;
                let minted: MintResponse = response.json().await?;
                let ark = Ark::parse(&minted.uri)?;
                Ok(MintedId {
                    ark,
                    ark_uri: minted.uri,
                })
            }
            _ => Ok(self.mint_local()),
        }
    }

    /// Development fallback: UUID-based noid, resolver URI on the target
    /// host.
    fn mint_local(&self) -> MintedId {
        let noid = uuid::Uuid::new_v4().simple().to_string();
        let ark = Ark::new(&self.config.naan, &noid[..12]);
        let ark_uri = format!("http://localhost/{ark}");
        MintedId { ark, ark_uri }
    }

    pub fn naan(&self) -> &str {
        &self.config.naan
    }
}

fn startup_backoff() -> backoff::ExponentialBackoff {
    backoff::ExponentialBackoff {
        max_elapsed_time: Some(Duration::from_secs(15)),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_roundtrip() {
        let pid = Pid::parse("oe:8g2qk").unwrap();
        assert_eq!(pid.pidspace(), "oe");
        assert_eq!(pid.noid(), "8g2qk");
        assert_eq!(pid.to_string(), "oe:8g2qk");
    }

    #[test]
    fn test_pid_rejects_garbage() {
        assert!(Pid::parse("no-colon").is_err());
        assert!(Pid::parse(":noid").is_err());
        assert!(Pid::parse("space:").is_err());
    }

    #[test]
    fn test_ark_parse_bare() {
        let ark = Ark::parse("ark:/25593/8g2qk").unwrap();
        assert_eq!(ark.naan(), "25593");
        assert_eq!(ark.noid(), "8g2qk");
        assert_eq!(ark.to_string(), "ark:/25593/8g2qk");
    }

    #[test]
    fn test_ark_parse_resolver_uri() {
        let ark = Ark::parse("https://pid.example.edu/ark:/25593/8g2qk").unwrap();
        assert_eq!(ark.noid(), "8g2qk");
    }

    #[test]
    fn test_ark_to_pid_and_oai() {
        let ark = Ark::parse("ark:/25593/8g2qk").unwrap();
        assert_eq!(ark.to_pid("oe").to_string(), "oe:8g2qk");
        assert_eq!(ark.oai_item_id(), "oai:ark:/25593/8g2qk");
    }

    #[tokio::test]
    async fn test_dev_fallback_mints_unique_pids() {
        let config = PidmanConfig {
            host: None,
            domain: None,
            naan: "25593".to_string(),
            dev_fallback: true,
            timeout_secs: 5,
        };
        let minter = Minter::new(config).unwrap();
        let a = minter.mint("http://localhost/a", "a").await.unwrap();
        let b = minter.mint("http://localhost/b", "b").await.unwrap();
        assert_ne!(a.ark, b.ark);
        assert_eq!(a.ark.naan(), "25593");
    }

    #[test]
    fn test_minter_requires_host_outside_dev() {
        let config = PidmanConfig {
            host: None,
            domain: None,
            naan: "25593".to_string(),
            dev_fallback: false,
            timeout_secs: 5,
        };
        assert!(Minter::new(config).is_err());
    }
}
