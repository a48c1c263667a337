//! REST implementation of the object store client.
//!
//! Speaks the store's management API over HTTP with basic auth for the
//! service account; the acting user travels in the `X-On-Behalf-Of`
//! header so audit trails record the real actor.

use super::{
    Datastream, DatastreamInfo, DatastreamWrite, ObjectProfile, ObjectStore, PidPage,
};
use crate::auth::Credentials;
use crate::config::FedoraConfig;
use crate::errors::{RepoError, Result};
use crate::pidman::Pid;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct FedoraClient {
    client: reqwest::Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    page_size: u32,
}

#[derive(Serialize)]
struct CommitRequest<'a> {
    profile: &'a ObjectProfile,
    expected_version: u64,
    writes: Vec<WireWrite>,
    log: &'a str,
}

#[derive(Serialize)]
struct IngestRequest<'a> {
    profile: &'a ObjectProfile,
    writes: Vec<WireWrite>,
    log: &'a str,
}

/// Datastream bytes travel hex-encoded inside the commit body so the
/// whole batch lands in one request and one store transaction
#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum WireWrite {
    Put {
        dsid: String,
        mime_type: String,
        content_hex: String,
        checksum_md5: Option<String>,
    },
    Delete {
        dsid: String,
    },
}

impl From<DatastreamWrite> for WireWrite {
    fn from(write: DatastreamWrite) -> Self {
        match write {
            DatastreamWrite::Put {
                dsid,
                mime_type,
                bytes,
                checksum_md5,
            } => WireWrite::Put {
                dsid,
                mime_type,
                content_hex: hex::encode(&bytes),
                checksum_md5,
            },
            DatastreamWrite::Delete { dsid } => WireWrite::Delete { dsid },
        }
    }
}

#[derive(Deserialize)]
struct CommitResponse {
    version: u64,
}

#[derive(Deserialize)]
struct PidPageResponse {
    pids: Vec<String>,
    cursor: Option<String>,
}

impl FedoraClient {
    pub fn new(config: &FedoraConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RepoError::Configuration {
                message: format!("failed to build object store HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            page_size: config.page_size,
        })
    }

    fn object_url(&self, pid: &Pid) -> String {
        format!("{}/objects/{}", self.base_url, pid)
    }

    fn request(&self, method: reqwest::Method, url: String, creds: &Credentials) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, url)
            .header("X-On-Behalf-Of", &creds.username);
        if let Some(username) = &self.username {
            builder = builder.basic_auth(username, self.password.as_deref());
        }
        builder
    }

    /// Map non-success responses onto the error taxonomy. Consumes the
    /// response to include the body in the message.
    async fn check(&self, response: reqwest::Response, pid: Option<&Pid>) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(match status.as_u16() {
            401 => RepoError::Unauthorized {
                message: "object store rejected service credentials".into(),
            },
            403 => RepoError::PermissionDenied {
                message: format!("object store denied operation: {body}"),
            },
            404 => RepoError::ObjectNotFound {
                pid: pid.map(|p| p.to_string()).unwrap_or_default(),
            },
            409 | 412 => RepoError::Conflict {
                message: format!("object store version conflict: {body}"),
            },
            _ => RepoError::unavailable("fedora", format!("HTTP {status}: {body}")),
        })
    }
}

#[async_trait]
impl ObjectStore for FedoraClient {
    async fn exists(&self, pid: &Pid) -> Result<bool> {
        let response = self
            .request(
                reqwest::Method::HEAD,
                self.object_url(pid),
                &Credentials::service(),
            )
            .send()
            .await?;
        match response.status().as_u16() {
            404 => Ok(false),
            _ => {
                self.check(response, Some(pid)).await?;
                Ok(true)
            }
        }
    }

    async fn get_profile(&self, pid: &Pid) -> Result<ObjectProfile> {
        let response = self
            .request(
                reqwest::Method::GET,
                self.object_url(pid),
                &Credentials::service(),
            )
            .send()
            .await?;
        let response = self.check(response, Some(pid)).await?;
        Ok(response.json().await?)
    }

    async fn get_datastream(&self, pid: &Pid, dsid: &str) -> Result<Option<Datastream>> {
        let url = format!("{}/datastreams/{}", self.object_url(pid), dsid);
        let response = self
            .request(reqwest::Method::GET, url, &Credentials::service())
            .send()
            .await?;
        if response.status().as_u16() == 404 {
            // disambiguate missing object from missing datastream
            return if self.exists(pid).await? {
                Ok(None)
            } else {
                Err(RepoError::ObjectNotFound {
                    pid: pid.to_string(),
                })
            };
        }
        let response = self.check(response, Some(pid)).await?;
        let headers = response.headers();
        let mime_type = headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let checksum_md5 = headers
            .get("x-checksum-md5")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let last_modified = headers
            .get("x-last-modified")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(chrono::Utc::now);
        let bytes = response.bytes().await?.to_vec();
        Ok(Some(Datastream {
            info: DatastreamInfo {
                dsid: dsid.to_string(),
                mime_type,
                checksum_md5,
                size: bytes.len() as u64,
                last_modified,
            },
            bytes,
        }))
    }

    async fn list_datastreams(&self, pid: &Pid) -> Result<Vec<DatastreamInfo>> {
        let url = format!("{}/datastreams", self.object_url(pid));
        let response = self
            .request(reqwest::Method::GET, url, &Credentials::service())
            .send()
            .await?;
        let response = self.check(response, Some(pid)).await?;
        Ok(response.json().await?)
    }

    async fn ingest_new(
        &self,
        profile: &ObjectProfile,
        writes: Vec<DatastreamWrite>,
        log: &str,
        creds: &Credentials,
    ) -> Result<u64> {
        let url = format!("{}/objects", self.base_url);
        let request = IngestRequest {
            profile,
            writes: writes.into_iter().map(WireWrite::from).collect(),
            log,
        };
        let response = self
            .request(reqwest::Method::POST, url, creds)
            .json(&request)
            .send()
            .await?;
        if response.status().as_u16() == 409 {
            let body = response.text().await.unwrap_or_default();
            return Err(RepoError::Integrity {
                message: format!("object {} already exists: {body}", profile.pid),
            });
        }
        let response = self.check(response, Some(&profile.pid)).await?;
        let result: CommitResponse = response.json().await?;
        Ok(result.version)
    }

    async fn commit(
        &self,
        profile: &ObjectProfile,
        writes: Vec<DatastreamWrite>,
        expected_version: u64,
        log: &str,
        creds: &Credentials,
    ) -> Result<u64> {
        let url = format!("{}/commit", self.object_url(&profile.pid));
        let request = CommitRequest {
            profile,
            expected_version,
            writes: writes.into_iter().map(WireWrite::from).collect(),
            log,
        };
        let response = self
            .request(reqwest::Method::POST, url, creds)
            .json(&request)
            .send()
            .await?;
        if matches!(response.status().as_u16(), 409 | 412) {
            let found = response
                .headers()
                .get("x-current-version")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            return Err(RepoError::StaleVersion {
                pid: profile.pid.to_string(),
                expected: expected_version,
                found,
            });
        }
        let response = self.check(response, Some(&profile.pid)).await?;
        let result: CommitResponse = response.json().await?;
        Ok(result.version)
    }

    async fn purge(&self, pid: &Pid, log: &str, creds: &Credentials) -> Result<()> {
        let response = self
            .request(reqwest::Method::DELETE, self.object_url(pid), creds)
            .query(&[("log", log)])
            .send()
            .await?;
        self.check(response, Some(pid)).await?;
        Ok(())
    }

    async fn find_by_content_model(&self, cm: &str, cursor: Option<String>) -> Result<PidPage> {
        let url = format!("{}/objects", self.base_url);
        let mut query = vec![
            ("contentModel".to_string(), cm.to_string()),
            ("limit".to_string(), self.page_size.to_string()),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor".to_string(), cursor));
        }
        let response = self
            .request(reqwest::Method::GET, url, &Credentials::service())
            .query(&query)
            .send()
            .await?;
        let response = self.check(response, None).await?;
        let result: PidPageResponse = response.json().await?;
        let pids = result
            .pids
            .iter()
            .map(|s| Pid::parse(s))
            .collect::<Result<Vec<_>>>()?;
        Ok(PidPage {
            pids,
            cursor: result.cursor,
        })
    }
}
