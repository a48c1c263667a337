//! Object store client
//!
//! The authoritative store keeps each article as a named object composed of
//! versioned datastreams (PDF content, descriptive metadata, Dublin Core
//! mirror, provenance, external feed XML, author agreement). This module
//! defines the typed client interface, the REST implementation
//! ([`client::FedoraClient`]) and an in-memory implementation
//! ([`memory::MemoryStore`]) used in development and tests.
//!
//! Every mutating call produces a new immutable version tagged with the
//! actor derived from the per-call credentials; optimistic version checks
//! surface as `StaleVersion`.

pub mod client;
pub mod memory;

use crate::auth::Credentials;
use crate::errors::{RepoError, Result};
use crate::pidman::Pid;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

pub use client::FedoraClient;
pub use memory::MemoryStore;

// Well-known datastream ids
pub const DS_CONTENT: &str = "content";
pub const DS_DESC_METADATA: &str = "descMetadata";
pub const DS_DC: &str = "DC";
pub const DS_PROVENANCE: &str = "provenanceMetadata";
pub const DS_SYMP_ATOM: &str = "SYMPLECTIC-ATOM";
pub const DS_AUTHOR_AGREEMENT: &str = "authorAgreement";

// Content model IRIs
pub const CM_ARTICLE: &str = "emory-control:PublishedArticle-1.0";
pub const CM_PUBLICATION: &str = "emory-control:Publication-1.0";
pub const CM_BOOK: &str = "emory-control:Book-1.0";

/// Lifecycle state of a stored object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectState {
    Unpublished,
    Published,
    Withdrawn,
    /// Only reached by duplicates folded into an authoritative object
    Inactive,
}

impl Default for ObjectState {
    fn default() -> Self {
        ObjectState::Unpublished
    }
}

impl ObjectState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectState::Unpublished => "unpublished",
            ObjectState::Published => "published",
            ObjectState::Withdrawn => "withdrawn",
            ObjectState::Inactive => "inactive",
        }
    }
}

/// Object-level metadata and relations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectProfile {
    pub pid: Pid,
    pub label: String,
    #[serde(default)]
    pub owners: Vec<String>,
    #[serde(default)]
    pub state: ObjectState,
    #[serde(default)]
    pub content_models: Vec<String>,
    /// Parent collection; external references are by pid only
    pub collection: Option<Pid>,
    /// OAI item id, present iff published
    pub oai_item_id: Option<String>,
    /// `dcterms:replaces` relation marking this object as a duplicate
    pub replaces: Option<Pid>,
    /// Wrapper-object pointer to the current version of a publication
    pub has_current: Option<Pid>,
    /// Wrapper-object pointer to the visible version of a publication
    pub has_visible: Option<Pid>,
    /// Optimistic concurrency token, bumped on every committed mutation
    #[serde(default)]
    pub version: u64,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl ObjectProfile {
    /// A fresh, unversioned profile for a new object
    pub fn new(pid: Pid, label: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            pid,
            label: label.into(),
            owners: Vec::new(),
            state: ObjectState::Unpublished,
            content_models: Vec::new(),
            collection: None,
            oai_item_id: None,
            replaces: None,
            has_current: None,
            has_visible: None,
            version: 0,
            created: now,
            last_modified: now,
        }
    }

    pub fn has_content_model(&self, cm: &str) -> bool {
        self.content_models.iter().any(|m| m == cm)
    }
}

/// Descriptive information about one datastream version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatastreamInfo {
    pub dsid: String,
    pub mime_type: String,
    pub checksum_md5: Option<String>,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// A datastream with its content bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datastream {
    pub info: DatastreamInfo,
    pub bytes: Vec<u8>,
}

impl Datastream {
    pub fn as_str(&self) -> Result<&str> {
        std::str::from_utf8(&self.bytes).map_err(|e| RepoError::InvalidFormat {
            message: format!("datastream {} is not UTF-8: {e}", self.info.dsid),
        })
    }
}

/// One write in a commit batch
#[derive(Debug, Clone)]
pub enum DatastreamWrite {
    Put {
        dsid: String,
        mime_type: String,
        bytes: Vec<u8>,
        /// Expected MD5; verified by the store, computed when absent
        checksum_md5: Option<String>,
    },
    Delete {
        dsid: String,
    },
}

impl DatastreamWrite {
    pub fn put(dsid: &str, mime_type: &str, bytes: Vec<u8>) -> Self {
        DatastreamWrite::Put {
            dsid: dsid.to_string(),
            mime_type: mime_type.to_string(),
            bytes,
            checksum_md5: None,
        }
    }

    pub fn put_checksummed(dsid: &str, mime_type: &str, bytes: Vec<u8>, md5: String) -> Self {
        DatastreamWrite::Put {
            dsid: dsid.to_string(),
            mime_type: mime_type.to_string(),
            bytes,
            checksum_md5: Some(md5),
        }
    }

    pub fn dsid(&self) -> &str {
        match self {
            DatastreamWrite::Put { dsid, .. } | DatastreamWrite::Delete { dsid } => dsid,
        }
    }
}

/// One page of pids from a content-model listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PidPage {
    pub pids: Vec<Pid>,
    /// Cursor for the next page; None when exhausted
    pub cursor: Option<String>,
}

/// Typed client interface to the object store.
///
/// All operations may block on network I/O and can fail with
/// `Unavailable`; mutations take per-call credentials.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn exists(&self, pid: &Pid) -> Result<bool>;

    /// Fetch the object profile, or `ObjectNotFound`
    async fn get_profile(&self, pid: &Pid) -> Result<ObjectProfile>;

    /// Fetch one datastream with content; Ok(None) when the object exists
    /// but the datastream does not
    async fn get_datastream(&self, pid: &Pid, dsid: &str) -> Result<Option<Datastream>>;

    async fn list_datastreams(&self, pid: &Pid) -> Result<Vec<DatastreamInfo>>;

    /// Atomic creation of a new object with its initial datastreams.
    /// Fails with `Integrity` if the pid already exists.
    async fn ingest_new(
        &self,
        profile: &ObjectProfile,
        writes: Vec<DatastreamWrite>,
        log: &str,
        creds: &Credentials,
    ) -> Result<u64>;

    /// Commit profile changes and datastream writes as one new version.
    ///
    /// All-or-nothing from the caller's perspective: fails with
    /// `StaleVersion` when `expected_version` no longer matches, leaving
    /// the stored object at its last committed version. Returns the new
    /// version.
    async fn commit(
        &self,
        profile: &ObjectProfile,
        writes: Vec<DatastreamWrite>,
        expected_version: u64,
        log: &str,
        creds: &Credentials,
    ) -> Result<u64>;

    /// Remove the object entirely (administrative)
    async fn purge(&self, pid: &Pid, log: &str, creds: &Credentials) -> Result<()>;

    /// Paged listing of pids carrying a content model
    async fn find_by_content_model(&self, cm: &str, cursor: Option<String>) -> Result<PidPage>;

    /// Convenience: single-datastream write against the current version
    async fn put_datastream(
        &self,
        pid: &Pid,
        write: DatastreamWrite,
        log: &str,
        creds: &Credentials,
    ) -> Result<u64> {
        let profile = self.get_profile(pid).await?;
        let expected = profile.version;
        self.commit(&profile, vec![write], expected, log, creds)
            .await
    }

    /// Convenience: single-datastream delete against the current version
    async fn delete_datastream(
        &self,
        pid: &Pid,
        dsid: &str,
        log: &str,
        creds: &Credentials,
    ) -> Result<u64> {
        self.put_datastream(
            pid,
            DatastreamWrite::Delete {
                dsid: dsid.to_string(),
            },
            log,
            creds,
        )
        .await
    }
}

/// Hex MD5 digest of a byte slice, as stored on checksummed datastreams
pub fn md5_hex(bytes: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md5_hex_known_value() {
        // RFC 1321 test vector
        assert_eq!(md5_hex(b"abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_object_state_serde_names() {
        let json = serde_json::to_string(&ObjectState::Unpublished).unwrap();
        assert_eq!(json, "\"unpublished\"");
        assert_eq!(ObjectState::Withdrawn.as_str(), "withdrawn");
    }

    #[test]
    fn test_profile_defaults() {
        let profile = ObjectProfile::new(Pid::new("oe", "x1"), "Test object");
        assert_eq!(profile.state, ObjectState::Unpublished);
        assert_eq!(profile.version, 0);
        assert!(profile.oai_item_id.is_none());
    }
}
