//! In-memory object store for tests and local development.
//!
//! Implements the full [`ObjectStore`] contract including version checks
//! and checksum verification, so lifecycle code can be exercised without
//! a running backend.

use super::{
    md5_hex, Datastream, DatastreamInfo, DatastreamWrite, ObjectProfile, ObjectStore, PidPage,
};
use crate::auth::Credentials;
use crate::errors::{RepoError, Result};
use crate::pidman::Pid;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct StoredObject {
    profile: ObjectProfile,
    datastreams: HashMap<String, Datastream>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    // BTreeMap keeps find_by_content_model ordering stable across runs
    objects: Mutex<BTreeMap<String, StoredObject>>,
    page_size: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            page_size: 100,
        }
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            page_size,
        }
    }

    fn apply_writes(
        stored: &mut StoredObject,
        writes: Vec<DatastreamWrite>,
        pid: &Pid,
    ) -> Result<()> {
        // verify every checksum before touching state so a failed batch
        // leaves the object untouched
        for write in &writes {
            if let DatastreamWrite::Put {
                dsid,
                bytes,
                checksum_md5: Some(expected),
                ..
            } = write
            {
                let actual = md5_hex(bytes);
                if &actual != expected {
                    return Err(RepoError::Integrity {
                        message: format!(
                            "checksum mismatch on {pid}/{dsid}: expected {expected}, got {actual}"
                        ),
                    });
                }
            }
        }
        for write in writes {
            match write {
                DatastreamWrite::Put {
                    dsid,
                    mime_type,
                    bytes,
                    checksum_md5,
                } => {
                    let info = DatastreamInfo {
                        dsid: dsid.clone(),
                        mime_type,
                        checksum_md5: Some(checksum_md5.unwrap_or_else(|| md5_hex(&bytes))),
                        size: bytes.len() as u64,
                        last_modified: Utc::now(),
                    };
                    stored.datastreams.insert(dsid, Datastream { info, bytes });
                }
                DatastreamWrite::Delete { dsid } => {
                    if stored.datastreams.remove(&dsid).is_none() {
                        return Err(RepoError::DatastreamNotFound {
                            pid: pid.to_string(),
                            dsid,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn exists(&self, pid: &Pid) -> Result<bool> {
        Ok(self.objects.lock().unwrap().contains_key(&pid.to_string()))
    }

    async fn get_profile(&self, pid: &Pid) -> Result<ObjectProfile> {
        self.objects
            .lock()
            .unwrap()
            .get(&pid.to_string())
            .map(|o| o.profile.clone())
            .ok_or_else(|| RepoError::ObjectNotFound {
                pid: pid.to_string(),
            })
    }

    async fn get_datastream(&self, pid: &Pid, dsid: &str) -> Result<Option<Datastream>> {
        let objects = self.objects.lock().unwrap();
        let stored = objects
            .get(&pid.to_string())
            .ok_or_else(|| RepoError::ObjectNotFound {
                pid: pid.to_string(),
            })?;
        Ok(stored.datastreams.get(dsid).cloned())
    }

    async fn list_datastreams(&self, pid: &Pid) -> Result<Vec<DatastreamInfo>> {
        let objects = self.objects.lock().unwrap();
        let stored = objects
            .get(&pid.to_string())
            .ok_or_else(|| RepoError::ObjectNotFound {
                pid: pid.to_string(),
            })?;
        let mut infos: Vec<_> = stored
            .datastreams
            .values()
            .map(|ds| ds.info.clone())
            .collect();
        infos.sort_by(|a, b| a.dsid.cmp(&b.dsid));
        Ok(infos)
    }

    async fn ingest_new(
        &self,
        profile: &ObjectProfile,
        writes: Vec<DatastreamWrite>,
        _log: &str,
        _creds: &Credentials,
    ) -> Result<u64> {
        let key = profile.pid.to_string();
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&key) {
            return Err(RepoError::Integrity {
                message: format!("object {key} already exists"),
            });
        }
        let mut stored = StoredObject {
            profile: profile.clone(),
            datastreams: HashMap::new(),
        };
        Self::apply_writes(&mut stored, writes, &profile.pid)?;
        stored.profile.version = 1;
        stored.profile.last_modified = Utc::now();
        objects.insert(key, stored);
        Ok(1)
    }

    async fn commit(
        &self,
        profile: &ObjectProfile,
        writes: Vec<DatastreamWrite>,
        expected_version: u64,
        _log: &str,
        _creds: &Credentials,
    ) -> Result<u64> {
        let key = profile.pid.to_string();
        let mut objects = self.objects.lock().unwrap();
        let stored = objects
            .get_mut(&key)
            .ok_or_else(|| RepoError::ObjectNotFound { pid: key.clone() })?;
        if stored.profile.version != expected_version {
            return Err(RepoError::StaleVersion {
                pid: key,
                expected: expected_version,
                found: stored.profile.version,
            });
        }
        // stage on a copy so version-check survivors that fail a write
        // leave the last committed version intact
        let mut staged = stored.clone();
        Self::apply_writes(&mut staged, writes, &profile.pid)?;
        staged.profile = profile.clone();
        staged.profile.version = expected_version + 1;
        staged.profile.last_modified = Utc::now();
        let new_version = staged.profile.version;
        *stored = staged;
        Ok(new_version)
    }

    async fn purge(&self, pid: &Pid, _log: &str, _creds: &Credentials) -> Result<()> {
        let mut objects = self.objects.lock().unwrap();
        objects
            .remove(&pid.to_string())
            .map(|_| ())
            .ok_or_else(|| RepoError::ObjectNotFound {
                pid: pid.to_string(),
            })
    }

    async fn find_by_content_model(&self, cm: &str, cursor: Option<String>) -> Result<PidPage> {
        let objects = self.objects.lock().unwrap();
        let mut pids: Vec<Pid> = Vec::new();
        let mut next: Option<String> = None;
        for (key, stored) in objects.iter() {
            if let Some(after) = &cursor {
                if key <= after {
                    continue;
                }
            }
            if !stored.profile.has_content_model(cm) {
                continue;
            }
            if pids.len() == self.page_size {
                next = pids.last().map(|p| p.to_string());
                break;
            }
            pids.push(stored.profile.pid.clone());
        }
        Ok(PidPage { pids, cursor: next })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fedora::{CM_ARTICLE, DS_CONTENT, DS_DESC_METADATA};

    fn creds() -> Credentials {
        Credentials::service()
    }

    fn new_profile(noid: &str) -> ObjectProfile {
        let mut profile = ObjectProfile::new(Pid::new("oe", noid), format!("object {noid}"));
        profile.content_models.push(CM_ARTICLE.to_string());
        profile
    }

    #[tokio::test]
    async fn test_ingest_and_fetch() {
        let store = MemoryStore::new();
        let profile = new_profile("a1");
        let writes = vec![DatastreamWrite::put(
            DS_CONTENT,
            "application/pdf",
            b"%PDF-1.4 fake".to_vec(),
        )];
        let version = store
            .ingest_new(&profile, writes, "initial ingest", &creds())
            .await
            .unwrap();
        assert_eq!(version, 1);

        let fetched = store.get_profile(&profile.pid).await.unwrap();
        assert_eq!(fetched.version, 1);
        let ds = store
            .get_datastream(&profile.pid, DS_CONTENT)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ds.bytes, b"%PDF-1.4 fake");
        assert!(ds.info.checksum_md5.is_some());
    }

    #[tokio::test]
    async fn test_ingest_duplicate_pid_is_integrity_error() {
        let store = MemoryStore::new();
        let profile = new_profile("a1");
        store
            .ingest_new(&profile, vec![], "first", &creds())
            .await
            .unwrap();
        let err = store
            .ingest_new(&profile, vec![], "second", &creds())
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Integrity { .. }));
    }

    #[tokio::test]
    async fn test_stale_version_rejected_and_state_preserved() {
        let store = MemoryStore::new();
        let profile = new_profile("a1");
        store
            .ingest_new(&profile, vec![], "ingest", &creds())
            .await
            .unwrap();

        let mut current = store.get_profile(&profile.pid).await.unwrap();
        current.label = "updated".into();
        store
            .commit(&current, vec![], 1, "update", &creds())
            .await
            .unwrap();

        // second writer still holds version 1
        let mut loser = profile.clone();
        loser.label = "conflicting".into();
        let err = store
            .commit(&loser, vec![], 1, "conflict", &creds())
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::StaleVersion { found: 2, .. }));

        let fetched = store.get_profile(&profile.pid).await.unwrap();
        assert_eq!(fetched.label, "updated");
        assert_eq!(fetched.version, 2);
    }

    #[tokio::test]
    async fn test_checksum_mismatch_aborts_whole_batch() {
        let store = MemoryStore::new();
        let profile = new_profile("a1");
        store
            .ingest_new(&profile, vec![], "ingest", &creds())
            .await
            .unwrap();

        let current = store.get_profile(&profile.pid).await.unwrap();
        let writes = vec![
            DatastreamWrite::put(DS_DESC_METADATA, "text/xml", b"<mods/>".to_vec()),
            DatastreamWrite::put_checksummed(
                DS_CONTENT,
                "application/pdf",
                b"%PDF-1.4".to_vec(),
                "0000".into(),
            ),
        ];
        let err = store
            .commit(&current, writes, 1, "bad batch", &creds())
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Integrity { .. }));

        // neither write landed
        let fetched = store.get_profile(&profile.pid).await.unwrap();
        assert_eq!(fetched.version, 1);
        assert!(store
            .get_datastream(&profile.pid, DS_DESC_METADATA)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_find_by_content_model_pages() {
        let store = MemoryStore::with_page_size(2);
        for noid in ["a1", "a2", "a3"] {
            store
                .ingest_new(&new_profile(noid), vec![], "ingest", &creds())
                .await
                .unwrap();
        }
        let page1 = store.find_by_content_model(CM_ARTICLE, None).await.unwrap();
        assert_eq!(page1.pids.len(), 2);
        let page2 = store
            .find_by_content_model(CM_ARTICLE, page1.cursor.clone())
            .await
            .unwrap();
        assert_eq!(page2.pids.len(), 1);
        assert!(page2.cursor.is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_datastream() {
        let store = MemoryStore::new();
        let profile = new_profile("a1");
        store
            .ingest_new(&profile, vec![], "ingest", &creds())
            .await
            .unwrap();
        let err = store
            .delete_datastream(&profile.pid, DS_CONTENT, "remove", &creds())
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::DatastreamNotFound { .. }));
    }
}
