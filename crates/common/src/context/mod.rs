//! Shared service context
//!
//! Process-wide singletons configured at startup: the object store and
//! search index endpoints, the identifier minter, and deployment
//! constants. Never mutated after construction; cheap to clone into
//! request handlers and pipelines.

use crate::config::RepositoryConfig;
use crate::errors::Result;
use crate::fedora::ObjectStore;
use crate::pidman::{Minter, Pid};
use crate::solr::SearchIndex;
use std::sync::Arc;

#[derive(Clone)]
pub struct RepoContext {
    pub store: Arc<dyn ObjectStore>,
    pub index: Arc<dyn SearchIndex>,
    pub minter: Arc<Minter>,
    /// Short-form identifier namespace, e.g. `oe`
    pub pidspace: String,
    /// Pid of the collection every article belongs to
    pub collection: Pid,
    /// Public base URL used in minted ARK targets and exports
    pub base_url: String,
}

impl RepoContext {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        index: Arc<dyn SearchIndex>,
        minter: Arc<Minter>,
        repository: &RepositoryConfig,
    ) -> Result<Self> {
        Ok(Self {
            store,
            index,
            minter,
            pidspace: repository.pidspace.clone(),
            collection: Pid::parse(&repository.collection_pid)?,
            base_url: repository.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Public landing-page URL for an article, the target of its ARK
    pub fn article_url(&self, pid: &Pid) -> String {
        format!("{}/publications/{}", self.base_url, pid)
    }
}
