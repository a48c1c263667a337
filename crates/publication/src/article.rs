//! Article aggregate
//!
//! One scholarly article as stored in the object store: profile plus the
//! descriptive metadata, Dublin Core mirror, provenance log and binary
//! datastreams. The aggregate stages changes in memory and commits them
//! as a single version, so concurrent editors fail with `StaleVersion`
//! instead of interleaving writes.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, instrument};

use openrepo_common::auth::{Caller, Credentials};
use openrepo_common::db::Repository;
use openrepo_common::errors::{RepoError, Result};
use openrepo_common::fedora::{
    md5_hex, DatastreamWrite, ObjectProfile, ObjectState, CM_ARTICLE, CM_PUBLICATION,
    DS_AUTHOR_AGREEMENT, DS_CONTENT, DS_DC, DS_DESC_METADATA, DS_PROVENANCE, DS_SYMP_ATOM,
};
use openrepo_common::pidman::{Ark, Pid};
use openrepo_common::RepoContext;

use crate::dc::DublinCore;
use crate::embargo::{self, AccessDecision};
use crate::mods::{PublicationMods, MEDIA_TYPE_PDF};
use crate::premis::ProvenanceLog;

const MIME_XML: &str = "text/xml";

pub struct Article {
    ctx: Arc<RepoContext>,
    profile: ObjectProfile,
    /// Version the datastreams were loaded at; commits race against it
    loaded_version: u64,
    mods: PublicationMods,
    dc: DublinCore,
    provenance: ProvenanceLog,
    // staged binary writes, applied on the next save
    pdf: Option<Vec<u8>>,
    symp_atom: Option<Vec<u8>>,
    author_agreement: Option<Vec<u8>>,
    is_new: bool,
}

impl Article {
    /// Mints a pid and returns an uncommitted aggregate. Nothing is
    /// stored until the first [`Self::save`].
    #[instrument(skip(ctx))]
    pub async fn create(ctx: Arc<RepoContext>, label: &str) -> Result<Self> {
        let target = format!("{}/publications/", ctx.base_url);
        let minted = ctx.minter.mint(&target, label).await?;
        let pid = minted.ark.to_pid(&ctx.pidspace);

        let mut profile = ObjectProfile::new(pid, label);
        profile.content_models = vec![CM_PUBLICATION.to_string(), CM_ARTICLE.to_string()];

        let mut mods = PublicationMods::article_defaults();
        mods.ark_uri = Some(minted.ark_uri.clone());

        let mut dc = DublinCore::default();
        dc.add_identifier(minted.ark_uri);

        let mut provenance = ProvenanceLog::new();
        provenance.init_object(&minted.ark.to_string(), "ark");

        Ok(Self {
            ctx,
            profile,
            loaded_version: 0,
            mods,
            dc,
            provenance,
            pdf: None,
            symp_atom: None,
            author_agreement: None,
            is_new: true,
        })
    }

    /// Loads an existing article and its metadata datastreams.
    #[instrument(skip(ctx))]
    pub async fn load(ctx: Arc<RepoContext>, pid: &Pid) -> Result<Self> {
        let profile = ctx.store.get_profile(pid).await?;

        let mods = match ctx.store.get_datastream(pid, DS_DESC_METADATA).await? {
            Some(ds) => PublicationMods::from_xml(ds.as_str()?)?,
            None => PublicationMods::article_defaults(),
        };
        let dc = match ctx.store.get_datastream(pid, DS_DC).await? {
            Some(ds) => DublinCore::from_xml(ds.as_str()?)?,
            None => DublinCore::default(),
        };
        let mut provenance = match ctx.store.get_datastream(pid, DS_PROVENANCE).await? {
            Some(ds) => ProvenanceLog::from_xml(ds.as_str()?)?,
            None => ProvenanceLog::new(),
        };
        let ark = Ark::new(ctx.minter.naan(), pid.noid());
        provenance.init_object(&ark.to_string(), "ark");

        let loaded_version = profile.version;
        Ok(Self {
            ctx,
            profile,
            loaded_version,
            mods,
            dc,
            provenance,
            pdf: None,
            symp_atom: None,
            author_agreement: None,
            is_new: false,
        })
    }

    pub fn pid(&self) -> &Pid {
        &self.profile.pid
    }

    pub fn state(&self) -> ObjectState {
        self.profile.state
    }

    pub fn profile(&self) -> &ObjectProfile {
        &self.profile
    }

    pub fn label(&self) -> &str {
        &self.profile.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.profile.label = label.into();
    }

    pub fn owners(&self) -> &[String] {
        &self.profile.owners
    }

    pub fn set_owner(&mut self, login: impl Into<String>) {
        self.profile.owners = vec![login.into()];
    }

    pub fn attach_to_collection(&mut self, collection: Pid) {
        self.profile.collection = Some(collection);
    }

    pub fn mods(&self) -> &PublicationMods {
        &self.mods
    }

    pub fn mods_mut(&mut self) -> &mut PublicationMods {
        &mut self.mods
    }

    pub fn dc(&self) -> &DublinCore {
        &self.dc
    }

    pub fn dc_mut(&mut self) -> &mut DublinCore {
        &mut self.dc
    }

    pub fn provenance(&self) -> &ProvenanceLog {
        &self.provenance
    }

    pub fn provenance_mut(&mut self) -> &mut ProvenanceLog {
        &mut self.provenance
    }

    /// PubMed Central id, when one of the DC identifiers carries it
    pub fn pmcid(&self) -> Option<i64> {
        self.dc.pmcid()
    }

    /// Stages a new PDF content datastream for the next save.
    pub fn set_pdf(&mut self, bytes: Vec<u8>) {
        self.pdf = Some(bytes);
    }

    pub fn set_symp_atom(&mut self, bytes: Vec<u8>) {
        self.symp_atom = Some(bytes);
    }

    pub fn set_author_agreement(&mut self, bytes: Vec<u8>) {
        self.author_agreement = Some(bytes);
    }

    /// Fetches the stored PDF, staged bytes first.
    pub async fn pdf_bytes(&self) -> Result<Option<Vec<u8>>> {
        if let Some(bytes) = &self.pdf {
            return Ok(Some(bytes.clone()));
        }
        Ok(self
            .ctx
            .store
            .get_datastream(self.pid(), DS_CONTENT)
            .await?
            .map(|ds| ds.bytes))
    }

    pub async fn symp_atom_bytes(&self) -> Result<Option<Vec<u8>>> {
        if let Some(bytes) = &self.symp_atom {
            return Ok(Some(bytes.clone()));
        }
        Ok(self
            .ctx
            .store
            .get_datastream(self.pid(), DS_SYMP_ATOM)
            .await?
            .map(|ds| ds.bytes))
    }

    pub fn embargo_end_date(&self) -> Option<NaiveDate> {
        self.mods
            .embargo_end
            .as_deref()
            .and_then(|d| d.parse().ok())
    }

    /// Who may see this article right now; see the embargo gate rules.
    pub fn access_decision(&self, caller: &Caller, now: NaiveDate) -> AccessDecision {
        embargo::access_decision(
            self.profile.state,
            &self.profile.owners,
            self.embargo_end_date(),
            caller,
            now,
        )
    }

    /// Commits every staged change as one new object version.
    ///
    /// Runs the invariant checks for the current state, derives owners
    /// from local-author ids, mirrors the metadata into DC, and writes
    /// all changed datastreams in a single commit so a stale aggregate
    /// fails with `StaleVersion` without partial effects.
    #[instrument(skip(self, caller), fields(pid = %self.profile.pid))]
    pub async fn save(&mut self, log: &str, caller: &Caller) -> Result<u64> {
        let errors = match self.profile.state {
            ObjectState::Published => self.mods.validate_for_publication(),
            _ => self.mods.validate(),
        };
        if !errors.is_empty() {
            return Err(RepoError::Validation { errors });
        }

        // line ends from browser form posts
        if let Some(text) = &mut self.mods.abstract_text {
            if text.contains('\r') {
                *text = text.replace('\r', "");
            }
        }

        // authors with a local login own the object; a metadata edit that
        // drops all logins never strips existing owners
        let logins = self.mods.author_logins();
        if !logins.is_empty() {
            self.profile.owners = logins;
        }

        if self.profile.state == ObjectState::Published {
            self.mods.calculate_embargo_end();
        }

        if let Some(title) = self.mods.full_title() {
            self.profile.label = title;
        }
        self.dc.sync_from_mods(&self.mods);

        let mut writes = vec![
            DatastreamWrite::put(DS_DESC_METADATA, MIME_XML, self.mods.to_xml()?.into_bytes()),
            DatastreamWrite::put(DS_DC, MIME_XML, self.dc.to_xml()?.into_bytes()),
            DatastreamWrite::put(DS_PROVENANCE, MIME_XML, self.provenance.to_xml()?.into_bytes()),
        ];
        if let Some(bytes) = self.pdf.take() {
            let md5 = md5_hex(&bytes);
            writes.push(DatastreamWrite::put_checksummed(
                DS_CONTENT,
                MEDIA_TYPE_PDF,
                bytes,
                md5,
            ));
        }
        if let Some(bytes) = self.symp_atom.take() {
            writes.push(DatastreamWrite::put(DS_SYMP_ATOM, MIME_XML, bytes));
        }
        if let Some(bytes) = self.author_agreement.take() {
            writes.push(DatastreamWrite::put(
                DS_AUTHOR_AGREEMENT,
                MEDIA_TYPE_PDF,
                bytes,
            ));
        }

        let creds = Credentials::for_caller(caller);
        let version = if self.is_new {
            let v = self
                .ctx
                .store
                .ingest_new(&self.profile, writes, log, &creds)
                .await?;
            self.is_new = false;
            v
        } else {
            self.ctx
                .store
                .commit(&self.profile, writes, self.loaded_version, log, &creds)
                .await?
        };
        self.loaded_version = version;
        self.profile.version = version;
        info!(version, "article saved");
        Ok(version)
    }

    /// Publishes the article. Idempotent: republishing an already
    /// published article recomputes derived fields and saves.
    #[instrument(skip(self, caller), fields(pid = %self.profile.pid))]
    pub async fn publish(&mut self, caller: &Caller) -> Result<()> {
        let errors = self.mods.validate_for_publication();
        if !errors.is_empty() {
            return Err(RepoError::Validation { errors });
        }

        self.profile.state = ObjectState::Published;
        let ark = Ark::new(self.ctx.minter.naan(), self.profile.pid.noid());
        self.profile.oai_item_id = Some(ark.oai_item_id());
        self.profile.collection = Some(self.ctx.collection.clone());
        self.mods.calculate_embargo_end();

        self.save("published", caller).await?;
        Ok(())
    }

    /// Takes a published article out of circulation.
    #[instrument(skip(self, caller), fields(pid = %self.profile.pid))]
    pub async fn withdraw(&mut self, caller: &Caller, reason: &str) -> Result<()> {
        if self.profile.state != ObjectState::Published {
            return Err(RepoError::Conflict {
                message: format!(
                    "cannot withdraw {}: state is {}",
                    self.profile.pid,
                    self.profile.state.as_str()
                ),
            });
        }
        let actor = caller.require_login()?;
        self.provenance
            .withdrawn(actor, caller.event_name(), reason);
        self.profile.state = ObjectState::Withdrawn;
        self.save("withdrawn", caller).await?;
        Ok(())
    }

    /// Returns a withdrawn article to its published state.
    #[instrument(skip(self, caller), fields(pid = %self.profile.pid))]
    pub async fn reinstate(&mut self, caller: &Caller, reason: Option<&str>) -> Result<()> {
        if self.profile.state != ObjectState::Withdrawn {
            return Err(RepoError::Conflict {
                message: format!(
                    "cannot reinstate {}: state is {}",
                    self.profile.pid,
                    self.profile.state.as_str()
                ),
            });
        }
        let actor = caller.require_login()?;
        self.provenance
            .reinstated(actor, caller.event_name(), reason);
        self.profile.state = ObjectState::Published;
        self.save("reinstated", caller).await?;
        Ok(())
    }

    /// Folds a duplicate object into this one.
    ///
    /// Descriptive metadata, DC, provenance events and the PDF (when the
    /// duplicate has one) move here; the duplicate ends up `inactive`
    /// and its view and download counts are added to this pid's.
    #[instrument(skip(self, other, repo, caller), fields(pid = %self.profile.pid, duplicate = %other.profile.pid))]
    pub async fn merge_from(
        &mut self,
        other: &mut Article,
        repo: &Repository,
        caller: &Caller,
    ) -> Result<()> {
        self.fold_duplicate(other, caller).await?;
        repo.transfer_statistics(&other.profile.pid.to_string(), &self.profile.pid.to_string())
            .await?;
        Ok(())
    }

    /// Metadata, provenance and content half of the merge; the
    /// statistics transfer happens in [`Article::merge_from`].
    async fn fold_duplicate(&mut self, other: &mut Article, caller: &Caller) -> Result<()> {
        let ark_uri = self.mods.ark_uri.clone();
        self.mods = other.mods.clone();
        // this object's identity survives the merge
        self.mods.ark_uri = ark_uri;

        let identifiers = self.dc.identifiers.clone();
        self.dc = other.dc.clone();
        for id in identifiers {
            self.dc.add_identifier(id);
        }

        for event in &other.provenance.events {
            self.provenance.copy_event(event);
        }
        self.provenance
            .merged(&self.profile.pid.to_string(), &other.profile.pid.to_string());

        if let Some(bytes) = other.pdf_bytes().await? {
            self.set_pdf(bytes);
        }
        if let Some(bytes) = other.symp_atom_bytes().await? {
            self.set_symp_atom(bytes);
        }

        other.profile.state = ObjectState::Inactive;
        other.save("merged into authoritative object", caller).await?;
        self.save("merged duplicate", caller).await?;
        Ok(())
    }
}
