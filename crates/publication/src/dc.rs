//! Flat Dublin Core mirror
//!
//! Kept alongside the MODS metadata as the `DC` datastream and the OAI
//! export surface. Never edited directly: [`DublinCore::sync_from_mods`]
//! rebuilds the derived fields after every save so `dc.title` always
//! matches the descriptive title.

use crate::mods::PublicationMods;
use openrepo_common::errors::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename = "dc", default)]
pub struct DublinCore {
    #[serde(rename = "title", skip_serializing_if = "Vec::is_empty")]
    pub titles: Vec<String>,
    #[serde(rename = "contributor", skip_serializing_if = "Vec::is_empty")]
    pub contributors: Vec<String>,
    #[serde(rename = "type", skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "subject", skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Journal, volume, issue, date and pagination in one line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(rename = "identifier", skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rights: Option<String>,
}

impl DublinCore {
    pub fn from_xml(xml: &str) -> Result<Self> {
        Ok(quick_xml::de::from_str(xml)?)
    }

    pub fn to_xml(&self) -> Result<String> {
        let body = quick_xml::se::to_string(self)?;
        Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>{body}"))
    }

    pub fn title(&self) -> Option<&str> {
        self.titles.first().map(String::as_str)
    }

    /// Add an identifier unless already present
    pub fn add_identifier(&mut self, id: impl Into<String>) {
        let id = id.into();
        if !self.identifiers.contains(&id) {
            self.identifiers.push(id);
        }
    }

    /// PubMed Central id from the identifier list (`PMC<digits>`)
    pub fn pmcid(&self) -> Option<i64> {
        self.identifiers
            .iter()
            .filter_map(|id| id.strip_prefix("PMC"))
            .find_map(|rest| rest.parse().ok())
    }

    /// Rebuild the derived fields from descriptive metadata. Identifiers
    /// and rights are owned by other code paths and survive untouched.
    pub fn sync_from_mods(&mut self, mods: &PublicationMods) {
        if let Some(title) = mods.full_title() {
            self.titles = vec![title];
        }

        self.contributors = mods.authors.iter().map(|a| a.display_name()).collect();

        let mut types = vec!["text".to_string()];
        match &mods.version {
            Some(version) => types.push(format!("{version}: article")),
            None => types.push("article".to_string()),
        }
        self.types = types;

        self.language = mods.language.as_ref().map(|l| l.name.clone());
        self.format = mods.media_type.clone();
        self.description = mods.abstract_text.clone();

        self.subjects = mods
            .subjects
            .iter()
            .map(|s| s.topic.clone())
            .chain(mods.keywords.iter().cloned())
            .collect();

        self.publisher = mods.publisher().map(String::from);
        self.date = mods.publication_date.clone();

        if let Some(journal) = &mods.journal {
            let volume = journal.volume.as_deref().unwrap_or("");
            let issue = journal.issue.as_deref().unwrap_or("");
            let (start, end) = journal
                .pages
                .as_ref()
                .map(|p| {
                    (
                        p.start.as_deref().unwrap_or(""),
                        p.end.as_deref().unwrap_or(""),
                    )
                })
                .unwrap_or(("", ""));
            self.source = Some(format!(
                "{} Volume {} Issue {} Date {} Pages {}-{}",
                journal.title.as_deref().unwrap_or(""),
                volume,
                issue,
                mods.publication_date.as_deref().unwrap_or(""),
                start,
                end
            ));
        }
    }
}
