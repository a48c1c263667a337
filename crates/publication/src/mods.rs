//! Descriptive metadata model
//!
//! MODS-like typed metadata with a round-trippable canonical XML form,
//! stored as the `descMetadata` datastream. Validation returns field
//! errors rather than failing fast so the deposit form can surface all
//! problems at once.

use crate::embargo::{self, EmbargoDuration};
use crate::language;
use openrepo_common::errors::{FieldError, Result};
use serde::{Deserialize, Serialize};

pub const RESOURCE_TYPE_TEXT: &str = "text";
pub const GENRE_ARTICLE: &str = "Article";
pub const MEDIA_TYPE_PDF: &str = "application/pdf";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TitleInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(rename = "partNumber", skip_serializing_if = "Option::is_none")]
    pub part_number: Option<String>,
    #[serde(rename = "partName", skip_serializing_if = "Option::is_none")]
    pub part_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    /// Repository login when the author is a local user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "familyName")]
    pub family_name: String,
    #[serde(rename = "givenName")]
    pub given_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
}

impl Author {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.given_name, self.family_name)
    }

    /// `Family, Given` form used for sorting and facets
    pub fn sort_name(&self) -> String {
        format!("{}, {}", self.family_name, self.given_name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Funder {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Journal {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<PageRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Language {
    pub code: String,
    pub name: String,
}

impl Default for Language {
    fn default() -> Self {
        Self {
            code: language::DEFAULT_CODE.to_string(),
            name: language::DEFAULT_NAME.to_string(),
        }
    }
}

impl Language {
    pub fn from_code(code: &str) -> Self {
        match language::name_for_code(code) {
            Some(name) => Self {
                code: code.to_ascii_lowercase(),
                name: name.to_string(),
            },
            None => Self::default(),
        }
    }
}

/// A research-field subject heading
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchField {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub topic: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalVersion {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// `doi:10.<number>/<suffix>`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct License {
    #[serde(rename = "shortName", skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename = "mods", default)]
pub struct PublicationMods {
    #[serde(rename = "titleInfo", skip_serializing_if = "Option::is_none")]
    pub title_info: Option<TitleInfo>,
    #[serde(rename = "author", skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<Author>,
    #[serde(rename = "funder", skip_serializing_if = "Vec::is_empty")]
    pub funders: Vec<Funder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal: Option<Journal>,
    /// ISO 8601 prefix: YYYY, YYYY-MM or YYYY-MM-DD
    #[serde(rename = "publicationDate", skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<String>,
    #[serde(rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(rename = "keyword", skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(rename = "authorNote", skip_serializing_if = "Vec::is_empty")]
    pub author_notes: Vec<String>,
    #[serde(rename = "otherUrl", skip_serializing_if = "Vec::is_empty")]
    pub other_urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    #[serde(rename = "subject", skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<ResearchField>,
    #[serde(rename = "finalVersion", skip_serializing_if = "Option::is_none")]
    pub final_version: Option<FinalVersion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(rename = "adminNote", skip_serializing_if = "Option::is_none")]
    pub admin_note: Option<String>,
    #[serde(rename = "rightsResearchDate", skip_serializing_if = "Option::is_none")]
    pub rights_research_date: Option<String>,
    #[serde(rename = "embargoDuration")]
    pub embargo_duration: EmbargoDuration,
    /// Derived; recomputed on publish and on saves while published
    #[serde(rename = "embargoEnd", skip_serializing_if = "Option::is_none")]
    pub embargo_end: Option<String>,
    /// Pre- or post-print
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    // declared type metadata, set statically at ingest
    #[serde(rename = "resourceType", skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(rename = "mediaType", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(rename = "arkUri", skip_serializing_if = "Option::is_none")]
    pub ark_uri: Option<String>,
}

impl PublicationMods {
    pub fn from_xml(xml: &str) -> Result<Self> {
        Ok(quick_xml::de::from_str(xml)?)
    }

    pub fn to_xml(&self) -> Result<String> {
        let body = quick_xml::se::to_string(self)?;
        Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>{body}"))
    }

    /// Static fields common to every deposited article
    pub fn article_defaults() -> Self {
        Self {
            resource_type: Some(RESOURCE_TYPE_TEXT.to_string()),
            genre: Some(GENRE_ARTICLE.to_string()),
            media_type: Some(MEDIA_TYPE_PDF.to_string()),
            language: Some(Language::default()),
            ..Self::default()
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.title_info.as_ref().and_then(|t| t.title.as_deref())
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title_info
            .get_or_insert_with(TitleInfo::default)
            .title = Some(title.into());
    }

    /// Title with subtitle appended, as mirrored into DC
    pub fn full_title(&self) -> Option<String> {
        let info = self.title_info.as_ref()?;
        let title = info.title.clone()?;
        Some(match &info.subtitle {
            Some(subtitle) => format!("{title}: {subtitle}"),
            None => title,
        })
    }

    pub fn journal_title(&self) -> Option<&str> {
        self.journal.as_ref().and_then(|j| j.title.as_deref())
    }

    pub fn publisher(&self) -> Option<&str> {
        self.journal.as_ref().and_then(|j| j.publisher.as_deref())
    }

    /// Year prefix of the publication date
    pub fn publication_year(&self) -> Option<i32> {
        self.publication_date
            .as_deref()
            .and_then(|d| d.get(..4))
            .and_then(|y| y.parse().ok())
    }

    /// Logins of authors who are local users, in author order
    pub fn author_logins(&self) -> Vec<String> {
        self.authors
            .iter()
            .filter_map(|a| a.id.clone())
            .collect()
    }

    /// Recompute [`Self::embargo_end`] from the duration and publication
    /// date; clears it when either is missing
    pub fn calculate_embargo_end(&mut self) {
        self.embargo_end =
            embargo::embargo_end(self.embargo_duration, self.publication_date.as_deref())
                .map(|d| d.to_string());
    }

    /// True when no descriptive content has been entered. Declared
    /// type-metadata fields (resource type, genre, media type, default
    /// language) do not count as content.
    pub fn is_empty(&self) -> bool {
        self.title().map_or(true, str::is_empty)
            && self.authors.is_empty()
            && self.funders.is_empty()
            && self.journal.is_none()
            && self.publication_date.is_none()
            && self.abstract_text.is_none()
            && self.keywords.is_empty()
            && self.subjects.is_empty()
            && self.final_version.is_none()
    }

    /// Well-formedness checks applied on every save
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();

        if let Some(date) = &self.publication_date {
            if !valid_date_prefix(date) {
                errors.push(FieldError::new(
                    "publication_date",
                    "must be YYYY, YYYY-MM or YYYY-MM-DD",
                ));
            }
        }
        if let Some(date) = &self.embargo_end {
            if !valid_date_prefix(date) {
                errors.push(FieldError::new("embargo_end", "must be an ISO 8601 date"));
            }
        }
        if let Some(doi) = self.final_version.as_ref().and_then(|f| f.doi.as_deref()) {
            if !valid_doi(doi) {
                errors.push(FieldError::new(
                    "final_version.doi",
                    "must have the form doi:10.<number>/<suffix>",
                ));
            }
        }
        for (i, author) in self.authors.iter().enumerate() {
            if author.family_name.trim().is_empty() && author.given_name.trim().is_empty() {
                errors.push(FieldError::new(
                    format!("authors[{i}]"),
                    "author name must not be empty",
                ));
            }
        }
        errors
    }

    /// Additional checks an article must pass to be published
    pub fn validate_for_publication(&self) -> Vec<FieldError> {
        let mut errors = self.validate();

        if self.title().map_or(true, |t| t.trim().is_empty()) {
            errors.push(FieldError::new("title", "a published article needs a title"));
        }
        if self.authors.is_empty() {
            errors.push(FieldError::new(
                "authors",
                "a published article needs at least one author",
            ));
        }
        if self.publication_year().is_none() {
            errors.push(FieldError::new(
                "publication_date",
                "a published article needs a publication year",
            ));
        }
        if self.journal_title().map_or(true, |t| t.trim().is_empty()) {
            errors.push(FieldError::new(
                "journal.title",
                "a published article needs a journal title",
            ));
        }
        if self.publisher().map_or(true, |p| p.trim().is_empty()) {
            errors.push(FieldError::new(
                "journal.publisher",
                "a published article needs a publisher",
            ));
        }
        errors
    }
}

fn valid_date_prefix(date: &str) -> bool {
    let re = regex_lite::Regex::new(r"^\d{4}(-\d{2}(-\d{2})?)?$").unwrap();
    re.is_match(date)
}

fn valid_doi(doi: &str) -> bool {
    let re = regex_lite::Regex::new(r"^doi:10\.\d+/\S+$").unwrap();
    re.is_match(doi)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_mods() -> PublicationMods {
        let mut mods = PublicationMods::article_defaults();
        mods.set_title("Tumor growth in model organisms");
        mods.title_info.as_mut().unwrap().subtitle = Some("a survey".into());
        mods.authors.push(Author {
            id: Some("jsmith".into()),
            family_name: "Smith".into(),
            given_name: "Jane".into(),
            affiliation: Some("Biology".into()),
        });
        mods.journal = Some(Journal {
            title: Some("Journal of Results".into()),
            publisher: Some("Results Press".into()),
            volume: Some("12".into()),
            issue: Some("3".into()),
            pages: Some(PageRange {
                start: Some("101".into()),
                end: Some("118".into()),
            }),
        });
        mods.publication_date = Some("2023-05".into());
        mods.abstract_text = Some("We survey growth.".into());
        mods.keywords.push("growth".into());
        mods
    }

    #[test]
    fn test_xml_round_trip() {
        let mods = complete_mods();
        let xml = mods.to_xml().unwrap();
        let parsed = PublicationMods::from_xml(&xml).unwrap();
        assert_eq!(parsed, mods);
    }

    #[test]
    fn test_full_title_includes_subtitle() {
        let mods = complete_mods();
        assert_eq!(
            mods.full_title().as_deref(),
            Some("Tumor growth in model organisms: a survey")
        );
    }

    #[test]
    fn test_is_empty_ignores_type_metadata() {
        let mods = PublicationMods::article_defaults();
        assert!(mods.is_empty());
        let mut mods = mods;
        mods.keywords.push("growth".into());
        assert!(!mods.is_empty());
    }

    #[test]
    fn test_validate_date_and_doi() {
        let mut mods = complete_mods();
        mods.publication_date = Some("05/2023".into());
        mods.final_version = Some(FinalVersion {
            url: None,
            doi: Some("10.1234/abc".into()),
        });
        let errors = mods.validate();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"publication_date"));
        assert!(fields.contains(&"final_version.doi"));

        mods.publication_date = Some("2023-05-01".into());
        mods.final_version.as_mut().unwrap().doi = Some("doi:10.1234/abc.5".into());
        assert!(mods.validate().is_empty());
    }

    #[test]
    fn test_publication_validation_names_every_gap() {
        let mods = PublicationMods::article_defaults();
        let errors = mods.validate_for_publication();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        for expected in [
            "title",
            "authors",
            "publication_date",
            "journal.title",
            "journal.publisher",
        ] {
            assert!(fields.contains(&expected), "missing {expected}");
        }
        assert!(complete_mods().validate_for_publication().is_empty());
    }

    #[test]
    fn test_embargo_end_recompute_and_clear() {
        let mut mods = complete_mods();
        mods.embargo_duration = EmbargoDuration::OneYear;
        mods.calculate_embargo_end();
        assert_eq!(mods.embargo_end.as_deref(), Some("2024-06-01"));

        mods.embargo_duration = EmbargoDuration::None;
        mods.calculate_embargo_end();
        assert_eq!(mods.embargo_end, None);
    }

    #[test]
    fn test_publication_year() {
        let mut mods = complete_mods();
        assert_eq!(mods.publication_year(), Some(2023));
        mods.publication_date = None;
        assert_eq!(mods.publication_year(), None);
    }
}
