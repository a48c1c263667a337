//! Symplectic-Elements atom feed entries.
//!
//! The feed delivers one entry per scholarly work, with the same
//! bibliographic fields repeated once per external data source. The
//! preferred-value accessors on [`SympAtom`] merge those per-source
//! records under a fixed priority so downstream metadata is
//! deterministic no matter which sources happen to be present.

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::warn;

use crate::mods::{Author, FinalVersion, Journal, Language, PageRange, PublicationMods};
use openrepo_common::errors::{RepoError, Result};

/// Preferred order when the same field is present in several sources.
pub const SOURCE_PRIORITY: [&str; 7] = [
    "web-of-science",
    "scopus",
    "pubmed",
    "crossref",
    "arxiv",
    "repec",
    "dblp",
];

/// An identified user on the feed entry, usually a local author.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SympUser {
    pub username: String,
    pub last_name: String,
    pub first_name: String,
    pub initials: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SympPages {
    pub begin_page: Option<String>,
    pub end_page: Option<String>,
}

/// Bibliographic fields as one external source reported them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SympSource {
    pub name: String,
    pub title: Option<String>,
    pub language: Option<String>,
    pub abstract_text: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub publication_date: Option<String>,
    pub pages: Option<SympPages>,
    pub publisher: Option<String>,
    pub journal: Option<String>,
    pub doi: Option<String>,
    pub keywords: Vec<String>,
}

/// One parsed feed entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SympAtom {
    /// `pubs:id`, the id of this work in the feed system
    pub external_id: Option<String>,
    /// `atom:category` labels; the second names the publication type
    pub categories: Vec<String>,
    pub users: Vec<SympUser>,
    /// Requested embargo period, free text
    pub embargo: Option<String>,
    /// `dcterms:replaces`, set when this entry duplicates an earlier pid
    pub replaces_pid: Option<String>,
    /// Entry body, used as a fulltext fallback when no PDF is attached
    pub body: Option<String>,
    pub sources: Vec<SympSource>,
}

impl SympAtom {
    pub fn from_xml(xml: &str) -> Result<Self> {
        parse_symp_atom(xml)
    }

    pub fn source(&self, name: &str) -> Option<&SympSource> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Walks sources in [`SOURCE_PRIORITY`] order, then any remaining
    /// sources in document order, and returns the first hit.
    fn preferred<'a, T, F>(&'a self, get: F) -> Option<T>
    where
        F: Fn(&'a SympSource) -> Option<T>,
    {
        for name in SOURCE_PRIORITY {
            if let Some(value) = self.source(name).and_then(&get) {
                return Some(value);
            }
        }
        self.sources
            .iter()
            .filter(|s| !SOURCE_PRIORITY.contains(&s.name.as_str()))
            .find_map(get)
    }

    pub fn title(&self) -> Option<&str> {
        self.preferred(|s| s.title.as_deref().filter(|t| !t.is_empty()))
    }

    pub fn language(&self) -> Option<&str> {
        self.preferred(|s| s.language.as_deref().filter(|l| !l.is_empty()))
    }

    pub fn abstract_text(&self) -> Option<&str> {
        self.preferred(|s| s.abstract_text.as_deref().filter(|a| !a.is_empty()))
    }

    pub fn volume(&self) -> Option<&str> {
        self.preferred(|s| s.volume.as_deref().filter(|v| !v.is_empty()))
    }

    pub fn issue(&self) -> Option<&str> {
        self.preferred(|s| s.issue.as_deref().filter(|i| !i.is_empty()))
    }

    pub fn publication_date(&self) -> Option<&str> {
        self.preferred(|s| s.publication_date.as_deref().filter(|d| !d.is_empty()))
    }

    pub fn pages(&self) -> Option<&SympPages> {
        self.preferred(|s| s.pages.as_ref())
    }

    pub fn publisher(&self) -> Option<&str> {
        self.preferred(|s| s.publisher.as_deref().filter(|p| !p.is_empty()))
    }

    pub fn journal(&self) -> Option<&str> {
        self.preferred(|s| s.journal.as_deref().filter(|j| !j.is_empty()))
    }

    pub fn doi(&self) -> Option<&str> {
        self.preferred(|s| s.doi.as_deref().filter(|d| !d.is_empty()))
    }

    pub fn keywords(&self) -> Vec<String> {
        self.preferred(|s| {
            if s.keywords.is_empty() {
                None
            } else {
                Some(s.keywords.clone())
            }
        })
        .unwrap_or_default()
    }

    /// Publication type from the category labels. The first label is
    /// the feed's object kind, the second the scholarly genre.
    pub fn publication_type(&self) -> Option<&str> {
        self.categories.get(1).map(String::as_str)
    }

    /// Builds descriptive metadata from the merged source fields.
    pub fn to_mods(&self) -> PublicationMods {
        let mut mods = PublicationMods::article_defaults();

        if let Some(title) = self.title() {
            mods.set_title(title);
        }
        mods.abstract_text = self.abstract_text().map(String::from);
        mods.publication_date = self.publication_date().map(String::from);
        if let Some(code) = self.language() {
            mods.language = Some(Language::from_code(code));
        }
        mods.keywords = self.keywords();

        let journal = Journal {
            title: self.journal().map(String::from),
            publisher: self.publisher().map(String::from),
            volume: self.volume().map(String::from),
            issue: self.issue().map(String::from),
            pages: self.pages().map(|p| PageRange {
                start: p.begin_page.clone(),
                // single-page articles carry only a begin page
                end: p.end_page.clone().or_else(|| p.begin_page.clone()),
            }),
        };
        if journal != Journal::default() {
            mods.journal = Some(journal);
        }

        if let Some(doi) = self.doi() {
            mods.final_version = Some(FinalVersion {
                url: Some(format!("http://dx.doi.org/{doi}")),
                doi: Some(format!("doi:{doi}")),
            });
        }

        for user in &self.users {
            mods.authors.push(Author {
                id: Some(user.username.to_ascii_lowercase()),
                family_name: user.last_name.clone(),
                given_name: user.first_name.clone(),
                affiliation: None,
            });
        }

        if let Some(requested) = self.embargo.as_deref() {
            match crate::embargo::EmbargoDuration::parse(requested) {
                Some(duration) => mods.embargo_duration = duration,
                None => warn!(requested, "unrecognized embargo period in feed entry"),
            }
        }
        mods.calculate_embargo_end();

        mods
    }
}

fn attr_value(e: &quick_xml::events::BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == key {
            let value = attr.unescape_value().map_err(|e| RepoError::InvalidFormat {
                message: format!("feed entry attribute: {e}"),
            })?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Parses one feed entry. Tolerates unknown elements; fails only on
/// malformed XML.
fn parse_symp_atom(xml: &str) -> Result<SympAtom> {
    let mut atom = SympAtom::default();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut current_source: Option<SympSource> = None;
    let mut current_user: Option<SympUser> = None;
    // @name of the enclosing pubs:field
    let mut current_field = String::new();
    let mut in_text = false;
    let mut in_keyword = false;
    let mut in_source_name = false;
    let mut in_replaces = false;
    let mut in_body = false;
    let mut in_pubs_id = false;
    let mut in_username = false;
    let mut in_last_name = false;
    let mut in_first_name = false;
    let mut in_initials = false;
    let mut in_email = false;
    let mut in_begin_page = false;
    let mut in_end_page = false;
    // publication-date parts, zero-filled and joined at field end
    let mut date_year = String::new();
    let mut date_month = String::new();
    let mut date_day = String::new();
    let mut in_year = false;
    let mut in_month = false;
    let mut in_day = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"atom:category" | b"category" => {
                    if let Some(label) = attr_value(e, b"label")? {
                        atom.categories.push(label);
                    }
                }
                b"pubs:record" => current_source = Some(SympSource::default()),
                b"pubs:source-name" => in_source_name = true,
                b"pubs:field" => {
                    current_field = attr_value(e, b"name")?.unwrap_or_default();
                    date_year.clear();
                    date_month.clear();
                    date_day.clear();
                }
                b"pubs:text" => in_text = true,
                b"pubs:keyword" => in_keyword = true,
                b"pubs:year" => in_year = true,
                b"pubs:month" => in_month = true,
                b"pubs:day" => in_day = true,
                b"pubs:begin-page" => in_begin_page = true,
                b"pubs:end-page" => in_end_page = true,
                b"pubs:user" | b"pubs:person" => current_user = Some(SympUser::default()),
                b"pubs:username" => in_username = true,
                b"pubs:last-name" => in_last_name = true,
                b"pubs:first-name" => in_first_name = true,
                b"pubs:initials" => in_initials = true,
                b"pubs:email-address" => in_email = true,
                b"pubs:id" => {
                    // the entry id, not a per-user or per-record id
                    in_pubs_id = current_source.is_none() && current_user.is_none();
                }
                b"dcterms:replaces" => in_replaces = true,
                b"atom:content" | b"content" => in_body = true,
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                if in_pubs_id {
                    atom.external_id = Some(text);
                } else if in_replaces {
                    atom.replaces_pid = Some(text);
                } else if in_body {
                    atom.body = Some(text);
                } else if let Some(ref mut user) = current_user {
                    if in_username {
                        user.username = text;
                    } else if in_last_name {
                        user.last_name = text;
                    } else if in_first_name {
                        user.first_name = text;
                    } else if in_initials {
                        user.initials = text;
                    } else if in_email {
                        user.email = text;
                    }
                } else if let Some(ref mut source) = current_source {
                    if in_source_name {
                        source.name = text;
                    } else if in_year {
                        date_year = text;
                    } else if in_month {
                        date_month = text;
                    } else if in_day {
                        date_day = text;
                    } else if in_begin_page {
                        source.pages.get_or_insert_with(SympPages::default).begin_page =
                            Some(text);
                    } else if in_end_page {
                        source.pages.get_or_insert_with(SympPages::default).end_page = Some(text);
                    } else if in_keyword && current_field == "keywords" {
                        source.keywords.push(text);
                    } else if in_text {
                        let slot = match current_field.as_str() {
                            "title" => Some(&mut source.title),
                            "language" => Some(&mut source.language),
                            "abstract" => Some(&mut source.abstract_text),
                            "volume" => Some(&mut source.volume),
                            "issue" => Some(&mut source.issue),
                            "publisher" => Some(&mut source.publisher),
                            "journal" => Some(&mut source.journal),
                            "doi" => Some(&mut source.doi),
                            _ => None,
                        };
                        if let Some(slot) = slot {
                            *slot = Some(text);
                        }
                    }
                } else if in_text && current_field == "requested-embargo-period" {
                    atom.embargo = Some(text);
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"pubs:record" => {
                    if let Some(source) = current_source.take() {
                        atom.sources.push(source);
                    }
                }
                b"pubs:source-name" => in_source_name = false,
                b"pubs:text" => in_text = false,
                b"pubs:keyword" => in_keyword = false,
                b"pubs:year" => in_year = false,
                b"pubs:month" => in_month = false,
                b"pubs:day" => in_day = false,
                b"pubs:begin-page" => in_begin_page = false,
                b"pubs:end-page" => in_end_page = false,
                b"pubs:user" | b"pubs:person" => {
                    if let Some(user) = current_user.take() {
                        if !user.username.is_empty() || !user.last_name.is_empty() {
                            atom.users.push(user);
                        }
                    }
                }
                b"pubs:username" => in_username = false,
                b"pubs:last-name" => in_last_name = false,
                b"pubs:first-name" => in_first_name = false,
                b"pubs:initials" => in_initials = false,
                b"pubs:email-address" => in_email = false,
                b"pubs:id" => in_pubs_id = false,
                b"dcterms:replaces" => in_replaces = false,
                b"atom:content" | b"content" => in_body = false,
                b"pubs:field" => {
                    if current_field == "publication-date" && !date_year.is_empty() {
                        if let Some(ref mut source) = current_source {
                            source.publication_date =
                                Some(format_date_parts(&date_year, &date_month, &date_day));
                        }
                    }
                    current_field.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(RepoError::InvalidFormat {
                    message: format!("malformed feed entry: {e}"),
                });
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(atom)
}

/// `YYYY`, `YYYY-MM` or `YYYY-MM-DD` from whatever parts are present.
fn format_date_parts(year: &str, month: &str, day: &str) -> String {
    let mut parts = vec![year.to_string()];
    if !month.is_empty() {
        parts.push(format!("{month:0>2}"));
        if !day.is_empty() {
            parts.push(format!("{day:0>2}"));
        }
    }
    parts.join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embargo::EmbargoDuration;

    const ENTRY: &str = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom"
      xmlns:pubs="http://www.symplectic.co.uk/publications/atom-api"
      xmlns:dcterms="http://purl.org/dc/terms/">
  <entry>
    <pubs:id>44961</pubs:id>
    <atom:category label="publication"/>
    <atom:category label="journal article"/>
    <dcterms:replaces>openrepo:8kq2v</dcterms:replaces>
    <pubs:users>
      <pubs:user>
        <pubs:username>JSMITH</pubs:username>
        <pubs:last-name>Smith</pubs:last-name>
        <pubs:first-name>Jane</pubs:first-name>
        <pubs:initials>JS</pubs:initials>
        <pubs:email-address>jsmith@example.edu</pubs:email-address>
      </pubs:user>
    </pubs:users>
    <pubs:fields>
      <pubs:field name="requested-embargo-period"><pubs:text>1 year</pubs:text></pubs:field>
    </pubs:fields>
    <pubs:records>
      <pubs:record>
        <pubs:data-source><pubs:source-name>scopus</pubs:source-name></pubs:data-source>
        <pubs:bibliographic-data><pubs:native>
          <pubs:field name="title"><pubs:text>Growth in model organisms</pubs:text></pubs:field>
          <pubs:field name="journal"><pubs:text>Journal of Results</pubs:text></pubs:field>
          <pubs:field name="volume"><pubs:text>12</pubs:text></pubs:field>
          <pubs:field name="publication-date">
            <pubs:date><pubs:year>2023</pubs:year><pubs:month>5</pubs:month></pubs:date>
          </pubs:field>
          <pubs:field name="pagination">
            <pubs:pagination><pubs:begin-page>101</pubs:begin-page><pubs:end-page>118</pubs:end-page></pubs:pagination>
          </pubs:field>
          <pubs:field name="keywords">
            <pubs:keywords><pubs:keyword>growth</pubs:keyword><pubs:keyword>models</pubs:keyword></pubs:keywords>
          </pubs:field>
        </pubs:native></pubs:bibliographic-data>
      </pubs:record>
      <pubs:record>
        <pubs:data-source><pubs:source-name>pubmed</pubs:source-name></pubs:data-source>
        <pubs:bibliographic-data><pubs:native>
          <pubs:field name="title"><pubs:text>Growth in model organisms (PubMed)</pubs:text></pubs:field>
          <pubs:field name="abstract"><pubs:text>We survey growth.</pubs:text></pubs:field>
          <pubs:field name="doi"><pubs:text>10.1234/growth.5</pubs:text></pubs:field>
          <pubs:field name="publisher"><pubs:text>Results Press</pubs:text></pubs:field>
        </pubs:native></pubs:bibliographic-data>
      </pubs:record>
    </pubs:records>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_entry_fields() {
        let atom = SympAtom::from_xml(ENTRY).unwrap();
        assert_eq!(atom.external_id.as_deref(), Some("44961"));
        assert_eq!(atom.publication_type(), Some("journal article"));
        assert_eq!(atom.replaces_pid.as_deref(), Some("openrepo:8kq2v"));
        assert_eq!(atom.embargo.as_deref(), Some("1 year"));
        assert_eq!(atom.users.len(), 1);
        assert_eq!(atom.users[0].username, "JSMITH");
        assert_eq!(atom.sources.len(), 2);
    }

    #[test]
    fn test_source_priority_picks_first_nonempty() {
        let atom = SympAtom::from_xml(ENTRY).unwrap();
        // scopus outranks pubmed for a field both carry
        assert_eq!(atom.title(), Some("Growth in model organisms"));
        // scopus has no abstract or doi, so pubmed wins those
        assert_eq!(atom.abstract_text(), Some("We survey growth."));
        assert_eq!(atom.doi(), Some("10.1234/growth.5"));
        assert_eq!(atom.journal(), Some("Journal of Results"));
        assert_eq!(atom.publication_date(), Some("2023-05"));
    }

    #[test]
    fn test_pages_and_keywords() {
        let atom = SympAtom::from_xml(ENTRY).unwrap();
        let pages = atom.pages().unwrap();
        assert_eq!(pages.begin_page.as_deref(), Some("101"));
        assert_eq!(pages.end_page.as_deref(), Some("118"));
        assert_eq!(atom.keywords(), vec!["growth", "models"]);
    }

    #[test]
    fn test_to_mods_merges_and_computes_embargo() {
        let atom = SympAtom::from_xml(ENTRY).unwrap();
        let mods = atom.to_mods();
        assert_eq!(mods.title(), Some("Growth in model organisms"));
        assert_eq!(mods.journal_title(), Some("Journal of Results"));
        assert_eq!(mods.publisher(), Some("Results Press"));
        assert_eq!(
            mods.final_version.as_ref().unwrap().doi.as_deref(),
            Some("doi:10.1234/growth.5")
        );
        assert_eq!(mods.authors.len(), 1);
        assert_eq!(mods.authors[0].id.as_deref(), Some("jsmith"));
        assert_eq!(mods.embargo_duration, EmbargoDuration::OneYear);
        // 1 year from 2023-05, rounded up to the first of the next month
        assert_eq!(mods.embargo_end.as_deref(), Some("2024-06-01"));
    }

    #[test]
    fn test_fallback_source_when_priority_list_misses() {
        let xml = r#"<feed xmlns:pubs="http://www.symplectic.co.uk/publications/atom-api"><entry>
          <pubs:id>7</pubs:id>
          <pubs:records><pubs:record>
            <pubs:data-source><pubs:source-name>manual-entry</pubs:source-name></pubs:data-source>
            <pubs:bibliographic-data><pubs:native>
              <pubs:field name="title"><pubs:text>Hand-entered title</pubs:text></pubs:field>
            </pubs:native></pubs:bibliographic-data>
          </pubs:record></pubs:records>
        </entry></feed>"#;
        let atom = SympAtom::from_xml(xml).unwrap();
        assert_eq!(atom.title(), Some("Hand-entered title"));
    }
}
