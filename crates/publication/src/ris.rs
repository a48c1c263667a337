//! RIS citation export
//!
//! Plain-text bibliographic record for citation managers. RIS tags are
//! two characters, two spaces, a hyphen and the value; records use CRLF
//! line endings and close with `ER  - `.

use crate::mods::PublicationMods;

const PROVIDER: &str = "OpenRepo";
const DATABASE: &str = "OpenRepo Institutional Repository";

fn tag(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str("  - ");
    out.push_str(value);
    out.push_str("\r\n");
}

/// Renders one journal-article record with its provider header.
pub fn render(mods: &PublicationMods, article_url: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("Provider: {PROVIDER}\r\n"));
    out.push_str(&format!("Database: {DATABASE}\r\n"));
    out.push_str("Content: text/plain; charset=\"UTF-8\"\r\n");
    out.push_str("\r\n");

    tag(&mut out, "TY", "JOUR");
    if let Some(info) = &mods.title_info {
        if let Some(title) = &info.title {
            tag(&mut out, "TI", title);
        }
        if let Some(subtitle) = &info.subtitle {
            tag(&mut out, "T2", subtitle);
        }
    }
    for author in &mods.authors {
        tag(&mut out, "AU", &author.sort_name());
    }
    if let Some(journal) = &mods.journal {
        if let Some(title) = &journal.title {
            tag(&mut out, "JO", title);
        }
        if let Some(publisher) = &journal.publisher {
            tag(&mut out, "PB", publisher);
        }
        if let Some(volume) = &journal.volume {
            tag(&mut out, "VL", volume);
        }
        if let Some(issue) = &journal.issue {
            tag(&mut out, "IS", issue);
        }
        if let Some(pages) = &journal.pages {
            if let Some(start) = &pages.start {
                tag(&mut out, "SP", start);
            }
            if let Some(end) = &pages.end {
                tag(&mut out, "EP", end);
            }
        }
    }
    if let Some(year) = mods.publication_year() {
        tag(&mut out, "PY", &year.to_string());
    }
    if let Some(date) = &mods.publication_date {
        // DA wants a full date; partial dates only emit PY
        if date.len() == 10 {
            tag(&mut out, "DA", date);
        }
    }
    for keyword in &mods.keywords {
        tag(&mut out, "KW", keyword);
    }
    if let Some(doi) = mods.final_version.as_ref().and_then(|f| f.doi.as_deref()) {
        tag(&mut out, "DO", doi);
    }
    if let Some(language) = &mods.language {
        tag(&mut out, "LA", &language.name);
    }
    tag(&mut out, "UR", article_url);
    tag(&mut out, "ER", "");

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mods::{Author, FinalVersion, Journal, PageRange, TitleInfo};

    fn complete_mods() -> PublicationMods {
        let mut mods = PublicationMods::article_defaults();
        mods.title_info = Some(TitleInfo {
            title: Some("A very scholarly article".into()),
            subtitle: Some("A love story".into()),
            ..Default::default()
        });
        mods.authors.push(Author {
            id: None,
            family_name: "Mouse".into(),
            given_name: "Mickey".into(),
            affiliation: None,
        });
        mods.authors.push(Author {
            id: None,
            family_name: "Mouse".into(),
            given_name: "Minnie".into(),
            affiliation: None,
        });
        mods.journal = Some(Journal {
            title: Some("Journal of Important Things".into()),
            publisher: Some("Big Deal Publications".into()),
            volume: Some("11".into()),
            issue: Some("5".into()),
            pages: Some(PageRange {
                start: Some("1742".into()),
                end: Some("2637".into()),
            }),
        });
        mods.publication_date = Some("2011-08-24".into());
        mods.keywords = vec!["Atlanta".into(), "rumba".into()];
        mods.final_version = Some(FinalVersion {
            url: None,
            doi: Some("doi:42.1234/1-2-3-4".into()),
        });
        mods
    }

    #[test]
    fn test_full_record() {
        let ris = render(
            &complete_mods(),
            "http://repo.example.edu/publications/openrepo:x1",
        );
        assert!(ris.starts_with("Provider: "));
        assert!(ris.contains("Database: "));
        assert!(ris.contains("Content: "));
        assert!(ris.contains("\r\n\r\nTY  - JOUR\r\n"));
        assert!(ris.contains("TI  - A very scholarly article\r\n"));
        assert!(ris.contains("T2  - A love story\r\n"));
        assert!(ris.contains("AU  - Mouse, Mickey\r\n"));
        assert!(ris.contains("AU  - Mouse, Minnie\r\n"));
        assert!(ris.contains("JO  - Journal of Important Things\r\n"));
        assert!(ris.contains("PB  - Big Deal Publications\r\n"));
        assert!(ris.contains("VL  - 11\r\n"));
        assert!(ris.contains("IS  - 5\r\n"));
        assert!(ris.contains("SP  - 1742\r\n"));
        assert!(ris.contains("EP  - 2637\r\n"));
        assert!(ris.contains("PY  - 2011\r\n"));
        assert!(ris.contains("DA  - 2011-08-24\r\n"));
        assert!(ris.contains("KW  - Atlanta\r\n"));
        assert!(ris.contains("DO  - doi:42.1234/1-2-3-4\r\n"));
        assert!(ris.contains("LA  - English\r\n"));
        assert!(ris.contains("UR  - http://repo.example.edu/publications/openrepo:x1\r\n"));
        assert!(ris.ends_with("ER  - \r\n"));
    }

    #[test]
    fn test_partial_date_omits_da() {
        let mut mods = complete_mods();
        mods.publication_date = Some("2011-08".into());
        let ris = render(&mods, "http://repo.example.edu/publications/openrepo:x1");
        assert!(ris.contains("PY  - 2011\r\n"));
        assert!(!ris.contains("DA  - "));
    }
}
