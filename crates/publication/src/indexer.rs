//! Index document construction
//!
//! Flattens an [`Article`] into the search schema and pushes it to the
//! index. The index is a derived view: the object store stays
//! authoritative and a failed submission can always be replayed.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument};

use openrepo_common::errors::Result;
use openrepo_common::pdf;
use openrepo_common::pidman::Pid;
use openrepo_common::solr::IndexDocument;
use openrepo_common::RepoContext;

use crate::article::Article;
use crate::symp::SympAtom;

pub struct Indexer {
    ctx: Arc<RepoContext>,
}

/// `lower|Original` pairs let the index sort case-insensitively while
/// faceting on the display form.
fn sortable(value: &str) -> String {
    format!("{}|{}", value.to_lowercase(), value)
}

impl Indexer {
    pub fn new(ctx: Arc<RepoContext>) -> Self {
        Self { ctx }
    }

    #[instrument(skip(self, article), fields(pid = %article.pid()))]
    pub async fn submit(&self, article: &Article) -> Result<()> {
        let doc = self.index_data(article).await?;
        self.ctx.index.submit(doc).await
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, pid: &Pid) -> Result<()> {
        self.ctx.index.remove(&pid.to_string()).await
    }

    /// Builds the flat index record for an article.
    pub async fn index_data(&self, article: &Article) -> Result<IndexDocument> {
        let profile = article.profile();
        let mods = article.mods();

        let mut doc = IndexDocument {
            pid: profile.pid.to_string(),
            pidspace: Some(profile.pid.pidspace().to_string()),
            state: Some(profile.state.as_str().to_string()),
            content_model: profile.content_models.first().cloned(),
            owner: profile.owners.clone(),
            title: mods.full_title(),
            abstract_text: mods.abstract_text.clone(),
            pubyear: mods.publication_year(),
            journal_title: mods.journal_title().map(String::from),
            embargo_end: mods.embargo_end.clone(),
            created: Some(profile.created),
            last_modified: Some(profile.last_modified),
            keyword_facet: mods.keywords.clone(),
            funder_facet: mods.funders.iter().map(|f| f.name.clone()).collect(),
            ..IndexDocument::default()
        };

        doc.title_sorting = doc.title.as_deref().map(sortable);
        doc.journal_title_sorting = doc.journal_title.as_deref().map(sortable);
        doc.journal_title_facet = doc.journal_title.clone();

        for author in &mods.authors {
            let sort_name = author.sort_name();
            doc.creator.push(match &author.id {
                Some(login) => format!("{login}:{sort_name}"),
                None => sort_name.clone(),
            });
            doc.creator_facet.push(sort_name.clone());
            if let Some(affiliation) = &author.affiliation {
                if !doc.affiliations_facet.contains(affiliation) {
                    doc.affiliations_facet.push(affiliation.clone());
                }
                doc.author_affiliation_facet
                    .push(format!("{sort_name}:{affiliation}"));
            }
        }
        doc.creator_sorting = doc.creator_facet.first().map(|n| sortable(n));
        // affiliations double as department short names until a
        // directory feed supplies separate codes
        doc.department_shortname_facet = doc.affiliations_facet.clone();
        doc.division_dept_id = doc
            .affiliations_facet
            .iter()
            .filter(|a| a.contains(':'))
            .cloned()
            .collect();

        doc.researchfield = mods.subjects.iter().map(|s| s.topic.clone()).collect();
        doc.researchfield_facet = doc.researchfield.clone();
        doc.researchfield_sorting = doc.researchfield.first().map(|t| sortable(t));

        doc.review_date = article
            .provenance()
            .review_date()
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string());
        doc.pmcid = article.pmcid().map(|n| format!("PMC{n}"));

        // the search corpus is access-gated: no full text while embargoed
        let embargoed = article
            .embargo_end_date()
            .is_some_and(|end| Utc::now().date_naive() < end);
        if !embargoed {
            doc.fulltext = self.fulltext(article).await?;
        } else {
            debug!(pid = %profile.pid, "embargoed, omitting fulltext");
        }

        Ok(doc)
    }

    /// Extracted PDF text, or the feed entry body when the article has
    /// no usable PDF.
    async fn fulltext(&self, article: &Article) -> Result<Option<String>> {
        if let Some(bytes) = article.pdf_bytes().await? {
            if let Some(text) = pdf::extract_text(&bytes) {
                return Ok(Some(text));
            }
        }
        if let Some(bytes) = article.symp_atom_bytes().await? {
            if let Ok(xml) = std::str::from_utf8(&bytes) {
                if let Ok(atom) = SympAtom::from_xml(xml) {
                    return Ok(atom.body.filter(|b| !b.is_empty()));
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mods::{Author, Journal};
    use openrepo_common::auth::Caller;
    use openrepo_common::config::{PidmanConfig, RepositoryConfig};
    use openrepo_common::fedora::MemoryStore;
    use openrepo_common::pidman::Minter;
    use openrepo_common::solr::{MemoryIndex, SearchQuery};

    fn test_ctx() -> Arc<RepoContext> {
        let config = RepositoryConfig {
            pidspace: "openrepo".into(),
            collection_pid: "openrepo:collection".into(),
            admin_users: vec![],
            harvest_users: vec![],
            reports_dir: "/tmp".into(),
            base_url: "http://repo.example.edu".into(),
        };
        let pidman = PidmanConfig {
            host: None,
            domain: None,
            naan: "25593".into(),
            dev_fallback: true,
            timeout_secs: 5,
        };
        Arc::new(
            RepoContext::new(
                Arc::new(MemoryStore::new()),
                Arc::new(MemoryIndex::new()),
                Arc::new(Minter::new(pidman).unwrap()),
                &config,
            )
            .unwrap(),
        )
    }

    async fn saved_article(ctx: &Arc<RepoContext>) -> Article {
        let caller = Caller::user("jsmith");
        let mut article = Article::create(ctx.clone(), "draft").await.unwrap();
        let mods = article.mods_mut();
        mods.set_title("Stents and outcomes");
        mods.authors.push(Author {
            id: Some("jsmith".into()),
            family_name: "Smith".into(),
            given_name: "Jane".into(),
            affiliation: Some("Cardiology".into()),
        });
        mods.authors.push(Author {
            id: None,
            family_name: "Doe".into(),
            given_name: "John".into(),
            affiliation: None,
        });
        mods.journal = Some(Journal {
            title: Some("Journal of Results".into()),
            publisher: Some("Results Press".into()),
            ..Default::default()
        });
        mods.publication_date = Some("2024-02".into());
        mods.keywords.push("stents".into());
        article.save("deposit", &caller).await.unwrap();
        article
    }

    #[tokio::test]
    async fn test_index_data_flattens_metadata() {
        let ctx = test_ctx();
        let article = saved_article(&ctx).await;
        let indexer = Indexer::new(ctx);

        let doc = indexer.index_data(&article).await.unwrap();
        assert_eq!(doc.pid, article.pid().to_string());
        assert_eq!(doc.pidspace.as_deref(), Some("openrepo"));
        assert_eq!(doc.state.as_deref(), Some("unpublished"));
        assert_eq!(doc.title.as_deref(), Some("Stents and outcomes"));
        assert_eq!(doc.pubyear, Some(2024));
        assert_eq!(doc.creator, ["jsmith:Smith, Jane", "Doe, John"]);
        assert_eq!(
            doc.creator_sorting.as_deref(),
            Some("smith, jane|Smith, Jane")
        );
        assert_eq!(doc.affiliations_facet, ["Cardiology"]);
        assert_eq!(doc.keyword_facet, ["stents"]);
        assert_eq!(
            doc.journal_title_sorting.as_deref(),
            Some("journal of results|Journal of Results")
        );
    }

    #[tokio::test]
    async fn test_submit_and_remove() {
        let ctx = test_ctx();
        let article = saved_article(&ctx).await;
        let indexer = Indexer::new(ctx.clone());

        indexer.submit(&article).await.unwrap();
        let results = ctx
            .index
            .search(SearchQuery::new().filter("pid", article.pid().to_string()))
            .await
            .unwrap();
        assert_eq!(results.total, 1);

        indexer.remove(article.pid()).await.unwrap();
        let results = ctx
            .index
            .search(SearchQuery::new().filter("pid", article.pid().to_string()))
            .await
            .unwrap();
        assert_eq!(results.total, 0);
    }

    #[tokio::test]
    async fn test_embargoed_article_has_no_fulltext() {
        let ctx = test_ctx();
        let caller = Caller::user("jsmith");
        let mut article = saved_article(&ctx).await;
        // far-future embargo
        article.mods_mut().embargo_end = Some("2999-01-01".into());
        article.save("embargo", &caller).await.unwrap();

        let atom = br#"<feed xmlns:pubs="http://www.symplectic.co.uk/publications/atom-api">
          <entry><pubs:id>9</pubs:id><content>body text here</content></entry></feed>"#;
        article.set_symp_atom(atom.to_vec());
        article.save("feed", &caller).await.unwrap();

        let indexer = Indexer::new(ctx);
        let doc = indexer.index_data(&article).await.unwrap();
        assert!(doc.fulltext.is_none());

        let mut article = article;
        article.mods_mut().embargo_end = None;
        let doc = indexer.index_data(&article).await.unwrap();
        assert_eq!(doc.fulltext.as_deref(), Some("body text here"));
    }
}
