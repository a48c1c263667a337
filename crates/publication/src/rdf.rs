//! Bibliographic RDF export
//!
//! Describes a published article with the Bibliographic Ontology and
//! FRBR, mirroring the Dublin Core fields, serialized as Turtle for the
//! landing-page export.

use openrepo_common::errors::Result;
use openrepo_common::pdf;

use crate::article::Article;

const NS_RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
const NS_RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";
const NS_BIBO: &str = "http://purl.org/ontology/bibo/";
const NS_FRBR: &str = "http://purl.org/vocab/frbr/core#";
const NS_DC: &str = "http://purl.org/dc/elements/1.1/";

pub fn pmc_access_url(pmcid: i64) -> String {
    format!("https://www.ncbi.nlm.nih.gov/pmc/articles/PMC{pmcid}/")
}

#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Iri(String),
    Literal(String),
}

/// A small in-memory graph about a single subject.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub subject: String,
    pub triples: Vec<(String, Object)>,
}

impl Graph {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            triples: Vec::new(),
        }
    }

    pub fn add_iri(&mut self, predicate: impl Into<String>, object: impl Into<String>) {
        self.triples.push((predicate.into(), Object::Iri(object.into())));
    }

    pub fn add_literal(&mut self, predicate: impl Into<String>, object: impl Into<String>) {
        self.triples
            .push((predicate.into(), Object::Literal(object.into())));
    }

    /// Turtle serialization with the bound prefixes.
    pub fn to_turtle(&self) -> String {
        let mut out = String::new();
        for (prefix, ns) in [
            ("rdf", NS_RDF),
            ("rdfs", NS_RDFS),
            ("bibo", NS_BIBO),
            ("frbr", NS_FRBR),
            ("dc", NS_DC),
        ] {
            out.push_str(&format!("@prefix {prefix}: <{ns}> .\n"));
        }
        out.push('\n');
        out.push_str(&format!("<{}>", self.subject));
        for (i, (predicate, object)) in self.triples.iter().enumerate() {
            let sep = if i == 0 { "\n    " } else { " ;\n    " };
            out.push_str(sep);
            out.push_str(&compact(predicate));
            out.push(' ');
            match object {
                Object::Iri(iri) => out.push_str(&compact(iri)),
                Object::Literal(text) => out.push_str(&turtle_literal(text)),
            }
        }
        out.push_str(" .\n");
        out
    }
}

/// Prefixed name for IRIs in a bound namespace, `<…>` otherwise
fn compact(iri: &str) -> String {
    for (prefix, ns) in [
        ("rdf", NS_RDF),
        ("rdfs", NS_RDFS),
        ("bibo", NS_BIBO),
        ("frbr", NS_FRBR),
        ("dc", NS_DC),
    ] {
        if let Some(local) = iri.strip_prefix(ns) {
            return format!("{prefix}:{local}");
        }
    }
    format!("<{iri}>")
}

fn turtle_literal(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r");
    format!("\"{escaped}\"")
}

/// Bibliographic graph for one article: typed as an academic article
/// and a scholarly work, with the DC mirror and a pointer to the PubMed
/// Central copy when one exists.
pub async fn article_graph(article: &Article, subject_uri: &str) -> Result<Graph> {
    let mut graph = Graph::new(subject_uri);

    graph.add_iri(format!("{NS_RDF}type"), format!("{NS_BIBO}AcademicArticle"));
    graph.add_iri(format!("{NS_RDF}type"), format!("{NS_FRBR}ScholarlyWork"));

    if let Some(pages) = article.pdf_bytes().await?.as_deref().and_then(pdf::page_count) {
        graph.add_literal(format!("{NS_BIBO}numPages"), pages.to_string());
    }

    let pmc_url = article.pmcid().map(pmc_access_url);
    if let Some(url) = &pmc_url {
        graph.add_iri(format!("{NS_RDFS}seeAlso"), url.clone());
    }

    let dc = article.dc();
    for title in &dc.titles {
        graph.add_literal(format!("{NS_DC}title"), title.clone());
    }
    for contributor in &dc.contributors {
        graph.add_literal(format!("{NS_DC}contributor"), contributor.clone());
    }
    for kind in &dc.types {
        graph.add_literal(format!("{NS_DC}type"), kind.clone());
    }
    if let Some(language) = &dc.language {
        graph.add_literal(format!("{NS_DC}language"), language.clone());
    }
    if let Some(format_name) = &dc.format {
        graph.add_literal(format!("{NS_DC}format"), format_name.clone());
    }
    if let Some(description) = &dc.description {
        graph.add_literal(format!("{NS_DC}description"), description.clone());
    }
    for subject in &dc.subjects {
        graph.add_literal(format!("{NS_DC}subject"), subject.clone());
    }
    if let Some(publisher) = &dc.publisher {
        graph.add_literal(format!("{NS_DC}publisher"), publisher.clone());
    }
    if let Some(date) = &dc.date {
        graph.add_literal(format!("{NS_DC}date"), date.clone());
    }
    if let Some(source) = &dc.source {
        graph.add_literal(format!("{NS_DC}source"), source.clone());
    }
    for identifier in &dc.identifiers {
        // the PMC copy is already linked via rdfs:seeAlso
        if pmc_url.as_deref() == Some(identifier.as_str()) {
            continue;
        }
        if article.pmcid().map(|n| format!("PMC{n}")).as_deref() == Some(identifier.as_str()) {
            continue;
        }
        graph.add_literal(format!("{NS_DC}identifier"), identifier.clone());
    }
    if let Some(rights) = &dc.rights {
        graph.add_literal(format!("{NS_DC}rights"), rights.clone());
    }

    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turtle_shape() {
        let mut graph = Graph::new("http://repo.example.edu/publications/openrepo:x1");
        graph.add_iri(format!("{NS_RDF}type"), format!("{NS_BIBO}AcademicArticle"));
        graph.add_literal(format!("{NS_DC}title"), "Stents \"and\" outcomes");

        let turtle = graph.to_turtle();
        assert!(turtle.contains("@prefix bibo: <http://purl.org/ontology/bibo/> ."));
        assert!(turtle.contains("rdf:type bibo:AcademicArticle ;"));
        assert!(turtle.contains("dc:title \"Stents \\\"and\\\" outcomes\" ."));
        assert!(turtle.starts_with("@prefix"));
    }

    #[test]
    fn test_turtle_compacts_iri_objects() {
        let mut graph = Graph::new("http://repo.example.edu/publications/openrepo:x1");
        graph.add_iri(format!("{NS_RDF}type"), format!("{NS_FRBR}ScholarlyWork"));
        graph.add_iri(format!("{NS_RDFS}seeAlso"), pmc_access_url(2001395));

        let turtle = graph.to_turtle();
        assert!(turtle.contains("rdf:type frbr:ScholarlyWork ;"));
        // objects outside the bound namespaces stay full IRIs
        assert!(turtle.contains(
            "rdfs:seeAlso <https://www.ncbi.nlm.nih.gov/pmc/articles/PMC2001395/> ."
        ));
    }

    #[test]
    fn test_pmc_access_url() {
        assert_eq!(
            pmc_access_url(3426130),
            "https://www.ncbi.nlm.nih.gov/pmc/articles/PMC3426130/"
        );
    }

    #[test]
    fn test_compact_unknown_namespace_stays_iri() {
        assert_eq!(compact("http://example.org/p"), "<http://example.org/p>");
        assert_eq!(compact(&format!("{NS_DC}title")), "dc:title");
    }
}
