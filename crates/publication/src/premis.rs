//! PREMIS-like provenance log
//!
//! Append-only event history stored as the `provenanceMetadata`
//! datastream. Events keep insertion order; readers rely on
//! last-of-kind for the review date. The ingest pipeline uses
//! [`ProvenanceLog::has_event`] to avoid duplicate upload and harvest
//! events on retried saves.

use chrono::{DateTime, Utc};
use openrepo_common::errors::Result;
use serde::{Deserialize, Serialize};

pub const PREMIS_NS: &str = "info:lc/xmlns/premis-v2";

/// Event kinds, serialized with their wire names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "upload")]
    Uploaded,
    #[serde(rename = "harvest")]
    Harvested,
    #[serde(rename = "review")]
    Reviewed,
    #[serde(rename = "withdraw")]
    Withdrawn,
    #[serde(rename = "reinstate")]
    Reinstated,
    #[serde(rename = "merge")]
    Merged,
    #[serde(rename = "symp_ingest")]
    SympIngest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventIdentifier {
    #[serde(rename = "eventIdentifierType")]
    pub id_type: String,
    #[serde(rename = "eventIdentifierValue")]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkingAgent {
    #[serde(rename = "linkingAgentIdentifierType")]
    pub agent_type: String,
    #[serde(rename = "linkingAgentIdentifierValue")]
    pub agent_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "eventIdentifier")]
    pub identifier: EventIdentifier,
    #[serde(rename = "eventType")]
    pub kind: EventKind,
    #[serde(rename = "eventDateTime")]
    pub date: DateTime<Utc>,
    #[serde(rename = "eventDetail")]
    pub detail: String,
    #[serde(rename = "linkingAgentIdentifier", skip_serializing_if = "Option::is_none")]
    pub agent: Option<LinkingAgent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectIdentifier {
    #[serde(rename = "objectIdentifierType")]
    pub id_type: String,
    #[serde(rename = "objectIdentifierValue")]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PremisObject {
    #[serde(rename = "objectIdentifier")]
    pub identifier: ObjectIdentifier,
    #[serde(rename = "objectCategory")]
    pub category: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename = "premis")]
pub struct ProvenanceLog {
    #[serde(rename = "@xmlns")]
    #[serde(default = "premis_ns")]
    pub xmlns: String,
    #[serde(rename = "@version", default = "premis_version")]
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<PremisObject>,
    #[serde(rename = "event", default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Event>,
}

fn premis_ns() -> String {
    PREMIS_NS.to_string()
}

fn premis_version() -> String {
    "2.1".to_string()
}

impl ProvenanceLog {
    pub fn new() -> Self {
        Self {
            xmlns: premis_ns(),
            version: premis_version(),
            object: None,
            events: Vec::new(),
        }
    }

    pub fn from_xml(xml: &str) -> Result<Self> {
        Ok(quick_xml::de::from_str(xml)?)
    }

    pub fn to_xml(&self) -> Result<String> {
        let body = quick_xml::se::to_string(self)?;
        Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>{body}"))
    }

    /// Idempotent: sets the header once, later calls leave it alone
    pub fn init_object(&mut self, id: &str, id_type: &str) {
        if self.object.is_none() {
            self.object = Some(PremisObject {
                identifier: ObjectIdentifier {
                    id_type: id_type.to_string(),
                    value: id.to_string(),
                },
                category: "representation".to_string(),
            });
        }
    }

    fn object_id(&self) -> &str {
        self.object
            .as_ref()
            .map(|o| o.identifier.value.as_str())
            .unwrap_or("")
    }

    /// Append an event with a generated local id and the current time
    pub fn append(&mut self, kind: EventKind, actor: Option<&str>, detail: String) {
        let id = format!("{}.ev{:03}", self.object_id(), self.events.len() + 1);
        self.events.push(Event {
            identifier: EventIdentifier {
                id_type: "local".to_string(),
                value: id,
            },
            kind,
            date: Utc::now(),
            detail,
            agent: actor.map(|a| LinkingAgent {
                agent_type: "netid".to_string(),
                agent_id: a.to_string(),
            }),
        });
    }

    /// Copy an event from another object's log. The original date,
    /// detail and agent survive; only the local identifier is
    /// re-numbered for this object.
    pub fn copy_event(&mut self, event: &Event) {
        let id = format!("{}.ev{:03}", self.object_id(), self.events.len() + 1);
        let mut event = event.clone();
        event.identifier = EventIdentifier {
            id_type: "local".to_string(),
            value: id,
        };
        self.events.push(event);
    }

    pub fn has_event(&self, kind: EventKind) -> bool {
        self.events.iter().any(|e| e.kind == kind)
    }

    pub fn last_event_of(&self, kind: EventKind) -> Option<&Event> {
        self.events.iter().rev().find(|e| e.kind == kind)
    }

    /// Date of the most recent review, used by the index
    pub fn review_date(&self) -> Option<DateTime<Utc>> {
        self.last_event_of(EventKind::Reviewed).map(|e| e.date)
    }

    // ====== Named event helpers ======

    pub fn uploaded(&mut self, actor: &str, display_name: &str, legal_statement: &str) {
        let detail = match legal_statement {
            "AUTHOR" => format!("Uploaded by {display_name} upon assent to deposit"),
            "MEDIATED" => format!(
                "Mediated Deposit with Assist Authorization or CC or PD by {display_name}"
            ),
            _ => format!("Uploaded by {display_name} without confirmed assent to deposit"),
        };
        let detail = format!("{detail} under OpenRepo v{}", openrepo_common::VERSION);
        self.append(EventKind::Uploaded, Some(actor), detail);
    }

    pub fn harvested(&mut self, actor: &str, display_name: &str, pmcid: i64) {
        let detail = format!("Harvested PMC{pmcid} from PubMed Central by {display_name}");
        self.append(EventKind::Harvested, Some(actor), detail);
    }

    pub fn reviewed(&mut self, actor: &str, display_name: &str) {
        let detail = format!("Reviewed by {display_name}");
        self.append(EventKind::Reviewed, Some(actor), detail);
    }

    pub fn withdrawn(&mut self, actor: &str, display_name: &str, reason: &str) {
        let detail = format!("Withdrawn by {display_name}: {reason}");
        self.append(EventKind::Withdrawn, Some(actor), detail);
    }

    pub fn reinstated(&mut self, actor: &str, display_name: &str, reason: Option<&str>) {
        let reason = reason.unwrap_or("No reason given.");
        let detail = format!("Reinstated (from withdrawal) by {display_name}: {reason}");
        self.append(EventKind::Reinstated, Some(actor), detail);
    }

    pub fn merged(&mut self, original_pid: &str, duplicate_pid: &str) {
        let detail = format!("{duplicate_pid} merged with {original_pid} by Administrator");
        self.append(EventKind::Merged, None, detail);
    }

    pub fn symp_ingest(&mut self, actor: &str, display_name: &str, external_id: &str) {
        let detail = format!("Ingested {external_id} from Symplectic-Elements by {display_name}");
        self.append(EventKind::SympIngest, Some(actor), detail);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_for(pid: &str) -> ProvenanceLog {
        let mut log = ProvenanceLog::new();
        log.init_object(pid, "pid");
        log
    }

    #[test]
    fn test_init_object_idempotent() {
        let mut log = log_for("oe:1");
        log.init_object("oe:other", "pid");
        assert_eq!(log.object.as_ref().unwrap().identifier.value, "oe:1");
        assert_eq!(log.object.as_ref().unwrap().category, "representation");
    }

    #[test]
    fn test_event_ids_are_sequential() {
        let mut log = log_for("oe:1");
        log.uploaded("jsmith", "Jane Smith", "AUTHOR");
        log.reviewed("curator", "Cary Curator");
        log.reviewed("curator", "Cary Curator");
        let ids: Vec<&str> = log
            .events
            .iter()
            .map(|e| e.identifier.value.as_str())
            .collect();
        assert_eq!(ids, ["oe:1.ev001", "oe:1.ev002", "oe:1.ev003"]);
    }

    #[test]
    fn test_upload_detail_per_statement() {
        let mut log = log_for("oe:1");
        log.uploaded("jsmith", "Jane Smith", "AUTHOR");
        assert!(log.events[0]
            .detail
            .starts_with("Uploaded by Jane Smith upon assent to deposit"));
        log.uploaded("jsmith", "Jane Smith", "MEDIATED");
        assert!(log.events[1]
            .detail
            .starts_with("Mediated Deposit with Assist Authorization or CC or PD by Jane Smith"));
    }

    #[test]
    fn test_has_event_and_review_date() {
        let mut log = log_for("oe:1");
        assert!(!log.has_event(EventKind::Uploaded));
        log.uploaded("jsmith", "Jane Smith", "AUTHOR");
        assert!(log.has_event(EventKind::Uploaded));
        assert!(log.review_date().is_none());
        log.reviewed("curator", "Cary Curator");
        let first = log.review_date().unwrap();
        log.reviewed("curator2", "Carl Curator");
        assert!(log.review_date().unwrap() >= first);
        assert_eq!(
            log.last_event_of(EventKind::Reviewed).unwrap().agent.as_ref().unwrap().agent_id,
            "curator2"
        );
    }

    #[test]
    fn test_copy_event_keeps_date_and_agent() {
        let mut legacy = log_for("oe:99");
        legacy.uploaded("kjones", "Kim Jones", "AUTHOR");
        legacy.events[0].date = "2019-06-01T12:00:00Z".parse().unwrap();

        let mut log = log_for("oe:1");
        log.reviewed("curator", "Cary Curator");
        log.copy_event(&legacy.events[0]);

        let copied = &log.events[1];
        assert_eq!(copied.date, legacy.events[0].date);
        assert_eq!(copied.detail, legacy.events[0].detail);
        assert_eq!(copied.agent.as_ref().unwrap().agent_id, "kjones");
        // identifier is re-numbered for the receiving object
        assert_eq!(copied.identifier.value, "oe:1.ev002");
    }

    #[test]
    fn test_xml_round_trip() {
        let mut log = log_for("oe:1");
        log.withdrawn("curator", "Cary Curator", "plagiarism");
        let xml = log.to_xml().unwrap();
        assert!(xml.contains("eventType"));
        assert!(xml.contains("Withdrawn by Cary Curator: plagiarism"));
        let parsed = ProvenanceLog::from_xml(&xml).unwrap();
        assert_eq!(parsed.events.len(), 1);
        assert_eq!(parsed.events[0].kind, EventKind::Withdrawn);
        assert_eq!(parsed.object, log.object);
    }

    #[test]
    fn test_merge_event_has_no_agent() {
        let mut log = log_for("oe:1");
        log.merged("oe:1", "oe:99");
        assert_eq!(
            log.events[0].detail,
            "oe:99 merged with oe:1 by Administrator"
        );
        assert!(log.events[0].agent.is_none());
    }
}
