//! Harvested-record bookkeeping
//!
//! Tracks records pulled from the external PubMed Central queue and
//! their path through the review queue. Status transitions are
//! serialized with row locks; see the repository.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A harvested record's place in the ingest workflow
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HarvestStatus {
    /// Fetched and waiting for review
    Harvested,
    /// Claimed by an ingest in flight
    InProcess,
    /// Turned into a repository object
    Ingested,
    /// Reviewed and rejected
    Ignored,
}

impl From<String> for HarvestStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "in_process" => HarvestStatus::InProcess,
            "ingested" => HarvestStatus::Ingested,
            "ignored" => HarvestStatus::Ignored,
            _ => HarvestStatus::Harvested,
        }
    }
}

impl From<HarvestStatus> for String {
    fn from(status: HarvestStatus) -> Self {
        match status {
            HarvestStatus::Harvested => "harvested".to_string(),
            HarvestStatus::InProcess => "in_process".to_string(),
            HarvestStatus::Ingested => "ingested".to_string(),
            HarvestStatus::Ignored => "ignored".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "harvest_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub pmcid: i64,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    /// Logins of repository users matched as authors
    #[sea_orm(column_type = "JsonBinary")]
    pub authors: serde_json::Value,

    pub harvested: DateTimeWithTimeZone,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    /// Whether the harvested content includes full text
    pub fulltext: bool,

    /// Raw harvested XML, consumed at ingest time
    #[sea_orm(column_type = "Text", nullable)]
    pub content: Option<String>,
}

impl Model {
    pub fn harvest_status(&self) -> HarvestStatus {
        HarvestStatus::from(self.status.clone())
    }

    pub fn author_logins(&self) -> Vec<String> {
        self.authors
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Display form used in review listings and access logs
    pub fn access_url(&self) -> String {
        format!("https://www.ncbi.nlm.nih.gov/pmc/articles/PMC{}/", self.pmcid)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            HarvestStatus::Harvested,
            HarvestStatus::InProcess,
            HarvestStatus::Ingested,
            HarvestStatus::Ignored,
        ] {
            let s: String = status.into();
            assert_eq!(HarvestStatus::from(s), status);
        }
    }

    #[test]
    fn test_unknown_status_defaults_to_harvested() {
        assert_eq!(
            HarvestStatus::from("bogus".to_string()),
            HarvestStatus::Harvested
        );
    }
}
