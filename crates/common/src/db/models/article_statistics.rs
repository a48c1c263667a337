//! Per-quarter view and download counters
//!
//! One row per (pid, year, quarter); the unique key makes concurrent
//! increments safe with an atomic upsert.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "article_statistics")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(column_type = "Text")]
    pub pid: String,

    pub year: i32,

    /// 1 through 4
    pub quarter: i16,

    pub num_views: i64,

    pub num_downloads: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
