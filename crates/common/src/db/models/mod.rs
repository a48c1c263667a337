//! SeaORM entity models
//!
//! Relational side of the repository: usage statistics, the harvested-
//! record queue and the featured-article list. Article content itself
//! lives in the object store, keyed here by pid string only.

mod article_statistics;
mod featured_article;
mod harvest_record;

pub use article_statistics::{
    ActiveModel as ArticleStatisticsActiveModel, Column as ArticleStatisticsColumn,
    Entity as ArticleStatisticsEntity, Model as ArticleStatistics,
};

pub use harvest_record::{
    ActiveModel as HarvestRecordActiveModel, Column as HarvestRecordColumn,
    Entity as HarvestRecordEntity, HarvestStatus, Model as HarvestRecord,
};

pub use featured_article::{
    ActiveModel as FeaturedArticleActiveModel, Column as FeaturedArticleColumn,
    Entity as FeaturedArticleEntity, Model as FeaturedArticle,
};
