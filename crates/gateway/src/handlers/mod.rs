//! API handlers module

pub mod articles;
pub mod download;
pub mod health;
pub mod ingest;
pub mod search;
