//! docshard - paginated, sorted queries over partitioned document stores
//!
//! A logical store is split into independent partitions. Each partition
//! answers queries on its own; the composite layer fans a query out, merges
//! the local pages into one globally ordered page and hands back a token
//! that resumes the scan.

pub mod cli;
pub mod composite;
pub mod config;
pub mod document;
pub mod errors;
pub mod locator;
pub mod observability;
pub mod partition;
