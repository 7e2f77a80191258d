//! # relsync-core
//!
//! A Rust library that keeps a "title → edition" relation in a digital-object repository in line
//! with what a search index says the title contains.
//!
//! ## Overview
//!
//! A parent record (a newspaper title) declares in its metadata which children (editions)
//! belong to it: an identifier plus an issue-date range. The search index answers which children
//! match; the repository holds the `isPartOf` edges that are linked now. relsync-core computes
//! the difference and applies it, one edge at a time.
//!
//! Repositories protect published records: the relations of an Active record cannot be changed.
//! The edge mutator handles this transparently by unpublishing the child, retrying, and always
//! republishing it afterwards.
//!
//! ### Key Features
//!
//! - **Set reconciliation**: Exact add/remove work items, adds first, deterministic order
//! - **Lifecycle-aware mutation**: Unpublish, mutate, republish, with the restore guaranteed
//! - **Partial failure reporting**: Failed items are collected per parent, the rest still run
//! - **Bounded concurrency**: Independent parents reconciled in parallel
//! - **Event streaming**: Linked/Unlinked/Failed notifications per work item
//!
//! ## Architecture
//!
//! - **[`reconcile`]**: Pure set difference between wanted and linked children
//! - **[`mutator`]**: `EdgeMutator` and the `UnpublishGuard` state machine
//! - **[`maintainer`]**: Per-parent jobs and batch runs (`RelationMaintainer`)
//! - **[`repository`]**: The collaborator traits (`EdgeQuery`, `EdgeStore`, `DatastreamSource`)
//! - **[`memory`]**: In-process repository with fault injection
//! - **`db`**: Sqlite repository (`service` feature)
//! - **[`metadata`]**: Matching rule extraction from MODS documents
//! - **[`properties`]**: Identifiers, edges, criteria and work items
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use relsync_core::{
//!     config::MaintainerConfig, maintainer::RelationMaintainer, memory::MemoryRepository,
//!     properties::Pid,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MaintainerConfig::default();
//!     let repo = MemoryRepository::new();
//!     let maintainer = RelationMaintainer::new(&repo, &repo, &config)?;
//!
//!     let report = maintainer.maintain(&Pid::from("uuid:title")).await?;
//!     println!("added {}, removed {}", report.added.len(), report.removed.len());
//!     report.into_result()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `service`: Sqlite-backed repository (`db` module)
//! - `bin`: The `relsync` command-line tool

pub mod config;
#[cfg(feature = "service")]
pub mod db;
pub mod error;
pub mod event;
pub mod maintainer;
pub mod memory;
pub mod metadata;
pub mod mutator;
pub mod properties;
pub mod reconcile;
pub mod repository;
#[cfg(test)]
mod tests;

pub use error::*;
