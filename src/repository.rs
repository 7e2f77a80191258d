//! The collaborator interfaces the reconciliation core consumes.
//!
//! - [`EdgeQuery`]: the search index, answering "which children should be linked?"
//! - [`EdgeStore`]: the repository holding relations and record lifecycle state
//! - [`DatastreamSource`]: read access to a record's metadata streams
//!
//! Implementations live in [`crate::memory`] (in-process) and `crate::db` (sqlite, `service`
//! feature).

use std::future::Future;

use crate::{
    error::RelsyncError,
    properties::{Edge, LifecycleState, MatchCriteria, Pid, Predicate},
};

pub trait EdgeQuery: Sync {
    /// All children matching the criteria. Must be idempotent and free of side effects.
    fn find(
        &self,
        criteria: &MatchCriteria,
    ) -> impl Future<Output = Result<Vec<Pid>, RelsyncError>> + Send;
}

pub trait EdgeStore: Sync {
    /// All edges with the given predicate whose object is `parent`.
    fn inverse_edges(
        &self,
        parent: &Pid,
        predicate: &Predicate,
    ) -> impl Future<Output = Result<Vec<Edge>, RelsyncError>> + Send;

    /// All outgoing edges with the given predicate from `child`, optionally restricted to those
    /// pointing at `object`.
    fn named_edges(
        &self,
        child: &Pid,
        predicate: &Predicate,
        object: Option<&Pid>,
    ) -> impl Future<Output = Result<Vec<Edge>, RelsyncError>> + Send;

    /// Add `child --predicate--> parent`. Fails with [RelsyncError::Obstacle] while the child is
    /// published.
    fn add_edge(
        &self,
        child: &Pid,
        predicate: &Predicate,
        parent: &Pid,
        comment: &str,
    ) -> impl Future<Output = Result<(), RelsyncError>> + Send;

    /// Delete `child --predicate--> parent`. Same failure modes as [EdgeStore::add_edge].
    fn delete_edge(
        &self,
        child: &Pid,
        predicate: &Predicate,
        parent: &Pid,
        comment: &str,
    ) -> impl Future<Output = Result<(), RelsyncError>> + Send;

    fn set_state(
        &self,
        record: &Pid,
        state: LifecycleState,
        comment: &str,
    ) -> impl Future<Output = Result<(), RelsyncError>> + Send;
}

pub trait DatastreamSource: Sync {
    /// The textual content of the named datastream of `record`.
    fn datastream(
        &self,
        record: &Pid,
        name: &str,
    ) -> impl Future<Output = Result<String, RelsyncError>> + Send;
}
