//! Applying one [WorkItem] to the repository.
//!
//! Published (Active) records refuse relation changes. When a direct change is rejected with
//! [RelsyncError::Obstacle], the child is unpublished through an [UnpublishGuard], the change is
//! retried once, and the guard republishes the record whether or not the retry succeeded:
//!
//! ```text
//! Direct ──ok──────────────────────────────> Done
//!   │ Obstacle
//!   v
//! Unpublished: set Inactive -> retry -> set Active (always) ──> Done | error
//! ```
//!
//! Any other failure of the direct attempt is returned untouched and never retried.

use crate::{
    config::RelationConfig,
    error::RelsyncError,
    properties::{LifecycleState, Pid, WorkItem},
    repository::EdgeStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeOp {
    Add,
    Delete,
}

/// Holds a record in [LifecycleState::Inactive] until [UnpublishGuard::release] republishes it.
///
/// Republishing talks to the repository and is therefore async, so it cannot happen in `Drop`.
/// Dropping an unreleased guard only logs the record that was left unpublished.
#[must_use = "an unpublished record stays unpublished until `release` is awaited"]
pub struct UnpublishGuard<'a, S> {
    store: &'a S,
    record: Pid,
    republish_comment: &'a str,
    released: bool,
}

impl<'a, S: EdgeStore> UnpublishGuard<'a, S> {
    pub async fn acquire(
        store: &'a S,
        record: &Pid,
        relation: &'a RelationConfig,
    ) -> Result<UnpublishGuard<'a, S>, RelsyncError> {
        store
            .set_state(record, LifecycleState::Inactive, &relation.unpublish_comment)
            .await?;
        tracing::debug!("[UnpublishGuard] {} set inactive", record);
        Ok(UnpublishGuard {
            store,
            record: record.clone(),
            republish_comment: &relation.republish_comment,
            released: false,
        })
    }

    pub fn record(&self) -> &Pid {
        &self.record
    }

    /// Republish the record.
    pub async fn release(mut self) -> Result<(), RelsyncError> {
        self.released = true;
        let result = self
            .store
            .set_state(&self.record, LifecycleState::Active, self.republish_comment)
            .await;
        match &result {
            Ok(()) => tracing::debug!("[UnpublishGuard] {} set active again", self.record),
            Err(e) => tracing::error!(
                "[UnpublishGuard] {} could not be republished and is left inactive: {}",
                self.record,
                e
            ),
        }
        result
    }
}

impl<S> Drop for UnpublishGuard<'_, S> {
    fn drop(&mut self) {
        if !self.released {
            tracing::error!(
                "[UnpublishGuard] dropped without release, {} is left inactive",
                self.record
            );
        }
    }
}

/// Executes work items for the relation described by a [RelationConfig].
pub struct EdgeMutator<'a, S> {
    store: &'a S,
    relation: &'a RelationConfig,
}

impl<'a, S: EdgeStore> EdgeMutator<'a, S> {
    pub fn new(store: &'a S, relation: &'a RelationConfig) -> Self {
        EdgeMutator { store, relation }
    }

    /// Link or unlink `item`'s child and `parent`.
    ///
    /// Obstacle failures are handled here and never returned. Every other error is returned
    /// after the child's lifecycle state has been restored.
    pub async fn apply(&self, item: &WorkItem, parent: &Pid) -> Result<(), RelsyncError> {
        match item {
            WorkItem::Add(child) => self.link(child, parent).await,
            WorkItem::Remove(child) => self.unlink(child, parent).await,
        }
    }

    async fn link(&self, child: &Pid, parent: &Pid) -> Result<(), RelsyncError> {
        let predicate = &self.relation.predicate;
        let existing = self
            .store
            .named_edges(child, predicate, Some(parent))
            .await?;
        if existing
            .iter()
            .any(|edge| edge.links(child, predicate, parent))
        {
            tracing::debug!("{} already links to {}, nothing to add", child, parent);
            return Ok(());
        }
        self.mutate(EdgeOp::Add, child, parent).await
    }

    async fn unlink(&self, child: &Pid, parent: &Pid) -> Result<(), RelsyncError> {
        let predicate = &self.relation.predicate;
        let existing = self.store.named_edges(child, predicate, None).await?;
        let matching = existing
            .iter()
            .filter(|edge| edge.links(child, predicate, parent))
            .count();
        if matching == 0 {
            tracing::debug!("{} does not link to {}, nothing to remove", child, parent);
            return Ok(());
        }
        for _ in 0..matching {
            self.mutate(EdgeOp::Delete, child, parent).await?;
        }
        Ok(())
    }

    async fn mutate(&self, op: EdgeOp, child: &Pid, parent: &Pid) -> Result<(), RelsyncError> {
        match self.run(op, child, parent).await {
            Ok(()) => Ok(()),
            Err(obstacle) if obstacle.is_obstacle() => {
                tracing::debug!(
                    "{:?} {} -> {} refused ({}), unpublishing and retrying",
                    op,
                    child,
                    parent,
                    obstacle
                );
                self.mutate_unpublished(op, child, parent).await
            }
            Err(e) => Err(e),
        }
    }

    async fn mutate_unpublished(
        &self,
        op: EdgeOp,
        child: &Pid,
        parent: &Pid,
    ) -> Result<(), RelsyncError> {
        let guard = UnpublishGuard::acquire(self.store, child, self.relation).await?;
        let outcome = self
            .run(op, child, parent)
            .await
            .map_err(|e| match e {
                RelsyncError::Obstacle(msg) => RelsyncError::Backend(format!(
                    "{child} still refuses relation changes while unpublished: {msg}"
                )),
                other => other,
            });
        let restored = guard.release().await;
        match (outcome, restored) {
            (outcome, Ok(())) => outcome,
            (Ok(()), Err(restore_err)) => Err(restore_err),
            (Err(mutation_err), Err(restore_err)) => {
                tracing::error!(
                    "{:?} {} -> {} failed while unpublished: {}",
                    op,
                    child,
                    parent,
                    mutation_err
                );
                Err(RelsyncError::Backend(format!(
                    "{mutation_err}; republishing {child} afterwards also failed: {restore_err}"
                )))
            }
        }
    }

    async fn run(&self, op: EdgeOp, child: &Pid, parent: &Pid) -> Result<(), RelsyncError> {
        let predicate = &self.relation.predicate;
        match op {
            EdgeOp::Add => {
                self.store
                    .add_edge(child, predicate, parent, &self.relation.link_comment)
                    .await
            }
            EdgeOp::Delete => {
                self.store
                    .delete_edge(child, predicate, parent, &self.relation.unlink_comment)
                    .await
            }
        }
    }
}
