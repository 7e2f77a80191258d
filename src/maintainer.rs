//! # Relation maintenance jobs
//!
//! [`RelationMaintainer`] keeps the tracked relation of one or more parent records in line with
//! what the search index says they should contain. For every parent:
//!
//! 1. Read the parent's metadata stream and extract its [`MatchCriteria`]
//! 2. Ask the [`EdgeQuery`] for the wanted children
//! 3. Ask the [`EdgeStore`] for the children linked now (inverse edges of the parent)
//! 4. [`reconcile`] the two sets into work items, adds before removes
//! 5. Apply every item with an [`EdgeMutator`], one at a time
//!
//! A failing item is recorded in the [`ParentReport`] and the remaining items still run. There
//! is no rollback: a parent with failed items is partially reconciled.
//!
//! Parents are independent of each other. [`RelationMaintainer::maintain_all`] reconciles up to
//! `concurrency` parents at once; the items of a single parent are never interleaved.

use futures::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    config::MaintainerConfig,
    error::{ItemFailure, RelsyncError},
    event::RelationEvent,
    metadata::ModsExtractor,
    mutator::EdgeMutator,
    properties::{MatchCriteria, Pid, WorkItem},
    reconcile::{current_children, reconcile},
    repository::{DatastreamSource, EdgeQuery, EdgeStore},
};

/// What a run would do for one parent, computed without touching the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub parent: Pid,
    pub criteria: MatchCriteria,
    pub wanted: BTreeSet<Pid>,
    pub current: BTreeSet<Pid>,
    pub items: Vec<WorkItem>,
}

impl Plan {
    pub fn to_json(&self) -> Result<String, RelsyncError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Per-parent outcome: which children were linked and unlinked, and which items failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentReport {
    pub parent: Pid,
    pub added: Vec<Pid>,
    pub removed: Vec<Pid>,
    pub failures: Vec<ItemFailure>,
}

impl ParentReport {
    fn new(parent: Pid) -> Self {
        ParentReport {
            parent,
            added: Vec::new(),
            removed: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn applied(&self) -> usize {
        self.added.len() + self.removed.len()
    }

    /// Turn a report with failed items into [RelsyncError::PartialReconciliation].
    pub fn into_result(self) -> Result<ParentReport, RelsyncError> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(RelsyncError::PartialReconciliation {
                parent: self.parent,
                failures: self.failures,
            })
        }
    }
}

/// Outcome of a batch of parents, in the order the parents were given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub parents: Vec<(Pid, Result<ParentReport, RelsyncError>)>,
}

impl RunReport {
    /// True when any parent failed outright or had failed work items.
    pub fn contains_failures(&self) -> bool {
        self.parents.iter().any(|(_, outcome)| match outcome {
            Ok(report) => !report.is_complete(),
            Err(_) => true,
        })
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &ParentReport> {
        self.parents.iter().filter_map(|(_, outcome)| match outcome {
            Ok(report) if report.is_complete() => Some(report),
            _ => None,
        })
    }

    pub fn failed(&self) -> impl Iterator<Item = &Pid> {
        self.parents
            .iter()
            .filter(|(_, outcome)| !matches!(outcome, Ok(report) if report.is_complete()))
            .map(|(parent, _)| parent)
    }

    /// Machine-readable form of the report. Each parent's outcome is an `{"Ok": …}` or
    /// `{"Err": …}` object.
    pub fn to_json(&self) -> Result<String, RelsyncError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub struct RelationMaintainer<'a, S, Q> {
    store: &'a S,
    index: &'a Q,
    config: &'a MaintainerConfig,
    extractor: ModsExtractor,
    tx: Option<UnboundedSender<RelationEvent>>,
}

impl<'a, S, Q> RelationMaintainer<'a, S, Q>
where
    S: EdgeStore + DatastreamSource,
    Q: EdgeQuery,
{
    pub fn new(
        store: &'a S,
        index: &'a Q,
        config: &'a MaintainerConfig,
    ) -> Result<Self, RelsyncError> {
        config.validate()?;
        Ok(RelationMaintainer {
            store,
            index,
            config,
            extractor: ModsExtractor::new(&config.metadata)?,
            tx: None,
        })
    }

    /// Send a [RelationEvent] for every applied or failed item to `tx`.
    pub fn with_events(mut self, tx: UnboundedSender<RelationEvent>) -> Self {
        self.tx = Some(tx);
        self
    }

    /// The matching rule declared in `parent`'s metadata stream.
    pub async fn criteria(&self, parent: &Pid) -> Result<MatchCriteria, RelsyncError> {
        let mods = self
            .store
            .datastream(parent, &self.config.metadata.datastream)
            .await?;
        self.extractor.extract(&mods)
    }

    pub async fn plan(&self, parent: &Pid) -> Result<Plan, RelsyncError> {
        let criteria = self.criteria(parent).await?;
        self.plan_with_criteria(parent, criteria).await
    }

    pub async fn plan_with_criteria(
        &self,
        parent: &Pid,
        criteria: MatchCriteria,
    ) -> Result<Plan, RelsyncError> {
        let wanted = self
            .index
            .find(&criteria)
            .await?
            .into_iter()
            .collect::<BTreeSet<Pid>>();
        let inverse = self
            .store
            .inverse_edges(parent, &self.config.relation.predicate)
            .await?;
        let current = current_children(&inverse);
        let items = reconcile(&wanted, &current);
        tracing::debug!(
            "[RelationMaintainer] {} matches {}: {} wanted, {} linked, {} work items",
            parent,
            criteria,
            wanted.len(),
            current.len(),
            items.len()
        );
        Ok(Plan {
            parent: parent.clone(),
            criteria,
            wanted,
            current,
            items,
        })
    }

    /// Reconcile one parent.
    ///
    /// Errors reading the parent's metadata, the index or the current relations are returned
    /// directly. Failed work items are collected in the report instead.
    #[tracing::instrument(skip(self))]
    pub async fn maintain(&self, parent: &Pid) -> Result<ParentReport, RelsyncError> {
        let plan = self.plan(parent).await?;
        Ok(self.apply(&plan).await)
    }

    pub async fn maintain_with_criteria(
        &self,
        parent: &Pid,
        criteria: MatchCriteria,
    ) -> Result<ParentReport, RelsyncError> {
        let plan = self.plan_with_criteria(parent, criteria).await?;
        Ok(self.apply(&plan).await)
    }

    /// Apply the items of `plan` in order.
    pub async fn apply(&self, plan: &Plan) -> ParentReport {
        let mutator = EdgeMutator::new(self.store, &self.config.relation);
        let parent = &plan.parent;
        let mut report = ParentReport::new(parent.clone());
        for item in plan.items.iter() {
            match mutator.apply(item, parent).await {
                Ok(()) => match item {
                    WorkItem::Add(child) => {
                        tracing::debug!("Linked {} to {}", child, parent);
                        self.emit(RelationEvent::Linked(child.clone(), parent.clone()));
                        report.added.push(child.clone());
                    }
                    WorkItem::Remove(child) => {
                        tracing::debug!("Unlinked {} from {}", child, parent);
                        self.emit(RelationEvent::Unlinked(child.clone(), parent.clone()));
                        report.removed.push(child.clone());
                    }
                },
                Err(error) => {
                    tracing::warn!("{} failed for parent {}: {}", item, parent, error);
                    self.emit(RelationEvent::Failed(
                        parent.clone(),
                        item.clone(),
                        error.to_string(),
                    ));
                    report.failures.push(ItemFailure {
                        item: item.clone(),
                        error,
                    });
                }
            }
        }
        self.emit(RelationEvent::ParentDone(
            parent.clone(),
            report.applied(),
            report.failures.len(),
        ));
        tracing::info!(
            "All work on {} done: {} added, {} removed, {} failed",
            parent,
            report.added.len(),
            report.removed.len(),
            report.failures.len()
        );
        report
    }

    /// Reconcile several parents, at most `concurrency` at a time. A failing parent does not
    /// stop the others.
    ///
    /// Repeated parents are reconciled once, at their first position, so a parent is never
    /// worked on by two jobs at the same time.
    pub async fn maintain_all<I>(&self, parents: I) -> RunReport
    where
        I: IntoIterator<Item = Pid>,
    {
        let mut seen = BTreeSet::new();
        let unique = parents
            .into_iter()
            .filter(|parent| seen.insert(parent.clone()))
            .collect::<Vec<_>>();
        let parents = stream::iter(unique)
            .map(|parent| async move {
                let outcome = self.maintain(&parent).await;
                if let Err(e) = &outcome {
                    tracing::warn!("Reconciliation of {} failed: {}", parent, e);
                }
                (parent, outcome)
            })
            .buffered(self.config.concurrency)
            .collect::<Vec<_>>()
            .await;
        RunReport { parents }
    }

    fn emit(&self, event: RelationEvent) {
        if let Some(tx) = &self.tx {
            if let Err(e) = tx.send(event) {
                tracing::debug!("Event receiver gone, dropping {:?}", e.0);
            }
        }
    }
}
