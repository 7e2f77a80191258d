//! In-process repository and search index.
//!
//! [`MemoryRepository`] implements [`EdgeQuery`], [`EdgeStore`] and [`DatastreamSource`] over
//! plain collections. It enforces the same lifecycle rule as a real repository (relations of an
//! Active record cannot be changed), journals every collaborator call unless built
//! [without a journal](MemoryRepository::without_journal), and can be told to fail selected
//! operations. That makes it the reference backend for dry runs and tests.

use parking_lot::Mutex;
use std::collections::BTreeMap;

use crate::{
    error::RelsyncError,
    properties::{Edge, LifecycleState, MatchCriteria, Pid, Predicate},
    repository::{DatastreamSource, EdgeQuery, EdgeStore},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    Find,
    InverseEdges,
    NamedEdges,
    AddEdge,
    DeleteEdge,
    SetState,
    Datastream,
}

/// A journaled collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Find(MatchCriteria),
    InverseEdges(Pid),
    NamedEdges(Pid),
    /// Child, Parent
    AddEdge(Pid, Pid),
    /// Child, Parent
    DeleteEdge(Pid, Pid),
    SetState(Pid, LifecycleState),
    Datastream(Pid, String),
}

#[derive(Debug, Clone)]
struct Fault {
    op: Operation,
    record: Option<Pid>,
    skip: usize,
    persistent: bool,
    error: RelsyncError,
}

#[derive(Debug, Clone)]
struct IndexEntry {
    pid: Pid,
    identifier: String,
    date_issued: String,
}

#[derive(Debug, Default)]
struct Inner {
    states: BTreeMap<Pid, LifecycleState>,
    datastreams: BTreeMap<(Pid, String), String>,
    edges: Vec<Edge>,
    index: Vec<IndexEntry>,
    faults: Vec<Fault>,
    calls: Vec<Call>,
    unjournaled: bool,
}

impl Inner {
    fn record(&mut self, call: Call) {
        if !self.unjournaled {
            self.calls.push(call);
        }
    }

    fn check_fault(&mut self, op: Operation, record: Option<&Pid>) -> Result<(), RelsyncError> {
        let Some(idx) = self.faults.iter().position(|fault| {
            fault.op == op
                && match (&fault.record, record) {
                    (None, _) => true,
                    (Some(target), Some(record)) => target == record,
                    (Some(_), None) => false,
                }
        }) else {
            return Ok(());
        };
        let fault = &mut self.faults[idx];
        if fault.skip > 0 {
            fault.skip -= 1;
            return Ok(());
        }
        let error = fault.error.clone();
        if !fault.persistent {
            self.faults.remove(idx);
        }
        Err(error)
    }

    fn writable(&self, record: &Pid) -> Result<(), RelsyncError> {
        match self.states.get(record) {
            None => Err(RelsyncError::NotFound(format!("record {record}"))),
            Some(LifecycleState::Active) => Err(RelsyncError::Obstacle(format!(
                "{record} is published"
            ))),
            Some(LifecycleState::Inactive) => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryRepository {
    inner: Mutex<Inner>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        MemoryRepository::default()
    }

    /// Stop journaling calls. The journal grows with every collaborator call, so long-lived
    /// repositories that never inspect [MemoryRepository::calls] should turn it off.
    pub fn without_journal(self) -> Self {
        {
            let mut inner = self.inner.lock();
            inner.unjournaled = true;
            inner.calls.clear();
        }
        self
    }

    pub fn put_record(&self, record: &Pid, state: LifecycleState) {
        self.inner.lock().states.insert(record.clone(), state);
    }

    pub fn put_datastream(&self, record: &Pid, name: &str, content: &str) {
        self.inner
            .lock()
            .datastreams
            .insert((record.clone(), name.to_string()), content.to_string());
    }

    /// Make `record` discoverable through [EdgeQuery::find].
    pub fn put_indexed(&self, record: &Pid, identifier: &str, date_issued: &str) {
        self.inner.lock().index.push(IndexEntry {
            pid: record.clone(),
            identifier: identifier.to_string(),
            date_issued: date_issued.to_string(),
        });
    }

    /// Insert an edge without any lifecycle checks. Duplicates are kept.
    pub fn put_edge(&self, edge: Edge) {
        self.inner.lock().edges.push(edge);
    }

    pub fn state(&self, record: &Pid) -> Option<LifecycleState> {
        self.inner.lock().states.get(record).copied()
    }

    pub fn edges(&self) -> Vec<Edge> {
        self.inner.lock().edges.clone()
    }

    /// Number of `child --predicate--> parent` edge instances.
    pub fn edges_between(&self, child: &Pid, predicate: &Predicate, parent: &Pid) -> usize {
        self.inner
            .lock()
            .edges
            .iter()
            .filter(|edge| edge.links(child, predicate, parent))
            .count()
    }

    /// Every collaborator call so far, oldest first. Empty when built
    /// [without a journal](MemoryRepository::without_journal).
    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    /// Let `skip` calls of `op` through, then fail the next one with `error`.
    pub fn fail_after(&self, op: Operation, skip: usize, error: RelsyncError) {
        self.inner.lock().faults.push(Fault {
            op,
            record: None,
            skip,
            persistent: false,
            error,
        });
    }

    /// Fail every call of `op` that concerns `record`.
    pub fn fail_for(&self, op: Operation, record: &Pid, error: RelsyncError) {
        self.inner.lock().faults.push(Fault {
            op,
            record: Some(record.clone()),
            skip: 0,
            persistent: true,
            error,
        });
    }
}

impl EdgeQuery for MemoryRepository {
    async fn find(&self, criteria: &MatchCriteria) -> Result<Vec<Pid>, RelsyncError> {
        let mut inner = self.inner.lock();
        inner.record(Call::Find(criteria.clone()));
        inner.check_fault(Operation::Find, None)?;
        let mut hits = inner
            .index
            .iter()
            .filter(|entry| {
                entry.identifier == criteria.identifier && criteria.covers(&entry.date_issued)
            })
            .map(|entry| (entry.date_issued.clone(), entry.pid.clone()))
            .collect::<Vec<_>>();
        hits.sort();
        Ok(hits.into_iter().map(|(_, pid)| pid).collect())
    }
}

impl EdgeStore for MemoryRepository {
    async fn inverse_edges(
        &self,
        parent: &Pid,
        predicate: &Predicate,
    ) -> Result<Vec<Edge>, RelsyncError> {
        let mut inner = self.inner.lock();
        inner.record(Call::InverseEdges(parent.clone()));
        inner.check_fault(Operation::InverseEdges, Some(parent))?;
        Ok(inner
            .edges
            .iter()
            .filter(|edge| &edge.object == parent && &edge.predicate == predicate)
            .cloned()
            .collect())
    }

    async fn named_edges(
        &self,
        child: &Pid,
        predicate: &Predicate,
        object: Option<&Pid>,
    ) -> Result<Vec<Edge>, RelsyncError> {
        let mut inner = self.inner.lock();
        inner.record(Call::NamedEdges(child.clone()));
        inner.check_fault(Operation::NamedEdges, Some(child))?;
        Ok(inner
            .edges
            .iter()
            .filter(|edge| &edge.subject == child && &edge.predicate == predicate)
            .filter(|edge| object.is_none_or(|object| &edge.object == object))
            .cloned()
            .collect())
    }

    async fn add_edge(
        &self,
        child: &Pid,
        predicate: &Predicate,
        parent: &Pid,
        comment: &str,
    ) -> Result<(), RelsyncError> {
        let mut inner = self.inner.lock();
        inner.record(Call::AddEdge(child.clone(), parent.clone()));
        inner.check_fault(Operation::AddEdge, Some(child))?;
        inner.writable(child)?;
        tracing::trace!("[MemoryRepository] add {} -> {}: {}", child, parent, comment);
        inner
            .edges
            .push(Edge::new(child.clone(), predicate.clone(), parent.clone()));
        Ok(())
    }

    async fn delete_edge(
        &self,
        child: &Pid,
        predicate: &Predicate,
        parent: &Pid,
        comment: &str,
    ) -> Result<(), RelsyncError> {
        let mut inner = self.inner.lock();
        inner.record(Call::DeleteEdge(child.clone(), parent.clone()));
        inner.check_fault(Operation::DeleteEdge, Some(child))?;
        inner.writable(child)?;
        tracing::trace!("[MemoryRepository] delete {} -> {}: {}", child, parent, comment);
        if let Some(idx) = inner
            .edges
            .iter()
            .position(|edge| edge.links(child, predicate, parent))
        {
            inner.edges.remove(idx);
        }
        Ok(())
    }

    async fn set_state(
        &self,
        record: &Pid,
        state: LifecycleState,
        comment: &str,
    ) -> Result<(), RelsyncError> {
        let mut inner = self.inner.lock();
        inner.record(Call::SetState(record.clone(), state));
        inner.check_fault(Operation::SetState, Some(record))?;
        let Some(current) = inner.states.get_mut(record) else {
            return Err(RelsyncError::NotFound(format!("record {record}")));
        };
        tracing::trace!("[MemoryRepository] {} {} -> {}: {}", record, current, state, comment);
        *current = state;
        Ok(())
    }
}

impl DatastreamSource for MemoryRepository {
    async fn datastream(&self, record: &Pid, name: &str) -> Result<String, RelsyncError> {
        let mut inner = self.inner.lock();
        inner.record(Call::Datastream(record.clone(), name.to_string()));
        inner.check_fault(Operation::Datastream, Some(record))?;
        inner
            .datastreams
            .get(&(record.clone(), name.to_string()))
            .cloned()
            .ok_or_else(|| RelsyncError::NotFound(format!("datastream {name} of {record}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::helpers::init_logging;

    #[tokio::test]
    async fn test_find_filters_by_identifier_and_range() {
        init_logging();
        let repo = MemoryRepository::new();
        repo.put_indexed(&Pid::from("e3"), "avis", "1975-03-01");
        repo.put_indexed(&Pid::from("e1"), "avis", "1970-01-01");
        repo.put_indexed(&Pid::from("e2"), "avis", "1990-01-01");
        repo.put_indexed(&Pid::from("x1"), "other", "1975-03-01");

        let hits = repo
            .find(&MatchCriteria::new("avis", "1970-01-01", "1980-01-01"))
            .await
            .unwrap();
        assert_eq!(hits, vec![Pid::from("e1"), Pid::from("e3")]);

        let unbounded = repo.find(&MatchCriteria::new("avis", "", "")).await.unwrap();
        assert_eq!(unbounded.len(), 3);
    }

    #[tokio::test]
    async fn test_published_record_refuses_edge_changes() {
        init_logging();
        let repo = MemoryRepository::new();
        let predicate = Predicate::from("isPartOf");
        let (child, parent) = (Pid::from("c"), Pid::from("p"));
        repo.put_record(&child, LifecycleState::Active);

        let refused = repo.add_edge(&child, &predicate, &parent, "test").await;
        assert!(refused.unwrap_err().is_obstacle());

        repo.set_state(&child, LifecycleState::Inactive, "test")
            .await
            .unwrap();
        repo.add_edge(&child, &predicate, &parent, "test")
            .await
            .unwrap();
        assert_eq!(
            repo.inverse_edges(&parent, &predicate).await.unwrap(),
            vec![Edge::new(child.clone(), predicate.clone(), parent.clone())]
        );
        assert_eq!(
            repo.named_edges(&child, &predicate, Some(&Pid::from("elsewhere")))
                .await
                .unwrap(),
            vec![]
        );
    }

    #[tokio::test]
    async fn test_fault_injection() {
        init_logging();
        let repo = MemoryRepository::new();
        let record = Pid::from("r");
        repo.put_record(&record, LifecycleState::Inactive);
        repo.fail_after(Operation::SetState, 1, RelsyncError::Backend("boom".into()));

        assert!(repo
            .set_state(&record, LifecycleState::Active, "first")
            .await
            .is_ok());
        assert_eq!(
            repo.set_state(&record, LifecycleState::Inactive, "second")
                .await,
            Err(RelsyncError::Backend("boom".into()))
        );
        // One-shot faults are consumed
        assert!(repo
            .set_state(&record, LifecycleState::Inactive, "third")
            .await
            .is_ok());

        repo.fail_for(Operation::Datastream, &record, RelsyncError::PermissionDenied);
        for _ in 0..2 {
            assert_eq!(
                repo.datastream(&record, "MODS").await,
                Err(RelsyncError::PermissionDenied)
            );
        }
        assert!(matches!(
            repo.datastream(&Pid::from("other"), "MODS").await,
            Err(RelsyncError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_journal_can_be_turned_off() {
        init_logging();
        let repo = MemoryRepository::new();
        let record = Pid::from("r");
        repo.put_record(&record, LifecycleState::Active);
        repo.set_state(&record, LifecycleState::Inactive, "").await.unwrap();
        assert_eq!(repo.calls().len(), 1);

        let repo = repo.without_journal();
        assert!(repo.calls().is_empty());
        repo.set_state(&record, LifecycleState::Active, "").await.unwrap();
        repo.find(&MatchCriteria::new("avis", "", "")).await.unwrap();
        assert!(repo.calls().is_empty());
        assert_eq!(repo.state(&record), Some(LifecycleState::Active));
    }
}
