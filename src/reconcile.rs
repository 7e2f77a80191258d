//! Set difference between the children a parent should have and the children it has.

use std::collections::BTreeSet;

use crate::properties::{Edge, Pid, WorkItem};

/// Derive the work items that turn `current` into `wanted`.
///
/// All [WorkItem::Add]s come first (`wanted - current`, in `wanted` order), followed by all
/// [WorkItem::Remove]s (`current - wanted`, in `current` order). Children present in both sets
/// produce nothing.
pub fn reconcile(wanted: &BTreeSet<Pid>, current: &BTreeSet<Pid>) -> Vec<WorkItem> {
    let adds = wanted
        .difference(current)
        .cloned()
        .map(WorkItem::Add);
    let removes = current
        .difference(wanted)
        .cloned()
        .map(WorkItem::Remove);
    adds.chain(removes).collect()
}

/// The children currently linked to a parent, taken from the subjects of its inverse edges.
pub fn current_children<'a, I>(inverse_edges: I) -> BTreeSet<Pid>
where
    I: IntoIterator<Item = &'a Edge>,
{
    inverse_edges
        .into_iter()
        .map(|edge| edge.subject.clone())
        .collect()
}
