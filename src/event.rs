use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::properties::{Pid, WorkItem};

/// Outcome notifications emitted while a parent record is reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationEvent {
    /// Child, Parent
    Linked(Pid, Pid),
    /// Child, Parent
    Unlinked(Pid, Pid),
    /// Parent, failed item, reason
    Failed(Pid, WorkItem, String),
    /// Parent, number of applied items, number of failed items
    ParentDone(Pid, usize, usize),
}

impl Display for RelationEvent {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            RelationEvent::Linked(child, parent) => write!(f, "Linked({child} -> {parent})"),
            RelationEvent::Unlinked(child, parent) => write!(f, "Unlinked({child} -> {parent})"),
            RelationEvent::Failed(parent, item, reason) => {
                write!(f, "Failed({parent}: {item}: {reason})")
            }
            RelationEvent::ParentDone(parent, applied, failed) => {
                write!(f, "ParentDone({parent}, applied: {applied}, failed: {failed})")
            }
        }
    }
}
