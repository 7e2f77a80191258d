//! [crate::properties] contains the value types passed between the reconciliation engine, the
//! mutator and the repository collaborators.
use serde::{Deserialize, Serialize};
use std::{
    borrow::Borrow,
    fmt::{Display, Formatter},
    str::FromStr,
};

use crate::error::RelsyncError;

/// Default prefix turning a [Pid] into the URI form used as a relation endpoint.
pub const DEFAULT_URI_PREFIX: &str = "info:fedora/";

/// Record handle (persistent identifier), e.g. `uuid:0c1969ca-94be-4ebb-abab-0bd8130e59d7`.
///
/// Equality, ordering and hashing are by identifier value.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Pid(String);

impl Pid {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Pid(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The URI form of this record, as stored at either end of a relation.
    pub fn to_uri(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.0)
    }

    /// Strip `prefix` from a relation endpoint. Endpoints without the prefix are taken as bare
    /// identifiers.
    pub fn from_uri(uri: &str, prefix: &str) -> Self {
        Pid(uri.strip_prefix(prefix).unwrap_or(uri).to_string())
    }
}

impl Display for Pid {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Pid {
    fn from(id: &str) -> Self {
        Pid(id.to_string())
    }
}

impl From<String> for Pid {
    fn from(id: String) -> Self {
        Pid(id)
    }
}

impl Borrow<str> for Pid {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Pid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The relation label (RDF predicate) being reconciled.
#[derive(Clone, Debug, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Predicate(String);

impl Predicate {
    pub fn new<S: Into<String>>(uri: S) -> Self {
        Predicate(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Predicate {
    fn from(uri: &str) -> Self {
        Predicate(uri.to_string())
    }
}

impl From<String> for Predicate {
    fn from(uri: String) -> Self {
        Predicate(uri)
    }
}

/// A directed, labeled relation instance. Tracked relations point from child (subject) to
/// parent (object).
#[derive(Clone, Debug, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Edge {
    pub subject: Pid,
    pub predicate: Predicate,
    pub object: Pid,
}

impl Edge {
    pub fn new(subject: Pid, predicate: Predicate, object: Pid) -> Self {
        Edge {
            subject,
            predicate,
            object,
        }
    }

    /// True when this edge is `child --predicate--> parent`.
    pub fn links(&self, child: &Pid, predicate: &Predicate, parent: &Pid) -> bool {
        &self.subject == child && &self.predicate == predicate && &self.object == parent
    }
}

impl Display for Edge {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{} -[{}]-> {}", self.subject, self.predicate, self.object)
    }
}

/// The matching rule a parent record declares: which children belong to it.
///
/// An empty date means the range is unbounded on that side.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchCriteria {
    pub identifier: String,
    pub start_date: String,
    pub end_date: String,
}

impl MatchCriteria {
    pub fn new<I, S, E>(identifier: I, start_date: S, end_date: E) -> Self
    where
        I: Into<String>,
        S: Into<String>,
        E: Into<String>,
    {
        MatchCriteria {
            identifier: identifier.into(),
            start_date: start_date.into(),
            end_date: end_date.into(),
        }
    }

    /// Inclusive date-range test on the date part of `date` and both bounds. Empty bounds never
    /// exclude. A reduced-precision bound (`1762`, `1762-05`) covers its whole period.
    pub fn covers(&self, date: &str) -> bool {
        let date = date_part(date);
        let after_start = self.start_date.is_empty() || date >= date_part(&self.start_date);
        let before_end = self.end_date.is_empty() || {
            let end = date_part(&self.end_date);
            // Compare at the bound's precision, so "1762-05-01" falls within "1762"
            date.get(..end.len()).unwrap_or(date) <= end
        };
        after_start && before_end
    }
}

impl Display for MatchCriteria {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} [{}..{}]",
            self.identifier, self.start_date, self.end_date
        )
    }
}

/// The `YYYY-MM-DD` prefix of an ISO-8601 date or date-time, or the whole string if it is
/// shorter.
pub fn date_part(date: &str) -> &str {
    let date = date.trim();
    match date.get(..10) {
        Some(day) if date.len() > 10 && date.as_bytes()[10] == b'T' => day,
        _ => date,
    }
}

/// Lifecycle state of a repository record. Relations may only be changed directly while a
/// record is [LifecycleState::Inactive].
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, Hash, PartialEq, Eq)]
pub enum LifecycleState {
    /// Published
    #[default]
    Active,
    /// Unpublished
    Inactive,
}

impl LifecycleState {
    /// Single-letter code used by the repository ("A" / "I").
    pub fn code(&self) -> &'static str {
        match self {
            LifecycleState::Active => "A",
            LifecycleState::Inactive => "I",
        }
    }
}

impl Display for LifecycleState {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for LifecycleState {
    type Err = RelsyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" | "Active" => Ok(LifecycleState::Active),
            "I" | "Inactive" => Ok(LifecycleState::Inactive),
            other => Err(RelsyncError::Serialization(format!(
                "Unknown lifecycle state '{other}'"
            ))),
        }
    }
}

/// One atomic link-add or link-remove between a child and the (fixed) parent of a run.
#[derive(Clone, Debug, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum WorkItem {
    Add(Pid),
    Remove(Pid),
}

impl WorkItem {
    pub fn child(&self) -> &Pid {
        match self {
            WorkItem::Add(child) | WorkItem::Remove(child) => child,
        }
    }

    pub fn is_add(&self) -> bool {
        matches!(self, WorkItem::Add(_))
    }
}

impl Display for WorkItem {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            WorkItem::Add(child) => write!(f, "Add({child})"),
            WorkItem::Remove(child) => write!(f, "Remove({child})"),
        }
    }
}
