use crate::error::Error;
use crate::model::{Issue, IssueKind};
use ahash::AHashMap;
use std::path::PathBuf;

/// Append-only collection of issues discovered in one scan session.
///
/// Records arrive through a single write lane (the scheduler's aggregation
/// thread); readers get a consistent snapshot once the session is complete.
/// A second record for the same path means the scheduler dispatched a file
/// twice; that is surfaced as a fatal [`Error::DuplicatePath`], never
/// swallowed.
#[derive(Debug, Default)]
pub struct IssueRegistry {
    issues: Vec<Issue>,
    index: AHashMap<PathBuf, usize>,
}

impl IssueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a registry from a persisted snapshot, re-validating the
    /// one-issue-per-path invariant.
    pub fn from_issues(issues: Vec<Issue>) -> Result<Self, Error> {
        let mut registry = Self::new();
        for issue in issues {
            registry.record(issue)?;
        }
        Ok(registry)
    }

    pub fn record(&mut self, issue: Issue) -> Result<(), Error> {
        if self.index.contains_key(&issue.path) {
            return Err(Error::DuplicatePath(issue.path.display().to_string()));
        }
        self.index.insert(issue.path.clone(), self.issues.len());
        self.issues.push(issue);
        Ok(())
    }

    /// All issues, in arrival order.
    pub fn all(&self) -> &[Issue] {
        &self.issues
    }

    pub fn by_kind(&self, kind: IssueKind) -> Vec<&Issue> {
        self.issues.iter().filter(|i| i.kind == kind).collect()
    }

    pub fn get(&self, path: &std::path::Path) -> Option<&Issue> {
        self.index.get(path).map(|&i| &self.issues[i])
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }
}
