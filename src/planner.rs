use crate::error::RepairError;
use crate::model::{ActionKind, Issue, IssueKind, RepairAction};
use ahash::AHashMap;
use std::sync::Arc;

/// Capability interface for repair actions. External collaborators register
/// implementations (a game-file verifier, a runtime reinstaller, a backup
/// mirror) against the generic action kinds; the core never hardcodes vendor
/// logic.
pub trait RepairHandler: Send + Sync {
    fn kind(&self) -> ActionKind;

    /// Availability predicate consulted during planning. Must be cheap and
    /// must not modify the filesystem.
    fn is_available(&self, issue: &Issue) -> bool;

    /// Handlers whose side effects are unknown after a partial run (external
    /// tool invocations, mostly) return `false` and get at most one attempt.
    fn retry_safe(&self) -> bool {
        true
    }

    /// The corrective side effect. Only ever called while the owning action
    /// is `Running`.
    fn execute(&self, issue: &Issue) -> Result<(), RepairError>;
}

/// Registered repair capabilities, one handler per action kind. Registering
/// a kind twice replaces the earlier handler.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: AHashMap<ActionKind, Arc<dyn RepairHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn RepairHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    pub fn get(&self, kind: ActionKind) -> Option<&Arc<dyn RepairHandler>> {
        self.handlers.get(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Ordered action preferences per issue kind.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    preferences: AHashMap<IssueKind, Vec<ActionKind>>,
}

impl Default for PolicyTable {
    fn default() -> Self {
        let mut preferences = AHashMap::new();
        preferences.insert(
            IssueKind::Missing,
            vec![ActionKind::RestoreBackup, ActionKind::Redownload],
        );
        preferences.insert(
            IssueKind::SizeMismatch,
            vec![
                ActionKind::RestoreBackup,
                ActionKind::Redownload,
                ActionKind::InvokeExternalTool,
            ],
        );
        preferences.insert(
            IssueKind::HashMismatch,
            vec![
                ActionKind::RestoreBackup,
                ActionKind::Redownload,
                ActionKind::InvokeExternalTool,
            ],
        );
        preferences.insert(IssueKind::Unreadable, vec![ActionKind::InvokeExternalTool]);
        // Unknown covers canceled checks and heuristic oddities; nothing is
        // repaired automatically.
        preferences.insert(IssueKind::Unknown, Vec::new());
        Self { preferences }
    }
}

impl PolicyTable {
    pub fn with_preference(mut self, kind: IssueKind, actions: Vec<ActionKind>) -> Self {
        self.preferences.insert(kind, actions);
        self
    }

    pub fn preferences_for(&self, kind: IssueKind) -> &[ActionKind] {
        self.preferences.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Maps issues to repair actions. Planning is a pure decision over the issue
/// and capability availability. It never touches the filesystem itself and
/// has no error path: an issue nothing can fix is planned as `Skip`.
pub struct RepairPlanner {
    policy: PolicyTable,
}

pub const NO_VIABLE_ACTION: &str = "no viable action";

impl RepairPlanner {
    pub fn new(policy: PolicyTable) -> Self {
        Self { policy }
    }

    pub fn plan(&self, issue: &Issue, handlers: &HandlerRegistry) -> RepairAction {
        for &kind in self.policy.preferences_for(issue.kind) {
            if let Some(handler) = handlers.get(kind) {
                if handler.is_available(issue) {
                    return RepairAction::pending(issue.clone(), kind);
                }
            }
        }
        RepairAction::skip(issue.clone(), NO_VIABLE_ACTION)
    }

    pub fn plan_all(&self, issues: &[Issue], handlers: &HandlerRegistry) -> Vec<RepairAction> {
        issues
            .iter()
            .map(|issue| self.plan(issue, handlers))
            .collect()
    }
}
