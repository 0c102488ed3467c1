//! Coordination-store change notifications

use hotswap_artifact::{ArtifactBlob, NodePath};
use serde::{Deserialize, Serialize};

/// Kind of change observed on a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// Node created (or seen for the first time by a new subscription)
    Added,
    /// Node data replaced
    Updated,
    /// Node deleted
    Removed,
    /// Anything else the client reports (initialization markers, session events)
    Other,
}

impl ChangeKind {
    /// Only additions and updates trigger dispatch
    #[inline]
    #[must_use]
    pub fn is_actionable(self) -> bool {
        matches!(self, Self::Added | Self::Updated)
    }
}

/// One change delivered by the coordination client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    /// Node that changed
    pub path: NodePath,
    /// Node data after the change (empty for removals)
    pub payload: ArtifactBlob,
    /// What happened
    pub kind: ChangeKind,
}

impl ChangeNotification {
    /// Create new notification
    #[inline]
    #[must_use]
    pub fn new(path: NodePath, kind: ChangeKind, payload: ArtifactBlob) -> Self {
        Self { path, payload, kind }
    }

    /// Node added
    #[inline]
    #[must_use]
    pub fn added(path: NodePath, payload: impl Into<ArtifactBlob>) -> Self {
        Self::new(path, ChangeKind::Added, payload.into())
    }

    /// Node updated
    #[inline]
    #[must_use]
    pub fn updated(path: NodePath, payload: impl Into<ArtifactBlob>) -> Self {
        Self::new(path, ChangeKind::Updated, payload.into())
    }

    /// Node removed
    #[inline]
    #[must_use]
    pub fn removed(path: NodePath) -> Self {
        Self::new(path, ChangeKind::Removed, ArtifactBlob::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_added_and_updated_are_actionable() {
        assert!(ChangeKind::Added.is_actionable());
        assert!(ChangeKind::Updated.is_actionable());
        assert!(!ChangeKind::Removed.is_actionable());
        assert!(!ChangeKind::Other.is_actionable());
    }

    #[test]
    fn removed_has_empty_payload() {
        let n = ChangeNotification::removed("/a".parse().unwrap());
        assert_eq!(n.kind, ChangeKind::Removed);
        assert!(n.payload.is_empty());
    }
}
