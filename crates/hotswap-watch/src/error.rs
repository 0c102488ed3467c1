//! Error types for coordination watches

use hotswap_artifact::NodePath;
use hotswap_dispatch::ConstructionError;

/// Coordination-service disruption
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Client has no live session
    #[error("coordination client is not connected")]
    NotConnected,

    /// Session dropped while subscribed
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// Service refused the subscription
    #[error("subscribe failed: {0}")]
    SubscribeFailed(String),
}

impl TransportError {
    /// Check if the session itself is gone
    #[inline]
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::NotConnected | Self::ConnectionLost(_))
    }
}

/// Node store operation failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Node does not exist
    #[error("no node at {0}")]
    NoNode(NodePath),

    /// Node already exists
    #[error("node already exists at {0}")]
    NodeExists(NodePath),

    /// Store session closed
    #[error("store is disconnected")]
    Disconnected,
}

/// Starting a watch failed
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Binding could not be built
    #[error("invalid watch binding: {0}")]
    Construction(#[from] ConstructionError),

    /// Subscription refused
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Dispatch thread could not be spawned
    #[error("failed to spawn dispatch thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Watch configuration could not be loaded
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML syntax or schema error
    #[error("invalid watch config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config could not be rendered
    #[error("cannot serialize watch config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnect_classification() {
        assert!(TransportError::NotConnected.is_disconnect());
        assert!(TransportError::ConnectionLost("expired".into()).is_disconnect());
        assert!(!TransportError::SubscribeFailed("acl".into()).is_disconnect());
    }

    #[test]
    fn watch_error_from_construction() {
        let err = WatchError::from(ConstructionError::EmptyProviderChain);
        assert!(matches!(err, WatchError::Construction(_)));
        assert!(err.to_string().starts_with("invalid watch binding"));
    }
}
