//! Discovery Errors

// ─────────────────────────────────────────────────────────────────────────────
// Discovery Error
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur in the discovery engine
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Device {0} not found in registry")]
    DeviceNotFound(u32),

    #[error("Transport send failed: {0}")]
    Transport(String),

    #[error("Transport closed")]
    TransportClosed,

    #[error("Malformed object reference: {0}")]
    MalformedReference(String),

    #[error("Unexpected property value: {0}")]
    UnexpectedValue(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Scheduler already running")]
    AlreadyRunning,

    #[error("Scheduler stopped")]
    SchedulerStopped,
}

/// Result type for discovery operations
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

impl DiscoveryError {
    /// Whether the error is a transient send failure that the next tick may recover from
    pub fn is_transient(&self) -> bool {
        matches!(self, DiscoveryError::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            DiscoveryError::DeviceNotFound(1001).to_string(),
            "Device 1001 not found in registry"
        );
        assert_eq!(
            DiscoveryError::Transport("socket closed".into()).to_string(),
            "Transport send failed: socket closed"
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(DiscoveryError::Transport("busy".into()).is_transient());
        assert!(!DiscoveryError::TransportClosed.is_transient());
        assert!(!DiscoveryError::DeviceNotFound(7).is_transient());
    }
}
