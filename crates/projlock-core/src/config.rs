//! Coordinator configuration

use std::time::Duration;

/// Configuration for the coordinator and its lock manager
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// How long to wait for a lock before failing with a timeout
    /// (`None` = wait indefinitely)
    pub acquire_timeout: Option<Duration>,

    /// Capacity of the lock-event broadcast channel
    pub event_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            acquire_timeout: Some(Duration::from_secs(30)),
            event_capacity: 256,
        }
    }
}

impl CoordinatorConfig {
    /// Set the acquire timeout
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    /// Wait indefinitely for locks
    pub fn without_acquire_timeout(mut self) -> Self {
        self.acquire_timeout = None;
        self
    }

    /// Set the event channel capacity (clamped to at least 1)
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.acquire_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.event_capacity, 256);
    }

    #[test]
    fn test_config_builder() {
        let config = CoordinatorConfig::default()
            .with_acquire_timeout(Duration::from_millis(250))
            .with_event_capacity(16);
        assert_eq!(config.acquire_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.event_capacity, 16);

        let config = config.without_acquire_timeout();
        assert_eq!(config.acquire_timeout, None);
    }

    #[test]
    fn test_event_capacity_is_clamped() {
        let config = CoordinatorConfig::default().with_event_capacity(0);
        assert_eq!(config.event_capacity, 1);
    }
}
