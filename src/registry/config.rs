//! Registry configuration

use std::time::Duration;

/// Tuning for the session registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Evict sessions that have had no producer and no subscribers for this
    /// long. `None` keeps every session for the life of the process.
    pub idle_session_timeout: Option<Duration>,

    /// How often the cleanup task runs when eviction is enabled
    pub cleanup_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            idle_session_timeout: None,
            cleanup_interval: Duration::from_secs(30),
        }
    }
}

impl RegistryConfig {
    /// Enable eviction of idle sessions
    pub fn idle_session_timeout(mut self, timeout: Duration) -> Self {
        self.idle_session_timeout = Some(timeout);
        self
    }

    /// Set the cleanup interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Whether idle sessions are ever removed
    pub fn eviction_enabled(&self) -> bool {
        self.idle_session_timeout.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_keeps_sessions_forever() {
        let config = RegistryConfig::default();

        assert!(config.idle_session_timeout.is_none());
        assert!(!config.eviction_enabled());
        assert_eq!(config.cleanup_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_builder_chaining() {
        let config = RegistryConfig::default()
            .idle_session_timeout(Duration::from_secs(300))
            .cleanup_interval(Duration::from_secs(5));

        assert!(config.eviction_enabled());
        assert_eq!(config.idle_session_timeout, Some(Duration::from_secs(300)));
        assert_eq!(config.cleanup_interval, Duration::from_secs(5));
    }
}
