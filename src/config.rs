//! Synchronization configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, SyncError};

/// Default location of the static hosts file.
pub const DEFAULT_HOSTS_PATH: &str = "/etc/hosts";

/// Agent name embedded in the start marker.
///
/// Nodes already carry sections written under this name, so changing it
/// would strand the old section next to the new one.
pub const DEFAULT_AGENT: &str = "Rainbond";

/// Default deadline for one cluster query.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for one managed hosts section.
///
/// # Example
///
/// ```
/// use hosts_sync::SyncConfig;
///
/// let config = SyncConfig::new("rbd-system", "name=rbd-hub", "goodrain.me")
///     .with_hosts_path("/tmp/hosts");
///
/// assert_eq!(config.hostname, "goodrain.me");
/// assert_eq!(config.hosts_path.to_str(), Some("/tmp/hosts"));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Namespace the registry pods run in.
    pub namespace: String,

    /// Label selector picking the registry pods (e.g. `"name=rbd-hub"`).
    pub selector: String,

    /// Hostname mapped to the registry address inside the managed section.
    pub hostname: String,

    /// Hosts file to edit.
    pub hosts_path: PathBuf,

    /// Name written into the start marker.
    pub agent: String,

    /// Upper bound on a single cluster query.
    pub query_timeout: Duration,
}

impl SyncConfig {
    /// Creates a config targeting `/etc/hosts` with the default agent and timeout.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        selector: impl Into<String>,
        hostname: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            selector: selector.into(),
            hostname: hostname.into(),
            hosts_path: PathBuf::from(DEFAULT_HOSTS_PATH),
            agent: DEFAULT_AGENT.to_string(),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Overrides the hosts file path (useful for testing).
    #[must_use]
    pub fn with_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.hosts_path = path.into();
        self
    }

    /// Overrides the agent name written into the start marker.
    #[must_use]
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = agent.into();
        self
    }

    /// Overrides the cluster query deadline.
    #[must_use]
    pub const fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Checks that the values can produce a well-formed section.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            return Err(SyncError::InvalidConfig("namespace is empty".into()));
        }
        if self.hostname.is_empty() || self.hostname.contains(char::is_whitespace) {
            return Err(SyncError::InvalidConfig(format!(
                "hostname {:?} must be a single non-empty token",
                self.hostname
            )));
        }
        if self.agent.trim().is_empty() {
            return Err(SyncError::InvalidConfig("agent is empty".into()));
        }
        if self.query_timeout.is_zero() {
            return Err(SyncError::InvalidConfig("query timeout is zero".into()));
        }
        Ok(())
    }
}
