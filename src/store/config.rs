//! Store configuration
//!
//! Loaded from a JSON file. Only `root_uri` is required.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{RegistryError, RegistryResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// URI of the root register; must end with `/`
    pub root_uri: String,

    /// Upper bound on waiting for a per-resource lock (default 5000)
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Run the change notifier dispatcher (default true)
    #[serde(default = "default_notifier_enabled")]
    pub notifier_enabled: bool,
}

fn default_lock_timeout_ms() -> u64 {
    5000
}
fn default_notifier_enabled() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root_uri: "http://localhost/".to_string(),
            lock_timeout_ms: default_lock_timeout_ms(),
            notifier_enabled: default_notifier_enabled(),
        }
    }
}

impl StoreConfig {
    pub fn new(root_uri: impl Into<String>) -> Self {
        Self {
            root_uri: root_uri.into(),
            ..Self::default()
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_notifier(mut self, enabled: bool) -> Self {
        self.notifier_enabled = enabled;
        self
    }

    /// Load and validate configuration from a file
    pub fn load(path: &Path) -> RegistryResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            RegistryError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let config: StoreConfig = serde_json::from_str(&content)
            .map_err(|e| RegistryError::Config(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RegistryResult<()> {
        if !self.root_uri.contains("://") {
            return Err(RegistryError::Config(format!(
                "root_uri must be an absolute URI, got '{}'",
                self.root_uri
            )));
        }
        if !self.root_uri.ends_with('/') {
            return Err(RegistryError::Config(format!(
                "root_uri must end with '/', got '{}'",
                self.root_uri
            )));
        }
        if self.lock_timeout_ms == 0 {
            return Err(RegistryError::Config("lock_timeout_ms must be > 0".into()));
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}
