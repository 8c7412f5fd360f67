//! Manager configuration.

use std::time::Duration;

/// Settings for an [`EventListenerManager`](crate::EventListenerManager).
///
/// With the `serde` feature the config can be deserialized from an
/// application's own config file; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ManagerConfig {
    /// Name used in log output.
    pub name: String,
    /// Deadline for session waits that do not set their own.
    pub default_session_timeout: Option<Duration>,
    /// Turn listener panics into `Panic` failures instead of aborting the
    /// dispatch.
    pub catch_panics: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagerConfig {
    /// Default configuration: no session deadline, panics caught.
    pub fn new() -> Self {
        Self {
            name: "hearken".to_string(),
            default_session_timeout: None,
            catch_panics: true,
        }
    }

    /// Set the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the default session deadline.
    pub fn with_default_session_timeout(mut self, timeout: Duration) -> Self {
        self.default_session_timeout = Some(timeout);
        self
    }

    /// Set whether listener panics are caught.
    pub fn with_catch_panics(mut self, catch_panics: bool) -> Self {
        self.catch_panics = catch_panics;
        self
    }
}
