//! Coordinator configuration

use std::time::Duration;

use crate::endpoint::ResourceName;
use crate::session::SessionId;

/// Configuration for [`SessionCoordinator`](super::SessionCoordinator)
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Base URL renderers use to reach the HTTP server (no trailing slash)
    pub content_base: String,

    /// First session ID handed out
    pub first_session_id: SessionId,

    /// Deactivate sessions without a liveness signal for this long (None = never)
    pub liveness_timeout: Option<Duration>,

    /// How often the liveness reaper runs
    pub reap_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            content_base: "http://127.0.0.1:7070".into(),
            first_session_id: 9236,
            liveness_timeout: None,
            reap_interval: Duration::from_secs(5),
        }
    }
}

impl CoordinatorConfig {
    /// Set the content base URL
    pub fn content_base(mut self, base: impl Into<String>) -> Self {
        let mut base = base.into();
        while base.ends_with('/') {
            base.pop();
        }
        self.content_base = base;
        self
    }

    /// Set the first session ID
    pub fn first_session_id(mut self, id: SessionId) -> Self {
        self.first_session_id = id;
        self
    }

    /// Enable the liveness reaper
    pub fn liveness_timeout(mut self, timeout: Duration) -> Self {
        self.liveness_timeout = Some(timeout);
        self
    }

    /// Set the reaper interval
    pub fn reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }

    /// Absolute URL of a streaming resource
    pub fn resource_url(&self, name: &ResourceName) -> String {
        format!("{}{}", self.content_base, name.path())
    }
}
