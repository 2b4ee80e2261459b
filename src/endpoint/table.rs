//! Live table of published streaming resources
//!
//! One entry per session whose pipeline is up. The table is bounded by the
//! number of live sessions: entries are retracted when the session ends.

use std::collections::HashMap;
use std::fmt;

use crate::session::SessionId;

/// Name of a streaming resource (`{kind}{id}.mp4`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceName {
    /// Endpoint kind (e.g. "camera")
    pub kind: String,
    /// Session ID
    pub id: SessionId,
}

impl ResourceName {
    /// Create a resource name
    pub fn new(kind: impl Into<String>, id: SessionId) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }

    /// Parse a path segment such as `camera9236.mp4`
    ///
    /// The kind is the leading non-digit part and must not be empty.
    pub fn parse(segment: &str) -> Option<Self> {
        let stem = segment.strip_prefix('/').unwrap_or(segment);
        let stem = stem.strip_suffix(".mp4")?;

        let split = stem.find(|c: char| c.is_ascii_digit())?;
        let (kind, digits) = stem.split_at(split);
        if kind.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let id = digits.parse().ok()?;
        Some(Self::new(kind, id))
    }

    /// URL path of the resource
    pub fn path(&self) -> String {
        format!("/{}", self)
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}.mp4", self.kind, self.id)
    }
}

/// Published resources keyed by session ID
#[derive(Debug, Default)]
pub struct EndpointTable {
    published: HashMap<SessionId, ResourceName>,
}

impl EndpointTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a resource
    pub fn publish(&mut self, name: ResourceName) {
        tracing::debug!(resource = %name, "Resource published");
        self.published.insert(name.id, name);
    }

    /// Retract the resource of a session
    ///
    /// Returns the retracted name, if any.
    pub fn retract(&mut self, id: SessionId) -> Option<ResourceName> {
        let name = self.published.remove(&id);
        if let Some(ref name) = name {
            tracing::debug!(resource = %name, "Resource retracted");
        }
        name
    }

    /// Check if exactly this resource is published
    pub fn is_published(&self, name: &ResourceName) -> bool {
        self.published.get(&name.id) == Some(name)
    }

    /// Number of published resources
    pub fn len(&self) -> usize {
        self.published.len()
    }

    /// Whether nothing is published
    pub fn is_empty(&self) -> bool {
        self.published.is_empty()
    }
}
