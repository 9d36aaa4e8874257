use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a single forge run.
///
/// Every pipeline execution gets a fresh id. It is used to correlate log
/// records and to derive unique names for provisioned resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ForgeId(Uuid);

impl ForgeId {
    /// Creates a new random forge ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a forge ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Returns the first eight hex digits, short enough for cloud resource names.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for ForgeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ForgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ForgeId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Identifier of the tenant that owns an application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}
