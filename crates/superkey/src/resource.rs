//! Provisioned resource bookkeeping.

use serde::{Deserialize, Serialize};

/// The kinds of cloud resources a pipeline step can create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// An access policy document.
    Policy,

    /// An assumable identity.
    Role,

    /// A binding of a policy to a role.
    PolicyAttachment,

    /// A long-lived key pair.
    AccessKey,
}

impl ResourceKind {
    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Policy => "policy",
            ResourceKind::Role => "role",
            ResourceKind::PolicyAttachment => "policy_attachment",
            ResourceKind::AccessKey => "access_key",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Provider-assigned handle used to delete a resource later.
///
/// `parent` scopes resources that only exist relative to another one, such
/// as the role a policy is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceHandle {
    pub id: String,
    pub parent: Option<String>,
}

impl ResourceHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent: None,
        }
    }

    pub fn scoped(id: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent: Some(parent.into()),
        }
    }
}

impl std::fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.parent {
            Some(parent) => write!(f, "{}/{}", parent, self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Record of one resource actually provisioned during a forge run.
///
/// `ordinal` is the zero-based position in creation order. Records are
/// never mutated once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedResource {
    pub step: String,
    pub kind: ResourceKind,
    pub handle: ResourceHandle,
    pub ordinal: usize,
}

impl CreatedResource {
    pub fn new(
        step: impl Into<String>,
        kind: ResourceKind,
        handle: ResourceHandle,
        ordinal: usize,
    ) -> Self {
        Self {
            step: step.into(),
            kind,
            handle,
            ordinal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display() {
        assert_eq!(ResourceKind::Policy.to_string(), "policy");
        assert_eq!(ResourceKind::Role.to_string(), "role");
        assert_eq!(
            ResourceKind::PolicyAttachment.to_string(),
            "policy_attachment"
        );
        assert_eq!(ResourceKind::AccessKey.to_string(), "access_key");
    }

    #[test]
    fn test_kind_serializes_as_snake_case() {
        let json = serde_json::to_string(&ResourceKind::PolicyAttachment).unwrap();
        assert_eq!(json, "\"policy_attachment\"");
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(ResourceHandle::new("policy-1").to_string(), "policy-1");
        assert_eq!(
            ResourceHandle::scoped("arn:policy", "role-1").to_string(),
            "role-1/arn:policy"
        );
    }
}
