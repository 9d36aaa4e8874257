//! Provider resource driver abstraction.
//!
//! A driver exposes one create and one delete operation per resource kind.
//! Creates are not idempotent: a retried create may leave a duplicate behind,
//! so callers never retry them. Deletes must treat "already gone" as success
//! so repeated teardown attempts stay safe.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use superkey::{CreateRequest, Credential, ResolvedInputs, ResourceHandle, ResourceKind};

use crate::error::ProviderError;

/// Inputs for creating a policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySpec {
    pub name: String,
    pub document: String,
}

/// Inputs for creating a role assumable from a trusted account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSpec {
    pub name: String,
    pub trusted_account: String,
    pub external_id: Option<String>,
}

/// Inputs for attaching a policy to a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentSpec {
    pub policy_arn: String,
    pub role_name: String,
}

/// Inputs for issuing an access key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessKeySpec {
    pub user_name: String,
}

/// Kind-specific typed inputs for one create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceSpec {
    Policy(PolicySpec),
    Role(RoleSpec),
    PolicyAttachment(AttachmentSpec),
    AccessKey(AccessKeySpec),
}

impl ResourceSpec {
    /// Builds the typed spec for `kind` from a step's resolved inputs.
    pub fn from_inputs(kind: ResourceKind, inputs: &ResolvedInputs) -> superkey::Result<Self> {
        let spec = match kind {
            ResourceKind::Policy => ResourceSpec::Policy(PolicySpec {
                name: inputs.require("name")?.to_string(),
                document: inputs.require("document")?.to_string(),
            }),
            ResourceKind::Role => ResourceSpec::Role(RoleSpec {
                name: inputs.require("name")?.to_string(),
                trusted_account: inputs.require("trusted_account")?.to_string(),
                external_id: inputs.get("external_id").map(str::to_string),
            }),
            ResourceKind::PolicyAttachment => ResourceSpec::PolicyAttachment(AttachmentSpec {
                policy_arn: inputs.require("policy_arn")?.to_string(),
                role_name: inputs.require("role_name")?.to_string(),
            }),
            ResourceKind::AccessKey => ResourceSpec::AccessKey(AccessKeySpec {
                user_name: inputs.require("user_name")?.to_string(),
            }),
        };
        Ok(spec)
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSpec::Policy(_) => ResourceKind::Policy,
            ResourceSpec::Role(_) => ResourceKind::Role,
            ResourceSpec::PolicyAttachment(_) => ResourceKind::PolicyAttachment,
            ResourceSpec::AccessKey(_) => ResourceKind::AccessKey,
        }
    }
}

/// A resource the provider has just created.
///
/// `outputs` are visible to later steps of the same run by key (for example
/// `arn` or `name`). `credential` is only meaningful on a pipeline's final step.
#[derive(Debug, Clone)]
pub struct Provisioned {
    pub handle: ResourceHandle,
    pub outputs: BTreeMap<String, String>,
    pub credential: Option<Credential>,
}

impl Provisioned {
    pub fn new(handle: ResourceHandle) -> Self {
        Self {
            handle,
            outputs: BTreeMap::new(),
            credential: None,
        }
    }

    pub fn with_output(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.outputs.insert(key.into(), value.into());
        self
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }
}

/// Create/delete capabilities of one cloud provider.
#[async_trait]
pub trait ProviderDriver: Send + Sync {
    /// Provider identifier, e.g. `"aws"`.
    fn provider(&self) -> &str;

    async fn create_policy(&self, spec: &PolicySpec) -> Result<Provisioned, ProviderError>;

    async fn delete_policy(&self, handle: &ResourceHandle) -> Result<(), ProviderError>;

    async fn create_role(&self, spec: &RoleSpec) -> Result<Provisioned, ProviderError>;

    async fn delete_role(&self, handle: &ResourceHandle) -> Result<(), ProviderError>;

    async fn attach_policy(&self, spec: &AttachmentSpec) -> Result<Provisioned, ProviderError>;

    async fn detach_policy(&self, handle: &ResourceHandle) -> Result<(), ProviderError>;

    async fn create_access_key(&self, spec: &AccessKeySpec) -> Result<Provisioned, ProviderError>;

    async fn delete_access_key(&self, handle: &ResourceHandle) -> Result<(), ProviderError>;
}

/// Routes a typed spec to the driver's create operation for its kind.
pub async fn create_resource(
    driver: &dyn ProviderDriver,
    spec: &ResourceSpec,
) -> Result<Provisioned, ProviderError> {
    match spec {
        ResourceSpec::Policy(spec) => driver.create_policy(spec).await,
        ResourceSpec::Role(spec) => driver.create_role(spec).await,
        ResourceSpec::PolicyAttachment(spec) => driver.attach_policy(spec).await,
        ResourceSpec::AccessKey(spec) => driver.create_access_key(spec).await,
    }
}

/// Routes a handle to the driver's delete operation for its kind.
pub async fn delete_resource(
    driver: &dyn ProviderDriver,
    kind: ResourceKind,
    handle: &ResourceHandle,
) -> Result<(), ProviderError> {
    match kind {
        ResourceKind::Policy => driver.delete_policy(handle).await,
        ResourceKind::Role => driver.delete_role(handle).await,
        ResourceKind::PolicyAttachment => driver.detach_policy(handle).await,
        ResourceKind::AccessKey => driver.delete_access_key(handle).await,
    }
}

/// Builds a driver bound to the credentials carried by one request.
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    async fn connect(
        &self,
        request: &CreateRequest,
    ) -> Result<Arc<dyn ProviderDriver>, ProviderError>;
}

/// Provider factories keyed by provider identifier.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    factories: HashMap<String, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory, replacing any previous one for the provider.
    pub fn with(
        mut self,
        provider: impl Into<String>,
        factory: impl ProviderFactory + 'static,
    ) -> Self {
        self.factories.insert(provider.into(), Arc::new(factory));
        self
    }

    pub fn get(&self, provider: &str) -> Option<Arc<dyn ProviderFactory>> {
        self.factories.get(provider).cloned()
    }

    pub fn providers(&self) -> Vec<&str> {
        let mut providers: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        providers.sort_unstable();
        providers
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use superkey::SuperkeyError;

    #[test]
    fn test_spec_from_inputs() {
        let inputs = ResolvedInputs::new("create-role")
            .with("name", "role-1")
            .with("trusted_account", "999");
        let spec = ResourceSpec::from_inputs(ResourceKind::Role, &inputs).unwrap();
        assert_eq!(spec.kind(), ResourceKind::Role);
        assert_eq!(
            spec,
            ResourceSpec::Role(RoleSpec {
                name: "role-1".to_string(),
                trusted_account: "999".to_string(),
                external_id: None,
            })
        );
    }

    #[test]
    fn test_spec_missing_required_input() {
        let inputs = ResolvedInputs::new("create-policy").with("name", "policy-1");
        let err = ResourceSpec::from_inputs(ResourceKind::Policy, &inputs).unwrap_err();
        match err {
            SuperkeyError::MissingInput { step, input } => {
                assert_eq!(step, "create-policy");
                assert_eq!(input, "document");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ProviderRegistry::new()
            .with("aws", crate::InMemoryProvider::named("aws"))
            .with("memory", crate::InMemoryProvider::new());
        assert_eq!(registry.providers(), vec!["aws", "memory"]);
        assert!(registry.get("aws").is_some());
        assert!(registry.get("gcp").is_none());
    }
}
