//! In-memory provider driver.
//!
//! Keeps live resources in a map and every create/delete attempt in an
//! ordered call log, so tests can assert exactly which provider calls a
//! forge or teardown made. Failures can be injected per resource kind on
//! create and per handle id on delete.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use superkey::{CreateRequest, Credential, ResourceHandle, ResourceKind};

use crate::error::ProviderError;
use crate::provider::{
    AccessKeySpec, AttachmentSpec, PolicySpec, ProviderDriver, ProviderFactory, Provisioned,
    RoleSpec,
};

/// One call made against the in-memory provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Create { kind: ResourceKind, name: String },
    Delete { kind: ResourceKind, handle: ResourceHandle },
}

#[derive(Debug, Default)]
struct InMemoryProviderState {
    live: HashMap<String, ResourceKind>,
    calls: Vec<ProviderCall>,
    next_id: u32,
    fail_on_create: HashSet<ResourceKind>,
    fail_on_delete: HashSet<String>,
    fail_on_connect: bool,
}

/// In-memory provider for tests and local runs.
///
/// Clones share state, so a clone handed to a registry can be inspected
/// through the original.
#[derive(Debug, Clone)]
pub struct InMemoryProvider {
    name: String,
    state: Arc<RwLock<InMemoryProviderState>>,
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::named("memory")
    }
}

impl InMemoryProvider {
    /// Creates a provider identified as `"memory"`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider that answers to the given identifier.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::default(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, InMemoryProviderState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, InMemoryProviderState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configures creates of `kind` to fail.
    pub fn set_fail_on_create(&self, kind: ResourceKind, fail: bool) {
        let mut state = self.write();
        if fail {
            state.fail_on_create.insert(kind);
        } else {
            state.fail_on_create.remove(&kind);
        }
    }

    /// Configures deletes of the resource with handle id `id` to fail.
    pub fn set_fail_on_delete(&self, id: impl Into<String>) {
        self.write().fail_on_delete.insert(id.into());
    }

    /// Configures `connect` to reject the request's credentials.
    pub fn set_fail_on_connect(&self, fail: bool) {
        self.write().fail_on_connect = fail;
    }

    /// Returns the number of resources currently provisioned.
    pub fn resource_count(&self) -> usize {
        self.read().live.len()
    }

    /// Returns true if a resource with the given handle id is provisioned.
    pub fn has_resource(&self, id: &str) -> bool {
        self.read().live.contains_key(id)
    }

    /// Returns every call made so far, in order.
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.read().calls.clone()
    }

    /// Returns the handles passed to delete calls, in order.
    pub fn delete_calls(&self) -> Vec<ResourceHandle> {
        self.read()
            .calls
            .iter()
            .filter_map(|call| match call {
                ProviderCall::Delete { handle, .. } => Some(handle.clone()),
                ProviderCall::Create { .. } => None,
            })
            .collect()
    }

    /// Returns the number of create calls made so far.
    pub fn create_call_count(&self) -> usize {
        self.read()
            .calls
            .iter()
            .filter(|call| matches!(call, ProviderCall::Create { .. }))
            .count()
    }

    fn create(
        &self,
        kind: ResourceKind,
        name: &str,
        prefix: &str,
    ) -> Result<String, ProviderError> {
        let mut state = self.write();
        state.calls.push(ProviderCall::Create {
            kind,
            name: name.to_string(),
        });

        if state.fail_on_create.contains(&kind) {
            return Err(ProviderError::Rejected {
                kind,
                reason: format!("{name} could not be created"),
            });
        }

        state.next_id += 1;
        let id = format!("{}-{:04}", prefix, state.next_id);
        state.live.insert(id.clone(), kind);
        Ok(id)
    }

    fn delete(&self, kind: ResourceKind, handle: &ResourceHandle) -> Result<(), ProviderError> {
        let mut state = self.write();
        state.calls.push(ProviderCall::Delete {
            kind,
            handle: handle.clone(),
        });

        if state.fail_on_delete.contains(&handle.id) {
            return Err(ProviderError::Api {
                operation: "delete",
                message: format!("{kind} {handle} is locked"),
            });
        }

        // Unknown handles count as already deleted.
        state.live.remove(&handle.id);
        Ok(())
    }
}

#[async_trait]
impl ProviderDriver for InMemoryProvider {
    fn provider(&self) -> &str {
        &self.name
    }

    async fn create_policy(&self, spec: &PolicySpec) -> Result<Provisioned, ProviderError> {
        let id = self.create(ResourceKind::Policy, &spec.name, "POL")?;
        Ok(Provisioned::new(ResourceHandle::new(&id))
            .with_output("name", &spec.name)
            .with_output("arn", format!("arn:memory:policy/{}", spec.name)))
    }

    async fn delete_policy(&self, handle: &ResourceHandle) -> Result<(), ProviderError> {
        self.delete(ResourceKind::Policy, handle)
    }

    async fn create_role(&self, spec: &RoleSpec) -> Result<Provisioned, ProviderError> {
        let id = self.create(ResourceKind::Role, &spec.name, "ROLE")?;
        let arn = format!("arn:memory:role/{}", spec.name);
        Ok(Provisioned::new(ResourceHandle::new(&id))
            .with_output("name", &spec.name)
            .with_output("arn", &arn)
            .with_credential(Credential::new("arn", arn)))
    }

    async fn delete_role(&self, handle: &ResourceHandle) -> Result<(), ProviderError> {
        self.delete(ResourceKind::Role, handle)
    }

    async fn attach_policy(&self, spec: &AttachmentSpec) -> Result<Provisioned, ProviderError> {
        let id = self.create(ResourceKind::PolicyAttachment, &spec.role_name, "ATT")?;
        let role_arn = format!("arn:memory:role/{}", spec.role_name);
        Ok(Provisioned::new(ResourceHandle::scoped(&id, &spec.role_name))
            .with_output("role_arn", &role_arn)
            .with_credential(Credential::new("arn", role_arn)))
    }

    async fn detach_policy(&self, handle: &ResourceHandle) -> Result<(), ProviderError> {
        self.delete(ResourceKind::PolicyAttachment, handle)
    }

    async fn create_access_key(&self, spec: &AccessKeySpec) -> Result<Provisioned, ProviderError> {
        let id = self.create(ResourceKind::AccessKey, &spec.user_name, "KEY")?;
        Ok(Provisioned::new(ResourceHandle::scoped(&id, &spec.user_name))
            .with_output("access_key_id", &id)
            .with_credential(
                Credential::new("access_key_secret_key", &id).with_password(format!("secret-{id}")),
            ))
    }

    async fn delete_access_key(&self, handle: &ResourceHandle) -> Result<(), ProviderError> {
        self.delete(ResourceKind::AccessKey, handle)
    }
}

#[async_trait]
impl ProviderFactory for InMemoryProvider {
    async fn connect(
        &self,
        _request: &CreateRequest,
    ) -> Result<Arc<dyn ProviderDriver>, ProviderError> {
        if self.read().fail_on_connect {
            return Err(ProviderError::Credentials(
                "credentials rejected".to_string(),
            ));
        }
        Ok(Arc::new(self.clone()))
    }
}
