//! Create requests decoded from `create_application` events.

use std::collections::BTreeMap;

use common::TenantId;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SuperkeyError};

/// A tenant's request to forge a superkey for one application.
///
/// Immutable once decoded. `params` carries provider-specific inputs such as
/// the cloud account id and, for providers that need them, the tenant's own
/// credentials. Its `Debug` output therefore lists parameter keys only.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    pub tenant_id: TenantId,
    pub application_type: String,
    pub provider: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
}

impl CreateRequest {
    /// Creates a request with no parameters.
    pub fn new(
        tenant_id: impl Into<String>,
        application_type: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: TenantId::new(tenant_id),
            application_type: application_type.into(),
            provider: provider.into(),
            params: BTreeMap::new(),
            source_id: None,
            application_id: None,
        }
    }

    /// Adds a provider parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Sets the application this request belongs to in the system of record.
    pub fn with_application_id(mut self, application_id: impl Into<String>) -> Self {
        self.application_id = Some(application_id.into());
        self
    }

    /// Sets the source this request belongs to in the system of record.
    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    /// Decodes a request from a raw event payload.
    ///
    /// Missing or empty identity fields are rejected; such a payload will
    /// never become valid on redelivery.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let request: CreateRequest = serde_json::from_slice(payload)?;

        if request.tenant_id.as_str().is_empty() {
            return Err(SuperkeyError::IncompleteRequest("tenantId"));
        }
        if request.application_type.is_empty() {
            return Err(SuperkeyError::IncompleteRequest("applicationType"));
        }
        if request.provider.is_empty() {
            return Err(SuperkeyError::IncompleteRequest("provider"));
        }

        Ok(request)
    }

    /// Looks up a provider parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

impl std::fmt::Debug for CreateRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateRequest")
            .field("tenant_id", &self.tenant_id)
            .field("application_type", &self.application_type)
            .field("provider", &self.provider)
            .field("params", &self.params.keys().collect::<Vec<_>>())
            .field("source_id", &self.source_id)
            .field("application_id", &self.application_id)
            .finish()
    }
}
