//! Forged applications and the credential material they carry.

use chrono::{DateTime, Utc};
use common::{ForgeId, TenantId};

use crate::request::CreateRequest;
use crate::resource::CreatedResource;

/// Credential material produced by the final step of a pipeline.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Authentication type understood by the system of record.
    pub authtype: String,
    pub username: String,
    pub password: Option<String>,
}

impl Credential {
    pub fn new(authtype: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            authtype: authtype.into(),
            username: username.into(),
            password: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("authtype", &self.authtype)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// The outcome of a pipeline run where every step succeeded.
///
/// `resources` is in creation order and always covers the full pipeline.
/// The aggregate is only committed once the system of record accepts it;
/// otherwise its resources are torn down and it is discarded.
#[derive(Debug, Clone)]
pub struct ForgedApplication {
    pub forge_id: ForgeId,
    pub request: CreateRequest,
    pub resources: Vec<CreatedResource>,
    pub credential: Option<Credential>,
    pub forged_at: DateTime<Utc>,
}

impl ForgedApplication {
    pub fn new(
        forge_id: ForgeId,
        request: CreateRequest,
        resources: Vec<CreatedResource>,
        credential: Option<Credential>,
    ) -> Self {
        Self {
            forge_id,
            request,
            resources,
            credential,
            forged_at: Utc::now(),
        }
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.request.tenant_id
    }

    pub fn application_type(&self) -> &str {
        &self.request.application_type
    }

    pub fn provider(&self) -> &str {
        &self.request.provider
    }
}
