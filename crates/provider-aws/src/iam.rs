//! IAM policy and role management for superkeys.

use async_trait::async_trait;
use aws_sdk_iam::Client;
use aws_sdk_iam::error::DisplayErrorContext;
use aws_sdk_iam::types::Tag;
use forge::{
    AccessKeySpec, AttachmentSpec, PolicySpec, ProviderDriver, ProviderError, Provisioned,
    RoleSpec,
};
use superkey::{Credential, ResourceHandle, ResourceKind};
use tracing::{debug, info};

use crate::PROVIDER;

/// Tag applied to every resource the worker creates.
const TAG_MANAGED_BY: &str = "managed-by";
const TAG_MANAGED_BY_VALUE: &str = "superkey-worker";

/// Authentication type reported for role-based superkeys.
const AUTHTYPE_ROLE_ARN: &str = "arn";

/// Generate the trust policy that lets `trusted_account` assume the role.
///
/// When an external id is given, assuming the role also requires it.
pub fn trust_policy(trusted_account: &str, external_id: Option<&str>) -> String {
    let mut statement = serde_json::json!({
        "Effect": "Allow",
        "Principal": {
            "AWS": format!("arn:aws:iam::{}:root", trusted_account)
        },
        "Action": "sts:AssumeRole"
    });

    if let Some(external_id) = external_id {
        statement["Condition"] = serde_json::json!({
            "StringEquals": { "sts:ExternalId": external_id }
        });
    }

    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [statement]
    })
    .to_string()
}

fn api_error<E: std::error::Error>(operation: &'static str, err: E) -> ProviderError {
    ProviderError::Api {
        operation,
        message: DisplayErrorContext(err).to_string(),
    }
}

fn managed_by_tag() -> Result<Tag, ProviderError> {
    Tag::builder()
        .key(TAG_MANAGED_BY)
        .value(TAG_MANAGED_BY_VALUE)
        .build()
        .map_err(|e| api_error("BuildTag", e))
}

/// IAM driver bound to one tenant's account and credentials.
pub struct AwsIamDriver {
    client: Client,
    account_id: String,
}

impl AwsIamDriver {
    pub fn new(client: Client, account_id: impl Into<String>) -> Self {
        Self {
            client,
            account_id: account_id.into(),
        }
    }

    pub fn policy_arn(&self, name: &str) -> String {
        format!("arn:aws:iam::{}:policy/{}", self.account_id, name)
    }

    pub fn role_arn(&self, name: &str) -> String {
        format!("arn:aws:iam::{}:role/{}", self.account_id, name)
    }
}

#[async_trait]
impl ProviderDriver for AwsIamDriver {
    fn provider(&self) -> &str {
        PROVIDER
    }

    async fn create_policy(&self, spec: &PolicySpec) -> Result<Provisioned, ProviderError> {
        self.client
            .create_policy()
            .policy_name(&spec.name)
            .policy_document(&spec.document)
            .tags(managed_by_tag()?)
            .send()
            .await
            .map_err(|e| api_error("CreatePolicy", e))?;

        let arn = self.policy_arn(&spec.name);
        info!(policy_arn = %arn, "IAM policy created");

        Ok(Provisioned::new(ResourceHandle::new(&arn))
            .with_output("name", &spec.name)
            .with_output("arn", arn))
    }

    async fn delete_policy(&self, handle: &ResourceHandle) -> Result<(), ProviderError> {
        match self
            .client
            .delete_policy()
            .policy_arn(&handle.id)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_no_such_entity_exception()) =>
            {
                debug!(policy_arn = %handle.id, "IAM policy already deleted");
                Ok(())
            }
            Err(err) => Err(api_error("DeletePolicy", err)),
        }
    }

    async fn create_role(&self, spec: &RoleSpec) -> Result<Provisioned, ProviderError> {
        let document = trust_policy(&spec.trusted_account, spec.external_id.as_deref());

        self.client
            .create_role()
            .role_name(&spec.name)
            .assume_role_policy_document(document)
            .description("Temporary superkey role")
            .tags(managed_by_tag()?)
            .send()
            .await
            .map_err(|e| api_error("CreateRole", e))?;

        let arn = self.role_arn(&spec.name);
        info!(role_arn = %arn, "IAM role created");

        Ok(Provisioned::new(ResourceHandle::new(&spec.name))
            .with_output("name", &spec.name)
            .with_output("arn", &arn)
            .with_credential(Credential::new(AUTHTYPE_ROLE_ARN, arn)))
    }

    async fn delete_role(&self, handle: &ResourceHandle) -> Result<(), ProviderError> {
        match self.client.delete_role().role_name(&handle.id).send().await {
            Ok(_) => Ok(()),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_no_such_entity_exception()) =>
            {
                debug!(role_name = %handle.id, "IAM role already deleted");
                Ok(())
            }
            Err(err) => Err(api_error("DeleteRole", err)),
        }
    }

    async fn attach_policy(&self, spec: &AttachmentSpec) -> Result<Provisioned, ProviderError> {
        self.client
            .attach_role_policy()
            .role_name(&spec.role_name)
            .policy_arn(&spec.policy_arn)
            .send()
            .await
            .map_err(|e| api_error("AttachRolePolicy", e))?;

        debug!(role_name = %spec.role_name, policy_arn = %spec.policy_arn, "policy attached");

        let role_arn = self.role_arn(&spec.role_name);
        Ok(
            Provisioned::new(ResourceHandle::scoped(&spec.policy_arn, &spec.role_name))
                .with_output("role_arn", &role_arn)
                .with_credential(Credential::new(AUTHTYPE_ROLE_ARN, role_arn)),
        )
    }

    async fn detach_policy(&self, handle: &ResourceHandle) -> Result<(), ProviderError> {
        let Some(role_name) = handle.parent.as_deref() else {
            return Err(ProviderError::Api {
                operation: "DetachRolePolicy",
                message: format!("attachment {} has no role", handle.id),
            });
        };

        match self
            .client
            .detach_role_policy()
            .role_name(role_name)
            .policy_arn(&handle.id)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_no_such_entity_exception()) =>
            {
                debug!(role_name, policy_arn = %handle.id, "policy already detached");
                Ok(())
            }
            Err(err) => Err(api_error("DetachRolePolicy", err)),
        }
    }

    // IAM access keys belong to users, which role-based superkeys never create.
    async fn create_access_key(&self, _spec: &AccessKeySpec) -> Result<Provisioned, ProviderError> {
        Err(ProviderError::Unsupported {
            provider: PROVIDER.to_string(),
            kind: ResourceKind::AccessKey,
        })
    }

    async fn delete_access_key(&self, _handle: &ResourceHandle) -> Result<(), ProviderError> {
        Err(ProviderError::Unsupported {
            provider: PROVIDER.to_string(),
            kind: ResourceKind::AccessKey,
        })
    }
}
