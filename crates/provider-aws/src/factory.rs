//! Per-request IAM client construction.

use std::sync::Arc;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_iam::config::Credentials;
use forge::{ProviderDriver, ProviderError, ProviderFactory};
use superkey::CreateRequest;

use crate::iam::AwsIamDriver;

/// Request parameter holding the tenant's AWS account id.
pub const PARAM_ACCOUNT_ID: &str = "accountId";
/// Request parameter holding the tenant's access key id.
pub const PARAM_ACCESS_KEY_ID: &str = "accessKeyId";
/// Request parameter holding the tenant's secret access key.
pub const PARAM_SECRET_ACCESS_KEY: &str = "secretAccessKey";

/// Builds IAM drivers bound to each request's credentials.
///
/// The loaded SDK config (region, retry and HTTP settings) is shared by all
/// drivers; only the credentials provider differs per request.
#[derive(Clone)]
pub struct AwsIamFactory {
    config: Arc<SdkConfig>,
}

impl AwsIamFactory {
    /// Loads AWS configuration for the given region.
    pub async fn new(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        Self::from_sdk_config(config)
    }

    pub fn from_sdk_config(config: SdkConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

fn required<'a>(request: &'a CreateRequest, key: &str) -> Result<&'a str, ProviderError> {
    request
        .param(key)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ProviderError::Credentials(format!("request is missing '{key}'")))
}

#[async_trait]
impl ProviderFactory for AwsIamFactory {
    async fn connect(
        &self,
        request: &CreateRequest,
    ) -> Result<Arc<dyn ProviderDriver>, ProviderError> {
        let account_id = required(request, PARAM_ACCOUNT_ID)?;
        let access_key_id = required(request, PARAM_ACCESS_KEY_ID)?;
        let secret_access_key = required(request, PARAM_SECRET_ACCESS_KEY)?;

        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "superkey-request",
        );
        let conf = aws_sdk_iam::config::Builder::from(self.config.as_ref())
            .credentials_provider(credentials)
            .build();

        tracing::debug!(tenant_id = %request.tenant_id, account_id, "IAM client built");

        Ok(Arc::new(AwsIamDriver::new(
            aws_sdk_iam::Client::from_conf(conf),
            account_id,
        )))
    }
}
