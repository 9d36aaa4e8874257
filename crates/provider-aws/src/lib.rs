//! AWS IAM provider for superkey forging.
//!
//! [`AwsIamFactory`] loads the base SDK configuration once and builds one
//! [`AwsIamDriver`] per request, authenticated with the static credentials
//! the tenant supplied in the request parameters.

pub mod factory;
pub mod iam;

pub use factory::{AwsIamFactory, PARAM_ACCESS_KEY_ID, PARAM_ACCOUNT_ID, PARAM_SECRET_ACCESS_KEY};
pub use iam::{AwsIamDriver, trust_policy};

/// Provider identifier used in create requests and pipelines.
pub const PROVIDER: &str = "aws";
