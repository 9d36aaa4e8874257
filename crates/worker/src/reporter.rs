//! System-of-record reporting.
//!
//! A forged application is only durable once the system of record has
//! accepted its credential. Reporters are shared across the worker pool and
//! must be safe to call concurrently.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::{ForgeId, TenantId};
use serde::Serialize;
use superkey::ForgedApplication;

use crate::error::ReportError;

/// Header carrying the tenant on every system-of-record request.
pub const ORG_ID_HEADER: &str = "x-rh-sources-org-id";

const AUTHENTICATIONS_PATH: &str = "/api/sources/v3.1/authentications";

/// Records a forged application with the tenant-visible system of record.
#[async_trait]
pub trait SystemOfRecord: Send + Sync {
    async fn create_application_record(
        &self,
        application: &ForgedApplication,
    ) -> Result<(), ReportError>;
}

#[derive(Debug, Serialize)]
struct AuthenticationRecord<'a> {
    resource_type: &'static str,
    resource_id: &'a str,
    authtype: &'a str,
    username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
}

/// Reports to the sources API over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSystemOfRecord {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSystemOfRecord {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ReportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), AUTHENTICATIONS_PATH),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SystemOfRecord for HttpSystemOfRecord {
    #[tracing::instrument(skip(self, application), fields(forge_id = %application.forge_id))]
    async fn create_application_record(
        &self,
        application: &ForgedApplication,
    ) -> Result<(), ReportError> {
        let application_id = application
            .request
            .application_id
            .as_deref()
            .ok_or(ReportError::Incomplete("applicationId"))?;
        let credential = application
            .credential
            .as_ref()
            .ok_or(ReportError::Incomplete("credential"))?;

        let record = AuthenticationRecord {
            resource_type: "Application",
            resource_id: application_id,
            authtype: &credential.authtype,
            username: &credential.username,
            password: credential.password.as_deref(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(ORG_ID_HEADER, application.tenant_id().as_str())
            .json(&record)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(application_id, "authentication recorded");
        Ok(())
    }
}

/// A record accepted by [`InMemorySystemOfRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationRecord {
    pub forge_id: ForgeId,
    pub tenant_id: TenantId,
    pub application_type: String,
    pub application_id: Option<String>,
    pub resources: usize,
}

#[derive(Debug, Default)]
struct RecordState {
    records: Vec<ApplicationRecord>,
    attempts: usize,
    fail: bool,
}

/// In-memory system of record for tests and local runs.
///
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemorySystemOfRecord {
    state: Arc<RwLock<RecordState>>,
}

impl InMemorySystemOfRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail until reset.
    pub fn set_fail(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail = fail;
    }

    pub fn records(&self) -> Vec<ApplicationRecord> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .clone()
    }

    pub fn record_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .len()
    }

    /// Calls made, including failed ones.
    pub fn attempts(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .attempts
    }
}

#[async_trait]
impl SystemOfRecord for InMemorySystemOfRecord {
    async fn create_application_record(
        &self,
        application: &ForgedApplication,
    ) -> Result<(), ReportError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.attempts += 1;

        if state.fail {
            return Err(ReportError::Unavailable(
                "system of record rejected the record".to_string(),
            ));
        }

        state.records.push(ApplicationRecord {
            forge_id: application.forge_id,
            tenant_id: application.tenant_id().clone(),
            application_type: application.application_type().to_string(),
            application_id: application.request.application_id.clone(),
            resources: application.resources.len(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use superkey::{CreateRequest, Credential};
    use tokio::net::TcpListener;
    use tokio::sync::Mutex;

    type Captured = Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>;

    fn application(application_id: Option<&str>, credential: Option<Credential>) -> ForgedApplication {
        let mut request = CreateRequest::new("tenant-1", "cost-management", "aws");
        if let Some(id) = application_id {
            request = request.with_application_id(id);
        }
        ForgedApplication::new(ForgeId::new(), request, Vec::new(), credential)
    }

    async fn serve(status: StatusCode) -> (String, Captured) {
        let captured: Captured = Arc::new(Mutex::new(Vec::new()));

        async fn record(
            State((captured, status)): State<(Captured, StatusCode)>,
            headers: HeaderMap,
            Json(body): Json<serde_json::Value>,
        ) -> StatusCode {
            let org = headers
                .get(ORG_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            captured.lock().await.push((org, body));
            status
        }

        let app = Router::new()
            .route(AUTHENTICATIONS_PATH, post(record))
            .with_state((captured.clone(), status));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), captured)
    }

    #[tokio::test]
    async fn test_http_record_posts_authentication() {
        let (base_url, captured) = serve(StatusCode::CREATED).await;
        let reporter = HttpSystemOfRecord::new(&base_url, Duration::from_secs(5)).unwrap();
        let credential = Credential::new("arn", "arn:aws:iam::123:role/r").with_password("pw");

        reporter
            .create_application_record(&application(Some("42"), Some(credential)))
            .await
            .unwrap();

        let calls = captured.lock().await;
        assert_eq!(calls.len(), 1);
        let (org, body) = &calls[0];
        assert_eq!(org.as_deref(), Some("tenant-1"));
        assert_eq!(body["resource_type"], "Application");
        assert_eq!(body["resource_id"], "42");
        assert_eq!(body["authtype"], "arn");
        assert_eq!(body["username"], "arn:aws:iam::123:role/r");
        assert_eq!(body["password"], "pw");
    }

    #[tokio::test]
    async fn test_http_record_non_success_status() {
        let (base_url, _captured) = serve(StatusCode::BAD_REQUEST).await;
        let reporter = HttpSystemOfRecord::new(&base_url, Duration::from_secs(5)).unwrap();

        let result = reporter
            .create_application_record(&application(Some("42"), Some(Credential::new("arn", "a"))))
            .await;

        assert!(matches!(result, Err(ReportError::Status { status: 400, .. })));
    }

    #[tokio::test]
    async fn test_http_record_requires_application_id_and_credential() {
        let reporter =
            HttpSystemOfRecord::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();

        let missing_id = reporter
            .create_application_record(&application(None, Some(Credential::new("arn", "a"))))
            .await;
        assert!(matches!(missing_id, Err(ReportError::Incomplete("applicationId"))));

        let missing_credential = reporter
            .create_application_record(&application(Some("42"), None))
            .await;
        assert!(matches!(missing_credential, Err(ReportError::Incomplete("credential"))));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let reporter =
            HttpSystemOfRecord::new("http://sources:8000/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            reporter.endpoint(),
            "http://sources:8000/api/sources/v3.1/authentications"
        );
    }

    #[tokio::test]
    async fn test_in_memory_records_and_fails() {
        let reporter = InMemorySystemOfRecord::new();
        let app = application(Some("7"), None);

        reporter.create_application_record(&app).await.unwrap();
        assert_eq!(reporter.record_count(), 1);
        assert_eq!(reporter.records()[0].application_id.as_deref(), Some("7"));

        reporter.set_fail(true);
        assert!(reporter.create_application_record(&app).await.is_err());
        assert_eq!(reporter.record_count(), 1);
        assert_eq!(reporter.attempts(), 2);
    }
}
