//! Routes inbound events to the forge and the system of record.

use common::ForgeId;
use forge::ForgeEngine;
use superkey::CreateRequest;
use tracing::{error, info, warn};

use crate::error::DispatchError;
use crate::event::{EventKind, InboundEvent};
use crate::reporter::SystemOfRecord;

/// How a single event was handled.
///
/// Every variant means the event is consumed; none asks for redelivery.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Forged and recorded.
    Committed { forge_id: ForgeId, resources: usize },

    /// Forge or report failed; whatever was created has been torn down.
    Compensated(DispatchError),

    /// The payload did not decode into a create request.
    Dropped { reason: String },

    /// A recognized event with no handler yet.
    Unimplemented(EventKind),

    /// Missing or unknown `event_type`.
    Unrecognized(Option<String>),
}

impl DispatchOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, DispatchOutcome::Committed { .. })
    }
}

/// Handles one event at a time; share it behind an `Arc` across workers.
pub struct Dispatcher<R: SystemOfRecord> {
    engine: ForgeEngine,
    reporter: R,
}

impl<R: SystemOfRecord> Dispatcher<R> {
    pub fn new(engine: ForgeEngine, reporter: R) -> Self {
        Self { engine, reporter }
    }

    pub fn engine(&self) -> &ForgeEngine {
        &self.engine
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    #[tracing::instrument(skip_all, fields(event_type = tracing::field::Empty))]
    pub async fn handle(&self, event: &InboundEvent) -> DispatchOutcome {
        let kind = event.kind();
        tracing::Span::current().record("event_type", kind.as_str());
        metrics::counter!("superkey_events_total", "kind" => kind.as_str()).increment(1);

        match kind {
            EventKind::CreateApplication => self.create_application(&event.payload).await,
            EventKind::DeleteApplication => {
                warn!("delete_application is not implemented yet, skipping");
                DispatchOutcome::Unimplemented(kind)
            }
            EventKind::Unrecognized(tag) => {
                warn!(tag = ?tag, "unknown event_type, ignoring");
                DispatchOutcome::Unrecognized(tag)
            }
        }
    }

    async fn create_application(&self, payload: &[u8]) -> DispatchOutcome {
        let request = match CreateRequest::decode(payload) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "malformed create_application payload, dropping");
                return DispatchOutcome::Dropped {
                    reason: e.to_string(),
                };
            }
        };
        info!(?request, "processing create_application");

        let application = match self.engine.forge(&request).await {
            Ok(application) => application,
            Err(e) => {
                error!(tenant_id = %request.tenant_id, error = %e, "forge failed");
                return DispatchOutcome::Compensated(DispatchError::Forge(e));
            }
        };

        if let Err(e) = self.reporter.create_application_record(&application).await {
            metrics::counter!("superkey_report_failed_total").increment(1);
            error!(
                forge_id = %application.forge_id,
                error = %e,
                "failed to record application, tearing down"
            );

            let report = self.engine.tear_down(&application).await;
            for failure in report.failed() {
                error!(
                    resource = %failure.resource.handle,
                    kind = %failure.resource.kind,
                    "resource left behind after report failure"
                );
            }
            return DispatchOutcome::Compensated(DispatchError::Report(e));
        }

        info!(
            forge_id = %application.forge_id,
            resources = application.resources.len(),
            "application forged and recorded"
        );
        DispatchOutcome::Committed {
            forge_id: application.forge_id,
            resources: application.resources.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EVENT_TYPE_HEADER;
    use crate::reporter::InMemorySystemOfRecord;
    use forge::{ForgeError, InMemoryProvider, ProviderRegistry};
    use superkey::{PipelineCatalog, ResourceKind};

    const PAYLOAD: &str = r#"{
        "tenantId": "tenant-1",
        "applicationType": "cost-management",
        "provider": "aws",
        "applicationId": "42",
        "params": { "trustedAccountId": "589173575009" }
    }"#;

    fn setup() -> (Dispatcher<InMemorySystemOfRecord>, InMemoryProvider, InMemorySystemOfRecord) {
        let provider = InMemoryProvider::named("aws");
        let reporter = InMemorySystemOfRecord::new();
        let engine = ForgeEngine::new(
            PipelineCatalog::builtin().unwrap(),
            ProviderRegistry::new().with("aws", provider.clone()),
        );
        (Dispatcher::new(engine, reporter.clone()), provider, reporter)
    }

    fn event(tag: &str, payload: &str) -> InboundEvent {
        InboundEvent::new(payload).with_header(EVENT_TYPE_HEADER, tag)
    }

    #[tokio::test]
    async fn test_create_application_commits() {
        let (dispatcher, provider, reporter) = setup();

        let outcome = dispatcher.handle(&event("create_application", PAYLOAD)).await;

        assert!(matches!(outcome, DispatchOutcome::Committed { resources: 3, .. }));
        assert_eq!(provider.resource_count(), 3);
        assert_eq!(reporter.record_count(), 1);
        assert_eq!(reporter.records()[0].application_id.as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn test_missing_event_type_is_ignored() {
        let (dispatcher, provider, reporter) = setup();

        let outcome = dispatcher.handle(&InboundEvent::new(PAYLOAD)).await;

        assert!(matches!(outcome, DispatchOutcome::Unrecognized(None)));
        assert!(provider.calls().is_empty());
        assert_eq!(reporter.attempts(), 0);
    }

    #[tokio::test]
    async fn test_unknown_event_type_is_ignored() {
        let (dispatcher, provider, reporter) = setup();

        let outcome = dispatcher.handle(&event("rotate_application", PAYLOAD)).await;

        match outcome {
            DispatchOutcome::Unrecognized(Some(tag)) => assert_eq!(tag, "rotate_application"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(provider.calls().is_empty());
        assert_eq!(reporter.attempts(), 0);
    }

    #[tokio::test]
    async fn test_delete_application_is_unimplemented() {
        let (dispatcher, provider, _reporter) = setup();

        let outcome = dispatcher.handle(&event("delete_application", PAYLOAD)).await;

        assert!(matches!(
            outcome,
            DispatchOutcome::Unimplemented(EventKind::DeleteApplication)
        ));
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_dropped() {
        let (dispatcher, provider, reporter) = setup();

        let outcome = dispatcher.handle(&event("create_application", "{not json")).await;

        assert!(matches!(outcome, DispatchOutcome::Dropped { .. }));
        assert!(provider.calls().is_empty());
        assert_eq!(reporter.attempts(), 0);
    }

    #[tokio::test]
    async fn test_incomplete_payload_is_dropped() {
        let (dispatcher, provider, _reporter) = setup();
        let payload = r#"{"tenantId":"","applicationType":"cost-management","provider":"aws"}"#;

        let outcome = dispatcher.handle(&event("create_application", payload)).await;

        assert!(matches!(outcome, DispatchOutcome::Dropped { .. }));
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_step_failure_is_compensated_without_report() {
        let (dispatcher, provider, reporter) = setup();
        provider.set_fail_on_create(ResourceKind::PolicyAttachment, true);

        let outcome = dispatcher.handle(&event("create_application", PAYLOAD)).await;

        match outcome {
            DispatchOutcome::Compensated(DispatchError::Forge(ForgeError::StepFailed {
                step, ..
            })) => assert_eq!(step, "attach-policy"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(provider.resource_count(), 0);
        let deleted: Vec<String> = provider.delete_calls().into_iter().map(|h| h.id).collect();
        assert_eq!(deleted, vec!["ROLE-0002", "POL-0001"]);
        assert_eq!(reporter.attempts(), 0);
    }

    #[tokio::test]
    async fn test_report_failure_tears_down_everything() {
        let (dispatcher, provider, reporter) = setup();
        reporter.set_fail(true);

        let outcome = dispatcher.handle(&event("create_application", PAYLOAD)).await;

        match &outcome {
            DispatchOutcome::Compensated(error) => assert!(error.is_report_failure()),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(reporter.attempts(), 1);
        assert_eq!(provider.resource_count(), 0);
        let deleted: Vec<String> = provider.delete_calls().into_iter().map(|h| h.id).collect();
        assert_eq!(deleted, vec!["ATT-0003", "ROLE-0002", "POL-0001"]);
    }

    #[tokio::test]
    async fn test_unknown_application_type_never_reaches_provider() {
        let (dispatcher, provider, reporter) = setup();
        let payload = r#"{"tenantId":"t","applicationType":"insights","provider":"aws"}"#;

        let outcome = dispatcher.handle(&event("create_application", payload)).await;

        assert!(matches!(
            outcome,
            DispatchOutcome::Compensated(DispatchError::Forge(
                ForgeError::UnknownApplicationType(_)
            ))
        ));
        assert!(provider.calls().is_empty());
        assert_eq!(reporter.attempts(), 0);
    }
}
