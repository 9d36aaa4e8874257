//! Integration tests for the forge/teardown saga.

use forge::{ForgeEngine, ForgeError, InMemoryProvider, ProviderCall, ProviderRegistry};
use superkey::{
    CreateRequest, InputSource, Pipeline, PipelineCatalog, ResourceKind, StepDefinition,
};

struct TestHarness {
    engine: ForgeEngine,
    provider: InMemoryProvider,
}

impl TestHarness {
    /// Three-step `aws-iam` pipeline: create-policy → create-role → create-access-key.
    fn new() -> Self {
        let pipeline = Pipeline::new(
            "aws",
            vec![
                StepDefinition::new("create-policy", ResourceKind::Policy)
                    .input("name", InputSource::generated("superkey-policy"))
                    .input("document", InputSource::literal(r#"{"Version":"2012-10-17"}"#)),
                StepDefinition::new("create-role", ResourceKind::Role)
                    .input("name", InputSource::generated("superkey-role"))
                    .input("trusted_account", InputSource::request("accountId")),
                StepDefinition::new("create-access-key", ResourceKind::AccessKey)
                    .input("user_name", InputSource::output("create-role", "name")),
            ],
        )
        .unwrap();

        let provider = InMemoryProvider::named("aws");
        let engine = ForgeEngine::new(
            PipelineCatalog::new().with("aws-iam", pipeline),
            ProviderRegistry::new().with("aws", provider.clone()),
        );

        Self { engine, provider }
    }

    fn request() -> CreateRequest {
        CreateRequest::decode(
            br#"{"tenantId":"t1","applicationType":"aws-iam","provider":"aws","params":{"accountId":"123"}}"#,
        )
        .unwrap()
    }
}

#[tokio::test]
async fn test_all_steps_succeed() {
    let h = TestHarness::new();

    let app = h.engine.forge(&TestHarness::request()).await.unwrap();

    assert_eq!(app.resources.len(), 3);
    let kinds: Vec<ResourceKind> = app.resources.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ResourceKind::Policy,
            ResourceKind::Role,
            ResourceKind::AccessKey
        ]
    );
    let ordinals: Vec<usize> = app.resources.iter().map(|r| r.ordinal).collect();
    assert_eq!(ordinals, vec![0, 1, 2]);

    // Credential material comes from the final step.
    let credential = app.credential.clone().unwrap();
    assert_eq!(credential.authtype, "access_key_secret_key");
    assert_eq!(credential.username, "KEY-0003");
    assert!(credential.password.is_some());

    assert_eq!(app.tenant_id().as_str(), "t1");
    assert_eq!(h.provider.resource_count(), 3);
    assert!(h.provider.delete_calls().is_empty());
}

#[tokio::test]
async fn test_role_failure_deletes_only_policy() {
    let h = TestHarness::new();
    h.provider.set_fail_on_create(ResourceKind::Role, true);

    let err = h.engine.forge(&TestHarness::request()).await.unwrap_err();

    // The root cause is the role creation, not anything teardown did.
    match &err {
        ForgeError::StepFailed { step, kind, .. } => {
            assert_eq!(step, "create-role");
            assert_eq!(*kind, ResourceKind::Role);
        }
        other => panic!("unexpected error: {other}"),
    }

    let deletes: Vec<ProviderCall> = h
        .provider
        .calls()
        .into_iter()
        .filter(|c| matches!(c, ProviderCall::Delete { .. }))
        .collect();
    assert_eq!(deletes.len(), 1);
    assert!(matches!(
        &deletes[0],
        ProviderCall::Delete {
            kind: ResourceKind::Policy,
            handle,
        } if handle.id == "POL-0001"
    ));
    assert_eq!(h.provider.resource_count(), 0);
}

#[tokio::test]
async fn test_access_key_failure_unwinds_role_then_policy() {
    let h = TestHarness::new();
    h.provider.set_fail_on_create(ResourceKind::AccessKey, true);

    let err = h.engine.forge(&TestHarness::request()).await.unwrap_err();
    assert_eq!(err.step(), Some("create-access-key"));

    let ids: Vec<String> = h.provider.delete_calls().into_iter().map(|h| h.id).collect();
    assert_eq!(ids, vec!["ROLE-0002", "POL-0001"]);
    assert_eq!(h.provider.resource_count(), 0);
}

#[tokio::test]
async fn test_concurrent_forges_do_not_share_accumulators() {
    let h = TestHarness::new();
    let engine = std::sync::Arc::new(h.engine);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.forge(&TestHarness::request()).await
        }));
    }

    for handle in handles {
        let app = handle.await.unwrap().unwrap();
        assert_eq!(app.resources.len(), 3);
    }
    assert_eq!(h.provider.resource_count(), 24);
}

#[tokio::test]
async fn test_redelivery_forges_again() {
    // No deduplication: the same request forged twice yields two resource sets.
    let h = TestHarness::new();

    let first = h.engine.forge(&TestHarness::request()).await.unwrap();
    let second = h.engine.forge(&TestHarness::request()).await.unwrap();

    assert_ne!(first.forge_id, second.forge_id);
    assert_eq!(h.provider.resource_count(), 6);
}
