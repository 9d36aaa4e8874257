use criterion::{Criterion, criterion_group, criterion_main};
use forge::{ForgeEngine, InMemoryProvider, ProviderRegistry};
use superkey::{
    CreateRequest, InputSource, Pipeline, PipelineCatalog, ResourceKind, StepDefinition,
};

fn engine(provider: &InMemoryProvider) -> ForgeEngine {
    let pipeline = Pipeline::new(
        "memory",
        vec![
            StepDefinition::new("create-policy", ResourceKind::Policy)
                .input("name", InputSource::generated("bench-policy"))
                .input("document", InputSource::literal("{}")),
            StepDefinition::new("create-role", ResourceKind::Role)
                .input("name", InputSource::generated("bench-role"))
                .input("trusted_account", InputSource::literal("123")),
            StepDefinition::new("attach-policy", ResourceKind::PolicyAttachment)
                .input("policy_arn", InputSource::output("create-policy", "arn"))
                .input("role_name", InputSource::output("create-role", "name")),
        ],
    )
    .unwrap();

    ForgeEngine::new(
        PipelineCatalog::new().with("bench", pipeline),
        ProviderRegistry::new().with("memory", provider.clone()),
    )
}

fn bench_forge(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let provider = InMemoryProvider::new();
    let engine = engine(&provider);
    let request = CreateRequest::new("bench", "bench", "memory");

    c.bench_function("forge/three_step_pipeline", |b| {
        b.iter(|| {
            rt.block_on(async {
                engine.forge(&request).await.unwrap();
            });
        });
    });
}

fn bench_forge_with_teardown(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let provider = InMemoryProvider::new();
    provider.set_fail_on_create(ResourceKind::PolicyAttachment, true);
    let engine = engine(&provider);
    let request = CreateRequest::new("bench", "bench", "memory");

    c.bench_function("forge/fail_last_step_and_compensate", |b| {
        b.iter(|| {
            rt.block_on(async {
                engine.forge(&request).await.unwrap_err();
            });
        });
    });
}

criterion_group!(benches, bench_forge, bench_forge_with_teardown);
criterion_main!(benches);
