//! Forge engine: runs a step pipeline and compensates on failure.

use std::sync::Arc;

use common::ForgeId;
use superkey::{
    CreateRequest, CreatedResource, ForgedApplication, PipelineCatalog, StepDefinition, StepOutputs,
};

use crate::error::{ForgeError, ProviderError, Result};
use crate::provider::{ProviderDriver, ProviderRegistry, Provisioned, ResourceSpec, create_resource};
use crate::teardown::{TeardownEngine, TeardownReport};

/// Executes step pipelines against provider drivers.
///
/// Each `forge` call owns its own accumulator of created resources; the
/// engine itself holds only read-only configuration and is cheap to share
/// between concurrent runs.
#[derive(Debug, Clone)]
pub struct ForgeEngine {
    catalog: PipelineCatalog,
    providers: ProviderRegistry,
}

impl ForgeEngine {
    /// Creates a new forge engine.
    pub fn new(catalog: PipelineCatalog, providers: ProviderRegistry) -> Self {
        Self { catalog, providers }
    }

    pub fn catalog(&self) -> &PipelineCatalog {
        &self.catalog
    }

    /// Runs the pipeline for the request's application type.
    ///
    /// Steps run strictly in order and a failed step is never retried. On
    /// failure, every resource created so far is torn down before the
    /// original step error is returned; teardown problems are logged but
    /// never replace that error.
    #[tracing::instrument(
        skip(self, request),
        fields(
            tenant_id = %request.tenant_id,
            application_type = %request.application_type,
            forge_id = tracing::field::Empty,
        )
    )]
    pub async fn forge(&self, request: &CreateRequest) -> Result<ForgedApplication> {
        metrics::counter!("superkey_forge_total").increment(1);
        let forge_start = std::time::Instant::now();

        let forge_id = ForgeId::new();
        tracing::Span::current().record("forge_id", tracing::field::display(forge_id));

        let pipeline = self
            .catalog
            .resolve(&request.application_type)
            .map_err(|_| ForgeError::UnknownApplicationType(request.application_type.clone()))?;

        if pipeline.provider() != request.provider {
            return Err(ForgeError::ProviderMismatch {
                application_type: request.application_type.clone(),
                expected: pipeline.provider().to_string(),
                actual: request.provider.clone(),
            });
        }

        let driver = self.connect(request).await?;

        let mut created: Vec<CreatedResource> = Vec::with_capacity(pipeline.len());
        let mut outputs = StepOutputs::new();
        let mut credential = None;

        for step in pipeline.steps() {
            tracing::info!(step = %step.name, kind = %step.kind, "forge step started");
            metrics::counter!("superkey_steps_total", "kind" => step.kind.as_str()).increment(1);

            match self
                .run_step(driver.as_ref(), step, request, forge_id, &outputs)
                .await
            {
                Ok(provisioned) => {
                    let ordinal = created.len();
                    tracing::info!(
                        step = %step.name,
                        handle = %provisioned.handle,
                        ordinal,
                        "forge step completed"
                    );
                    created.push(CreatedResource::new(
                        &step.name,
                        step.kind,
                        provisioned.handle,
                        ordinal,
                    ));
                    outputs.insert(step.name.clone(), provisioned.outputs);
                    credential = provisioned.credential;
                }
                Err(e) => {
                    metrics::counter!("superkey_forge_failed_total").increment(1);
                    tracing::error!(
                        step = %step.name,
                        error = %e,
                        created = created.len(),
                        "forge step failed, tearing down"
                    );

                    let report = TeardownEngine::new(driver.as_ref()).run(&created).await;
                    for failure in report.errors() {
                        tracing::error!(error = %failure, "error during teardown");
                    }

                    metrics::histogram!("superkey_forge_duration_seconds")
                        .record(forge_start.elapsed().as_secs_f64());
                    return Err(e);
                }
            }
        }

        let duration = forge_start.elapsed().as_secs_f64();
        metrics::histogram!("superkey_forge_duration_seconds").record(duration);
        tracing::info!(resources = created.len(), duration, "forge completed");

        Ok(ForgedApplication::new(
            forge_id,
            request.clone(),
            created,
            credential,
        ))
    }

    /// Tears down every resource of a forged application.
    ///
    /// Used when a forge succeeded but could not be committed. Reconnects to
    /// the application's provider; if that fails, every resource is reported
    /// as left behind.
    #[tracing::instrument(skip(self, application), fields(forge_id = %application.forge_id))]
    pub async fn tear_down(&self, application: &ForgedApplication) -> TeardownReport {
        match self.connect(&application.request).await {
            Ok(driver) => {
                TeardownEngine::new(driver.as_ref())
                    .run(&application.resources)
                    .await
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot reach provider for teardown");
                TeardownReport::unreachable(
                    &application.resources,
                    ProviderError::Unavailable(e.to_string()),
                )
            }
        }
    }

    async fn connect(&self, request: &CreateRequest) -> Result<Arc<dyn ProviderDriver>> {
        let factory = self
            .providers
            .get(&request.provider)
            .ok_or_else(|| ForgeError::UnsupportedProvider(request.provider.clone()))?;

        factory.connect(request).await.map_err(ForgeError::Connect)
    }

    async fn run_step(
        &self,
        driver: &dyn ProviderDriver,
        step: &StepDefinition,
        request: &CreateRequest,
        forge_id: ForgeId,
        outputs: &StepOutputs,
    ) -> Result<Provisioned> {
        let inputs = step
            .resolve(request, forge_id, outputs)
            .map_err(ForgeError::Input)?;
        let spec = ResourceSpec::from_inputs(step.kind, &inputs).map_err(ForgeError::Input)?;

        create_resource(driver, &spec)
            .await
            .map_err(|source| ForgeError::StepFailed {
                step: step.name.clone(),
                kind: step.kind,
                source,
            })
    }
}
