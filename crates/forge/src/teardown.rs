//! Teardown engine: best-effort compensation of provisioned resources.

use superkey::CreatedResource;

use crate::error::ProviderError;
use crate::provider::{ProviderDriver, delete_resource};

/// Result of deleting one resource.
#[derive(Debug, Clone)]
pub struct TeardownOutcome {
    pub resource: CreatedResource,
    pub error: Option<ProviderError>,
}

impl TeardownOutcome {
    pub fn is_deleted(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-resource outcomes of one teardown, in the order they were processed.
#[derive(Debug, Clone, Default)]
pub struct TeardownReport {
    outcomes: Vec<TeardownOutcome>,
}

impl TeardownReport {
    /// Builds a report where every resource failed with the same error,
    /// used when no driver could be obtained to delete anything.
    pub fn unreachable(resources: &[CreatedResource], error: ProviderError) -> Self {
        let outcomes = in_reverse_order(resources)
            .into_iter()
            .map(|resource| TeardownOutcome {
                resource: resource.clone(),
                error: Some(error.clone()),
            })
            .collect();
        Self { outcomes }
    }

    pub fn outcomes(&self) -> &[TeardownOutcome] {
        &self.outcomes
    }

    /// Returns every collected delete error. Empty means full success.
    pub fn errors(&self) -> Vec<&ProviderError> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.error.as_ref())
            .collect()
    }

    /// Returns the outcomes that left a resource behind.
    pub fn failed(&self) -> impl Iterator<Item = &TeardownOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.is_deleted())
    }

    pub fn is_clean(&self) -> bool {
        self.outcomes.iter().all(TeardownOutcome::is_deleted)
    }

    /// Number of delete attempts made.
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }
}

fn in_reverse_order(resources: &[CreatedResource]) -> Vec<&CreatedResource> {
    let mut ordered: Vec<&CreatedResource> = resources.iter().collect();
    ordered.sort_by(|a, b| b.ordinal.cmp(&a.ordinal));
    ordered
}

/// Deletes created resources through a driver, newest first.
///
/// A failed delete is recorded and the next resource is still attempted;
/// leaving one resource behind is better than leaving all of them.
pub struct TeardownEngine<'a> {
    driver: &'a dyn ProviderDriver,
}

impl<'a> TeardownEngine<'a> {
    pub fn new(driver: &'a dyn ProviderDriver) -> Self {
        Self { driver }
    }

    /// Tears down `resources` in strict reverse ordinal order.
    ///
    /// Never fails; inspect the returned report for leftovers.
    #[tracing::instrument(skip_all, fields(provider = %self.driver.provider(), resources = resources.len()))]
    pub async fn run(&self, resources: &[CreatedResource]) -> TeardownReport {
        let mut outcomes = Vec::with_capacity(resources.len());

        for resource in in_reverse_order(resources) {
            let result = delete_resource(self.driver, resource.kind, &resource.handle).await;

            let error = match result {
                Ok(()) => {
                    tracing::info!(
                        step = %resource.step,
                        kind = %resource.kind,
                        handle = %resource.handle,
                        "resource deleted"
                    );
                    None
                }
                Err(e) => {
                    metrics::counter!("superkey_teardown_failures_total").increment(1);
                    tracing::error!(
                        step = %resource.step,
                        kind = %resource.kind,
                        handle = %resource.handle,
                        error = %e,
                        "resource delete failed, manual cleanup required"
                    );
                    Some(e)
                }
            };

            outcomes.push(TeardownOutcome {
                resource: resource.clone(),
                error,
            });
        }

        let report = TeardownReport { outcomes };
        if report.is_clean() {
            tracing::info!(deleted = report.attempted(), "teardown complete");
        } else {
            tracing::error!(
                attempted = report.attempted(),
                failed = report.errors().len(),
                "teardown left resources behind"
            );
        }
        report
    }
}
