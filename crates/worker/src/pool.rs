//! Bounded worker pool draining the ingest queue.

use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinError, JoinSet};

use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::event::InboundEvent;
use crate::reporter::SystemOfRecord;

/// Runs up to `concurrency` dispatches at once.
///
/// Events are independent: each runs in its own task with its own forge
/// state, so a slow provider call only holds up its own event.
pub struct WorkerPool<R: SystemOfRecord + 'static> {
    dispatcher: Arc<Dispatcher<R>>,
    concurrency: usize,
}

impl<R: SystemOfRecord + 'static> WorkerPool<R> {
    pub fn new(dispatcher: Arc<Dispatcher<R>>, concurrency: usize) -> Self {
        Self {
            dispatcher,
            concurrency: concurrency.max(1),
        }
    }

    /// Consumes events until every sender is dropped, then waits for
    /// in-flight dispatches. Returns the number of events handled.
    pub async fn run(self, mut events: mpsc::Receiver<InboundEvent>) -> usize {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut handled = 0usize;

        tracing::info!(concurrency = self.concurrency, "worker pool started");

        while let Some(event) = events.recv().await {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let dispatcher = Arc::clone(&self.dispatcher);
            tasks.spawn(async move {
                let _permit = permit;
                dispatcher.handle(&event).await
            });
            handled += 1;

            while let Some(joined) = tasks.try_join_next() {
                log_completion(joined);
            }
        }

        while let Some(joined) = tasks.join_next().await {
            log_completion(joined);
        }

        tracing::info!(handled, "worker pool drained");
        handled
    }
}

fn log_completion(joined: Result<DispatchOutcome, JoinError>) {
    match joined {
        Ok(outcome) => tracing::debug!(?outcome, "event handled"),
        Err(e) => tracing::error!(error = %e, "dispatch task panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EVENT_TYPE_HEADER;
    use crate::reporter::InMemorySystemOfRecord;
    use forge::{ForgeEngine, InMemoryProvider, ProviderRegistry};
    use superkey::PipelineCatalog;

    fn payload(application_id: usize) -> String {
        format!(
            r#"{{"tenantId":"tenant-{application_id}","applicationType":"cost-management","provider":"aws","applicationId":"{application_id}","params":{{"trustedAccountId":"589173575009"}}}}"#
        )
    }

    #[tokio::test]
    async fn test_pool_drains_queue_after_close() {
        let provider = InMemoryProvider::named("aws");
        let reporter = InMemorySystemOfRecord::new();
        let engine = ForgeEngine::new(
            PipelineCatalog::builtin().unwrap(),
            ProviderRegistry::new().with("aws", provider.clone()),
        );
        let dispatcher = Arc::new(Dispatcher::new(engine, reporter.clone()));

        let (tx, rx) = mpsc::channel(32);
        let pool = tokio::spawn(WorkerPool::new(dispatcher, 4).run(rx));

        for i in 0..10 {
            let event = InboundEvent::new(payload(i))
                .with_header(EVENT_TYPE_HEADER, "create_application");
            tx.send(event).await.unwrap();
        }
        tx.send(InboundEvent::new("ignored")).await.unwrap();
        drop(tx);

        let handled = pool.await.unwrap();
        assert_eq!(handled, 11);
        assert_eq!(reporter.record_count(), 10);
        assert_eq!(provider.resource_count(), 30);
    }

    #[tokio::test]
    async fn test_zero_concurrency_still_makes_progress() {
        let reporter = InMemorySystemOfRecord::new();
        let engine = ForgeEngine::new(
            PipelineCatalog::builtin().unwrap(),
            ProviderRegistry::new().with("aws", InMemoryProvider::named("aws")),
        );
        let dispatcher = Arc::new(Dispatcher::new(engine, reporter.clone()));

        let (tx, rx) = mpsc::channel(4);
        let pool = tokio::spawn(WorkerPool::new(dispatcher, 0).run(rx));
        tx.send(
            InboundEvent::new(payload(1)).with_header(EVENT_TYPE_HEADER, "create_application"),
        )
        .await
        .unwrap();
        drop(tx);

        assert_eq!(pool.await.unwrap(), 1);
        assert_eq!(reporter.record_count(), 1);
    }
}
