//! Paginated work scheduler.
//!
//! On every tick, scans the full set of pollable jobs page by page and
//! publishes each page to the dispatcher. Pages are fetched and
//! published sequentially; a page shorter than the page size ends the
//! scan until the next tick.

use crate::aggregator::AggregatorHandle;
use crate::dispatcher::DispatcherHandle;
use anyhow::{Context, Result};
use oxpoll_storage::PollStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

pub struct WorkScheduler {
    store: Arc<dyn PollStore>,
    dispatcher: DispatcherHandle,
    aggregator: AggregatorHandle,
    period: Duration,
    page_size: usize,
}

impl WorkScheduler {
    pub fn new(
        store: Arc<dyn PollStore>,
        dispatcher: DispatcherHandle,
        aggregator: AggregatorHandle,
        period: Duration,
        page_size: usize,
    ) -> Self {
        Self {
            store,
            dispatcher,
            aggregator,
            period,
            page_size,
        }
    }

    pub async fn run(&self) {
        tracing::info!(
            period_secs = self.period.as_secs(),
            page_size = self.page_size,
            "Work scheduler started"
        );
        let mut tick = interval(self.period);
        loop {
            tick.tick().await;
            if let Err(e) = self.run_cycle().await {
                tracing::error!(error = %e, "Polling cycle failed");
            }
        }
    }

    /// One full scan: page through all jobs from offset zero, publishing
    /// each non-empty page before requesting the next.
    pub async fn run_cycle(&self) -> Result<()> {
        // Marks the batch boundary: polls still pending from the last
        // cycle are counted lost by the aggregator.
        self.aggregator.cycle_start();

        let mut offset = 0usize;
        let mut total = 0usize;
        loop {
            let store = self.store.clone();
            let limit = self.page_size;
            let page = tokio::task::spawn_blocking(move || store.select_job_page(offset, limit))
                .await
                .context("job page query task failed")?
                .context("job page query failed")?;

            let page_len = page.len();
            total += page_len;
            if page_len > 0 {
                self.dispatcher
                    .publish_jobs(page)
                    .await
                    .context("dispatcher unavailable")?;
            }
            if page_len < self.page_size {
                break;
            }
            offset += self.page_size;
        }

        tracing::debug!(jobs = total, "Polling cycle published");
        Ok(())
    }
}
