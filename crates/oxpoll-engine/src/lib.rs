//! The oxpoll core: dispatch, correlation, timeout, and batch
//! aggregation over a best-effort plugin transport.
//!
//! Three single-writer loops cooperate by message passing only:
//!
//! - the [`dispatcher::Dispatcher`] owns the pending-discovery map,
//!   drains plugin replies, and sweeps timed-out discovery calls;
//! - the [`aggregator::Aggregator`] owns the in-flight poll map and the
//!   batch buffer, flushing on size or age;
//! - the [`scheduler::WorkScheduler`] pages pollable jobs out of the
//!   store and publishes them to the dispatcher each cycle.
//!
//! No state is shared for mutation across loops, and no loop ever
//! blocks on I/O: transport sends are non-blocking, bulk inserts run on
//! blocking worker threads, and the inbound drain is bounded per tick.

pub mod aggregator;
pub mod config;
pub mod dispatcher;
pub mod scheduler;

pub use config::EngineConfig;
pub use dispatcher::{DiscoveryRequest, DispatchError, DispatcherHandle};

use aggregator::{Aggregator, AggregatorHandle};
use dispatcher::Dispatcher;
use oxpoll_storage::PollStore;
use oxpoll_transport::TransportPair;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Running engine loops and the handles to talk to them.
pub struct Engine {
    pub dispatcher: DispatcherHandle,
    pub aggregator: AggregatorHandle,
    dispatcher_task: JoinHandle<()>,
    aggregator_task: JoinHandle<()>,
}

impl Engine {
    /// Spawns the dispatcher and aggregator loops on the current
    /// runtime. The scheduler is built separately by the caller so it
    /// can be disabled or driven manually in tests.
    pub fn start(
        config: &EngineConfig,
        store: Arc<dyn PollStore>,
        transport: TransportPair,
    ) -> Engine {
        let (aggregator_handle, aggregator) = Aggregator::new(
            store,
            config.batch_size_threshold,
            config.batch_time_threshold,
            config.batch_check_period,
        );
        let (dispatcher_handle, dispatcher) = Dispatcher::new(
            transport,
            aggregator_handle.clone(),
            config.network_timeout,
            config.sweep_period,
            config.drain_period,
            // Command queue depth: one scheduler page plus headroom for
            // concurrent discovery callers.
            config.page_size.max(16) * 2,
        );

        let aggregator_task = tokio::spawn(aggregator.run());
        let dispatcher_task = tokio::spawn(dispatcher.run());

        Engine {
            dispatcher: dispatcher_handle,
            aggregator: aggregator_handle,
            dispatcher_task,
            aggregator_task,
        }
    }

    /// Stops both loops. The dispatcher is aborted; the aggregator is
    /// asked to stop so it can flush what it still holds. In-flight
    /// flushes on blocking threads are left to finish on their own.
    pub async fn shutdown(self) {
        self.dispatcher_task.abort();
        self.aggregator.shutdown();
        let _ = self.aggregator_task.await;
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}
