//! Request dispatcher and reply correlator.
//!
//! Bridges synchronous-looking discovery callers to the fire-and-forget
//! plugin transport. Discovery requests get a generated correlation ID
//! and a pending entry holding the caller's resolver; polling requests
//! need no per-request record, their job ID is the natural key matched
//! later by the aggregator. The pending map is owned exclusively by the
//! dispatcher loop: every mutation happens on this loop, so no locking
//! is involved.

use crate::aggregator::AggregatorHandle;
use oxpoll_common::types::{JobRow, OutboundRequest};
use oxpoll_transport::TransportPair;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Instant};

/// Errors surfaced to discovery callers.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No reply arrived within the network timeout. Maps to
    /// gateway-timeout semantics at outer layers.
    #[error("Dispatch: discovery request timed out waiting for plugin reply")]
    NetworkTimeout,

    /// The dispatcher loop is no longer running.
    #[error("Dispatch: engine stopped")]
    EngineStopped,
}

/// A discovery probe of one device, as accepted from callers.
#[derive(Debug, Clone)]
pub struct DiscoveryRequest {
    pub ip: String,
    pub port: u16,
    pub system_type: String,
    pub credentials: Map<String, Value>,
}

pub enum Command {
    Discover {
        request: DiscoveryRequest,
        reply: oneshot::Sender<Result<Value, DispatchError>>,
    },
    /// One page of scheduled polls, dispatched as a unit.
    PollBatch { jobs: Vec<JobRow> },
}

/// Cloneable handle for submitting work to the dispatcher loop.
#[derive(Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<Command>,
}

impl DispatcherHandle {
    /// Runs a discovery probe and waits for the correlated reply.
    ///
    /// Resolves with the plugin's payload minus the `correlationId`
    /// field, or fails with [`DispatchError::NetworkTimeout`] once the
    /// sweep expires the pending entry.
    pub async fn discover(&self, request: DiscoveryRequest) -> Result<Value, DispatchError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Command::Discover { request, reply: tx })
            .await
            .map_err(|_| DispatchError::EngineStopped)?;
        rx.await.map_err(|_| DispatchError::EngineStopped)?
    }

    /// Publishes one page of poll jobs to the dispatcher.
    pub async fn publish_jobs(&self, jobs: Vec<JobRow>) -> Result<(), DispatchError> {
        self.tx
            .send(Command::PollBatch { jobs })
            .await
            .map_err(|_| DispatchError::EngineStopped)
    }
}

struct PendingDiscovery {
    reply: oneshot::Sender<Result<Value, DispatchError>>,
    sent_at: Instant,
}

pub struct Dispatcher {
    transport: TransportPair,
    aggregator: AggregatorHandle,
    rx: mpsc::Receiver<Command>,
    pending: HashMap<String, PendingDiscovery>,
    network_timeout: Duration,
    sweep_period: Duration,
    drain_period: Duration,
}

impl Dispatcher {
    pub fn new(
        transport: TransportPair,
        aggregator: AggregatorHandle,
        network_timeout: Duration,
        sweep_period: Duration,
        drain_period: Duration,
        queue_depth: usize,
    ) -> (DispatcherHandle, Dispatcher) {
        let (tx, rx) = mpsc::channel(queue_depth);
        let dispatcher = Dispatcher {
            transport,
            aggregator,
            rx,
            pending: HashMap::new(),
            network_timeout,
            sweep_period,
            drain_period,
        };
        (DispatcherHandle { tx }, dispatcher)
    }

    pub async fn run(mut self) {
        tracing::info!(
            network_timeout_secs = self.network_timeout.as_secs(),
            sweep_period_secs = self.sweep_period.as_secs(),
            "Dispatcher started"
        );
        let mut drain = interval(self.drain_period);
        let mut sweep = interval(self.sweep_period);
        loop {
            tokio::select! {
                cmd = self.rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                _ = drain.tick() => self.drain_inbound(),
                _ = sweep.tick() => self.sweep_pending(),
            }
        }
        tracing::info!("Dispatcher stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Discover { request, reply } => self.dispatch_discovery(request, reply),
            Command::PollBatch { jobs } => self.dispatch_polls(jobs),
        }
    }

    fn dispatch_discovery(
        &mut self,
        request: DiscoveryRequest,
        reply: oneshot::Sender<Result<Value, DispatchError>>,
    ) {
        let correlation_id = oxpoll_common::id::next_id_string();
        let outbound = OutboundRequest::Discovery {
            correlation_id: correlation_id.clone(),
            ip: request.ip,
            port: request.port,
            system_type: request.system_type,
            credentials: request.credentials,
        };

        // Record before sending: a dropped send still surfaces to the
        // caller through the timeout sweep, never silently.
        self.pending.insert(
            correlation_id.clone(),
            PendingDiscovery {
                reply,
                sent_at: Instant::now(),
            },
        );

        match serde_json::to_string(&outbound) {
            Ok(message) => {
                if let Err(e) = self.transport.tx.try_send(message) {
                    tracing::error!(
                        correlation_id = %correlation_id,
                        error = %e,
                        "Failed to send discovery request, will expire via sweep"
                    );
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize discovery request");
            }
        }
    }

    fn dispatch_polls(&mut self, jobs: Vec<JobRow>) {
        let mut sent = 0usize;
        let mut dropped = 0usize;
        for job in jobs {
            let outbound = OutboundRequest::Polling {
                job_id: job.id,
                ip: job.ip,
                port: job.port,
                system_type: job.system_type,
                credentials: job.credentials.as_object().cloned().unwrap_or_default(),
            };
            let message = match serde_json::to_string(&outbound) {
                Ok(message) => message,
                Err(e) => {
                    tracing::error!(job_id = job.id, error = %e, "Failed to serialize poll request");
                    continue;
                }
            };
            match self.transport.tx.try_send(message) {
                Ok(()) => {
                    self.aggregator.dispatched(job.id);
                    sent += 1;
                }
                Err(e) => {
                    tracing::error!(job_id = job.id, error = %e, "Failed to send poll request, dropped");
                    dropped += 1;
                }
            }
        }
        tracing::debug!(sent, dropped, "Poll batch dispatched");
    }

    /// Drains the inbound channel until empty. A malformed message never
    /// stalls the drain.
    fn drain_inbound(&mut self) {
        while let Some(raw) = self.transport.rx.try_recv() {
            let payload: Value = match serde_json::from_str(&raw) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding malformed plugin reply");
                    continue;
                }
            };
            match payload.get("requestType").and_then(Value::as_str) {
                Some("discovery") => self.resolve_discovery(payload),
                // Polling or untyped replies go to the aggregator as-is.
                _ => self.aggregator.forward_reply(payload),
            }
        }
    }

    fn resolve_discovery(&mut self, mut payload: Value) {
        let correlation_id = match payload
            .as_object_mut()
            .and_then(|obj| obj.remove("correlationId"))
        {
            Some(Value::String(id)) => id,
            _ => {
                tracing::warn!("Discarding discovery reply without correlationId");
                return;
            }
        };

        match self.pending.remove(&correlation_id) {
            Some(entry) => {
                // Caller may have given up; a dead oneshot is not an error.
                let _ = entry.reply.send(Ok(payload));
            }
            None => {
                tracing::warn!(
                    correlation_id = %correlation_id,
                    "Discovery reply has no pending call (late or duplicate), discarded"
                );
            }
        }
    }

    /// Fails every pending discovery older than the network timeout.
    /// Entries are evaluated independently; never touches polling state.
    fn sweep_pending(&mut self) {
        let now = Instant::now();
        let expired: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.sent_at) >= self.network_timeout)
            .map(|(id, _)| id.clone())
            .collect();
        for correlation_id in expired {
            if let Some(entry) = self.pending.remove(&correlation_id) {
                tracing::warn!(correlation_id = %correlation_id, "Discovery request timed out");
                let _ = entry.reply.send(Err(DispatchError::NetworkTimeout));
            }
        }
    }
}
