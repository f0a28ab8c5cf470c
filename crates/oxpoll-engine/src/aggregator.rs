//! Batch aggregator: folds correlated polling replies into a buffer and
//! flushes it to the persistence collaborator under a size-or-time
//! policy.
//!
//! The aggregator exclusively owns two pieces of state, mutated only on
//! its own loop: the pending-job map (job ID -> dispatch time, the
//! polling-side timeout layer) and the batch buffer. Job lifecycle:
//! DISPATCHED -> COLLECTED -> FLUSHED, or DISPATCHED -> LOST when the
//! next scheduling cycle supersedes a poll that never replied.

use chrono::{DateTime, Utc};
use oxpoll_common::types::{PollResultRow, PollingReply, ReplyStatus};
use oxpoll_storage::PollStore;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant};

#[derive(Debug)]
pub enum AggregatorMsg {
    /// A new scheduling cycle is starting; stale pending jobs are lost.
    CycleStart,
    /// A polling request for this job was handed to the transport.
    Dispatched { job_id: i64 },
    /// A reply payload forwarded from the correlator, unparsed.
    Reply(Value),
    /// Stop the loop once queued messages are processed.
    Shutdown,
}

/// Fire-and-forget handle into the aggregator loop.
#[derive(Clone)]
pub struct AggregatorHandle {
    tx: mpsc::UnboundedSender<AggregatorMsg>,
}

impl AggregatorHandle {
    pub fn cycle_start(&self) {
        let _ = self.tx.send(AggregatorMsg::CycleStart);
    }

    pub fn dispatched(&self, job_id: i64) {
        let _ = self.tx.send(AggregatorMsg::Dispatched { job_id });
    }

    pub fn forward_reply(&self, payload: Value) {
        let _ = self.tx.send(AggregatorMsg::Reply(payload));
    }

    /// Asks the loop to stop. Messages already queued are still
    /// processed; whatever remains buffered is flushed on exit.
    pub fn shutdown(&self) {
        let _ = self.tx.send(AggregatorMsg::Shutdown);
    }
}

struct BatchEntry {
    job_id: i64,
    result: Value,
    collected_at: DateTime<Utc>,
}

pub struct Aggregator {
    store: Arc<dyn PollStore>,
    rx: mpsc::UnboundedReceiver<AggregatorMsg>,
    pending: HashMap<i64, DateTime<Utc>>,
    batch: Vec<BatchEntry>,
    last_flush: Instant,
    size_threshold: usize,
    time_threshold: Duration,
    check_period: Duration,
}

impl Aggregator {
    /// Builds the aggregator and its handle. The returned future is the
    /// aggregator loop; the caller spawns it.
    pub fn new(
        store: Arc<dyn PollStore>,
        size_threshold: usize,
        time_threshold: Duration,
        check_period: Duration,
    ) -> (AggregatorHandle, Aggregator) {
        let (tx, rx) = mpsc::unbounded_channel();
        let aggregator = Aggregator {
            store,
            rx,
            pending: HashMap::new(),
            batch: Vec::new(),
            last_flush: Instant::now(),
            size_threshold,
            time_threshold,
            check_period,
        };
        (AggregatorHandle { tx }, aggregator)
    }

    pub async fn run(mut self) {
        tracing::info!(
            size_threshold = self.size_threshold,
            time_threshold_secs = self.time_threshold.as_secs(),
            "Batch aggregator started"
        );
        let mut check = interval(self.check_period);
        loop {
            tokio::select! {
                msg = self.rx.recv() => match msg {
                    Some(AggregatorMsg::Shutdown) | None => break,
                    Some(msg) => self.handle(msg),
                },
                _ = check.tick() => {
                    if !self.batch.is_empty() && self.last_flush.elapsed() >= self.time_threshold {
                        self.flush("time");
                    }
                }
            }
        }
        // Drain what we still hold before the loop exits.
        if !self.batch.is_empty() {
            self.flush("shutdown");
        }
        tracing::info!("Batch aggregator stopped");
    }

    fn handle(&mut self, msg: AggregatorMsg) {
        match msg {
            AggregatorMsg::CycleStart => self.reset_cycle(),
            AggregatorMsg::Dispatched { job_id } => {
                self.pending.insert(job_id, Utc::now());
            }
            AggregatorMsg::Reply(payload) => self.fold_reply(payload),
            // Intercepted by the run loop.
            AggregatorMsg::Shutdown => {}
        }
    }

    /// Stale-job reset tied to the scheduling cadence: polls still
    /// pending from the previous cycle are lost, not retried.
    fn reset_cycle(&mut self) {
        if !self.pending.is_empty() {
            let lost: Vec<i64> = self.pending.keys().copied().collect();
            tracing::warn!(
                lost = lost.len(),
                job_ids = ?lost,
                "Polls from previous cycle never replied; marking lost"
            );
            self.pending.clear();
        }
    }

    fn fold_reply(&mut self, payload: Value) {
        let reply: PollingReply = match serde_json::from_value(payload) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding polling reply with unusable fields");
                return;
            }
        };

        // Duplicate or unexpected replies are tolerated and still accepted.
        if self.pending.remove(&reply.job_id).is_none() {
            tracing::debug!(
                job_id = reply.job_id,
                "Reply for job not pending in this cycle (late or duplicate)"
            );
        }

        match (reply.status, reply.data) {
            (ReplyStatus::Success, Some(data)) => {
                self.batch.push(BatchEntry {
                    job_id: reply.job_id,
                    result: data,
                    collected_at: Utc::now(),
                });
                if self.batch.len() >= self.size_threshold {
                    self.flush("size");
                }
            }
            (ReplyStatus::Success, None) => {
                tracing::warn!(job_id = reply.job_id, "Success reply without data, dropped");
            }
            (ReplyStatus::Fail, _) => {
                tracing::info!(
                    job_id = reply.job_id,
                    error = reply.error.as_deref().unwrap_or("unknown"),
                    "Poll failed at plugin"
                );
            }
        }
    }

    /// Detaches the current batch and submits it. Accumulation continues
    /// while the insert is in flight; a failed insert loses the batch.
    fn flush(&mut self, trigger: &'static str) {
        let entries = std::mem::take(&mut self.batch);
        self.last_flush = Instant::now();
        if entries.is_empty() {
            return;
        }

        let rows: Vec<PollResultRow> = entries
            .into_iter()
            .map(|entry| PollResultRow {
                id: oxpoll_common::id::next_id(),
                job_id: entry.job_id,
                result: entry.result,
                collected_at: entry.collected_at,
            })
            .collect();
        let count = rows.len();
        tracing::info!(rows = count, trigger, "Flushing poll result batch");

        let store = self.store.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = store.bulk_insert_results(&rows) {
                tracing::error!(error = %e, rows = count, "Bulk insert failed, batch lost");
            }
        });
    }
}
