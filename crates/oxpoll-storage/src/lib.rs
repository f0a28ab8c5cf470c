//! Persistence layer for poll jobs and collected results.
//!
//! The default implementation ([`engine::SqlitePollStore`]) is a single
//! SQLite database in WAL mode. The engine treats this layer as a
//! fallible, non-transactional sink: a failed bulk insert loses that
//! batch, and no operation here spans the plugin transport.

pub mod engine;
pub mod error;

#[cfg(test)]
mod tests;

use anyhow::Result;
use oxpoll_common::types::{JobRow, PollResultRow};
use serde::Deserialize;
use serde_json::Value;

/// Fields of a poll job to be created. Row ID and timestamps are
/// assigned by the store.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    pub ip: String,
    pub port: u16,
    pub system_type: String,
    #[serde(default)]
    pub credentials: Value,
}

/// Persistence collaborator consumed by the poll engine.
///
/// Implementations must be `Send + Sync`: the scheduler pages jobs and
/// the aggregator bulk-inserts results concurrently.
pub trait PollStore: Send + Sync {
    /// Returns one page of pollable jobs ordered by job ID. A page
    /// shorter than `limit` signals the end of the result set.
    fn select_job_page(&self, offset: usize, limit: usize) -> Result<Vec<JobRow>>;

    /// Inserts a batch of poll results in one transaction. Returns the
    /// assigned row IDs.
    fn bulk_insert_results(&self, rows: &[PollResultRow]) -> Result<Vec<i64>>;

    /// Creates a poll job and returns the stored row.
    fn insert_job(&self, job: &NewJob) -> Result<JobRow>;

    /// Lists jobs with pagination, ordered by job ID.
    fn list_jobs(&self, limit: usize, offset: usize) -> Result<Vec<JobRow>>;

    /// Returns the total number of jobs.
    fn count_jobs(&self) -> Result<u64>;

    /// Returns the most recent results for a job, newest first.
    fn query_results_for_job(&self, job_id: i64, limit: usize) -> Result<Vec<PollResultRow>>;
}
