//! Job seeding from a JSON seed file (`seed-jobs` subcommand).

use anyhow::Result;
use oxpoll_storage::{NewJob, PollStore};
use serde::Deserialize;
use std::collections::HashSet;

#[derive(Debug, Deserialize)]
pub struct JobsSeedFile {
    #[serde(default)]
    pub jobs: Vec<NewJob>,
}

/// Inserts the jobs from a seed file, skipping targets that already
/// exist (same ip, port, and system type).
pub fn seed_jobs_from_file(store: &dyn PollStore, seed_path: &str) -> Result<()> {
    let seed_content = std::fs::read_to_string(seed_path)
        .map_err(|e| anyhow::anyhow!("Failed to read seed file '{}': {}", seed_path, e))?;
    let seed: JobsSeedFile = serde_json::from_str(&seed_content)
        .map_err(|e| anyhow::anyhow!("Failed to parse seed file '{}': {}", seed_path, e))?;

    // List existing targets for dedup
    let existing = store.list_jobs(10000, 0)?;
    let existing_targets: HashSet<(String, u16, String)> = existing
        .iter()
        .map(|job| (job.ip.clone(), job.port, job.system_type.clone()))
        .collect();

    let mut created = 0u32;
    let mut skipped = 0u32;

    for job in &seed.jobs {
        let target = (job.ip.clone(), job.port, job.system_type.clone());
        if existing_targets.contains(&target) {
            tracing::warn!(ip = %job.ip, port = job.port, "Job already exists, skipping");
            skipped += 1;
            continue;
        }

        match store.insert_job(job) {
            Ok(inserted) => {
                tracing::info!(ip = %job.ip, id = inserted.id, "Job created");
                created += 1;
            }
            Err(e) => {
                tracing::error!(ip = %job.ip, error = %e, "Failed to create job");
            }
        }
    }

    tracing::info!(created, skipped, "seed-jobs completed");
    Ok(())
}
