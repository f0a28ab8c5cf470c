use std::time::Duration;

/// Tunables for the poll engine. All periods and thresholds map
/// one-to-one onto `[poller]` keys in the server config file.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Jobs fetched per scheduler page request.
    pub page_size: usize,
    /// Period between full job scans.
    pub scheduler_period: Duration,
    /// Maximum time a discovery caller waits for a reply.
    pub network_timeout: Duration,
    /// Period of the pending-discovery timeout sweep. Must be shorter
    /// than `network_timeout`.
    pub sweep_period: Duration,
    /// Period of the inbound reply drain.
    pub drain_period: Duration,
    /// Batch size that triggers an immediate flush.
    pub batch_size_threshold: usize,
    /// Maximum age of a non-empty batch before the periodic check
    /// flushes it regardless of size.
    pub batch_time_threshold: Duration,
    /// Period of the batch age check.
    pub batch_check_period: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            scheduler_period: Duration::from_secs(60),
            network_timeout: Duration::from_secs(60),
            sweep_period: Duration::from_secs(30),
            drain_period: Duration::from_millis(200),
            batch_size_threshold: 100,
            batch_time_threshold: Duration::from_secs(30),
            batch_check_period: Duration::from_secs(10),
        }
    }
}
