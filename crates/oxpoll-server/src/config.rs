use oxpoll_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub plugin: PluginConfig,
    #[serde(default)]
    pub poller: PollerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            plugin: PluginConfig::default(),
            poller: PollerConfig::default(),
        }
    }
}

/// How to start the protocol plugin process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    #[serde(default = "default_plugin_command")]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Bound of both transport directions; a saturated outbound channel
    /// rejects sends, a saturated inbound buffer drops replies.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            command: default_plugin_command(),
            args: Vec::new(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_scheduler_period_secs")]
    pub scheduler_period_secs: u64,
    /// Maximum wait for a discovery reply. The sweep period must stay
    /// strictly below this.
    #[serde(default = "default_network_timeout_secs")]
    pub network_timeout_secs: u64,
    #[serde(default = "default_sweep_period_secs")]
    pub sweep_period_secs: u64,
    #[serde(default = "default_drain_period_ms")]
    pub drain_period_ms: u64,
    #[serde(default = "default_batch_size_threshold")]
    pub batch_size_threshold: usize,
    #[serde(default = "default_batch_time_threshold_secs")]
    pub batch_time_threshold_secs: u64,
    #[serde(default = "default_batch_check_period_secs")]
    pub batch_check_period_secs: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            scheduler_period_secs: default_scheduler_period_secs(),
            network_timeout_secs: default_network_timeout_secs(),
            sweep_period_secs: default_sweep_period_secs(),
            drain_period_ms: default_drain_period_ms(),
            batch_size_threshold: default_batch_size_threshold(),
            batch_time_threshold_secs: default_batch_time_threshold_secs(),
            batch_check_period_secs: default_batch_check_period_secs(),
        }
    }
}

impl PollerConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            page_size: self.page_size,
            scheduler_period: Duration::from_secs(self.scheduler_period_secs),
            network_timeout: Duration::from_secs(self.network_timeout_secs),
            sweep_period: Duration::from_secs(self.sweep_period_secs),
            drain_period: Duration::from_millis(self.drain_period_ms),
            batch_size_threshold: self.batch_size_threshold,
            batch_time_threshold: Duration::from_secs(self.batch_time_threshold_secs),
            batch_check_period: Duration::from_secs(self.batch_check_period_secs),
        }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_plugin_command() -> String {
    "oxpoll-mock-plugin".to_string()
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_page_size() -> usize {
    100
}

fn default_scheduler_period_secs() -> u64 {
    60
}

fn default_network_timeout_secs() -> u64 {
    60
}

fn default_sweep_period_secs() -> u64 {
    30
}

fn default_drain_period_ms() -> u64 {
    200
}

fn default_batch_size_threshold() -> usize {
    100
}

fn default_batch_time_threshold_secs() -> u64 {
    30
}

fn default_batch_check_period_secs() -> u64 {
    10
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_sweep_below_network_timeout() {
        let config = PollerConfig::default();
        assert!(config.sweep_period_secs < config.network_timeout_secs);
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.data_dir, "data");
        assert_eq!(config.poller.page_size, 100);
        assert_eq!(config.plugin.command, "oxpoll-mock-plugin");
    }

    #[test]
    fn partial_toml_overrides_selected_keys() {
        let config: ServerConfig = toml::from_str(
            "data_dir = \"/var/lib/oxpoll\"\n\n[poller]\nbatch_size_threshold = 15\n",
        )
        .unwrap();
        assert_eq!(config.data_dir, "/var/lib/oxpoll");
        assert_eq!(config.poller.batch_size_threshold, 15);
        assert_eq!(config.poller.page_size, 100);
    }
}
