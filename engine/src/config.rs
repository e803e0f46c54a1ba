use crate::hw::{AckPolicy, pcm::PlatformType};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const LOG_ENV: &str = "ABOX_LOG";
pub const SIM_DROP_ACKS_ENV: &str = "ABOX_SIM_DROP_ACKS";
pub const SIM_NO_COMPLETIONS_ENV: &str = "ABOX_SIM_NO_COMPLETIONS";

pub fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| {
            let s = v.trim().to_ascii_lowercase();
            s == "1" || s == "true" || s == "yes" || s == "on"
        })
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OffloadConfig {
    pub id: u32,
    pub platform: PlatformType,
    pub ack_timeout_ms: u64,
    pub ack_poll_interval_us: u64,
    pub create_timeout_ms: u64,
    pub stop_timeout_ms: u64,
    pub destroy_timeout_ms: u64,
    pub rdma_disable_timeout_ms: u64,
    pub notify_queue_depth: usize,
}

impl Default for OffloadConfig {
    fn default() -> Self {
        Self {
            id: 0,
            platform: PlatformType::Normal,
            ack_timeout_ms: 200,
            ack_poll_interval_us: 100,
            create_timeout_ms: 1000,
            stop_timeout_ms: 1000,
            destroy_timeout_ms: 1000,
            rdma_disable_timeout_ms: 40,
            notify_queue_depth: 32,
        }
    }
}

impl OffloadConfig {
    pub fn ack_policy(&self) -> AckPolicy {
        AckPolicy {
            budget: Duration::from_millis(self.ack_timeout_ms),
            poll_interval: Duration::from_micros(self.ack_poll_interval_us.max(1)),
        }
    }

    pub fn create_timeout(&self) -> Duration {
        Duration::from_millis(self.create_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn destroy_timeout(&self) -> Duration {
        Duration::from_millis(self.destroy_timeout_ms)
    }

    pub fn rdma_disable_timeout(&self) -> Duration {
        Duration::from_millis(self.rdma_disable_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_firmware_timing() {
        let config = OffloadConfig::default();
        let policy = config.ack_policy();
        assert_eq!(policy.budget, Duration::from_millis(200));
        assert_eq!(policy.poll_interval, Duration::from_micros(100));
        assert_eq!(config.create_timeout(), Duration::from_secs(1));
        assert_eq!(config.stop_timeout(), Duration::from_secs(1));
        assert_eq!(config.destroy_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let config: OffloadConfig =
            serde_json::from_str(r#"{"ack_timeout_ms": 20, "platform": "sync"}"#).unwrap();
        assert_eq!(config.ack_timeout_ms, 20);
        assert_eq!(config.platform, PlatformType::Sync);
        assert_eq!(config.create_timeout_ms, 1000);
    }

    #[test]
    fn env_flag_is_false_when_unset() {
        assert!(!env_flag("ABOX_TEST_FLAG_THAT_IS_NEVER_SET"));
    }
}
