use std::path::PathBuf;
use std::str::FromStr;

use shared::PayloadEncoding;

use crate::commands::DeferMode;

/// 服务配置 - 资产流水线的所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./work_dir | 工作目录 (数据库、日志) |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_JSON | false | JSON 日志输出 |
/// | COMMAND_TOPIC | command-queue | 命令通道 |
/// | EVENT_TOPIC | event-journal | 事件通道 |
/// | RETRY_TOPIC | event-retry | 重试通道 |
/// | DLQ_TOPIC | event-dlq | 死信通道 |
/// | COMMAND_GROUP_ID | asset-command-router | 命令消费组 |
/// | EVENT_GROUP_ID | asset-event-router | 事件消费组 |
/// | MAX_RETRY_ATTEMPTS | 3 | 进入死信前的最大失败次数 |
/// | TRANSFER_HORIZON_SECS | 600 | 转账执行窗口(秒) |
/// | TRANSFER_DEFER_MODE | schedule | schedule \| requeue |
/// | SCHEDULE_SCAN_INTERVAL_SECS | 5 | 延迟转账扫描间隔(秒) |
/// | COMMAND_ENCODING | json | json \| base64 |
/// | EVENT_ENCODING | json | json \| base64 |
/// | INGRESS_ADDR | (unset) | TCP 入口监听地址, 未设置则关闭 |
/// | CHANNEL_CAPACITY | 10000 | 每个通道保留的已消费记录数 |
/// | ATTEMPT_RETENTION_SECS | 604800 | 重试计数与死信标记保留时长(秒) |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/assets TRANSFER_DEFER_MODE=requeue cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库和日志
    pub work_dir: String,
    pub log_level: String,
    pub log_json: bool,

    // === 通道 ===
    pub command_topic: String,
    pub event_topic: String,
    pub retry_topic: String,
    pub dlq_topic: String,
    pub command_group_id: String,
    pub event_group_id: String,

    // === 流水线策略 ===
    pub max_retry_attempts: u32,
    pub transfer_horizon_secs: i64,
    pub transfer_defer_mode: DeferMode,
    pub schedule_scan_interval_secs: u64,
    pub command_encoding: PayloadEncoding,
    pub event_encoding: PayloadEncoding,

    /// TCP 入口 (外部 HTTP 层写入命令通道)
    pub ingress_addr: Option<String>,
    pub channel_capacity: usize,
    /// 未再触及的重试计数 / 死信标记在此之后清理
    pub attempt_retention_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_dir: "./work_dir".into(),
            log_level: "info".into(),
            log_json: false,
            command_topic: "command-queue".into(),
            event_topic: "event-journal".into(),
            retry_topic: "event-retry".into(),
            dlq_topic: "event-dlq".into(),
            command_group_id: "asset-command-router".into(),
            event_group_id: "asset-event-router".into(),
            max_retry_attempts: 3,
            transfer_horizon_secs: 600,
            transfer_defer_mode: DeferMode::Schedule,
            schedule_scan_interval_secs: 5,
            command_encoding: PayloadEncoding::Json,
            event_encoding: PayloadEncoding::Json,
            ingress_addr: None,
            channel_capacity: 10_000,
            attempt_retention_secs: 7 * 24 * 3600,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置或无法解析，使用默认值
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            work_dir: env_or("WORK_DIR", d.work_dir),
            log_level: env_or("LOG_LEVEL", d.log_level),
            log_json: env_or("LOG_JSON", d.log_json),
            command_topic: env_or("COMMAND_TOPIC", d.command_topic),
            event_topic: env_or("EVENT_TOPIC", d.event_topic),
            retry_topic: env_or("RETRY_TOPIC", d.retry_topic),
            dlq_topic: env_or("DLQ_TOPIC", d.dlq_topic),
            command_group_id: env_or("COMMAND_GROUP_ID", d.command_group_id),
            event_group_id: env_or("EVENT_GROUP_ID", d.event_group_id),
            max_retry_attempts: env_or("MAX_RETRY_ATTEMPTS", d.max_retry_attempts).max(1),
            transfer_horizon_secs: env_or("TRANSFER_HORIZON_SECS", d.transfer_horizon_secs),
            transfer_defer_mode: env_or("TRANSFER_DEFER_MODE", d.transfer_defer_mode),
            schedule_scan_interval_secs: env_or(
                "SCHEDULE_SCAN_INTERVAL_SECS",
                d.schedule_scan_interval_secs,
            )
            .max(1),
            command_encoding: env_or("COMMAND_ENCODING", d.command_encoding),
            event_encoding: env_or("EVENT_ENCODING", d.event_encoding),
            ingress_addr: std::env::var("INGRESS_ADDR")
                .ok()
                .filter(|addr| !addr.trim().is_empty()),
            channel_capacity: env_or("CHANNEL_CAPACITY", d.channel_capacity),
            attempt_retention_secs: env_or("ATTEMPT_RETENTION_SECS", d.attempt_retention_secs),
        }
    }

    /// 使用自定义工作目录 (常用于测试)
    pub fn with_work_dir(work_dir: impl Into<String>) -> Self {
        Self {
            work_dir: work_dir.into(),
            ..Self::default()
        }
    }

    /// redb 数据库文件路径
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("assets.redb")
    }

    /// 日志目录
    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.command_topic, "command-queue");
        assert_eq!(config.event_topic, "event-journal");
        assert_eq!(config.max_retry_attempts, 3);
        assert_eq!(config.transfer_horizon_secs, 600);
        assert_eq!(config.transfer_defer_mode, DeferMode::Schedule);
        assert!(config.ingress_addr.is_none());
        assert_eq!(config.attempt_retention_secs, 604_800);
    }

    #[test]
    fn test_paths_live_under_work_dir() {
        let config = Config::with_work_dir("/tmp/assets");
        assert_eq!(config.database_path(), PathBuf::from("/tmp/assets/assets.redb"));
        assert_eq!(config.log_dir(), PathBuf::from("/tmp/assets/logs"));
    }

    #[test]
    fn test_env_or_falls_back_on_parse_error() {
        // Variable names unique to this test; nothing else reads them.
        unsafe {
            std::env::set_var("ASSET_TEST_BAD_NUMBER", "not-a-number");
        }
        assert_eq!(env_or("ASSET_TEST_BAD_NUMBER", 7u32), 7);
        assert_eq!(env_or("ASSET_TEST_UNSET_VARIABLE", 9u32), 9);
    }
}
