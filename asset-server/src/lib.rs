//! Asset Server - 钱包资产命令/事件溯源流水线
//!
//! # 架构概述
//!
//! - **消息通道** (`message`): 进程内有序日志、消费组、TCP 入口
//! - **命令** (`commands`): 生产者、路由、转账调度、资产应用
//! - **事件** (`events`): 事件日志、事件路由、重试/死信
//! - **存储** (`storage`): redb 余额投影、重试计数、延迟转账
//!
//! # 模块结构
//!
//! ```text
//! asset-server/src/
//! ├── core/          # 配置、后台任务、服务装配
//! ├── commands/      # 命令侧
//! ├── events/        # 事件侧
//! ├── message/       # 消息通道
//! ├── storage/       # redb 持久化
//! └── utils/         # 错误、日志
//! ```

pub mod commands;
pub mod core;
pub mod events;
pub mod message;
pub mod storage;
pub mod utils;

// Re-export 公共类型
pub use core::{AssetServer, BackgroundTasks, Config, TaskKind};
pub use message::{MessageBus, ProcessResult, Record};
pub use storage::{LedgerStorage, ProjectionStore};
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{cleanup_old_logs, init_logger_with_file};

/// Load `.env`, read the configuration and initialise logging
pub fn setup_environment() -> anyhow::Result<Config> {
    dotenv::dotenv().ok();

    let config = Config::from_env();
    std::fs::create_dir_all(&config.work_dir)?;

    let log_dir = config.log_dir();
    init_logger_with_file(&config.log_level, config.log_json, log_dir.to_str())?;

    Ok(config)
}
