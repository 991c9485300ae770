//! 核心模块 - 配置、后台任务和服务装配
//!
//! - [`Config`] - 服务配置
//! - [`BackgroundTasks`] - 后台任务管理
//! - [`AssetServer`] - 流水线装配与生命周期

pub mod config;
pub mod server;
pub mod tasks;

pub use config::Config;
pub use server::AssetServer;
pub use tasks::{BackgroundTasks, TaskKind};
