//! 集群作业协调的核心类型
//!
//! 包含错误类型、数据模型、配置，以及传输、存储、注册表和插件包的抽象接口。
//! 具体实现位于 `coordinator-infrastructure`。

pub mod config;
pub mod errors;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use errors::*;
