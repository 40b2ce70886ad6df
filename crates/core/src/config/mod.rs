//! 配置模型
//!
//! 配置按组件分段，每段提供 `Default` 与 `validate()`；
//! `AppConfig::load` 依次合并默认值、TOML 文件和环境变量。

pub mod models;

pub use models::*;
