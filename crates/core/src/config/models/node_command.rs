use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 本进程的身份
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub process_id: String,
    pub hostname: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let hostname = hostname::get()
            .unwrap_or_else(|_| "unknown".into())
            .to_string_lossy()
            .to_string();
        let suffix = uuid::Uuid::new_v4().to_string();
        Self {
            process_id: format!("{}-{}", hostname, &suffix[..8]),
            hostname,
        }
    }
}

impl NodeConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.process_id.is_empty() {
            return Err(anyhow::anyhow!("进程ID不能为空"));
        }

        if self.hostname.is_empty() {
            return Err(anyhow::anyhow!("主机名不能为空"));
        }

        Ok(())
    }
}

/// 轮次进行中注册表成员变化时的处理方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MembershipPolicy {
    /// 发送时确定的进程集合必须全部回复
    #[default]
    Snapshot,
    /// 轮次中离开注册表的进程不再等待；新加入进程的回复被记录但不是必需的
    Live,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// 等待所有回复的超时时间
    pub timeout_seconds: u64,
    #[serde(default)]
    pub membership: MembershipPolicy,
    /// Live 模式下重新读取注册表的间隔
    pub registry_refresh_ms: u64,
    /// 已处理命令的回复缓存大小，用于重复投递去重
    pub reply_cache_size: usize,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            membership: MembershipPolicy::Snapshot,
            registry_refresh_ms: 1000,
            reply_cache_size: 256,
        }
    }
}

impl CommandConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.timeout_seconds == 0 {
            return Err(anyhow::anyhow!("命令超时时间必须大于0"));
        }

        if self.registry_refresh_ms == 0 {
            return Err(anyhow::anyhow!("注册表刷新间隔必须大于0"));
        }

        if self.reply_cache_size == 0 {
            return Err(anyhow::anyhow!("回复缓存大小必须大于0"));
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn registry_refresh(&self) -> Duration {
        Duration::from_millis(self.registry_refresh_ms)
    }
}
