use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(rename = "type", default)]
    pub r#type: StorageType,
    pub url: String,
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            r#type: StorageType::Memory,
            url: "sqlite://coordinator.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.r#type == StorageType::Sqlite {
            if self.url.is_empty() {
                return Err(anyhow::anyhow!("数据库URL不能为空"));
            }

            if !self.url.starts_with("sqlite:") {
                return Err(anyhow::anyhow!("数据库URL必须以sqlite:开头: {}", self.url));
            }
        }

        if self.max_connections == 0 {
            return Err(anyhow::anyhow!("最大连接数必须大于0"));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RegistryType {
    /// 固定成员，仅在单进程或测试中使用
    #[default]
    Static,
    /// 心跳写入共享存储
    Store,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    #[serde(rename = "type", default)]
    pub r#type: RegistryType,
    pub heartbeat_interval_seconds: u64,
    /// 心跳超过该时间未刷新的进程视为离线
    pub ttl_seconds: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            r#type: RegistryType::Static,
            heartbeat_interval_seconds: 10,
            ttl_seconds: 30,
        }
    }
}

impl RegistryConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.heartbeat_interval_seconds == 0 {
            return Err(anyhow::anyhow!("心跳间隔必须大于0"));
        }

        if self.ttl_seconds <= self.heartbeat_interval_seconds {
            return Err(anyhow::anyhow!(
                "进程存活时间({}s)必须大于心跳间隔({}s)",
                self.ttl_seconds,
                self.heartbeat_interval_seconds
            ));
        }

        Ok(())
    }
}
