use serde::{Deserialize, Serialize};

/// 命令传输后端类型
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransportType {
    /// 单进程内的广播通道，测试和嵌入式部署使用
    #[default]
    InMemory,
    Redis,
    StoragePolling,
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub database: i64,
    pub password: Option<String>,
    pub connection_timeout_seconds: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            database: 0,
            password: None,
            connection_timeout_seconds: 30,
        }
    }
}

impl RedisConfig {
    /// Validate Redis configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.host.is_empty() {
            return Err(anyhow::anyhow!("Redis主机地址不能为空"));
        }

        if self.port == 0 {
            return Err(anyhow::anyhow!("Redis端口必须大于0"));
        }

        if self.database < 0 {
            return Err(anyhow::anyhow!("Redis数据库索引不能为负数"));
        }

        if self.connection_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("Redis连接超时时间必须大于0"));
        }

        Ok(())
    }

    /// Build Redis connection URL
    pub fn build_url(&self) -> String {
        let auth = if let Some(password) = &self.password {
            format!(":{password}@")
        } else {
            String::new()
        };
        format!(
            "redis://{}{}:{}/{}",
            auth, self.host, self.port, self.database
        )
    }
}

/// Command transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    #[serde(rename = "type", default)]
    pub r#type: TransportType,
    /// 广播频道名称
    pub channel: String,
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    /// 存储轮询后端的轮询间隔
    pub poll_interval_ms: u64,
    /// 存储轮询后端中消息的保留时间
    pub envelope_ttl_seconds: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            r#type: TransportType::InMemory,
            channel: "coordinator:commands".to_string(),
            redis: None,
            poll_interval_ms: 250,
            envelope_ttl_seconds: 300,
        }
    }
}

impl TransportConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.channel.is_empty() {
            return Err(anyhow::anyhow!("传输频道名称不能为空"));
        }

        match self.r#type {
            TransportType::Redis => match &self.redis {
                Some(redis) => redis.validate()?,
                None => return Err(anyhow::anyhow!("Redis传输需要提供redis配置段")),
            },
            TransportType::StoragePolling => {
                if self.poll_interval_ms == 0 {
                    return Err(anyhow::anyhow!("轮询间隔必须大于0"));
                }
                if self.envelope_ttl_seconds == 0 {
                    return Err(anyhow::anyhow!("消息保留时间必须大于0"));
                }
            }
            TransportType::InMemory => {}
        }

        Ok(())
    }
}
