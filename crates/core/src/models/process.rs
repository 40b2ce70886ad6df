use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 集群中一个进程的注册信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub id: String,
    pub hostname: String,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
}

impl ProcessInfo {
    pub fn current(id: &str, hostname: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            hostname: hostname.to_string(),
            pid: std::process::id(),
            started_at: now,
            last_heartbeat: now,
        }
    }

    /// 心跳是否仍在有效期内
    pub fn is_alive(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.last_heartbeat) <= ttl
    }
}
