use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::CoordinatorError;

/// 命令轮次的关联键
///
/// 一个命令名称在一次协调轮次内唯一，回复通过 (name, job_id) 关联到发起方。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoundKey {
    pub name: String,
    pub job_id: String,
}

impl fmt::Display for RoundKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.job_id)
    }
}

/// 广播给集群中每个活跃进程的命令
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: String,
    /// 处理器路由键，例如 `initialize_plugin`
    pub command_type: String,
    /// 本轮次唯一的命令名称，例如 `INITIALIZE_PLUGIN_sample-plugin`
    pub name: String,
    /// 发起命令的作业ID
    pub job_id: String,
    /// 发起进程ID，回复发送给它
    pub reply_to: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Command {
    pub fn new(
        command_type: impl Into<String>,
        name: impl Into<String>,
        job_id: impl Into<String>,
        reply_to: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            command_type: command_type.into(),
            name: name.into(),
            job_id: job_id.into(),
            reply_to: reply_to.into(),
            payload,
            created_at: Utc::now(),
        }
    }

    pub fn round_key(&self) -> RoundKey {
        RoundKey {
            name: self.name.clone(),
            job_id: self.job_id.clone(),
        }
    }
}

/// 进程对命令的回复
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandReply {
    pub id: String,
    pub command_type: String,
    pub name: String,
    pub job_id: String,
    /// 回复方进程ID
    pub from: String,
    /// 接收方（发起命令的进程）
    pub to: String,
    pub success: bool,
    #[serde(default)]
    pub result: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl CommandReply {
    pub fn success(command: &Command, from: impl Into<String>, result: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            command_type: command.command_type.clone(),
            name: command.name.clone(),
            job_id: command.job_id.clone(),
            from: from.into(),
            to: command.reply_to.clone(),
            success: true,
            result,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(command: &Command, from: impl Into<String>, error: &CoordinatorError) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            command_type: command.command_type.clone(),
            name: command.name.clone(),
            job_id: command.job_id.clone(),
            from: from.into(),
            to: command.reply_to.clone(),
            success: false,
            result: serde_json::Value::Null,
            error: Some(error.to_string()),
            timestamp: Utc::now(),
        }
    }

    pub fn round_key(&self) -> RoundKey {
        RoundKey {
            name: self.name.clone(),
            job_id: self.job_id.clone(),
        }
    }
}

/// 传输层上流动的消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Envelope {
    Command(Command),
    Reply(CommandReply),
}

impl Envelope {
    pub fn id(&self) -> &str {
        match self {
            Envelope::Command(command) => &command.id,
            Envelope::Reply(reply) => &reply.id,
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            Envelope::Command(_) => "command",
            Envelope::Reply(_) => "reply",
        }
    }

    pub fn serialize(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn deserialize(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
