use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use coordinator_core::{config::MembershipPolicy, models::CommandReply};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

/// 一轮广播的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRoundResult {
    /// 每个必需进程都回复且全部成功
    pub all_acknowledged: bool,
    /// 进程ID -> 回复
    pub results: BTreeMap<String, CommandReply>,
}

impl CommandRoundResult {
    /// 失败回复，格式为 `进程ID: 错误`
    pub fn failures(&self) -> Vec<String> {
        self.results
            .values()
            .filter(|reply| !reply.success)
            .map(|reply| {
                format!(
                    "{}: {}",
                    reply.from,
                    reply.error.as_deref().unwrap_or("unknown error")
                )
            })
            .collect()
    }

    pub fn responders(&self) -> Vec<&str> {
        self.results.keys().map(String::as_str).collect()
    }
}

/// 发起方正在等待的轮次
#[derive(Debug)]
pub(crate) struct PendingRound {
    pub expected: BTreeSet<String>,
    pub received: BTreeMap<String, CommandReply>,
    pub notify: Arc<Notify>,
    membership: MembershipPolicy,
}

/// 记录回复的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReplyOutcome {
    Recorded,
    Duplicate,
    /// Snapshot 模式下来自发送时未寻址进程的回复
    Unaddressed,
}

impl PendingRound {
    pub fn new(expected: BTreeSet<String>, membership: MembershipPolicy) -> Self {
        Self {
            expected,
            received: BTreeMap::new(),
            notify: Arc::new(Notify::new()),
            membership,
        }
    }

    pub fn record(&mut self, reply: CommandReply) -> ReplyOutcome {
        if self.received.contains_key(&reply.from) {
            return ReplyOutcome::Duplicate;
        }
        if self.membership == MembershipPolicy::Snapshot && !self.expected.contains(&reply.from) {
            return ReplyOutcome::Unaddressed;
        }
        self.received.insert(reply.from.clone(), reply);
        if self.is_complete() {
            self.notify.notify_one();
        }
        ReplyOutcome::Recorded
    }

    pub fn is_complete(&self) -> bool {
        self.expected.iter().all(|p| self.received.contains_key(p))
    }

    pub fn missing(&self) -> Vec<String> {
        self.expected
            .iter()
            .filter(|p| !self.received.contains_key(*p))
            .cloned()
            .collect()
    }

    /// 按当前注册表收缩必需集合：已离开且尚未回复的进程不再等待
    pub fn excuse_departed(&mut self, active: &BTreeSet<String>) -> Vec<String> {
        let departed: Vec<String> = self
            .missing()
            .into_iter()
            .filter(|p| !active.contains(p))
            .collect();
        for process in &departed {
            self.expected.remove(process);
        }
        if !departed.is_empty() && self.is_complete() {
            self.notify.notify_one();
        }
        departed
    }

    pub fn into_result(self) -> CommandRoundResult {
        let all_acknowledged = self.is_complete()
            && self
                .expected
                .iter()
                .filter_map(|p| self.received.get(p))
                .all(|reply| reply.success);
        CommandRoundResult {
            all_acknowledged,
            results: self.received,
        }
    }
}
