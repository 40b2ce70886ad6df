use std::collections::{HashMap, VecDeque};

use coordinator_core::models::{CommandReply, RoundKey};

/// 已接收命令的处理状态
#[derive(Debug, Clone, PartialEq)]
pub enum HandledState {
    /// 正在处理，重复投递直接忽略
    InFlight,
    /// 已处理完成，重复投递时重发缓存的回复
    Done(CommandReply),
}

/// 有界的回复缓存，按插入顺序淘汰
#[derive(Debug)]
pub struct ReplyCache {
    capacity: usize,
    order: VecDeque<RoundKey>,
    entries: HashMap<RoundKey, HandledState>,
}

impl ReplyCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, key: &RoundKey) -> Option<&HandledState> {
        self.entries.get(key)
    }

    /// 标记为处理中；已存在时返回 false
    pub fn begin(&mut self, key: RoundKey) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, HandledState::InFlight);
        self.evict();
        true
    }

    pub fn complete(&mut self, reply: CommandReply) {
        let key = reply.round_key();
        if !self.entries.contains_key(&key) {
            self.order.push_back(key.clone());
        }
        self.entries.insert(key, HandledState::Done(reply));
        self.evict();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict(&mut self) {
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }
}
