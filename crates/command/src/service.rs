use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use coordinator_core::{
    config::{CommandConfig, MembershipPolicy},
    models::{Command, CommandReply, Envelope, RoundKey},
    traits::{CommandTransport, ProcessRegistry},
    CoordinatorError, CoordinatorResult,
};
use futures::StreamExt;
use metrics::{counter, histogram};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

use crate::{
    handler::CommandHandler,
    reply_cache::{HandledState, ReplyCache},
    round::{CommandRoundResult, PendingRound, ReplyOutcome},
};

const MAX_REPLY_PUBLISH_RETRIES: u32 = 3;

/// 命令服务
///
/// 同时承担两个角色：
/// - 发起方：`send_command` 向注册表中的所有活跃进程广播命令并等待全部回复
/// - 接收方：监听传输层，把命令路由给已注册的处理器并回复发起方
///
/// 回复按 (name, job_id) 关联到等待中的轮次；没有等待轮次的回复（迟到）
/// 以及同一进程的重复回复会被丢弃。重复投递的命令不会被再次执行，
/// 缓存的回复会被重新发送。
pub struct CommandService {
    process_id: String,
    transport: Arc<dyn CommandTransport>,
    registry: Arc<dyn ProcessRegistry>,
    config: CommandConfig,
    handlers: RwLock<HashMap<String, Arc<dyn CommandHandler>>>,
    pending: Mutex<HashMap<RoundKey, PendingRound>>,
    reply_cache: Mutex<ReplyCache>,
    shutdown_tx: RwLock<Option<broadcast::Sender<()>>>,
}

/// 等待中的轮次在 `send_command` 返回或被取消时移除
struct RoundGuard<'a> {
    service: &'a CommandService,
    key: RoundKey,
}

impl RoundGuard<'_> {
    fn take(self) -> Option<PendingRound> {
        self.service.pending().remove(&self.key)
    }
}

impl Drop for RoundGuard<'_> {
    fn drop(&mut self) {
        self.service.pending().remove(&self.key);
    }
}

impl CommandService {
    pub fn new(
        process_id: impl Into<String>,
        transport: Arc<dyn CommandTransport>,
        registry: Arc<dyn ProcessRegistry>,
        config: CommandConfig,
    ) -> Arc<Self> {
        let reply_cache = ReplyCache::new(config.reply_cache_size);
        Arc::new(Self {
            process_id: process_id.into(),
            transport,
            registry,
            config,
            handlers: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            reply_cache: Mutex::new(reply_cache),
            shutdown_tx: RwLock::new(None),
        })
    }

    pub fn process_id(&self) -> &str {
        &self.process_id
    }

    pub fn registry(&self) -> &Arc<dyn ProcessRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &CommandConfig {
        &self.config
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<RoundKey, PendingRound>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn reply_cache(&self) -> MutexGuard<'_, ReplyCache> {
        self.reply_cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 注册命令处理器，同类型的旧处理器被替换
    pub async fn register_handler(&self, handler: Arc<dyn CommandHandler>) {
        let command_type = handler.command_type().to_string();
        info!("注册命令处理器: {}", command_type);
        self.handlers.write().await.insert(command_type, handler);
    }

    pub async fn handler_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.read().await.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn pending_rounds(&self) -> usize {
        self.pending().len()
    }

    /// 订阅传输层并启动监听循环
    pub async fn start(self: &Arc<Self>) -> CoordinatorResult<()> {
        let mut stream = self.transport.subscribe(&self.process_id).await?;
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        *self.shutdown_tx.write().await = Some(shutdown_tx);

        let service = Arc::clone(self);
        tokio::spawn(async move {
            info!(
                "命令监听已启动: process={}, backend={}",
                service.process_id,
                service.transport.backend_name()
            );
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("命令监听收到停止信号: {}", service.process_id);
                        break;
                    }
                    next = stream.next() => match next {
                        Some(envelope) => service.handle_envelope(envelope),
                        None => {
                            warn!("命令消息流已关闭: {}", service.process_id);
                            break;
                        }
                    }
                }
            }
        });

        Ok(())
    }

    pub async fn stop(&self) {
        if let Some(shutdown_tx) = self.shutdown_tx.write().await.take() {
            let _ = shutdown_tx.send(());
        }
    }

    /// 分发一条入站消息；命令在独立任务中执行，不阻塞监听循环
    pub fn handle_envelope(self: &Arc<Self>, envelope: Envelope) {
        match envelope {
            Envelope::Command(command) => {
                let service = Arc::clone(self);
                tokio::spawn(async move { service.handle_command(command).await });
            }
            Envelope::Reply(reply) => self.handle_reply(reply),
        }
    }

    async fn handle_command(&self, command: Command) {
        let key = command.round_key();

        let cached = {
            let mut cache = self.reply_cache();
            match cache.get(&key) {
                Some(HandledState::Done(reply)) => Some(Some(reply.clone())),
                Some(HandledState::InFlight) => Some(None),
                None => {
                    cache.begin(key.clone());
                    None
                }
            }
        };

        if let Some(cached) = cached {
            counter!("command_duplicate_deliveries_total").increment(1);
            debug!("重复投递的命令 {}，不再执行", key);
            if let Some(reply) = cached {
                self.publish_reply(reply).await;
            }
            return;
        }

        let handler = self
            .handlers
            .read()
            .await
            .get(&command.command_type)
            .cloned();

        let started = Instant::now();
        let reply = match handler {
            Some(handler) => match handler.handle(&command).await {
                Ok(result) => CommandReply::success(&command, self.process_id.clone(), result),
                Err(e) => {
                    warn!("命令 {} 在进程 {} 上执行失败: {}", key, self.process_id, e);
                    CommandReply::failure(&command, self.process_id.clone(), &e)
                }
            },
            None => {
                warn!("未注册的命令类型: {}", command.command_type);
                CommandReply::failure(
                    &command,
                    self.process_id.clone(),
                    &CoordinatorError::Internal(format!(
                        "未注册的命令类型: {}",
                        command.command_type
                    )),
                )
            }
        };

        counter!(
            "commands_handled_total",
            "command_type" => command.command_type.clone(),
            "outcome" => if reply.success { "success" } else { "failure" }
        )
        .increment(1);
        histogram!("command_handle_duration_ms")
            .record(started.elapsed().as_millis() as f64);

        self.reply_cache().complete(reply.clone());
        self.publish_reply(reply).await;
    }

    async fn publish_reply(&self, reply: CommandReply) {
        let round = reply.round_key();
        let envelope = Envelope::Reply(reply);

        for attempt in 1..=MAX_REPLY_PUBLISH_RETRIES {
            match self.transport.publish(&envelope).await {
                Ok(()) => {
                    debug!("回复已发送: {} (attempt {})", round, attempt);
                    return;
                }
                Err(e) => {
                    error!(
                        "发送回复失败 (重试 {}/{}): {}, error={}",
                        attempt, MAX_REPLY_PUBLISH_RETRIES, round, e
                    );
                    if attempt < MAX_REPLY_PUBLISH_RETRIES {
                        tokio::time::sleep(Duration::from_millis(100 * 2u64.pow(attempt - 1)))
                            .await;
                    }
                }
            }
        }
        counter!("command_reply_publish_failures_total").increment(1);
    }

    fn handle_reply(&self, reply: CommandReply) {
        if reply.to != self.process_id {
            return;
        }

        let key = reply.round_key();
        let from = reply.from.clone();
        let mut pending = self.pending();
        match pending.get_mut(&key) {
            None => {
                counter!("command_replies_discarded_total", "reason" => "late").increment(1);
                debug!("丢弃迟到的回复: {} from {}", key, from);
            }
            Some(round) => match round.record(reply) {
                ReplyOutcome::Recorded => debug!("收到回复: {} from {}", key, from),
                ReplyOutcome::Unaddressed => {
                    counter!("command_replies_discarded_total", "reason" => "unaddressed")
                        .increment(1);
                    debug!("丢弃未寻址进程的回复: {} from {}", key, from);
                }
                ReplyOutcome::Duplicate => {
                    counter!("command_replies_discarded_total", "reason" => "duplicate")
                        .increment(1);
                    debug!("丢弃重复的回复: {} from {}", key, from);
                }
            },
        }
    }

    /// 向所有活跃进程广播命令，等待每个必需进程回复
    ///
    /// 超时返回 `CommandTimeout`，其中列出未回复的进程。
    /// 有进程回复失败时仍返回 `Ok`，由 `all_acknowledged` 表示。
    pub async fn send_command(
        &self,
        command_type: &str,
        name: &str,
        job_id: &str,
        payload: serde_json::Value,
    ) -> CoordinatorResult<CommandRoundResult> {
        let active = self.registry.active_processes().await?;
        if active.is_empty() {
            return Err(CoordinatorError::NoActiveProcesses);
        }

        let command = Command::new(command_type, name, job_id, self.process_id.clone(), payload);
        let key = command.round_key();

        let notify = {
            let mut pending = self.pending();
            if pending.contains_key(&key) {
                return Err(CoordinatorError::InvalidArgument(format!(
                    "命令轮次已在进行中: {key}"
                )));
            }
            let round = PendingRound::new(active.clone(), self.config.membership);
            let notify = Arc::clone(&round.notify);
            pending.insert(key.clone(), round);
            notify
        };
        let guard = RoundGuard {
            service: self,
            key: key.clone(),
        };

        info!(
            "广播命令 {} ({}) 到 {} 个进程: {:?}",
            key,
            command_type,
            active.len(),
            active
        );
        let started = Instant::now();
        self.transport.publish(&Envelope::Command(command)).await?;

        let deadline = tokio::time::Instant::now() + self.config.timeout();
        let live = self.config.membership == MembershipPolicy::Live;
        let mut refresh = tokio::time::interval(self.config.registry_refresh());
        refresh.tick().await;

        loop {
            let complete = self.pending().get(&key).map_or(true, PendingRound::is_complete);
            if complete {
                break;
            }

            tokio::select! {
                _ = notify.notified() => {}
                _ = tokio::time::sleep_until(deadline) => {
                    let round = guard.take();
                    let missing = round.as_ref().map(PendingRound::missing).unwrap_or_default();
                    if let Some(round) = round.filter(|_| missing.is_empty()) {
                        return Ok(round.into_result());
                    }
                    counter!("command_rounds_total", "outcome" => "timeout").increment(1);
                    warn!("命令 {} 等待回复超时，未回复的进程: {:?}", key, missing);
                    return Err(CoordinatorError::CommandTimeout {
                        name: key.name,
                        job_id: key.job_id,
                        missing,
                    });
                }
                _ = refresh.tick(), if live => {
                    match self.registry.active_processes().await {
                        Ok(active) => {
                            if let Some(round) = self.pending().get_mut(&key) {
                                let departed = round.excuse_departed(&active);
                                if !departed.is_empty() {
                                    info!("命令 {} 不再等待已离开的进程: {:?}", key, departed);
                                }
                            }
                        }
                        Err(e) => warn!("刷新进程注册表失败: {}", e),
                    }
                }
            }
        }

        let round = guard
            .take()
            .ok_or_else(|| CoordinatorError::Internal(format!("命令轮次丢失: {key}")))?;
        let result = round.into_result();

        counter!(
            "command_rounds_total",
            "outcome" => if result.all_acknowledged { "acknowledged" } else { "failed" }
        )
        .increment(1);
        histogram!("command_round_duration_ms").record(started.elapsed().as_millis() as f64);
        info!(
            "命令 {} 完成: {} 个回复, all_acknowledged={}",
            key,
            result.results.len(),
            result.all_acknowledged
        );
        Ok(result)
    }
}
