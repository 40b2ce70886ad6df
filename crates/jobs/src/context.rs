use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

/// 作业角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobRole {
    /// 在收到原始请求的进程上协调整个集群
    Initiator,
    /// 在收到分发命令的进程上只执行本地步骤
    Worker,
}

impl fmt::Display for JobRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobRole::Initiator => write!(f, "initiator"),
            JobRole::Worker => write!(f, "worker"),
        }
    }
}

/// 作业状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Created,
    Running,
    Dispatching,
    AwaitingReplies,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Created => "created",
            JobStatus::Running => "running",
            JobStatus::Dispatching => "dispatching",
            JobStatus::AwaitingReplies => "awaiting_replies",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// 嵌套作业与父作业的关联
struct ParentLink {
    context: JobContext,
    weight: f64,
}

struct ContextState {
    status: JobStatus,
    progress: f64,
    /// 已经计入父作业的进度
    contributed: f64,
    logs: Vec<String>,
}

struct ContextInner {
    id: String,
    name: String,
    role: JobRole,
    parent: Option<ParentLink>,
    state: Mutex<ContextState>,
    progress_tx: watch::Sender<f64>,
}

/// 作业运行时上下文
///
/// 由作业引擎创建，克隆成本低，任务闭包各自持有一份。
/// 进度单调不减并限制在 [0, 100]；嵌套作业把自己的进度按权重
/// `round(weight * progress)` 计入父作业。
#[derive(Clone)]
pub struct JobContext {
    inner: Arc<ContextInner>,
}

impl fmt::Debug for JobContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobContext")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("role", &self.inner.role)
            .finish()
    }
}

impl JobContext {
    pub(crate) fn new(
        id: String,
        name: String,
        role: JobRole,
        parent: Option<(JobContext, f64)>,
    ) -> Self {
        let (progress_tx, _) = watch::channel(0.0);
        Self {
            inner: Arc::new(ContextInner {
                id,
                name,
                role,
                parent: parent.map(|(context, weight)| ParentLink { context, weight }),
                state: Mutex::new(ContextState {
                    status: JobStatus::Created,
                    progress: 0.0,
                    contributed: 0.0,
                    logs: Vec::new(),
                }),
                progress_tx,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ContextState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn role(&self) -> JobRole {
        self.inner.role
    }

    pub fn is_initiator(&self) -> bool {
        self.inner.role == JobRole::Initiator
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.inner.parent.as_ref().map(|p| p.context.id())
    }

    pub fn chunk_of_work(&self) -> f64 {
        self.inner.parent.as_ref().map_or(1.0, |p| p.weight)
    }

    pub fn status(&self) -> JobStatus {
        self.state().status
    }

    pub fn progress(&self) -> f64 {
        self.state().progress
    }

    pub fn logs(&self) -> Vec<String> {
        self.state().logs.clone()
    }

    /// 订阅进度变化
    pub fn subscribe_progress(&self) -> watch::Receiver<f64> {
        self.inner.progress_tx.subscribe()
    }

    pub(crate) fn set_status(&self, status: JobStatus) {
        let mut state = self.state();
        if state.status == status || state.status.is_terminal() {
            return;
        }
        debug!(job_id = %self.inner.id, "job {} status {} -> {}", self.inner.name, state.status, status);
        state.status = status;
    }

    /// 推进进度（增量百分比）
    ///
    /// 负值被忽略，结果截断到 100。嵌套作业把变化量按权重转发给父作业。
    pub fn on_update(&self, increment: f64) {
        if !increment.is_finite() || increment <= 0.0 {
            return;
        }
        self.advance(|current| current + increment);
    }

    pub(crate) fn set_progress(&self, value: f64) {
        self.advance(|_| value);
    }

    fn advance(&self, next: impl FnOnce(f64) -> f64) {
        let parent_delta = {
            let mut state = self.state();
            let next = next(state.progress).clamp(0.0, 100.0);
            if next <= state.progress {
                return;
            }
            state.progress = next;
            self.inner.progress_tx.send_replace(next);

            self.inner.parent.as_ref().map(|parent| {
                let contribution = (parent.weight * next).round();
                let delta = contribution - state.contributed;
                state.contributed = contribution;
                delta
            })
        };

        if let (Some(parent), Some(delta)) = (&self.inner.parent, parent_delta) {
            if delta > 0.0 {
                parent.context.on_update(delta);
            }
        }
    }

    /// 同时写入作业日志和系统日志
    pub fn log(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        info!(job_id = %self.inner.id, job = %self.inner.name, "{}", message);
        let line = format!("{} [{}] {}", Utc::now().to_rfc3339(), self.inner.name, message);
        self.state().logs.push(line);
    }
}
