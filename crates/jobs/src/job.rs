use chrono::{DateTime, Utc};
use coordinator_core::{CoordinatorError, CoordinatorResult};
use metrics::{counter, histogram};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    context::{JobContext, JobRole, JobStatus},
    recorder::JobRunRecorder,
    runner::run_tasks,
    task::TaskProvider,
};

/// 作业构建器
///
/// 所有设置都必须在 `build` 之前完成；构建出的作业只能运行一次。
pub struct JobBuilder {
    id: Option<String>,
    name: String,
    parent: Option<JobContext>,
    chunk_of_work: f64,
    parallel_limit: Option<usize>,
    role: JobRole,
    recorder: Option<JobRunRecorder>,
}

impl JobBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            parent: None,
            chunk_of_work: 1.0,
            parallel_limit: None,
            role: JobRole::Initiator,
            recorder: None,
        }
    }

    /// 指定作业ID，默认生成 UUID
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// 作为子作业嵌套在父作业中
    pub fn parent(mut self, parent: &JobContext) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// 子作业在父作业进度中所占比例，取值 (0, 1]
    pub fn chunk_of_work(mut self, fraction: f64) -> Self {
        self.chunk_of_work = fraction;
        self
    }

    pub fn parallel_limit(mut self, limit: usize) -> Self {
        self.parallel_limit = Some(limit);
        self
    }

    pub fn run_as_initiator(mut self, initiator: bool) -> Self {
        self.role = if initiator {
            JobRole::Initiator
        } else {
            JobRole::Worker
        };
        self
    }

    pub fn recorder(mut self, recorder: Option<JobRunRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn build<P: TaskProvider>(self, provider: P) -> CoordinatorResult<Job<P>> {
        if self.name.trim().is_empty() {
            return Err(CoordinatorError::MissingArgument("job name".to_string()));
        }
        if !(self.chunk_of_work > 0.0 && self.chunk_of_work <= 1.0) {
            return Err(CoordinatorError::InvalidArgument(format!(
                "chunk of work must be in (0, 1], got {}",
                self.chunk_of_work
            )));
        }
        if self.parallel_limit == Some(0) {
            return Err(CoordinatorError::InvalidArgument(
                "parallel limit must be positive".to_string(),
            ));
        }

        let parallel_limit = provider.parallel_limit().or(self.parallel_limit);
        let id = self.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let parent = self.parent.map(|p| (p, self.chunk_of_work));
        let context = JobContext::new(id, self.name, self.role, parent);

        Ok(Job {
            context,
            provider,
            parallel_limit,
            recorder: self.recorder,
        })
    }
}

/// 作业结束后的结果
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub id: String,
    pub name: String,
    pub role: JobRole,
    pub status: JobStatus,
    pub progress: f64,
    pub results: Vec<serde_json::Value>,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<CoordinatorError>,
    pub logs: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

fn serialize_error<S: serde::Serializer>(
    error: &Option<CoordinatorError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Completed
    }

    pub fn into_result(self) -> CoordinatorResult<serde_json::Value> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(serde_json::Value::Array(self.results)),
        }
    }
}

/// 作业引擎
///
/// 任务列表来自 `TaskProvider`，执行策略、进度和日志由引擎统一处理。
pub struct Job<P> {
    context: JobContext,
    provider: P,
    parallel_limit: Option<usize>,
    recorder: Option<JobRunRecorder>,
}

impl<P: TaskProvider> Job<P> {
    pub fn context(&self) -> &JobContext {
        &self.context
    }

    pub fn id(&self) -> &str {
        self.context.id()
    }

    pub fn name(&self) -> &str {
        self.context.name()
    }

    pub fn parallel_limit(&self) -> Option<usize> {
        self.parallel_limit
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<f64> {
        self.context.subscribe_progress()
    }

    /// 运行作业直到完成或第一个任务失败
    pub async fn run(self) -> JobOutcome {
        let ctx = self.context;
        let started_at = Utc::now();
        ctx.set_status(JobStatus::Running);
        ctx.log(format!("Starting job {} as {}", ctx.id(), ctx.role()));
        if let Some(recorder) = &self.recorder {
            recorder.record(&ctx, started_at, None).await;
        }

        let result = match self.provider.tasks(&ctx) {
            Ok(tasks) => run_tasks(&ctx, tasks, self.parallel_limit).await,
            Err(e) => Err(e),
        };

        let (results, error) = match result {
            Ok(results) => {
                ctx.set_progress(100.0);
                ctx.set_status(JobStatus::Completed);
                ctx.log("Job completed");
                (results, None)
            }
            Err(e) => {
                ctx.set_status(JobStatus::Failed);
                ctx.log(format!("Job failed: {e}"));
                error!(
                    job_id = %ctx.id(),
                    job = %ctx.name(),
                    category = ?e.category(),
                    progress = ctx.progress(),
                    "作业执行失败: {:?}", e
                );
                (Vec::new(), Some(e))
            }
        };

        let finished_at = Utc::now();
        let status = ctx.status();
        counter!("jobs_completed_total", "status" => status.to_string()).increment(1);
        histogram!("job_duration_ms")
            .record((finished_at - started_at).num_milliseconds().max(0) as f64);
        info!(
            job_id = %ctx.id(),
            "Job {} finished with status {} at {}%",
            ctx.name(),
            status,
            ctx.progress()
        );

        if let Some(recorder) = &self.recorder {
            recorder
                .record(&ctx, started_at, error.as_ref().map(|e| e.to_string()))
                .await;
        }

        JobOutcome {
            id: ctx.id().to_string(),
            name: ctx.name().to_string(),
            role: ctx.role(),
            status,
            progress: ctx.progress(),
            results,
            error,
            logs: ctx.logs(),
            started_at,
            finished_at,
        }
    }
}
