use coordinator_command::{CommandRoundResult, CommandService};
use coordinator_core::{CoordinatorError, CoordinatorResult};
use tracing::warn;

use crate::{
    context::{JobContext, JobRole, JobStatus},
    job::{Job, JobBuilder},
    recorder::JobRunRecorder,
    task::{Task, TaskProvider},
};

/// 集群作业的两种角色各自的任务列表
///
/// 发起者任务通常包括前置检查、广播命令、本地持久化和嵌套子作业；
/// 工作者任务只包含在单个进程上有意义的本地步骤。
pub trait ClusterWorkflow: Send + Sync + 'static {
    fn initiator_tasks(&self, ctx: &JobContext) -> CoordinatorResult<Vec<Task>>;

    fn worker_tasks(&self, ctx: &JobContext) -> CoordinatorResult<Vec<Task>>;

    fn parallel_limit(&self) -> Option<usize> {
        None
    }
}

/// 按作业角色选择任务列表
pub struct RoleStrategy<W> {
    workflow: W,
}

impl<W> RoleStrategy<W> {
    pub fn workflow(&self) -> &W {
        &self.workflow
    }
}

impl<W: ClusterWorkflow> TaskProvider for RoleStrategy<W> {
    fn tasks(&self, ctx: &JobContext) -> CoordinatorResult<Vec<Task>> {
        match ctx.role() {
            JobRole::Initiator => self.workflow.initiator_tasks(ctx),
            JobRole::Worker => self.workflow.worker_tasks(ctx),
        }
    }

    fn parallel_limit(&self) -> Option<usize> {
        self.workflow.parallel_limit()
    }
}

pub type ClusterJob<W> = Job<RoleStrategy<W>>;

impl JobBuilder {
    pub fn build_cluster<W: ClusterWorkflow>(self, workflow: W) -> CoordinatorResult<ClusterJob<W>> {
        self.build(RoleStrategy { workflow })
    }
}

impl<W: ClusterWorkflow> Job<RoleStrategy<W>> {
    pub fn workflow(&self) -> &W {
        self.provider().workflow()
    }

    /// 发起者任务列表；以工作者角色构建的作业调用时立即失败
    pub fn initiator_tasks(&self) -> CoordinatorResult<Vec<Task>> {
        self.require_role(JobRole::Initiator)?;
        self.workflow().initiator_tasks(self.context())
    }

    /// 工作者任务列表；以发起者角色构建的作业调用时立即失败
    pub fn worker_tasks(&self) -> CoordinatorResult<Vec<Task>> {
        self.require_role(JobRole::Worker)?;
        self.workflow().worker_tasks(self.context())
    }

    fn require_role(&self, requested: JobRole) -> CoordinatorResult<()> {
        let actual = self.context().role();
        if actual != requested {
            return Err(CoordinatorError::RoleMismatch {
                job: self.name().to_string(),
                requested: requested.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }
}

/// 广播命令并等待集群中所有进程确认
///
/// 命令名称取作业名称，回复按 (作业名称, 作业ID) 关联。
/// 任何进程回复失败或轮次超时都使调用失败。
pub async fn dispatch(
    ctx: &JobContext,
    commands: &CommandService,
    command_type: &str,
    payload: serde_json::Value,
) -> CoordinatorResult<CommandRoundResult> {
    ctx.set_status(JobStatus::Dispatching);
    ctx.log(format!("Dispatching {} command {} to the cluster", command_type, ctx.name()));

    ctx.set_status(JobStatus::AwaitingReplies);
    let round = commands
        .send_command(command_type, ctx.name(), ctx.id(), payload)
        .await;
    ctx.set_status(JobStatus::Running);

    let round = round.inspect_err(|e| ctx.log(format!("Command {} failed: {}", ctx.name(), e)))?;
    if !round.all_acknowledged {
        let failures = round.failures();
        warn!(job_id = %ctx.id(), "command {} was not acknowledged: {:?}", ctx.name(), failures);
        ctx.log(format!("Command {} was rejected by: {:?}", ctx.name(), failures));
        return Err(CoordinatorError::CoordinationFailed {
            name: ctx.name().to_string(),
            failures,
        });
    }

    ctx.log(format!(
        "Command {} acknowledged by {} processes",
        ctx.name(),
        round.results.len()
    ));
    Ok(round)
}

/// 以发起者角色运行嵌套的集群作业
///
/// 子作业的进度按 `weight` 计入父作业；子作业失败原样传播给父作业。
pub async fn run_nested<W: ClusterWorkflow>(
    parent: &JobContext,
    name: String,
    weight: f64,
    recorder: Option<JobRunRecorder>,
    workflow: W,
) -> CoordinatorResult<serde_json::Value> {
    parent.log(format!("Running sub-job {} (weight {})", name, weight));
    let job = JobBuilder::new(name)
        .parent(parent)
        .chunk_of_work(weight)
        .recorder(recorder)
        .build_cluster(workflow)?;
    job.run().await.into_result()
}
