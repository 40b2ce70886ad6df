//! 工作者命令处理器
//!
//! 每种分发命令对应一个处理器：收到命令后以工作者角色构建同一个作业并运行，
//! 作业结果作为回复返回给发起者。

use std::sync::Arc;

use async_trait::async_trait;
use coordinator_command::{CommandHandler, CommandService};
use coordinator_core::{models::Command, CoordinatorResult};
use tracing::info;

use crate::{
    cluster::ClusterWorkflow,
    environment::JobEnvironment,
    job::JobBuilder,
    plugins::{
        AvailablePluginJob, InitializePluginJob, PluginDependenciesJob, PluginTarget,
        UninstallPluginJob,
    },
    sites::{CreateEditSiteJob, SiteActivationJob, SiteTarget},
};

/// 从命令负载构建工作流
pub type WorkflowFactory<W> = fn(&JobEnvironment, &serde_json::Value) -> CoordinatorResult<W>;

pub struct WorkerJobHandler<W> {
    command_type: &'static str,
    env: JobEnvironment,
    factory: WorkflowFactory<W>,
}

impl<W: ClusterWorkflow> WorkerJobHandler<W> {
    pub fn new(command_type: &'static str, env: JobEnvironment, factory: WorkflowFactory<W>) -> Self {
        Self {
            command_type,
            env,
            factory,
        }
    }
}

#[async_trait]
impl<W: ClusterWorkflow> CommandHandler for WorkerJobHandler<W> {
    fn command_type(&self) -> &str {
        self.command_type
    }

    async fn handle(&self, command: &Command) -> CoordinatorResult<serde_json::Value> {
        let workflow = (self.factory)(&self.env, &command.payload)?;
        let job = JobBuilder::new(command.name.clone())
            .id(format!("{}:{}", command.job_id, self.env.process_id()))
            .run_as_initiator(false)
            .recorder(self.env.recorder.clone())
            .build_cluster(workflow)?;

        info!(
            "Running worker job {} for initiator {} (job {})",
            command.name, command.reply_to, command.job_id
        );
        job.run().await.into_result()
    }
}


/// 注册本进程能响应的全部工作者命令
pub async fn register_worker_handlers(commands: &CommandService, env: &JobEnvironment) {
    let handlers: Vec<Arc<dyn CommandHandler>> = vec![
        Arc::new(WorkerJobHandler::<AvailablePluginJob>::new(
            AvailablePluginJob::COMMAND_TYPE,
            env.clone(),
            |env, payload| {
                Ok(AvailablePluginJob::new(env.clone(), PluginTarget::from_payload(payload)?))
            },
        )),
        Arc::new(WorkerJobHandler::<PluginDependenciesJob>::new(
            PluginDependenciesJob::COMMAND_TYPE,
            env.clone(),
            |env, payload| {
                Ok(PluginDependenciesJob::new(env.clone(), PluginTarget::from_payload(payload)?))
            },
        )),
        Arc::new(WorkerJobHandler::<InitializePluginJob>::new(
            InitializePluginJob::COMMAND_TYPE,
            env.clone(),
            |env, payload| {
                Ok(InitializePluginJob::new(env.clone(), PluginTarget::from_payload(payload)?))
            },
        )),
        Arc::new(WorkerJobHandler::<UninstallPluginJob>::new(
            UninstallPluginJob::COMMAND_TYPE,
            env.clone(),
            |env, payload| {
                Ok(UninstallPluginJob::new(env.clone(), PluginTarget::from_payload(payload)?))
            },
        )),
        Arc::new(WorkerJobHandler::<SiteActivationJob>::new(
            SiteActivationJob::ACTIVATE_COMMAND,
            env.clone(),
            |env, payload| {
                Ok(SiteActivationJob::activate(env.clone(), SiteTarget::from_payload(payload)?))
            },
        )),
        Arc::new(WorkerJobHandler::<SiteActivationJob>::new(
            SiteActivationJob::DEACTIVATE_COMMAND,
            env.clone(),
            |env, payload| {
                Ok(SiteActivationJob::deactivate(env.clone(), SiteTarget::from_payload(payload)?))
            },
        )),
        Arc::new(WorkerJobHandler::<CreateEditSiteJob>::new(
            CreateEditSiteJob::COMMAND_TYPE,
            env.clone(),
            |env, payload| CreateEditSiteJob::from_payload(env.clone(), payload),
        )),
    ];

    for handler in handlers {
        commands.register_handler(handler).await;
    }
}
