use chrono::Utc;
use coordinator_core::{traits::LifecyclePhase, CoordinatorError, CoordinatorResult};
use serde_json::json;

use super::{load_details, run_lifecycle_hook, ActivePlugin, PluginRecords, PluginTarget};
use crate::{
    cluster::{dispatch, ClusterWorkflow},
    context::JobContext,
    environment::JobEnvironment,
    task::{task, Task},
};

/// 在集群中每个进程上启动插件
///
/// 工作者加载详情和主模块，调用启动钩子，并把插件登记到本进程的运行时。
pub struct InitializePluginJob {
    env: JobEnvironment,
    target: PluginTarget,
}

impl InitializePluginJob {
    pub const OPERATION: &'static str = "INITIALIZE_PLUGIN";
    pub const COMMAND_TYPE: &'static str = "initialize_plugin";

    pub fn new(env: JobEnvironment, target: PluginTarget) -> Self {
        let target = target.scoped(&env.settings);
        Self { env, target }
    }

    pub fn target(&self) -> &PluginTarget {
        &self.target
    }

    pub fn job_name(&self) -> String {
        self.target.job_name(Self::OPERATION)
    }
}

impl ClusterWorkflow for InitializePluginJob {
    fn initiator_tasks(&self, ctx: &JobContext) -> CoordinatorResult<Vec<Task>> {
        let ctx = ctx.clone();
        let commands = self.env.commands.clone();
        let payload = self.target.payload();

        Ok(vec![task(async move {
            let round = dispatch(&ctx, &commands, Self::COMMAND_TYPE, payload).await?;
            Ok(json!({ "responders": round.responders() }))
        })])
    }

    fn worker_tasks(&self, ctx: &JobContext) -> CoordinatorResult<Vec<Task>> {
        let ctx = ctx.clone();
        let env = self.env.clone();
        let target = self.target.clone();

        Ok(vec![task(async move {
            let records = PluginRecords::new(env.store.clone());
            if !records.is_installed(&target).await? {
                return Err(CoordinatorError::NotInstalled {
                    plugin: target.plugin_uid.clone(),
                });
            }

            let details = load_details(env.packages.as_ref(), &target.plugin_uid).await?;
            let module = env
                .packages
                .load_main_module(&target.plugin_uid, &details.main_module.path)
                .await?;
            let hook = run_lifecycle_hook(
                module.as_ref(),
                LifecyclePhase::Startup,
                &target.plugin_uid,
                &target.hook_context(),
            )
            .await?;

            env.plugins
                .activate(ActivePlugin {
                    uid: target.plugin_uid.clone(),
                    name: details.name.clone(),
                    version: details.version.clone(),
                    site: target.site.clone(),
                    activated_at: Utc::now(),
                })
                .await;
            ctx.log(format!(
                "Plugin {} initialized on {} for site {}",
                target.plugin_uid,
                env.process_id(),
                target.site
            ));

            Ok(json!({ "plugin_uid": target.plugin_uid, "startup_hook": hook }))
        })])
    }
}
