use coordinator_core::{CoordinatorError, CoordinatorResult};
use serde_json::json;

use super::{load_details, PluginTarget};
use crate::{
    cluster::{dispatch, ClusterWorkflow},
    context::JobContext,
    environment::JobEnvironment,
    task::{task, Task},
};

/// 确认集群中每个进程都能加载插件的依赖包
pub struct AvailablePluginJob {
    env: JobEnvironment,
    target: PluginTarget,
}

impl AvailablePluginJob {
    pub const OPERATION: &'static str = "IS_AVAILABLE";
    pub const COMMAND_TYPE: &'static str = "is_plugin_available";

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

impl ClusterWorkflow for AvailablePluginJob {
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
        let packages = self.env.packages.clone();
        let uid = self.target.plugin_uid.clone();
        let process_id = self.env.process_id().to_string();

        Ok(vec![task(async move {
            let details = load_details(packages.as_ref(), &uid).await?;
            let missing = packages.missing_dependencies(&details).await?;
            if !missing.is_empty() {
                ctx.log(format!("Plugin {} is missing dependencies: {:?}", uid, missing));
                return Err(CoordinatorError::Precondition(format!(
                    "进程 {} 缺少插件 {} 的依赖: {}",
                    process_id,
                    uid,
                    missing.join(", ")
                )));
            }

            ctx.log(format!(
                "Plugin {} is available ({} dependencies)",
                uid,
                details.dependencies.len()
            ));
            Ok(json!({ "plugin_uid": uid, "available": true }))
        })])
    }
}
