use coordinator_core::CoordinatorResult;
use serde_json::json;

use super::{load_details, PluginTarget};
use crate::{
    cluster::{dispatch, ClusterWorkflow},
    context::JobContext,
    environment::JobEnvironment,
    task::{task, Task},
};

/// 在集群中每个进程上安装插件缺失的依赖包
pub struct PluginDependenciesJob {
    env: JobEnvironment,
    target: PluginTarget,
}

impl PluginDependenciesJob {
    pub const OPERATION: &'static str = "INSTALL_PLUGIN_DEPENDENCIES";
    pub const COMMAND_TYPE: &'static str = "install_plugin_dependencies";

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

impl ClusterWorkflow for PluginDependenciesJob {
    fn initiator_tasks(&self, ctx: &JobContext) -> CoordinatorResult<Vec<Task>> {
        let ctx = ctx.clone();
        let commands = self.env.commands.clone();
        let payload = self.target.payload();

        Ok(vec![task(async move {
            let round = dispatch(&ctx, &commands, Self::COMMAND_TYPE, payload).await?;
            let installed: serde_json::Map<_, _> = round
                .results
                .iter()
                .map(|(pid, reply)| (pid.clone(), reply.result.clone()))
                .collect();
            Ok(serde_json::Value::Object(installed))
        })])
    }

    fn worker_tasks(&self, ctx: &JobContext) -> CoordinatorResult<Vec<Task>> {
        let ctx = ctx.clone();
        let packages = self.env.packages.clone();
        let uid = self.target.plugin_uid.clone();

        Ok(vec![task(async move {
            let details = load_details(packages.as_ref(), &uid).await?;
            let missing = packages.missing_dependencies(&details).await?;
            if missing.is_empty() {
                ctx.log(format!("All dependencies of {} are present", uid));
                return Ok(json!({ "installed": [] }));
            }

            ctx.log(format!("Installing dependencies of {}: {:?}", uid, missing));
            packages.install_dependencies(&details, &missing).await?;
            Ok(json!({ "installed": missing }))
        })])
    }
}
