use coordinator_core::{
    models::PluginDetails, traits::LifecyclePhase, CoordinatorError, CoordinatorResult,
};
use serde_json::json;
use tracing::warn;

use super::{run_lifecycle_hook, HookInvocation, PluginRecords, PluginTarget};
use crate::{
    cluster::{dispatch, ClusterWorkflow},
    context::JobContext,
    environment::JobEnvironment,
    task::{task, Task},
};

/// 插件卸载作业
///
/// 发起者先确认插件已安装，再通知所有进程停用插件，最后串行清理：
/// 卸载钩子、插件设置、主题设置、安装记录，以及指向该插件的当前主题。
pub struct UninstallPluginJob {
    env: JobEnvironment,
    target: PluginTarget,
}

impl UninstallPluginJob {
    pub const OPERATION: &'static str = "UNINSTALL_PLUGIN";
    pub const COMMAND_TYPE: &'static str = "uninstall_plugin";

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

    fn check_installed(&self, ctx: &JobContext) -> Task {
        let ctx = ctx.clone();
        let records = PluginRecords::new(self.env.store.clone());
        let target = self.target.clone();

        task(async move {
            ctx.log(format!("Verifying plugin {} is installed", target.plugin_uid));
            if !records.is_installed(&target).await? {
                return Err(CoordinatorError::NotInstalled {
                    plugin: target.plugin_uid.clone(),
                });
            }
            Ok(json!({ "installed": true }))
        })
    }

    fn deactivate_everywhere(&self, ctx: &JobContext) -> Task {
        let ctx = ctx.clone();
        let commands = self.env.commands.clone();
        let payload = self.target.payload();

        task(async move {
            let round = dispatch(&ctx, &commands, Self::COMMAND_TYPE, payload).await?;
            ctx.on_update(50.0);
            Ok(json!({ "responders": round.responders() }))
        })
    }

    fn cleanup(&self, ctx: &JobContext) -> Task {
        let ctx = ctx.clone();
        let env = self.env.clone();
        let target = self.target.clone();

        task(async move {
            let records = PluginRecords::new(env.store.clone());
            let uid = target.plugin_uid.as_str();

            let hook = match records.find_installed(&target).await? {
                Some(record) => {
                    // 安装记录是详情文件的副本
                    let details: PluginDetails = serde_json::from_value(record.body)?;
                    let module = env
                        .packages
                        .load_main_module(uid, &details.main_module.path)
                        .await?;
                    run_lifecycle_hook(
                        module.as_ref(),
                        LifecyclePhase::Uninstall,
                        uid,
                        &target.hook_context(),
                    )
                    .await?
                }
                None => {
                    warn!("Install record of {} disappeared before cleanup", uid);
                    HookInvocation::Skipped
                }
            };
            ctx.log(format!("Uninstall hook of {}: {:?}", uid, hook));

            records.purge_settings(&target).await?;
            records.purge_theme_settings(&target).await?;
            records.delete_record(&target).await?;
            ctx.log(format!("Removed records of {} for site {}", uid, target.site));

            let theme_reset = records
                .reset_active_theme(&target, &env.settings.default_theme)
                .await?;
            if theme_reset {
                ctx.log(format!(
                    "Active theme reset to {}",
                    env.settings.default_theme
                ));
            }

            Ok(json!({ "uninstall_hook": hook, "theme_reset": theme_reset }))
        })
    }
}

impl ClusterWorkflow for UninstallPluginJob {
    fn initiator_tasks(&self, ctx: &JobContext) -> CoordinatorResult<Vec<Task>> {
        Ok(vec![
            self.check_installed(ctx),
            self.deactivate_everywhere(ctx),
            self.cleanup(ctx),
        ])
    }

    /// 在本进程的运行时中停用插件
    fn worker_tasks(&self, ctx: &JobContext) -> CoordinatorResult<Vec<Task>> {
        let ctx = ctx.clone();
        let plugins = self.env.plugins.clone();
        let target = self.target.clone();

        Ok(vec![task(async move {
            let was_active = plugins.deactivate(&target.plugin_uid, &target.site).await;
            ctx.log(format!(
                "Plugin {} deactivated (was active: {})",
                target.plugin_uid, was_active
            ));
            Ok(json!({ "was_active": was_active }))
        })])
    }

    fn parallel_limit(&self) -> Option<usize> {
        Some(1)
    }
}
