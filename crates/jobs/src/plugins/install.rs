use coordinator_core::{traits::LifecyclePhase, CoordinatorError, CoordinatorResult};
use serde_json::json;
use tracing::info;

use super::{
    load_details, run_lifecycle_hook, AvailablePluginJob, InitializePluginJob, PluginRecords,
    PluginTarget,
};
use crate::{
    cluster::{run_nested, ClusterWorkflow},
    context::JobContext,
    environment::JobEnvironment,
    task::{task, Task},
};

/// 可用性检查和初始化子作业各占安装进度的一半，本地持久化不单独计入进度
const SUB_JOB_WEIGHT: f64 = 0.5;

/// 插件安装作业
///
/// 只能由发起者运行，步骤严格串行：
/// 1. 检查插件尚未安装
/// 2. 嵌套可用性检查作业
/// 3. 写安装记录、重置设置和主题设置、加载主模块并调用安装钩子
///    (主模块无法加载时安装失败，已写入的记录保留)
/// 4. 嵌套初始化作业，在每个进程上启动插件
///
/// 工作者通过单独分发的可用性检查和初始化命令参与。
pub struct InstallPluginJob {
    env: JobEnvironment,
    target: PluginTarget,
}

impl InstallPluginJob {
    pub const OPERATION: &'static str = "INSTALL_PLUGIN";

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

    fn check_not_installed(&self, ctx: &JobContext) -> Task {
        let ctx = ctx.clone();
        let records = PluginRecords::new(self.env.store.clone());
        let target = self.target.clone();

        task(async move {
            ctx.log(format!("Verifying plugin {} is not already installed", target.plugin_uid));
            if records.is_installed(&target).await? {
                return Err(CoordinatorError::AlreadyInstalled {
                    plugin: target.plugin_uid.clone(),
                });
            }
            Ok(json!({ "installed": false }))
        })
    }

    fn check_available(&self, ctx: &JobContext) -> Task {
        let ctx = ctx.clone();
        let workflow = AvailablePluginJob::new(self.env.clone(), self.target.clone());
        let recorder = self.env.recorder.clone();

        task(async move {
            let name = workflow.job_name();
            run_nested(&ctx, name, SUB_JOB_WEIGHT, recorder, workflow).await
        })
    }

    /// 本地持久化序列，任一步失败都中止后续步骤
    fn persist(&self, ctx: &JobContext) -> Task {
        let ctx = ctx.clone();
        let env = self.env.clone();
        let target = self.target.clone();

        task(async move {
            let records = PluginRecords::new(env.store.clone());
            let uid = target.plugin_uid.as_str();

            let details = load_details(env.packages.as_ref(), uid).await?;
            ctx.log(format!("Loaded details for {} ({})", uid, details.name));

            let record = records.save_install_record(&target, &details).await?;
            ctx.log(format!("Saved install record {} for site {}", record.id, target.site));

            records.reset_settings(&target, &details.settings).await?;
            ctx.log(format!("Reset settings of {}", uid));

            let theme = records
                .reset_theme_settings(&target, details.theme_settings().map(Vec::as_slice))
                .await?;
            if theme.is_some() {
                ctx.log(format!("Reset theme settings of {}", uid));
            }

            let module = env
                .packages
                .load_main_module(uid, &details.main_module.path)
                .await?
                .ok_or_else(|| {
                    let path = env
                        .packages
                        .details_path(uid)
                        .with_file_name(&details.main_module.path);
                    CoordinatorError::PluginLoad(format!(
                        "加载插件 {} 的主模块失败: {}",
                        uid,
                        path.display()
                    ))
                })?;
            let hook = run_lifecycle_hook(
                Some(&module),
                LifecyclePhase::Install,
                uid,
                &target.hook_context(),
            )
            .await?;
            ctx.log(format!("Install hook of {}: {:?}", uid, hook));

            Ok(json!({
                "plugin_id": record.id,
                "theme_settings": theme.is_some(),
                "install_hook": hook,
            }))
        })
    }

    fn initialize(&self, ctx: &JobContext) -> Task {
        let ctx = ctx.clone();
        let workflow = InitializePluginJob::new(self.env.clone(), self.target.clone());
        let recorder = self.env.recorder.clone();

        task(async move {
            let name = workflow.job_name();
            let result = run_nested(&ctx, name, SUB_JOB_WEIGHT, recorder, workflow).await?;
            info!("插件 {} 已在集群中初始化", ctx.name());
            Ok(result)
        })
    }
}

impl ClusterWorkflow for InstallPluginJob {
    fn initiator_tasks(&self, ctx: &JobContext) -> CoordinatorResult<Vec<Task>> {
        Ok(vec![
            self.check_not_installed(ctx),
            self.check_available(ctx),
            self.persist(ctx),
            self.initialize(ctx),
        ])
    }

    fn worker_tasks(&self, ctx: &JobContext) -> CoordinatorResult<Vec<Task>> {
        Err(CoordinatorError::InitiatorOnly {
            job: ctx.name().to_string(),
        })
    }

    fn parallel_limit(&self) -> Option<usize> {
        Some(1)
    }
}
