use std::sync::Arc;

use coordinator_command::CommandService;
use coordinator_core::{
    config::PluginsConfig,
    traits::{DocumentStore, PluginPackages},
};

use crate::{plugins::PluginRuntime, recorder::JobRunRecorder, sites::SiteRuntime};

/// 作业运行所需的协作者
///
/// 替代进程级的全局注册表：每个作业在构造时显式拿到它需要的句柄。
#[derive(Clone)]
pub struct JobEnvironment {
    pub commands: Arc<CommandService>,
    pub store: Arc<dyn DocumentStore>,
    pub packages: Arc<dyn PluginPackages>,
    pub plugins: Arc<PluginRuntime>,
    pub sites: Arc<SiteRuntime>,
    pub settings: PluginsConfig,
    pub recorder: Option<JobRunRecorder>,
}

impl JobEnvironment {
    pub fn new(
        commands: Arc<CommandService>,
        store: Arc<dyn DocumentStore>,
        packages: Arc<dyn PluginPackages>,
        settings: PluginsConfig,
    ) -> Self {
        Self {
            commands,
            store,
            packages,
            plugins: Arc::new(PluginRuntime::default()),
            sites: Arc::new(SiteRuntime::default()),
            settings,
            recorder: None,
        }
    }

    /// 启用作业运行记录
    pub fn with_recorder(mut self, recorder: JobRunRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn process_id(&self) -> &str {
        self.commands.process_id()
    }
}
