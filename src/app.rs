use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use coordinator_command::CommandService;
use coordinator_core::{
    models::{ProcessInfo, SiteDescriptor},
    traits::{CommandTransport, DocumentStore, PluginPackages, ProcessRegistry},
    AppConfig,
};
use coordinator_infrastructure::{
    FileSystemPluginPackages, RegistryFactory, StoreFactory, TransportFactory,
};
use coordinator_jobs::{
    plugins::{
        AvailablePluginJob, InitializePluginJob, InstallPluginJob, PluginDependenciesJob,
        PluginTarget, UninstallPluginJob,
    },
    register_worker_handlers,
    sites::{CreateEditSiteJob, SiteActivationJob, SiteTarget},
    ClusterWorkflow, JobBuilder, JobEnvironment, JobOutcome, JobRunRecorder,
};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 由命令行发起的集群操作
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Install(PluginTarget),
    Uninstall(PluginTarget),
    Initialize(PluginTarget),
    Available(PluginTarget),
    Dependencies(PluginTarget),
    SiteActivate(SiteTarget),
    SiteDeactivate(SiteTarget),
    SiteCreateEdit(SiteDescriptor),
}

/// 一个集群进程
///
/// 持有文档存储、命令传输、进程注册表和命令服务，并注册所有工作者命令处理器。
pub struct Application {
    config: AppConfig,
    registry: Arc<dyn ProcessRegistry>,
    commands: Arc<CommandService>,
    env: JobEnvironment,
    heartbeat: Mutex<Option<(broadcast::Sender<()>, JoinHandle<()>)>>,
}

impl Application {
    /// 按配置创建各个协作者
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("初始化进程 {}", config.node.process_id);

        let store = StoreFactory::create(&config.storage)
            .await
            .context("创建文档存储失败")?;
        let transport = TransportFactory::create(&config.transport, store.clone())
            .await
            .context("创建命令传输失败")?;
        let registry = RegistryFactory::create(&config.registry, store.clone());
        let packages: Arc<dyn PluginPackages> =
            Arc::new(FileSystemPluginPackages::new(&config.plugins));

        Self::from_parts(config, store, transport, registry, packages).await
    }

    /// 使用给定的协作者组装进程
    pub async fn from_parts(
        config: AppConfig,
        store: Arc<dyn DocumentStore>,
        transport: Arc<dyn CommandTransport>,
        registry: Arc<dyn ProcessRegistry>,
        packages: Arc<dyn PluginPackages>,
    ) -> Result<Self> {
        let commands = CommandService::new(
            config.node.process_id.clone(),
            transport,
            registry.clone(),
            config.command.clone(),
        );

        let mut env = JobEnvironment::new(
            commands.clone(),
            store.clone(),
            packages,
            config.plugins.clone(),
        );
        if config.jobs.persist_runs {
            env = env.with_recorder(JobRunRecorder::new(store));
        }

        register_worker_handlers(&commands, &env).await;

        Ok(Self {
            config,
            registry,
            commands,
            env,
            heartbeat: Mutex::new(None),
        })
    }

    pub fn process_id(&self) -> &str {
        &self.config.node.process_id
    }

    pub fn environment(&self) -> &JobEnvironment {
        &self.env
    }

    /// 加入集群：注册进程、开始监听命令、启动心跳
    pub async fn start(&self) -> Result<()> {
        let info = ProcessInfo::current(&self.config.node.process_id, &self.config.node.hostname);
        self.registry
            .register(&info)
            .await
            .context("注册进程失败")?;
        self.commands.start().await.context("启动命令服务失败")?;

        let (stop_tx, stop_rx) = broadcast::channel(1);
        let handle = tokio::spawn(run_heartbeat_loop(
            self.registry.clone(),
            info,
            Duration::from_secs(self.config.registry.heartbeat_interval_seconds),
            stop_rx,
        ));
        *self.heartbeat.lock().await = Some((stop_tx, handle));

        info!("进程 {} 已加入集群", self.process_id());
        Ok(())
    }

    /// 离开集群
    pub async fn stop(&self) {
        if let Some((stop_tx, handle)) = self.heartbeat.lock().await.take() {
            let _ = stop_tx.send(());
            if let Err(e) = handle.await {
                warn!("心跳任务退出异常: {}", e);
            }
        }

        self.commands.stop().await;
        if let Err(e) = self.registry.unregister(self.process_id()).await {
            warn!("注销进程失败: {}", e);
        }
        info!("进程 {} 已离开集群", self.process_id());
    }

    /// 作为集群成员运行直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        self.start().await?;
        let _ = shutdown_rx.recv().await;
        info!("进程 {} 收到关闭信号", self.process_id());
        self.stop().await;
        Ok(())
    }

    /// 以发起者角色运行一个集群操作
    pub async fn execute(&self, operation: Operation) -> Result<JobOutcome> {
        let env = self.env.clone();
        let outcome = match operation {
            Operation::Install(target) => {
                let job = InstallPluginJob::new(env, target);
                self.run_initiator(job.job_name(), job).await?
            }
            Operation::Uninstall(target) => {
                let job = UninstallPluginJob::new(env, target);
                self.run_initiator(job.job_name(), job).await?
            }
            Operation::Initialize(target) => {
                let job = InitializePluginJob::new(env, target);
                self.run_initiator(job.job_name(), job).await?
            }
            Operation::Available(target) => {
                let job = AvailablePluginJob::new(env, target);
                self.run_initiator(job.job_name(), job).await?
            }
            Operation::Dependencies(target) => {
                let job = PluginDependenciesJob::new(env, target);
                self.run_initiator(job.job_name(), job).await?
            }
            Operation::SiteActivate(target) => {
                let job = SiteActivationJob::activate(env, target);
                self.run_initiator(job.job_name(), job).await?
            }
            Operation::SiteDeactivate(target) => {
                let job = SiteActivationJob::deactivate(env, target);
                self.run_initiator(job.job_name(), job).await?
            }
            Operation::SiteCreateEdit(site) => {
                let job = CreateEditSiteJob::new(env, site);
                self.run_initiator(job.job_name(), job).await?
            }
        };

        if outcome.is_success() {
            info!("作业 {} 完成", outcome.name);
        } else {
            error!(
                "作业 {} 失败，进度 {}%: {:?}",
                outcome.name, outcome.progress, outcome.error
            );
        }
        Ok(outcome)
    }

    async fn run_initiator<W: ClusterWorkflow>(&self, name: String, workflow: W) -> Result<JobOutcome> {
        let job = JobBuilder::new(name)
            .recorder(self.env.recorder.clone())
            .build_cluster(workflow)?;
        Ok(job.run().await)
    }
}

/// 周期性刷新进程注册信息
async fn run_heartbeat_loop(
    registry: Arc<dyn ProcessRegistry>,
    mut info: ProcessInfo,
    interval: Duration,
    mut stop_rx: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    // 第一次 tick 立即返回，注册已经在启动时完成
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                info.last_heartbeat = chrono::Utc::now();
                match registry.register(&info).await {
                    Ok(()) => debug!("进程 {} 心跳已刷新", info.id),
                    Err(e) => warn!("刷新进程 {} 心跳失败: {}", info.id, e),
                }
            }
            _ = stop_rx.recv() => {
                debug!("心跳任务收到停止信号");
                break;
            }
        }
    }
}
