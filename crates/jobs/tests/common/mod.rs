#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use coordinator_command::CommandService;
use coordinator_core::{
    config::{CommandConfig, PluginsConfig},
    models::{Document, DocumentKey, DocumentQuery, HookContext},
    traits::{CommandTransport, DocumentStore, HookKind, PluginModule, PluginPackages, ProcessRegistry},
    CoordinatorError, CoordinatorResult,
};
use coordinator_infrastructure::{
    FileSystemPluginPackages, InMemoryCommandBroker, InMemoryDocumentStore, StaticProcessRegistry,
};
use coordinator_jobs::{register_worker_handlers, ClusterWorkflow, JobBuilder, JobEnvironment, JobOutcome};
use serde_json::Value;
use tempfile::TempDir;

/// 集群中所有参与者共享的事件日志
pub type Events = Arc<Mutex<Vec<String>>>;

/// 记录每次写操作的文档存储
pub struct RecordingStore {
    inner: InMemoryDocumentStore,
    events: Events,
}

#[async_trait]
impl DocumentStore for RecordingStore {
    async fn save(&self, document: Document) -> CoordinatorResult<Document> {
        self.events
            .lock()
            .unwrap()
            .push(format!("save:{}", document.object_type));
        // 让出执行权，暴露任何依赖完成顺序的问题
        tokio::task::yield_now().await;
        self.inner.save(document).await
    }

    async fn get(&self, key: &DocumentKey) -> CoordinatorResult<Option<Document>> {
        self.inner.get(key).await
    }

    async fn purge(&self, key: &DocumentKey) -> CoordinatorResult<u64> {
        self.events
            .lock()
            .unwrap()
            .push(format!("purge:{}", key.object_type));
        tokio::task::yield_now().await;
        self.inner.purge(key).await
    }

    async fn find(&self, query: &DocumentQuery) -> CoordinatorResult<Vec<Document>> {
        self.inner.find(query).await
    }
}

/// 按脚本响应钩子的插件模块
pub struct ScriptedModule {
    pub hooks: Vec<HookKind>,
    pub fail_install: bool,
    events: Events,
}

impl ScriptedModule {
    pub fn new(events: &Events, hooks: Vec<HookKind>) -> Self {
        Self {
            hooks,
            fail_install: false,
            events: events.clone(),
        }
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl PluginModule for ScriptedModule {
    fn provides(&self, hook: HookKind) -> bool {
        self.hooks.contains(&hook)
    }

    async fn on_install(&self) -> CoordinatorResult<()> {
        self.push("hook:install".to_string());
        if self.fail_install {
            return Err(CoordinatorError::Internal("install script crashed".to_string()));
        }
        Ok(())
    }

    async fn on_install_with_context(&self, context: &HookContext) -> CoordinatorResult<()> {
        self.push(format!("hook:install@{}", context.site));
        Ok(())
    }

    async fn on_uninstall(&self) -> CoordinatorResult<()> {
        self.push("hook:uninstall".to_string());
        Ok(())
    }

    async fn on_startup(&self) -> CoordinatorResult<()> {
        self.push("hook:startup".to_string());
        Ok(())
    }

    async fn on_startup_with_context(&self, context: &HookContext) -> CoordinatorResult<()> {
        self.push(format!("hook:startup@{}", context.site));
        Ok(())
    }
}

/// 共享一个内存代理、一个静态注册表和一个文档存储的模拟集群
pub struct TestCluster {
    pub broker: Arc<InMemoryCommandBroker>,
    pub registry: Arc<StaticProcessRegistry>,
    pub inner_store: Arc<RecordingStore>,
    pub events: Events,
    pub plugin_dir: TempDir,
    pub command: CommandConfig,
    pub multisite: bool,
}

impl TestCluster {
    pub fn new(members: &[&str]) -> Self {
        let events: Events = Arc::new(Mutex::new(Vec::new()));
        Self {
            broker: Arc::new(InMemoryCommandBroker::default()),
            registry: Arc::new(StaticProcessRegistry::new(members.iter().copied())),
            inner_store: Arc::new(RecordingStore {
                inner: InMemoryDocumentStore::new(),
                events: events.clone(),
            }),
            events,
            plugin_dir: tempfile::tempdir().unwrap(),
            command: CommandConfig {
                timeout_seconds: 1,
                registry_refresh_ms: 50,
                ..CommandConfig::default()
            },
            multisite: false,
        }
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        self.inner_store.clone()
    }

    pub fn write_count(&self) -> u64 {
        self.inner_store.inner.write_count()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn settings(&self) -> PluginsConfig {
        PluginsConfig {
            directory: self.plugin_dir.path().to_string_lossy().to_string(),
            install_command: Some("mkdir -p node_modules/{name}".to_string()),
            multisite_enabled: self.multisite,
            ..PluginsConfig::default()
        }
    }

    /// 在插件目录下写入详情文件
    pub fn write_plugin(&self, details: Value) {
        let uid = details["uid"].as_str().unwrap().to_string();
        let dir = self.plugin_dir.path().join(&uid);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("details.json"), details.to_string()).unwrap();
    }

    /// 不提供任何钩子的主模块
    pub fn bare_module(&self) -> Arc<dyn PluginModule> {
        Arc::new(ScriptedModule::new(&self.events, Vec::new()))
    }

    pub fn plugin_path(&self, uid: &str) -> std::path::PathBuf {
        self.plugin_dir.path().join(uid)
    }

    /// 启动一个处理所有工作者命令的节点
    pub async fn node(
        &self,
        id: &str,
        modules: Vec<(&str, Arc<dyn PluginModule>)>,
    ) -> JobEnvironment {
        let settings = self.settings();
        let packages = modules
            .into_iter()
            .fold(FileSystemPluginPackages::new(&settings), |p, (uid, module)| {
                p.with_module(uid, module)
            });

        let commands = CommandService::new(
            id,
            self.broker.clone() as Arc<dyn CommandTransport>,
            self.registry.clone() as Arc<dyn ProcessRegistry>,
            self.command.clone(),
        );
        let env = JobEnvironment::new(
            commands.clone(),
            self.store(),
            Arc::new(packages) as Arc<dyn PluginPackages>,
            settings,
        );
        register_worker_handlers(&commands, &env).await;
        commands.start().await.unwrap();
        env
    }
}

pub fn sample_details(uid: &str) -> Value {
    serde_json::json!({
        "uid": uid,
        "name": "Sample Plugin",
        "version": "1.0.0",
        "main_module": {"path": "index.js"},
        "settings": [{"name": "greeting", "value": "hello"}]
    })
}

/// 以发起者角色运行一个集群作业
pub async fn run_initiator<W: ClusterWorkflow>(name: String, workflow: W) -> JobOutcome {
    JobBuilder::new(name)
        .build_cluster(workflow)
        .unwrap()
        .run()
        .await
}

/// 事件在日志中第一次出现的位置
pub fn position(events: &[String], event: &str) -> usize {
    events
        .iter()
        .position(|e| e == event)
        .unwrap_or_else(|| panic!("event {event} not found in {events:?}"))
}
