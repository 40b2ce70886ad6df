use std::sync::Arc;

use coordinator::app::{Application, Operation};
use coordinator_core::{
    models::{object_types, DocumentKey, DocumentQuery, SiteDescriptor, GLOBAL_SITE},
    traits::{CommandTransport, DocumentStore, PluginPackages, ProcessRegistry},
    AppConfig, CoordinatorError,
};
use coordinator_infrastructure::{
    FileSystemPluginPackages, InMemoryCommandBroker, InMemoryDocumentStore, StaticProcessRegistry,
    StoragePollingCommandBroker,
};
use coordinator_jobs::{plugins::PluginTarget, sites::SiteTarget, JobStatus};
use serde_json::json;
use tempfile::TempDir;

/// 共享传输、注册表和存储的多进程集群
struct Cluster {
    transport: Arc<dyn CommandTransport>,
    registry: Arc<StaticProcessRegistry>,
    store: Arc<InMemoryDocumentStore>,
    plugins: TempDir,
}

impl Cluster {
    fn new() -> Self {
        Self::with_transport(Arc::new(InMemoryCommandBroker::default()))
    }

    fn with_transport(transport: Arc<dyn CommandTransport>) -> Self {
        Self {
            transport,
            registry: Arc::new(StaticProcessRegistry::default()),
            store: Arc::new(InMemoryDocumentStore::new()),
            plugins: tempfile::tempdir().unwrap(),
        }
    }

    fn config(&self, process_id: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.node.process_id = process_id.to_string();
        config.command.timeout_seconds = 2;
        config.plugins.directory = self.plugins.path().to_string_lossy().to_string();
        config.jobs.persist_runs = true;
        config
    }

    fn write_plugin(&self, uid: &str) {
        let dir = self.plugins.path().join(uid);
        std::fs::create_dir_all(&dir).unwrap();
        let details = json!({
            "uid": uid,
            "name": format!("Plugin {uid}"),
            "main_module": {"path": "index.js"},
            "settings": []
        });
        std::fs::write(dir.join("details.json"), details.to_string()).unwrap();
        // 主模块文件存在即可加载，不提供钩子
        std::fs::write(dir.join("index.js"), "module.exports = {};").unwrap();
    }

    async fn process(&self, process_id: &str) -> Application {
        let config = self.config(process_id);
        let packages: Arc<dyn PluginPackages> =
            Arc::new(FileSystemPluginPackages::new(&config.plugins));
        let app = Application::from_parts(
            config,
            self.store.clone() as Arc<dyn DocumentStore>,
            self.transport.clone(),
            self.registry.clone() as Arc<dyn ProcessRegistry>,
            packages,
        )
        .await
        .unwrap();
        app.start().await.unwrap();
        app
    }
}

#[tokio::test]
async fn test_install_and_uninstall_across_processes() {
    let cluster = Cluster::new();
    cluster.write_plugin("sample-plugin");
    let a = cluster.process("node-a").await;
    let b = cluster.process("node-b").await;
    let c = cluster.process("node-c").await;

    let target = PluginTarget::new("sample-plugin", None).unwrap();
    let outcome = a.execute(Operation::Install(target.clone())).await.unwrap();
    assert_eq!(outcome.status, JobStatus::Completed, "{:?}", outcome.error);
    assert_eq!(outcome.progress, 100.0);

    for node in [&a, &b, &c] {
        assert!(
            node.environment()
                .plugins
                .is_active("sample-plugin", GLOBAL_SITE)
                .await,
            "{} did not initialize the plugin",
            node.process_id()
        );
    }

    // 初始化命令在每个进程上各运行一次工作者作业
    let runs = cluster
        .store
        .find(&DocumentQuery::of_type(object_types::JOB_RUN))
        .await
        .unwrap();
    let worker_runs = runs
        .iter()
        .filter(|d| d.get_str("name") == Some("INITIALIZE_PLUGIN_sample-plugin"))
        .filter(|d| d.get_str("role") == Some("worker"))
        .count();
    assert_eq!(worker_runs, 3);

    let outcome = b.execute(Operation::Uninstall(target)).await.unwrap();
    assert!(outcome.is_success(), "{:?}", outcome.error);
    for node in [&a, &b, &c] {
        assert!(
            !node
                .environment()
                .plugins
                .is_active("sample-plugin", GLOBAL_SITE)
                .await
        );
    }
    assert!(cluster
        .store
        .get(&DocumentKey::global(object_types::PLUGIN, "sample-plugin"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_stopped_process_is_no_longer_addressed() {
    let cluster = Cluster::new();
    cluster.write_plugin("sample-plugin");
    let a = cluster.process("node-a").await;
    let b = cluster.process("node-b").await;

    b.stop().await;
    let outcome = a
        .execute(Operation::Available(
            PluginTarget::new("sample-plugin", None).unwrap(),
        ))
        .await
        .unwrap();
    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert_eq!(outcome.results[0]["responders"], json!(["node-a"]));
}

#[tokio::test]
async fn test_registered_but_silent_process_times_out() {
    let cluster = Cluster::new();
    cluster.write_plugin("sample-plugin");
    let a = cluster.process("node-a").await;
    cluster
        .registry
        .register(&coordinator_core::models::ProcessInfo::current("ghost", "nowhere"))
        .await
        .unwrap();

    let outcome = a
        .execute(Operation::Install(
            PluginTarget::new("sample-plugin", None).unwrap(),
        ))
        .await
        .unwrap();
    assert_eq!(outcome.status, JobStatus::Failed);
    assert!(matches!(
        outcome.error,
        Some(CoordinatorError::CommandTimeout { ref missing, .. }) if missing == &vec!["ghost".to_string()]
    ));
}

#[tokio::test]
async fn test_site_lifecycle_over_storage_polling_transport() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let transport = Arc::new(StoragePollingCommandBroker::new(
        store.clone(),
        std::time::Duration::from_millis(20),
        std::time::Duration::from_secs(60),
    ));
    let mut cluster = Cluster::with_transport(transport);
    cluster.store = store;
    let a = cluster.process("node-a").await;
    let b = cluster.process("node-b").await;

    let outcome = a
        .execute(Operation::SiteCreateEdit(SiteDescriptor::new(
            "s1",
            "Site One",
            "one.example.com",
        )))
        .await
        .unwrap();
    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert!(b.environment().sites.get("s1").await.is_some());

    let outcome = b
        .execute(Operation::SiteActivate(SiteTarget::new("s1").unwrap()))
        .await
        .unwrap();
    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert!(a.environment().sites.is_active("s1").await);
    assert!(b.environment().sites.is_active("s1").await);

    a.stop().await;
    b.stop().await;
}
