mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coordinator_command::CommandHandler;
use coordinator_core::{
    models::{object_types, Command, Document, DocumentKey, GLOBAL_SITE},
    traits::{HookKind, PluginModule},
    CoordinatorError, CoordinatorResult,
};
use coordinator_jobs::{
    plugins::{
        records::ACTIVE_THEME_KEY, AvailablePluginJob, InstallPluginJob, PluginDependenciesJob,
        PluginRecords, PluginTarget, UninstallPluginJob,
    },
    JobBuilder, JobEnvironment, JobOutcome, JobRole, JobStatus,
};
use serde_json::json;

use common::{position, run_initiator, sample_details, ScriptedModule, TestCluster};

const UID: &str = "sample-plugin";

fn install_hook_module(cluster: &TestCluster) -> Arc<dyn PluginModule> {
    Arc::new(ScriptedModule::new(
        &cluster.events,
        vec![HookKind::Install, HookKind::Uninstall],
    ))
}

async fn install(env: &JobEnvironment, site: Option<&str>) -> JobOutcome {
    let workflow = InstallPluginJob::new(env.clone(), PluginTarget::new(UID, site).unwrap());
    run_initiator(workflow.job_name(), workflow).await
}

#[tokio::test]
async fn test_install_sample_plugin_on_single_process() {
    let cluster = TestCluster::new(&["node-a"]);
    cluster.write_plugin(sample_details(UID));
    let env = cluster
        .node("node-a", vec![(UID, install_hook_module(&cluster))])
        .await;

    let outcome = install(&env, None).await;
    assert_eq!(outcome.status, JobStatus::Completed, "{:?}", outcome.error);
    assert_eq!(outcome.progress, 100.0);
    assert_eq!(outcome.name, "INSTALL_PLUGIN_sample-plugin");

    let record = cluster
        .store()
        .get(&DocumentKey::global(object_types::PLUGIN, UID))
        .await
        .unwrap()
        .expect("install record");
    assert_eq!(record.get_str("object_type"), Some("plugin"));
    assert_eq!(record.get_str("dirName"), Some(UID));

    let events = cluster.events();
    assert_eq!(events.iter().filter(|e| *e == "hook:install").count(), 1);
    assert!(!events.iter().any(|e| e.ends_with("theme_settings")));

    assert!(env.plugins.is_active(UID, GLOBAL_SITE).await);
    assert!(outcome.logs.iter().any(|l| l.contains("IS_AVAILABLE_sample-plugin")));
    assert!(outcome.logs.iter().any(|l| l.contains("INITIALIZE_PLUGIN_sample-plugin")));
}

#[tokio::test]
async fn test_install_writes_record_before_settings_before_hook() {
    let cluster = TestCluster::new(&["node-a", "node-b"]);
    let mut details = sample_details(UID);
    details["theme"] = json!({"settings": [{"name": "color", "value": "blue"}]});
    cluster.write_plugin(details);

    let env = cluster
        .node("node-a", vec![(UID, install_hook_module(&cluster))])
        .await;
    cluster
        .node("node-b", vec![(UID, install_hook_module(&cluster))])
        .await;

    let outcome = install(&env, None).await;
    assert!(outcome.is_success(), "{:?}", outcome.error);

    let events = cluster.events();
    let record = position(&events, "save:plugin");
    let purge_settings = position(&events, "purge:plugin_settings");
    let settings = position(&events, "save:plugin_settings");
    let theme = position(&events, "save:theme_settings");
    let hook = position(&events, "hook:install");
    assert!(record < purge_settings);
    assert!(purge_settings < settings);
    assert!(settings < theme);
    assert!(theme < hook);
}

#[tokio::test]
async fn test_install_already_installed_fails_without_writes() {
    let cluster = TestCluster::new(&["node-a"]);
    cluster.write_plugin(sample_details(UID));
    let env = cluster.node("node-a", vec![]).await;

    let target = PluginTarget::new(UID, None).unwrap();
    let details = serde_json::from_value(sample_details(UID)).unwrap();
    PluginRecords::new(cluster.store())
        .save_install_record(&target, &details)
        .await
        .unwrap();
    let writes = cluster.write_count();

    let outcome = install(&env, None).await;
    assert_eq!(outcome.status, JobStatus::Failed);
    let error = outcome.error.clone().unwrap();
    assert!(matches!(error, CoordinatorError::AlreadyInstalled { .. }));
    assert!(error.is_precondition());
    assert_eq!(outcome.progress, 0.0);
    assert_eq!(cluster.write_count(), writes);
}

/// 对初始化命令永远不回复
struct StallingHandler;

#[async_trait]
impl CommandHandler for StallingHandler {
    fn command_type(&self) -> &str {
        "initialize_plugin"
    }

    async fn handle(&self, _command: &Command) -> CoordinatorResult<serde_json::Value> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(json!(null))
    }
}

#[tokio::test]
async fn test_initialize_timeout_keeps_plugin_record() {
    let cluster = TestCluster::new(&["node-a", "node-b"]);
    cluster.write_plugin(sample_details(UID));
    let env = cluster.node("node-a", vec![(UID, cluster.bare_module())]).await;
    let node_b = cluster.node("node-b", vec![]).await;
    node_b.commands.register_handler(Arc::new(StallingHandler)).await;

    let outcome = install(&env, None).await;
    assert_eq!(outcome.status, JobStatus::Failed);
    match outcome.error.clone().unwrap() {
        CoordinatorError::CommandTimeout { name, missing, .. } => {
            assert_eq!(name, "INITIALIZE_PLUGIN_sample-plugin");
            assert_eq!(missing, vec!["node-b".to_string()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // 只有可用性检查的一半计入，初始化的一半尚未到达
    assert_eq!(outcome.progress, 50.0);
    let target = PluginTarget::new(UID, None).unwrap();
    assert!(PluginRecords::new(cluster.store())
        .is_installed(&target)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_install_hook_failure_does_not_roll_back() {
    let cluster = TestCluster::new(&["node-a"]);
    cluster.write_plugin(sample_details(UID));
    let mut module = ScriptedModule::new(&cluster.events, vec![HookKind::Install]);
    module.fail_install = true;
    let module: Arc<dyn PluginModule> = Arc::new(module);
    let env = cluster.node("node-a", vec![(UID, module)]).await;

    let outcome = install(&env, None).await;
    assert!(matches!(
        outcome.error,
        Some(CoordinatorError::Hook { ref plugin, .. }) if plugin == UID
    ));
    assert!(!env.plugins.is_active(UID, GLOBAL_SITE).await);
    assert!(PluginRecords::new(cluster.store())
        .is_installed(&PluginTarget::new(UID, None).unwrap())
        .await
        .unwrap());
}

#[tokio::test]
async fn test_install_fails_when_main_module_cannot_be_loaded() {
    let cluster = TestCluster::new(&["node-a"]);
    cluster.write_plugin(sample_details(UID));
    let env = cluster.node("node-a", vec![]).await;

    let outcome = install(&env, None).await;
    assert_eq!(outcome.status, JobStatus::Failed);
    match outcome.error.clone() {
        Some(CoordinatorError::PluginLoad(message)) => {
            assert!(message.contains(UID), "{message}");
            assert!(message.contains("index.js"), "{message}");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    // 初始化没有运行，记录不回滚
    assert!(!env.plugins.is_active(UID, GLOBAL_SITE).await);
    assert!(!outcome
        .logs
        .iter()
        .any(|l| l.contains("INITIALIZE_PLUGIN_sample-plugin")));
    assert!(PluginRecords::new(cluster.store())
        .is_installed(&PluginTarget::new(UID, None).unwrap())
        .await
        .unwrap());
}

#[tokio::test]
async fn test_module_without_install_hook_still_installs() {
    let cluster = TestCluster::new(&["node-a"]);
    cluster.write_plugin(sample_details(UID));
    let env = cluster.node("node-a", vec![(UID, cluster.bare_module())]).await;

    let outcome = install(&env, None).await;
    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert_eq!(outcome.results[2]["install_hook"], json!("skipped"));
    assert!(env.plugins.is_active(UID, GLOBAL_SITE).await);
}

#[tokio::test]
async fn test_context_hooks_receive_site_when_multisite() {
    let mut cluster = TestCluster::new(&["node-a"]);
    cluster.multisite = true;
    cluster.write_plugin(sample_details(UID));
    let module: Arc<dyn PluginModule> = Arc::new(ScriptedModule::new(
        &cluster.events,
        vec![
            HookKind::Install,
            HookKind::InstallWithContext,
            HookKind::Startup,
            HookKind::StartupWithContext,
        ],
    ));
    let env = cluster.node("node-a", vec![(UID, module)]).await;

    let outcome = install(&env, Some("site-a")).await;
    assert!(outcome.is_success(), "{:?}", outcome.error);

    let events = cluster.events();
    assert!(events.contains(&"hook:install@site-a".to_string()));
    assert!(events.contains(&"hook:startup@site-a".to_string()));
    assert!(!events.contains(&"hook:install".to_string()));
    assert!(env.plugins.is_active(UID, "site-a").await);
}

#[tokio::test]
async fn test_install_progress_is_monotonic() {
    let cluster = TestCluster::new(&["node-a", "node-b"]);
    cluster.write_plugin(sample_details(UID));
    let env = cluster.node("node-a", vec![(UID, cluster.bare_module())]).await;
    cluster.node("node-b", vec![]).await;

    let workflow = InstallPluginJob::new(env.clone(), PluginTarget::new(UID, None).unwrap());
    let job = JobBuilder::new(workflow.job_name())
        .build_cluster(workflow)
        .unwrap();
    let mut progress = job.subscribe_progress();
    let observer = tokio::spawn(async move {
        let mut seen = Vec::new();
        while progress.changed().await.is_ok() {
            seen.push(*progress.borrow_and_update());
        }
        seen
    });

    let outcome = job.run().await;
    assert!(outcome.is_success(), "{:?}", outcome.error);

    let seen = tokio::time::timeout(Duration::from_secs(1), observer)
        .await
        .unwrap()
        .unwrap();
    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
    assert!(seen.iter().all(|p| (0.0..=100.0).contains(p)));
    assert_eq!(seen.last().copied(), Some(100.0));
}

#[tokio::test]
async fn test_install_refuses_worker_role() {
    let cluster = TestCluster::new(&["node-a"]);
    let env = cluster.node("node-a", vec![]).await;

    let workflow = InstallPluginJob::new(env.clone(), PluginTarget::new(UID, None).unwrap());
    let outcome = JobBuilder::new(workflow.job_name())
        .run_as_initiator(false)
        .build_cluster(workflow)
        .unwrap()
        .run()
        .await;

    assert_eq!(outcome.role, JobRole::Worker);
    assert!(matches!(
        outcome.error,
        Some(CoordinatorError::InitiatorOnly { .. })
    ));
    assert_eq!(cluster.write_count(), 0);
}

#[tokio::test]
async fn test_missing_dependencies_block_install_until_installed() {
    let cluster = TestCluster::new(&["node-a", "node-b"]);
    let mut details = sample_details(UID);
    details["dependencies"] = json!({"left-pad": "1.3.0"});
    cluster.write_plugin(details);
    let env = cluster.node("node-a", vec![]).await;
    cluster.node("node-b", vec![]).await;

    let outcome = install(&env, None).await;
    match outcome.error.clone() {
        Some(CoordinatorError::CoordinationFailed { name, failures }) => {
            assert_eq!(name, "IS_AVAILABLE_sample-plugin");
            assert_eq!(failures.len(), 2);
            assert!(failures[0].contains("left-pad"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(cluster.write_count(), 0);

    let target = PluginTarget::new(UID, None).unwrap();
    let deps = PluginDependenciesJob::new(env.clone(), target.clone());
    let outcome = run_initiator(deps.job_name(), deps).await;
    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert!(cluster
        .plugin_path(UID)
        .join("node_modules")
        .join("left-pad")
        .exists());

    let available = AvailablePluginJob::new(env.clone(), target);
    let outcome = run_initiator(available.job_name(), available).await;
    assert!(outcome.is_success(), "{:?}", outcome.error);
}

#[tokio::test]
async fn test_uninstall_cleans_records_and_active_theme() {
    let cluster = TestCluster::new(&["node-a", "node-b"]);
    let mut details = sample_details(UID);
    details["theme"] = json!({"settings": [{"name": "color", "value": "blue"}]});
    cluster.write_plugin(details);
    let env = cluster
        .node("node-a", vec![(UID, install_hook_module(&cluster))])
        .await;
    let node_b = cluster
        .node("node-b", vec![(UID, install_hook_module(&cluster))])
        .await;

    assert!(install(&env, None).await.is_success());
    assert!(node_b.plugins.is_active(UID, GLOBAL_SITE).await);
    cluster
        .store()
        .save(Document::new(
            object_types::SETTING,
            ACTIVE_THEME_KEY,
            GLOBAL_SITE,
            json!({"value": UID}),
        ))
        .await
        .unwrap();

    let target = PluginTarget::new(UID, None).unwrap();
    let uninstall = UninstallPluginJob::new(env.clone(), target.clone());
    let outcome = run_initiator(uninstall.job_name(), uninstall).await;
    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert_eq!(outcome.progress, 100.0);

    let records = PluginRecords::new(cluster.store());
    assert!(!records.is_installed(&target).await.unwrap());
    for object_type in [object_types::PLUGIN_SETTINGS, object_types::THEME_SETTINGS] {
        let key = DocumentKey::global(object_type, UID);
        assert!(cluster.store().get(&key).await.unwrap().is_none());
    }
    assert_eq!(
        records.active_theme(GLOBAL_SITE).await.unwrap().as_deref(),
        Some("default-theme")
    );
    assert!(!env.plugins.is_active(UID, GLOBAL_SITE).await);
    assert!(!node_b.plugins.is_active(UID, GLOBAL_SITE).await);
    assert_eq!(
        cluster
            .events()
            .iter()
            .filter(|e| *e == "hook:uninstall")
            .count(),
        1
    );
}

#[tokio::test]
async fn test_uninstall_requires_installed_plugin() {
    let cluster = TestCluster::new(&["node-a"]);
    let env = cluster.node("node-a", vec![]).await;

    let uninstall = UninstallPluginJob::new(env.clone(), PluginTarget::new(UID, None).unwrap());
    let outcome = run_initiator(uninstall.job_name(), uninstall).await;
    assert!(matches!(
        outcome.error,
        Some(CoordinatorError::NotInstalled { .. })
    ));
    assert_eq!(cluster.write_count(), 0);
}
