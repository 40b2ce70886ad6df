mod common;

use coordinator_core::{models::SiteDescriptor, CoordinatorError};
use coordinator_jobs::sites::{CreateEditSiteJob, SiteActivationJob, SiteRecords, SiteTarget};

use common::{run_initiator, TestCluster};

async fn create_site(
    env: &coordinator_jobs::JobEnvironment,
    site: SiteDescriptor,
) -> coordinator_jobs::JobOutcome {
    let job = CreateEditSiteJob::new(env.clone(), site);
    run_initiator(job.job_name(), job).await
}

#[tokio::test]
async fn test_create_site_refreshes_every_process() {
    let cluster = TestCluster::new(&["node-a", "node-b"]);
    let env = cluster.node("node-a", vec![]).await;
    let node_b = cluster.node("node-b", vec![]).await;

    let outcome = create_site(&env, SiteDescriptor::new("s1", "Site One", "one.example.com")).await;
    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert_eq!(outcome.results[0]["created"], true);

    let stored = SiteRecords::new(cluster.store()).get("s1").await.unwrap().unwrap();
    assert_eq!(stored.hostname, "one.example.com");
    assert!(!stored.active);
    for node in [&env, &node_b] {
        let site = node.sites.get("s1").await.expect("site refreshed");
        assert_eq!(site.display_name, "Site One");
    }
}

#[tokio::test]
async fn test_create_site_generates_uid_when_missing() {
    let cluster = TestCluster::new(&["node-a"]);
    let env = cluster.node("node-a", vec![]).await;

    let job = CreateEditSiteJob::new(env.clone(), SiteDescriptor::new("", "Fresh", "fresh.example.com"));
    let uid = job.site().uid.clone();
    assert!(!uid.is_empty());

    let outcome = run_initiator(job.job_name(), job).await;
    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert!(env.sites.get(&uid).await.is_some());
}

#[tokio::test]
async fn test_create_site_validation() {
    let cluster = TestCluster::new(&["node-a"]);
    let env = cluster.node("node-a", vec![]).await;

    let outcome = create_site(&env, SiteDescriptor::new("s1", " ", "one.example.com")).await;
    assert_eq!(
        outcome.error,
        Some(CoordinatorError::MissingArgument("display_name".to_string()))
    );

    let outcome = create_site(&env, SiteDescriptor::new("s1", "Site One", "")).await;
    assert_eq!(
        outcome.error,
        Some(CoordinatorError::MissingArgument("hostname".to_string()))
    );
    assert_eq!(cluster.write_count(), 0);

    assert!(create_site(&env, SiteDescriptor::new("s1", "Site One", "one.example.com"))
        .await
        .is_success());
    let outcome = create_site(&env, SiteDescriptor::new("s2", "Copy", "ONE.example.com")).await;
    assert!(matches!(outcome.error, Some(CoordinatorError::Precondition(_))));
    assert!(env.sites.get("s2").await.is_none());
}

#[tokio::test]
async fn test_activate_then_deactivate_site() {
    let cluster = TestCluster::new(&["node-a", "node-b"]);
    let env = cluster.node("node-a", vec![]).await;
    let node_b = cluster.node("node-b", vec![]).await;
    assert!(create_site(&env, SiteDescriptor::new("s1", "Site One", "one.example.com"))
        .await
        .is_success());

    let target = SiteTarget::new("s1").unwrap();
    let activate = SiteActivationJob::activate(env.clone(), target.clone());
    assert_eq!(activate.job_name(), "ACTIVATE_SITE_s1");
    let outcome = run_initiator(activate.job_name(), activate).await;
    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert_eq!(outcome.progress, 100.0);

    let records = SiteRecords::new(cluster.store());
    assert!(records.get("s1").await.unwrap().unwrap().active);
    assert!(env.sites.is_active("s1").await);
    assert!(node_b.sites.is_active("s1").await);

    // 编辑保留激活状态
    let outcome = create_site(&env, SiteDescriptor::new("s1", "Renamed", "one.example.com")).await;
    assert!(outcome.is_success(), "{:?}", outcome.error);
    let stored = records.get("s1").await.unwrap().unwrap();
    assert_eq!(stored.display_name, "Renamed");
    assert!(stored.active);
    assert!(node_b.sites.is_active("s1").await);

    let deactivate = SiteActivationJob::deactivate(env.clone(), target);
    let outcome = run_initiator(deactivate.job_name(), deactivate).await;
    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert!(!records.get("s1").await.unwrap().unwrap().active);
    assert!(!env.sites.is_active("s1").await);
    assert!(!node_b.sites.is_active("s1").await);
}

#[tokio::test]
async fn test_activate_unknown_site_fails_before_dispatch() {
    let cluster = TestCluster::new(&["node-a"]);
    let env = cluster.node("node-a", vec![]).await;
    let published = cluster.broker.published_count();

    let activate = SiteActivationJob::activate(env.clone(), SiteTarget::new("missing").unwrap());
    let outcome = run_initiator(activate.job_name(), activate).await;

    assert!(matches!(outcome.error, Some(CoordinatorError::Precondition(_))));
    assert_eq!(cluster.broker.published_count(), published);
    assert!(SiteTarget::new("").is_err());
}
