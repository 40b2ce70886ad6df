use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

/// 本进程中已激活的插件
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivePlugin {
    pub uid: String,
    pub name: String,
    pub version: Option<String>,
    pub site: String,
    pub activated_at: DateTime<Utc>,
}

/// 进程内插件运行时
///
/// 只记录本进程的激活状态；集群范围的变化通过初始化/卸载命令同步到每个进程。
#[derive(Debug, Default)]
pub struct PluginRuntime {
    active: RwLock<BTreeMap<(String, String), ActivePlugin>>,
}

impl PluginRuntime {
    pub async fn activate(&self, plugin: ActivePlugin) {
        let key = (plugin.site.clone(), plugin.uid.clone());
        self.active.write().await.insert(key, plugin);
    }

    /// 返回插件之前是否处于激活状态
    pub async fn deactivate(&self, uid: &str, site: &str) -> bool {
        self.active
            .write()
            .await
            .remove(&(site.to_string(), uid.to_string()))
            .is_some()
    }

    pub async fn is_active(&self, uid: &str, site: &str) -> bool {
        self.active
            .read()
            .await
            .contains_key(&(site.to_string(), uid.to_string()))
    }

    pub async fn active_plugins(&self) -> Vec<ActivePlugin> {
        self.active.read().await.values().cloned().collect()
    }
}
