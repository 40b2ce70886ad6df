use coordinator_core::{
    config::PluginsConfig,
    models::{normalize_site, HookContext, GLOBAL_SITE},
    CoordinatorError, CoordinatorResult,
};
use serde::{Deserialize, Serialize};

/// 插件作业的目标：插件 uid 与站点
///
/// 同时作为插件命令的负载在进程间传递。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginTarget {
    pub plugin_uid: String,
    pub site: String,
}

impl PluginTarget {
    pub fn new(plugin_uid: &str, site: Option<&str>) -> CoordinatorResult<Self> {
        let plugin_uid = plugin_uid.trim();
        if plugin_uid.is_empty() {
            return Err(CoordinatorError::MissingArgument("plugin_uid".to_string()));
        }
        Ok(Self {
            plugin_uid: plugin_uid.to_string(),
            site: normalize_site(site),
        })
    }

    pub fn from_payload(payload: &serde_json::Value) -> CoordinatorResult<Self> {
        let target: PluginTarget = serde_json::from_value(payload.clone())
            .map_err(|e| CoordinatorError::InvalidArgument(format!("插件命令负载无效: {e}")))?;
        Self::new(&target.plugin_uid, Some(&target.site))
    }

    /// 未启用多站点时所有插件都属于全局站点
    pub fn scoped(mut self, settings: &PluginsConfig) -> Self {
        if !settings.multisite_enabled {
            self.site = GLOBAL_SITE.to_string();
        }
        self
    }

    pub fn payload(&self) -> serde_json::Value {
        serde_json::json!({
            "plugin_uid": self.plugin_uid,
            "site": self.site,
        })
    }

    /// `<OPERATION>_<uid>` 形式的作业名称
    pub fn job_name(&self, operation: &str) -> String {
        format!("{}_{}", operation, self.plugin_uid)
    }

    pub fn hook_context(&self) -> HookContext {
        HookContext {
            site: self.site.clone(),
        }
    }
}
