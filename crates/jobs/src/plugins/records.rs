//! 插件相关文档的读写
//!
//! 安装记录、插件设置、主题设置和站点的当前主题设置都保存在通用文档存储中，
//! 按 (类型, 插件uid, 站点) 定位。

use std::sync::Arc;

use coordinator_core::{
    models::{object_types, Document, DocumentKey, PluginDetails, PluginSetting},
    traits::DocumentStore,
    CoordinatorError, CoordinatorResult,
};
use serde_json::{json, Value};
use tracing::debug;

use super::PluginTarget;

/// 站点当前主题的设置键
pub const ACTIVE_THEME_KEY: &str = "active_theme";

#[derive(Clone)]
pub struct PluginRecords {
    store: Arc<dyn DocumentStore>,
}

impl PluginRecords {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn key(object_type: &str, target: &PluginTarget) -> DocumentKey {
        DocumentKey::new(object_type, &target.plugin_uid, &target.site)
    }

    pub async fn find_installed(&self, target: &PluginTarget) -> CoordinatorResult<Option<Document>> {
        self.store
            .get(&Self::key(object_types::PLUGIN, target))
            .await
    }

    pub async fn is_installed(&self, target: &PluginTarget) -> CoordinatorResult<bool> {
        Ok(self.find_installed(target).await?.is_some())
    }

    /// 写入安装记录：详情的完整副本加上目录名、类型和站点标记
    pub async fn save_install_record(
        &self,
        target: &PluginTarget,
        details: &PluginDetails,
    ) -> CoordinatorResult<Document> {
        let mut body = serde_json::to_value(details)?;
        if let Value::Object(map) = &mut body {
            map.insert("dirName".to_string(), json!(target.plugin_uid));
            map.insert("object_type".to_string(), json!(object_types::PLUGIN));
            map.insert("site".to_string(), json!(target.site));
        }

        let document = Document::new(object_types::PLUGIN, &target.plugin_uid, &target.site, body);
        self.store.save(document).await
    }

    /// 删除旧的插件设置后按详情中的默认值重新写入
    ///
    /// 插件必须已有安装记录。
    pub async fn reset_settings(
        &self,
        target: &PluginTarget,
        settings: &[PluginSetting],
    ) -> CoordinatorResult<Document> {
        self.reset(object_types::PLUGIN_SETTINGS, target, settings)
            .await
    }

    /// 主题设置的重置；`None` 表示插件没有主题设置块，直接成功
    pub async fn reset_theme_settings(
        &self,
        target: &PluginTarget,
        settings: Option<&[PluginSetting]>,
    ) -> CoordinatorResult<Option<Document>> {
        match settings {
            Some(settings) => Ok(Some(
                self.reset(object_types::THEME_SETTINGS, target, settings)
                    .await?,
            )),
            None => {
                debug!("Plugin {} has no theme settings, skipping reset", target.plugin_uid);
                Ok(None)
            }
        }
    }

    async fn reset(
        &self,
        object_type: &str,
        target: &PluginTarget,
        settings: &[PluginSetting],
    ) -> CoordinatorResult<Document> {
        let record = self
            .find_installed(target)
            .await?
            .ok_or_else(|| CoordinatorError::NotInstalled {
                plugin: target.plugin_uid.clone(),
            })?;

        let key = Self::key(object_type, target);
        self.store.purge(&key).await?;

        let body = json!({
            "plugin_name": record.get_str("name").unwrap_or(&target.plugin_uid),
            "plugin_uid": target.plugin_uid,
            "plugin_id": record.id,
            "settings": settings,
            "site": target.site,
        });
        self.store
            .save(Document::new(object_type, &target.plugin_uid, &target.site, body))
            .await
    }

    pub async fn purge_settings(&self, target: &PluginTarget) -> CoordinatorResult<u64> {
        self.store
            .purge(&Self::key(object_types::PLUGIN_SETTINGS, target))
            .await
    }

    pub async fn purge_theme_settings(&self, target: &PluginTarget) -> CoordinatorResult<u64> {
        self.store
            .purge(&Self::key(object_types::THEME_SETTINGS, target))
            .await
    }

    pub async fn delete_record(&self, target: &PluginTarget) -> CoordinatorResult<u64> {
        self.store
            .purge(&Self::key(object_types::PLUGIN, target))
            .await
    }

    pub async fn active_theme(&self, site: &str) -> CoordinatorResult<Option<String>> {
        let doc = self
            .store
            .get(&DocumentKey::new(object_types::SETTING, ACTIVE_THEME_KEY, site))
            .await?;
        Ok(doc.and_then(|d| d.get_str("value").map(str::to_string)))
    }

    /// 当前主题指向该插件时恢复为默认主题，返回是否发生了重置
    pub async fn reset_active_theme(
        &self,
        target: &PluginTarget,
        default_theme: &str,
    ) -> CoordinatorResult<bool> {
        if self.active_theme(&target.site).await?.as_deref() != Some(target.plugin_uid.as_str()) {
            return Ok(false);
        }

        self.store
            .save(Document::new(
                object_types::SETTING,
                ACTIVE_THEME_KEY,
                &target.site,
                json!({ "value": default_theme }),
            ))
            .await?;
        Ok(true)
    }
}
