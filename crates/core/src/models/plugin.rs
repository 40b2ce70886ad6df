use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// 插件或主题的单个设置项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginSetting {
    pub name: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainModule {
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThemeBlock {
    #[serde(default)]
    pub settings: Option<Vec<PluginSetting>>,
}

/// 插件详情文件（details file）的内容
///
/// 只读输入；未识别的字段保留在 `extra` 中，以便安装记录保存完整副本。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDetails {
    pub uid: String,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    pub main_module: MainModule,
    #[serde(default)]
    pub settings: Vec<PluginSetting>,
    #[serde(default)]
    pub theme: Option<ThemeBlock>,
    /// 依赖包名 -> 版本要求
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PluginDetails {
    /// 主题设置块；空块视同不存在
    pub fn theme_settings(&self) -> Option<&Vec<PluginSetting>> {
        self.theme.as_ref().and_then(|t| t.settings.as_ref())
    }
}

/// 传给上下文感知钩子的参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookContext {
    pub site: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_details_keep_unknown_fields() {
        let details: PluginDetails = serde_json::from_value(json!({
            "uid": "sample-plugin",
            "name": "Sample Plugin",
            "main_module": {"path": "sample.js"},
            "author": {"name": "someone"},
            "dependencies": {"left-pad": "1.0.0"}
        }))
        .unwrap();

        assert_eq!(details.uid, "sample-plugin");
        assert!(details.theme_settings().is_none());
        assert!(details.settings.is_empty());
        assert_eq!(details.dependencies.get("left-pad").unwrap(), "1.0.0");
        assert!(details.extra.contains_key("author"));

        let round = serde_json::to_value(&details).unwrap();
        assert_eq!(round["author"]["name"], "someone");
    }

    #[test]
    fn test_theme_settings_block() {
        let details: PluginDetails = serde_json::from_value(json!({
            "uid": "theme",
            "name": "Theme",
            "main_module": {"path": "theme.js"},
            "theme": {"settings": [{"name": "color", "value": "blue"}]}
        }))
        .unwrap();

        let settings = details.theme_settings().unwrap();
        assert_eq!(settings.len(), 1);
        assert_eq!(settings[0].name, "color");
    }
}
