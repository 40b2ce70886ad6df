use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 全局站点标识，单站点部署时所有文档都属于它
pub const GLOBAL_SITE: &str = "global";

/// 文档类型鉴别字段的取值
pub mod object_types {
    pub const PLUGIN: &str = "plugin";
    pub const PLUGIN_SETTINGS: &str = "plugin_settings";
    pub const THEME_SETTINGS: &str = "theme_settings";
    pub const SETTING: &str = "setting";
    pub const SITE: &str = "site";
    pub const JOB_RUN: &str = "job_run";
    pub const SERVER_REGISTRATION: &str = "server_registration";
    pub const COMMAND_ENVELOPE: &str = "command_envelope";
}

/// 文档定位键：类型 + 业务键 + 站点
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentKey {
    pub object_type: String,
    pub key: String,
    pub site: String,
}

impl DocumentKey {
    pub fn new(object_type: &str, key: &str, site: &str) -> Self {
        Self {
            object_type: object_type.to_string(),
            key: key.to_string(),
            site: site.to_string(),
        }
    }

    pub fn global(object_type: &str, key: &str) -> Self {
        Self::new(object_type, key, GLOBAL_SITE)
    }
}

/// 通用文档
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub object_type: String,
    pub key: String,
    pub site: String,
    pub body: serde_json::Value,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl Document {
    pub fn new(object_type: &str, key: &str, site: &str, body: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            object_type: object_type.to_string(),
            key: key.to_string(),
            site: site.to_string(),
            body,
            created: now,
            last_modified: now,
        }
    }

    pub fn document_key(&self) -> DocumentKey {
        DocumentKey::new(&self.object_type, &self.key, &self.site)
    }

    /// 读取 body 中的字符串字段
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.body.get(field).and_then(|v| v.as_str())
    }

    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.body.get(field).and_then(|v| v.as_bool())
    }
}

/// 按类型扫描文档的查询条件
#[derive(Debug, Clone, Default)]
pub struct DocumentQuery {
    pub object_type: String,
    pub site: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
}

impl DocumentQuery {
    pub fn of_type(object_type: &str) -> Self {
        Self {
            object_type: object_type.to_string(),
            ..Self::default()
        }
    }

    pub fn site(mut self, site: &str) -> Self {
        self.site = Some(site.to_string());
        self
    }

    pub fn created_after(mut self, instant: DateTime<Utc>) -> Self {
        self.created_after = Some(instant);
        self
    }

    pub fn matches(&self, document: &Document) -> bool {
        if document.object_type != self.object_type {
            return false;
        }
        if let Some(site) = &self.site {
            if &document.site != site {
                return false;
            }
        }
        if let Some(after) = self.created_after {
            if document.created <= after {
                return false;
            }
        }
        true
    }
}

/// 规范化站点标识：空值归入全局站点
pub fn normalize_site(site: Option<&str>) -> String {
    match site {
        Some(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => GLOBAL_SITE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_site() {
        assert_eq!(normalize_site(None), GLOBAL_SITE);
        assert_eq!(normalize_site(Some("  ")), GLOBAL_SITE);
        assert_eq!(normalize_site(Some("site-a")), "site-a");
    }

    #[test]
    fn test_query_matching() {
        let doc = Document::new(object_types::PLUGIN, "sample", "site-a", json!({"uid": "sample"}));

        assert!(DocumentQuery::of_type(object_types::PLUGIN).matches(&doc));
        assert!(DocumentQuery::of_type(object_types::PLUGIN)
            .site("site-a")
            .matches(&doc));
        assert!(!DocumentQuery::of_type(object_types::PLUGIN)
            .site(GLOBAL_SITE)
            .matches(&doc));
        assert!(!DocumentQuery::of_type(object_types::SITE).matches(&doc));
        assert!(!DocumentQuery::of_type(object_types::PLUGIN)
            .created_after(doc.created)
            .matches(&doc));
        assert_eq!(doc.get_str("uid"), Some("sample"));
    }
}
