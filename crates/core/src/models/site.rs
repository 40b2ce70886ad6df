use serde::{Deserialize, Serialize};

/// 站点描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteDescriptor {
    pub uid: String,
    pub display_name: String,
    pub hostname: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub default_locale: Option<String>,
}

impl SiteDescriptor {
    pub fn new(uid: &str, display_name: &str, hostname: &str) -> Self {
        Self {
            uid: uid.to_string(),
            display_name: display_name.to_string(),
            hostname: hostname.to_string(),
            active: false,
            default_locale: None,
        }
    }
}
