use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    /// 插件根目录，每个插件一个子目录
    pub directory: String,
    /// 详情文件名
    pub details_file: String,
    /// 插件目录下存放依赖包的子目录
    pub dependency_dir: String,
    /// 安装缺失依赖的命令，`{name}` 与 `{version}` 会被替换
    #[serde(default)]
    pub install_command: Option<String>,
    /// 卸载当前主题插件后恢复的默认主题
    pub default_theme: String,
    pub multisite_enabled: bool,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            directory: "plugins".to_string(),
            details_file: "details.json".to_string(),
            dependency_dir: "node_modules".to_string(),
            install_command: None,
            default_theme: "default-theme".to_string(),
            multisite_enabled: false,
        }
    }
}

impl PluginsConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.directory.is_empty() {
            return Err(anyhow::anyhow!("插件目录不能为空"));
        }

        if self.details_file.is_empty() {
            return Err(anyhow::anyhow!("详情文件名不能为空"));
        }

        if self.default_theme.is_empty() {
            return Err(anyhow::anyhow!("默认主题不能为空"));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// 是否把作业运行记录写入文档存储
    pub persist_runs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
    pub metrics_enabled: bool,
    pub metrics_bind: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_bind: "0.0.0.0:9100".to_string(),
        }
    }
}

impl ObservabilityConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(anyhow::anyhow!(
                "无效的日志级别: {}，支持的级别: {:?}",
                self.log_level,
                valid_levels
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.as_str()) {
            return Err(anyhow::anyhow!(
                "无效的日志格式: {}，支持的格式: {:?}",
                self.log_format,
                valid_formats
            ));
        }

        if self.metrics_enabled && self.metrics_bind.parse::<std::net::SocketAddr>().is_err() {
            return Err(anyhow::anyhow!("无效的指标监听地址: {}", self.metrics_bind));
        }

        Ok(())
    }
}
