use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use coordinator_core::{
    config::PluginsConfig,
    models::PluginDetails,
    traits::{HookKind, PluginModule, PluginPackages},
    CoordinatorError, CoordinatorResult,
};
use tracing::{debug, info, warn};

/// 基于文件系统的插件包
///
/// 目录结构：`<directory>/<uid>/<details_file>`，依赖安装在
/// `<directory>/<uid>/<dependency_dir>/<name>`。
/// 主模块是编译进进程的 `PluginModule` 实现，按插件 uid 注册；
/// 未注册时只要主模块文件存在就按无钩子模块加载。
pub struct FileSystemPluginPackages {
    root: PathBuf,
    details_file: String,
    dependency_dir: String,
    install_command: Option<String>,
    modules: HashMap<String, Arc<dyn PluginModule>>,
}

impl FileSystemPluginPackages {
    pub fn new(config: &PluginsConfig) -> Self {
        Self {
            root: PathBuf::from(&config.directory),
            details_file: config.details_file.clone(),
            dependency_dir: config.dependency_dir.clone(),
            install_command: config.install_command.clone(),
            modules: HashMap::new(),
        }
    }

    /// 注册插件的主模块
    pub fn with_module(mut self, plugin_uid: &str, module: Arc<dyn PluginModule>) -> Self {
        self.modules.insert(plugin_uid.to_string(), module);
        self
    }

    pub fn plugin_dir(&self, plugin_uid: &str) -> PathBuf {
        self.root.join(plugin_uid)
    }

    fn render_install_command(template: &str, name: &str, version: &str) -> String {
        template.replace("{name}", name).replace("{version}", version)
    }
}

/// 主模块文件存在但没有注册原生实现时使用，所有钩子都不提供
struct HooklessModule;

impl PluginModule for HooklessModule {
    fn provides(&self, _hook: HookKind) -> bool {
        false
    }
}

#[async_trait]
impl PluginPackages for FileSystemPluginPackages {
    fn details_path(&self, plugin_uid: &str) -> PathBuf {
        self.plugin_dir(plugin_uid).join(&self.details_file)
    }

    async fn load_details_file(&self, path: &Path) -> CoordinatorResult<PluginDetails> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            CoordinatorError::PluginLoad(format!("读取详情文件失败 {}: {e}", path.display()))
        })?;
        let details: PluginDetails = serde_json::from_str(&content).map_err(|e| {
            CoordinatorError::PluginLoad(format!("解析详情文件失败 {}: {e}", path.display()))
        })?;
        debug!("Loaded details for plugin {} from {}", details.uid, path.display());
        Ok(details)
    }

    async fn load_main_module(
        &self,
        plugin_uid: &str,
        main_module_path: &str,
    ) -> CoordinatorResult<Option<Arc<dyn PluginModule>>> {
        if let Some(module) = self.modules.get(plugin_uid) {
            return Ok(Some(module.clone()));
        }

        let path = self.plugin_dir(plugin_uid).join(main_module_path);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            warn!("Main module {} of plugin {} not found", path.display(), plugin_uid);
            return Ok(None);
        }
        debug!(
            "Plugin {} has no registered module, {} provides no hooks",
            plugin_uid,
            path.display()
        );
        Ok(Some(Arc::new(HooklessModule)))
    }

    async fn missing_dependencies(&self, details: &PluginDetails) -> CoordinatorResult<Vec<String>> {
        let dependency_root = self.plugin_dir(&details.uid).join(&self.dependency_dir);
        let mut missing = Vec::new();
        for name in details.dependencies.keys() {
            let present = tokio::fs::try_exists(dependency_root.join(name))
                .await
                .unwrap_or(false);
            if !present {
                missing.push(name.clone());
            }
        }
        Ok(missing)
    }

    async fn install_dependencies(
        &self,
        details: &PluginDetails,
        missing: &[String],
    ) -> CoordinatorResult<()> {
        if missing.is_empty() {
            return Ok(());
        }

        let template = self.install_command.as_deref().ok_or_else(|| {
            CoordinatorError::PluginLoad(format!(
                "插件 {} 缺少依赖 {:?}，且未配置安装命令",
                details.uid, missing
            ))
        })?;

        let plugin_dir = self.plugin_dir(&details.uid);
        for name in missing {
            let version = details
                .dependencies
                .get(name)
                .map(String::as_str)
                .unwrap_or("*");
            let command_line = Self::render_install_command(template, name, version);
            info!("Installing dependency {}@{} for plugin {}", name, version, details.uid);

            let status = tokio::process::Command::new("sh")
                .arg("-c")
                .arg(&command_line)
                .current_dir(&plugin_dir)
                .status()
                .await
                .map_err(|e| {
                    CoordinatorError::PluginLoad(format!("执行安装命令失败 `{command_line}`: {e}"))
                })?;

            if !status.success() {
                return Err(CoordinatorError::PluginLoad(format!(
                    "依赖 {name} 安装失败，命令 `{command_line}` 退出状态 {status}"
                )));
            }
        }
        Ok(())
    }
}
