use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    models::{HookContext, PluginDetails},
    CoordinatorResult,
};

/// 插件生命周期阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    Install,
    Uninstall,
    Startup,
}

/// 插件模块可以提供的钩子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    Install,
    InstallWithContext,
    Uninstall,
    UninstallWithContext,
    Startup,
    StartupWithContext,
}

impl HookKind {
    /// 某阶段的 (简单钩子, 上下文钩子)
    pub fn for_phase(phase: LifecyclePhase) -> (HookKind, HookKind) {
        match phase {
            LifecyclePhase::Install => (HookKind::Install, HookKind::InstallWithContext),
            LifecyclePhase::Uninstall => (HookKind::Uninstall, HookKind::UninstallWithContext),
            LifecyclePhase::Startup => (HookKind::Startup, HookKind::StartupWithContext),
        }
    }

    pub fn takes_context(&self) -> bool {
        matches!(
            self,
            HookKind::InstallWithContext
                | HookKind::UninstallWithContext
                | HookKind::StartupWithContext
        )
    }
}

/// 插件主模块的能力接口
///
/// 所有钩子都是可选的：`provides` 声明模块实现了哪些钩子，
/// 未声明的钩子不会被调用。
#[async_trait]
pub trait PluginModule: Send + Sync {
    fn provides(&self, hook: HookKind) -> bool;

    async fn on_install(&self) -> CoordinatorResult<()> {
        Ok(())
    }

    async fn on_install_with_context(&self, _context: &HookContext) -> CoordinatorResult<()> {
        Ok(())
    }

    async fn on_uninstall(&self) -> CoordinatorResult<()> {
        Ok(())
    }

    async fn on_uninstall_with_context(&self, _context: &HookContext) -> CoordinatorResult<()> {
        Ok(())
    }

    async fn on_startup(&self) -> CoordinatorResult<()> {
        Ok(())
    }

    async fn on_startup_with_context(&self, _context: &HookContext) -> CoordinatorResult<()> {
        Ok(())
    }
}

/// 插件包接口：详情文件、主模块、依赖
#[async_trait]
pub trait PluginPackages: Send + Sync {
    /// 插件详情文件的路径
    fn details_path(&self, plugin_uid: &str) -> PathBuf;

    async fn load_details_file(&self, path: &Path) -> CoordinatorResult<PluginDetails>;

    /// 加载主模块；`None` 表示模块不存在
    async fn load_main_module(
        &self,
        plugin_uid: &str,
        main_module_path: &str,
    ) -> CoordinatorResult<Option<Arc<dyn PluginModule>>>;

    /// 本进程缺失的依赖包名
    async fn missing_dependencies(&self, details: &PluginDetails) -> CoordinatorResult<Vec<String>>;

    async fn install_dependencies(
        &self,
        details: &PluginDetails,
        missing: &[String],
    ) -> CoordinatorResult<()>;
}
