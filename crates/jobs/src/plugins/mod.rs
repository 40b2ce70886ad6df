//! 插件作业
//!
//! 所有插件作业都以 `PluginTarget` 为目标，名称遵循 `<OPERATION>_<plugin_uid>`。

pub mod available;
pub mod dependencies;
pub mod hooks;
pub mod initialize;
pub mod install;
pub mod records;
pub mod runtime;
pub mod target;
pub mod uninstall;

pub use available::AvailablePluginJob;
pub use dependencies::PluginDependenciesJob;
pub use hooks::{run_lifecycle_hook, select_hook, HookInvocation};
pub use initialize::InitializePluginJob;
pub use install::InstallPluginJob;
pub use records::PluginRecords;
pub use runtime::{ActivePlugin, PluginRuntime};
pub use target::PluginTarget;
pub use uninstall::UninstallPluginJob;

use coordinator_core::{models::PluginDetails, traits::PluginPackages, CoordinatorResult};

/// 从插件包读取详情文件
pub(crate) async fn load_details(
    packages: &dyn PluginPackages,
    plugin_uid: &str,
) -> CoordinatorResult<PluginDetails> {
    let path = packages.details_path(plugin_uid);
    packages.load_details_file(&path).await
}
