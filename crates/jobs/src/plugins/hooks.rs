use std::sync::Arc;

use coordinator_core::{
    models::HookContext,
    traits::{HookKind, LifecyclePhase, PluginModule},
    CoordinatorError, CoordinatorResult,
};
use serde::Serialize;
use tracing::warn;

/// 实际调用的钩子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookInvocation {
    WithContext,
    Basic,
    Skipped,
}

/// 选择某阶段可用的钩子，上下文钩子优先
pub fn select_hook(module: &dyn PluginModule, phase: LifecyclePhase) -> Option<HookKind> {
    let (basic, contextual) = HookKind::for_phase(phase);
    if module.provides(contextual) {
        Some(contextual)
    } else if module.provides(basic) {
        Some(basic)
    } else {
        None
    }
}

/// 调用插件的生命周期钩子；模块不存在或未提供钩子时视为成功
pub async fn run_lifecycle_hook(
    module: Option<&Arc<dyn PluginModule>>,
    phase: LifecyclePhase,
    plugin_uid: &str,
    context: &HookContext,
) -> CoordinatorResult<HookInvocation> {
    let Some(module) = module else {
        warn!("Plugin {} has no main module, skipping {:?} hook", plugin_uid, phase);
        return Ok(HookInvocation::Skipped);
    };

    let Some(hook) = select_hook(module.as_ref(), phase) else {
        warn!("Plugin {} did not provide a {:?} hook", plugin_uid, phase);
        return Ok(HookInvocation::Skipped);
    };

    let result = match hook {
        HookKind::Install => module.on_install().await,
        HookKind::InstallWithContext => module.on_install_with_context(context).await,
        HookKind::Uninstall => module.on_uninstall().await,
        HookKind::UninstallWithContext => module.on_uninstall_with_context(context).await,
        HookKind::Startup => module.on_startup().await,
        HookKind::StartupWithContext => module.on_startup_with_context(context).await,
    };

    result.map_err(|e| match e {
        CoordinatorError::Hook { .. } => e,
        other => CoordinatorError::Hook {
            plugin: plugin_uid.to_string(),
            message: other.to_string(),
        },
    })?;

    Ok(if hook.takes_context() {
        HookInvocation::WithContext
    } else {
        HookInvocation::Basic
    })
}
