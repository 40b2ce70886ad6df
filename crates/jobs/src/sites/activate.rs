use coordinator_core::{CoordinatorError, CoordinatorResult};
use serde_json::json;

use super::{SiteRecords, SiteTarget};
use crate::{
    cluster::{dispatch, ClusterWorkflow},
    context::JobContext,
    environment::JobEnvironment,
    task::{task, Task},
};

/// 站点激活/停用作业
///
/// 先通知所有进程修改本地站点表，全部确认后再持久化 `active` 标记。
pub struct SiteActivationJob {
    env: JobEnvironment,
    target: SiteTarget,
    active: bool,
}

impl SiteActivationJob {
    pub const ACTIVATE_COMMAND: &'static str = "activate_site";
    pub const DEACTIVATE_COMMAND: &'static str = "deactivate_site";

    pub fn activate(env: JobEnvironment, target: SiteTarget) -> Self {
        Self {
            env,
            target,
            active: true,
        }
    }

    pub fn deactivate(env: JobEnvironment, target: SiteTarget) -> Self {
        Self {
            env,
            target,
            active: false,
        }
    }

    pub fn command_type(&self) -> &'static str {
        if self.active {
            Self::ACTIVATE_COMMAND
        } else {
            Self::DEACTIVATE_COMMAND
        }
    }

    pub fn job_name(&self) -> String {
        let operation = if self.active {
            "ACTIVATE_SITE"
        } else {
            "DEACTIVATE_SITE"
        };
        self.target.job_name(operation)
    }
}

fn site_not_found(uid: &str) -> CoordinatorError {
    CoordinatorError::Precondition(format!("站点不存在: {uid}"))
}

impl ClusterWorkflow for SiteActivationJob {
    fn initiator_tasks(&self, ctx: &JobContext) -> CoordinatorResult<Vec<Task>> {
        let ctx = ctx.clone();
        let records = SiteRecords::new(self.env.store.clone());
        let commands = self.env.commands.clone();
        let target = self.target.clone();
        let command_type = self.command_type();
        let active = self.active;

        Ok(vec![task(async move {
            let mut site = records
                .get(&target.site_uid)
                .await?
                .ok_or_else(|| site_not_found(&target.site_uid))?;

            dispatch(&ctx, &commands, command_type, target.payload()).await?;
            ctx.on_update(50.0);

            site.active = active;
            records.save(&site).await?;
            ctx.log(format!("Site {} persisted with active = {}", site.uid, active));
            Ok(json!({ "site_uid": site.uid, "active": active }))
        })])
    }

    fn worker_tasks(&self, ctx: &JobContext) -> CoordinatorResult<Vec<Task>> {
        let ctx = ctx.clone();
        let env = self.env.clone();
        let target = self.target.clone();
        let active = self.active;

        Ok(vec![task(async move {
            if !env.sites.set_active(&target.site_uid, active).await {
                let mut site = SiteRecords::new(env.store.clone())
                    .get(&target.site_uid)
                    .await?
                    .ok_or_else(|| site_not_found(&target.site_uid))?;
                site.active = active;
                env.sites.upsert(site).await;
            }
            ctx.log(format!(
                "Site {} marked active = {} on {}",
                target.site_uid,
                active,
                env.process_id()
            ));
            Ok(json!({ "active": active }))
        })])
    }
}
