use coordinator_core::{models::SiteDescriptor, CoordinatorError, CoordinatorResult};
use serde_json::json;
use uuid::Uuid;

use super::SiteRecords;
use crate::{
    cluster::{dispatch, ClusterWorkflow},
    context::JobContext,
    environment::JobEnvironment,
    task::{task, Task},
};

/// 创建或编辑站点
///
/// 校验并保存站点文档后通知所有进程刷新本地站点表。
/// 编辑时保留文档中已有的激活状态。
pub struct CreateEditSiteJob {
    env: JobEnvironment,
    site: SiteDescriptor,
}

impl CreateEditSiteJob {
    pub const OPERATION: &'static str = "CREATE_EDIT_SITE";
    pub const COMMAND_TYPE: &'static str = "create_edit_site";

    /// uid 为空时视为新建站点并生成 uid
    pub fn new(env: JobEnvironment, mut site: SiteDescriptor) -> Self {
        if site.uid.trim().is_empty() {
            site.uid = Uuid::new_v4().simple().to_string();
        }
        Self { env, site }
    }

    pub fn from_payload(env: JobEnvironment, payload: &serde_json::Value) -> CoordinatorResult<Self> {
        let site: SiteDescriptor = serde_json::from_value(payload.clone())
            .map_err(|e| CoordinatorError::InvalidArgument(format!("站点命令负载无效: {e}")))?;
        Ok(Self::new(env, site))
    }

    pub fn site(&self) -> &SiteDescriptor {
        &self.site
    }

    pub fn job_name(&self) -> String {
        format!("{}_{}", Self::OPERATION, self.site.uid)
    }

    fn validate(site: &SiteDescriptor) -> CoordinatorResult<()> {
        if site.display_name.trim().is_empty() {
            return Err(CoordinatorError::MissingArgument("display_name".to_string()));
        }
        if site.hostname.trim().is_empty() {
            return Err(CoordinatorError::MissingArgument("hostname".to_string()));
        }
        Ok(())
    }
}

impl ClusterWorkflow for CreateEditSiteJob {
    fn initiator_tasks(&self, ctx: &JobContext) -> CoordinatorResult<Vec<Task>> {
        let ctx = ctx.clone();
        let records = SiteRecords::new(self.env.store.clone());
        let commands = self.env.commands.clone();
        let mut site = self.site.clone();

        Ok(vec![task(async move {
            Self::validate(&site)?;
            if records.hostname_taken(&site.hostname, &site.uid).await? {
                return Err(CoordinatorError::Precondition(format!(
                    "主机名已被其他站点使用: {}",
                    site.hostname
                )));
            }

            let existing = records.get(&site.uid).await?;
            if let Some(existing) = &existing {
                site.active = existing.active;
            }
            records.save(&site).await?;
            ctx.log(format!(
                "Site {} {}",
                site.uid,
                if existing.is_some() { "updated" } else { "created" }
            ));
            ctx.on_update(50.0);

            dispatch(&ctx, &commands, Self::COMMAND_TYPE, serde_json::to_value(&site)?).await?;
            Ok(json!({ "site_uid": site.uid, "created": existing.is_none() }))
        })])
    }

    /// 以存储中的文档为准刷新本地站点表
    fn worker_tasks(&self, ctx: &JobContext) -> CoordinatorResult<Vec<Task>> {
        let ctx = ctx.clone();
        let env = self.env.clone();
        let site = self.site.clone();

        Ok(vec![task(async move {
            let stored = SiteRecords::new(env.store.clone()).get(&site.uid).await?;
            let site = stored.unwrap_or(site);
            ctx.log(format!("Refreshing site {} on {}", site.uid, env.process_id()));
            env.sites.upsert(site).await;
            Ok(json!({ "refreshed": true }))
        })])
    }
}
