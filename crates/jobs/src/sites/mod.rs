//! 站点作业：激活、停用、创建/编辑

pub mod activate;
pub mod create_edit;
pub mod records;
pub mod runtime;

pub use activate::SiteActivationJob;
pub use create_edit::CreateEditSiteJob;
pub use records::SiteRecords;
pub use runtime::SiteRuntime;

use coordinator_core::{CoordinatorError, CoordinatorResult};
use serde::{Deserialize, Serialize};

/// 站点作业的目标
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteTarget {
    pub site_uid: String,
}

impl SiteTarget {
    pub fn new(site_uid: &str) -> CoordinatorResult<Self> {
        let site_uid = site_uid.trim();
        if site_uid.is_empty() {
            return Err(CoordinatorError::MissingArgument("site_uid".to_string()));
        }
        Ok(Self {
            site_uid: site_uid.to_string(),
        })
    }

    pub fn from_payload(payload: &serde_json::Value) -> CoordinatorResult<Self> {
        let target: SiteTarget = serde_json::from_value(payload.clone())
            .map_err(|e| CoordinatorError::InvalidArgument(format!("站点命令负载无效: {e}")))?;
        Self::new(&target.site_uid)
    }

    pub fn payload(&self) -> serde_json::Value {
        serde_json::json!({ "site_uid": self.site_uid })
    }

    pub fn job_name(&self, operation: &str) -> String {
        format!("{}_{}", operation, self.site_uid)
    }
}
