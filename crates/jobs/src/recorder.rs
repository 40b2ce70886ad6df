use std::sync::Arc;

use chrono::{DateTime, Utc};
use coordinator_core::{
    models::{object_types, Document, DocumentKey, GLOBAL_SITE},
    traits::DocumentStore,
    CoordinatorResult,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::context::{JobContext, JobRole, JobStatus};

/// 持久化的作业运行记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRunRecord {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub role: JobRole,
    pub status: JobStatus,
    pub progress: f64,
    pub error: Option<String>,
    pub logs: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// 把作业运行记录写入文档存储
///
/// 写入失败只记录告警，不影响作业本身的结果。
#[derive(Clone)]
pub struct JobRunRecorder {
    store: Arc<dyn DocumentStore>,
}

impl JobRunRecorder {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub(crate) async fn record(
        &self,
        ctx: &JobContext,
        started_at: DateTime<Utc>,
        error: Option<String>,
    ) {
        let status = ctx.status();
        let record = JobRunRecord {
            id: ctx.id().to_string(),
            name: ctx.name().to_string(),
            parent_id: ctx.parent_id().map(str::to_string),
            role: ctx.role(),
            status,
            progress: ctx.progress(),
            error,
            logs: ctx.logs(),
            started_at,
            finished_at: status.is_terminal().then(Utc::now),
        };

        if let Err(e) = self.save(&record).await {
            warn!(job_id = %record.id, "保存作业运行记录失败: {}", e);
        }
    }

    pub async fn load(&self, job_id: &str) -> CoordinatorResult<Option<JobRunRecord>> {
        let key = DocumentKey::global(object_types::JOB_RUN, job_id);
        match self.store.get(&key).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc.body)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, record: &JobRunRecord) -> CoordinatorResult<()> {
        let document = Document::new(
            object_types::JOB_RUN,
            &record.id,
            GLOBAL_SITE,
            serde_json::to_value(record)?,
        );
        self.store.save(document).await?;
        Ok(())
    }
}
