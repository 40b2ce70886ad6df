//! 集群作业框架与具体的插件/站点作业
//!
//! - `Job` 作业引擎：任务列表、并发上限、加权进度、日志
//! - `ClusterWorkflow` 发起者/工作者两种角色的任务列表
//! - `plugins` / `sites` 具体的管理作业
//! - `handlers` 把分发命令映射回工作者作业

pub mod cluster;
pub mod context;
pub mod environment;
pub mod handlers;
pub mod job;
pub mod plugins;
pub mod recorder;
pub mod runner;
pub mod sites;
pub mod task;

pub use cluster::{dispatch, run_nested, ClusterJob, ClusterWorkflow, RoleStrategy};
pub use context::{JobContext, JobRole, JobStatus};
pub use environment::JobEnvironment;
pub use handlers::{register_worker_handlers, WorkerJobHandler};
pub use job::{Job, JobBuilder, JobOutcome};
pub use recorder::{JobRunRecord, JobRunRecorder};
pub use task::{task, Task, TaskProvider};
