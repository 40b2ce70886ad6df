use thiserror::Error;

/// 错误分类
///
/// 决定调用方如何处理失败：前置条件错误可以直接返回给调用方，
/// 协调错误意味着集群中可能已经有部分进程应用了变更。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Precondition,
    Coordination,
    Persistence,
    Hook,
    Internal,
}

/// 协调器错误类型定义
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoordinatorError {
    #[error("插件已安装: {plugin}")]
    AlreadyInstalled { plugin: String },

    #[error("插件未安装: {plugin}")]
    NotInstalled { plugin: String },

    #[error("缺少必需参数: {0}")]
    MissingArgument(String),

    #[error("无效参数: {0}")]
    InvalidArgument(String),

    #[error("前置条件不满足: {0}")]
    Precondition(String),

    #[error("命令 {name} (job {job_id}) 等待回复超时，未回复的进程: {missing:?}")]
    CommandTimeout {
        name: String,
        job_id: String,
        missing: Vec<String>,
    },

    #[error("命令 {name} 在以下进程上失败: {failures:?}")]
    CoordinationFailed { name: String, failures: Vec<String> },

    #[error("没有活跃的进程可以接收命令")]
    NoActiveProcesses,

    #[error("命令传输错误: {0}")]
    Transport(String),

    #[error("持久化错误: {0}")]
    Persistence(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("插件 {plugin} 的钩子执行失败: {message}")]
    Hook { plugin: String, message: String },

    #[error("插件加载失败: {0}")]
    PluginLoad(String),

    #[error("作业 {job} 以 {actual} 角色运行，不能获取 {requested} 任务列表")]
    RoleMismatch {
        job: String,
        requested: String,
        actual: String,
    },

    #[error("作业 {job} 只能以发起者模式运行")]
    InitiatorOnly { job: String },

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl CoordinatorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CoordinatorError::AlreadyInstalled { .. }
            | CoordinatorError::NotInstalled { .. }
            | CoordinatorError::MissingArgument(_)
            | CoordinatorError::InvalidArgument(_)
            | CoordinatorError::Precondition(_) => ErrorCategory::Precondition,
            CoordinatorError::CommandTimeout { .. }
            | CoordinatorError::CoordinationFailed { .. }
            | CoordinatorError::NoActiveProcesses
            | CoordinatorError::Transport(_) => ErrorCategory::Coordination,
            CoordinatorError::Persistence(_) | CoordinatorError::Serialization(_) => {
                ErrorCategory::Persistence
            }
            CoordinatorError::Hook { .. } | CoordinatorError::PluginLoad(_) => ErrorCategory::Hook,
            CoordinatorError::RoleMismatch { .. }
            | CoordinatorError::InitiatorOnly { .. }
            | CoordinatorError::Configuration(_)
            | CoordinatorError::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// 是否可以安全地直接报告给调用方（尚未产生任何副作用）
    pub fn is_precondition(&self) -> bool {
        self.category() == ErrorCategory::Precondition
    }
}

impl From<serde_json::Error> for CoordinatorError {
    fn from(e: serde_json::Error) -> Self {
        CoordinatorError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for CoordinatorError {
    fn from(e: std::io::Error) -> Self {
        CoordinatorError::Persistence(e.to_string())
    }
}

/// 统一的Result类型
pub type CoordinatorResult<T> = std::result::Result<T, CoordinatorError>;
