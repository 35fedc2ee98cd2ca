use thiserror::Error;

/// 导入系统错误类型定义
///
/// 普通的导入器失败（`ImporterFailure`）会被隔离边界吞掉，
/// 只有 `InterruptingSignal` 会穿过隔离边界触发一次性重试。
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("学校未找到: {local_id}")]
    SchoolNotFound { local_id: String },

    #[error("未知的数据源: {name}")]
    UnknownSource { name: String },

    #[error("检测到循环依赖: {kinds:?}")]
    CircularDependency { kinds: Vec<String> },

    #[error("导入器 {importer} 执行失败: {message}")]
    ImporterFailure { importer: String, message: String },

    #[error("导入被中断: {reason}")]
    InterruptingSignal { reason: String },

    #[error("维护任务 {task} 执行失败: {message}")]
    MaintenanceFailure { task: String, message: String },

    #[error("非法的运行阶段转换: {from} -> {to}")]
    InvalidPhaseTransition { from: String, to: String },

    #[error("导入记录未找到: {id}")]
    RunNotFound { id: i64 },

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl ImportError {
    pub fn importer(importer: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::ImporterFailure {
            importer: importer.into(),
            message: message.to_string(),
        }
    }

    pub fn interrupted(reason: impl Into<String>) -> Self {
        Self::InterruptingSignal {
            reason: reason.into(),
        }
    }

    pub fn maintenance(task: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::MaintenanceFailure {
            task: task.into(),
            message: message.to_string(),
        }
    }

    /// 是否为进程级中断（区别于普通的导入失败）
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::InterruptingSignal { .. })
    }

    /// 是否属于校验阶段的致命错误
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::SchoolNotFound { .. } | Self::UnknownSource { .. }
        )
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for ImportError {
    fn from(err: anyhow::Error) -> Self {
        // `{:?}` 保留完整的错误链
        Self::Internal(format!("{err:?}"))
    }
}

/// 统一的Result类型
pub type ImportResult<T> = std::result::Result<T, ImportError>;
