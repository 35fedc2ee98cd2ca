//! 导入编排：把多个相互独立的导入器按依赖顺序串成一次运行，隔离单个导入器的
//! 失败，持久化审计记录，并在进程被中断时安排一次重试。

pub mod executor;
pub mod isolation;
pub mod maintenance;
pub mod registry;
pub mod report;
pub mod retry_scheduler;
pub mod validator;

pub use executor::{ImportExecutor, RunOutcome};
pub use isolation::{AlertPolicy, FailureIsolationBoundary};
pub use maintenance::PostImportMaintenance;
pub use registry::{ImporterDefinition, ImporterRegistry, ImporterRegistryBuilder, ResolvedImporter};
pub use report::ImportTaskReport;
pub use retry_scheduler::{RetryDecision, RetryScheduler};
pub use validator::{ConfigValidator, ValidatedScope};
