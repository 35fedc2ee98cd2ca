//! 数据仓储层接口定义
//!
//! - `ImportRunRepository` - 导入运行审计记录，只追加、永不删除
//! - `SchoolRepository` - 学校表，用于范围校验和首次播种
//! - `EntityCounter` - 导入报告使用的实体计数
//!
//! 所有接口都是异步的，返回 `ImportResult<T>`，实现需满足 `Send + Sync`。
//! 提供SQLite实现和内存实现（测试用）。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    models::{ImportRun, NewImportRun, RunPhase, SchoolRecord, TimingEntry, TrackedEntity},
    ImportResult,
};

/// 导入运行审计记录仓储
///
/// 每次写入都立即持久化，进程崩溃后仍可从记录中恢复已完成的进度。
#[async_trait]
pub trait ImportRunRepository: Send + Sync {
    /// 创建记录，阶段为 `Init`，`ended_at` 为空
    async fn create(&self, run: &NewImportRun) -> ImportResult<ImportRun>;

    async fn get_by_id(&self, id: i64) -> ImportResult<Option<ImportRun>>;

    /// 追加日志文本
    async fn append_log(&self, id: i64, text: &str) -> ImportResult<()>;

    /// 追加一条计时记录
    async fn append_timing(&self, id: i64, entry: &TimingEntry) -> ImportResult<()>;

    async fn update_phase(&self, id: i64, phase: RunPhase) -> ImportResult<()>;

    /// 进入终止阶段并写入结束时间
    async fn finish(&self, id: i64, phase: RunPhase, ended_at: DateTime<Utc>) -> ImportResult<()>;

    /// 最近的导入记录，按开始时间倒序
    async fn list_recent(&self, limit: i64) -> ImportResult<Vec<ImportRun>>;
}

/// 学校仓储
#[async_trait]
pub trait SchoolRepository: Send + Sync {
    async fn count(&self) -> ImportResult<u64>;

    /// 批量写入学校，已存在的编号跳过；返回新写入的数量
    async fn seed(&self, schools: &[SchoolRecord]) -> ImportResult<u64>;

    async fn find_by_local_id(&self, local_id: &str) -> ImportResult<Option<SchoolRecord>>;
}

/// 实体计数
#[async_trait]
pub trait EntityCounter: Send + Sync {
    async fn count(&self, entity: TrackedEntity) -> ImportResult<u64>;
}
