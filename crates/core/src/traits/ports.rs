use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    models::{Alert, DistrictConfig, ImportJob, JobStatus},
    ImportResult,
};

/// 区配置提供者：根据区的key返回规范的学校列表
#[async_trait]
pub trait DistrictConfigProvider: Send + Sync {
    /// 配置缺失或格式错误时返回 `Configuration`
    async fn load(&self, district_key: &str) -> ImportResult<DistrictConfig>;
}

/// 告警通道
#[async_trait]
pub trait AlertChannel: Send + Sync {
    async fn send(&self, alert: &Alert) -> ImportResult<()>;
}

/// 导入任务队列，由单个worker消费
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: &ImportJob) -> ImportResult<()>;

    /// 领取最早入队的待处理任务并标记为 `Running`
    async fn claim_next(&self) -> ImportResult<Option<ImportJob>>;

    async fn mark(&self, id: Uuid, status: JobStatus) -> ImportResult<()>;

    async fn pending_count(&self) -> ImportResult<u64>;
}

/// 导入完成后的派生数据维护任务，必须幂等
#[async_trait]
pub trait MaintenanceTask: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> ImportResult<()>;
}
