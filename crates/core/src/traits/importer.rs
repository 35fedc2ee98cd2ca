//! 导入器接口定义
//!
//! 每个导入器读取一个外部数据源并把对应记录写入存储。导入器每次运行都通过
//! [`ImporterFactory`] 重新构造，构造参数是显式的 [`ImporterContext`]，不依赖任何
//! 进程级全局状态。

use async_trait::async_trait;

use crate::{
    models::{RecencyFlags, SourceKind},
    run_log::RunLog,
    ImportResult,
};

/// 构造导入器时传入的单次运行上下文
#[derive(Debug, Clone)]
pub struct ImporterContext {
    pub source: SourceKind,
    /// 已校验的学校编号
    pub school_scope: Vec<String>,
    pub log: RunLog,
    pub recency: RecencyFlags,
}

/// 单个导入单元
///
/// `import` 没有返回值，副作用是写入存储。返回 `InterruptingSignal`
/// 表示进程级中断，其它任何错误都被视为普通失败。
#[async_trait]
pub trait ImporterUnit: Send + Sync {
    fn name(&self) -> &str;

    async fn import(&self) -> ImportResult<()>;

    /// 是否可以安全地重复执行；重试整次运行时依赖该声明
    fn idempotent(&self) -> bool {
        true
    }
}

/// 导入器工厂，注册表在每次运行时用它构造新的导入器实例
pub trait ImporterFactory: Send + Sync {
    fn create(&self, context: ImporterContext) -> ImportResult<Box<dyn ImporterUnit>>;
}

impl<F> ImporterFactory for F
where
    F: Fn(ImporterContext) -> ImportResult<Box<dyn ImporterUnit>> + Send + Sync,
{
    fn create(&self, context: ImporterContext) -> ImportResult<Box<dyn ImporterUnit>> {
        self(context)
    }
}
