use std::sync::Arc;

use tracing::{info, warn};

use crate::{traits::ImportRunRepository, ImportResult};

/// 单次运行的日志目标
///
/// 每一行都同时写入 tracing 和导入记录，写入后立即持久化（不做批量缓冲）。
/// 通过克隆在执行器、隔离边界和导入器之间共享。
#[derive(Clone)]
pub struct RunLog {
    run_id: i64,
    runs: Arc<dyn ImportRunRepository>,
}

impl RunLog {
    pub fn new(run_id: i64, runs: Arc<dyn ImportRunRepository>) -> Self {
        Self { run_id, runs }
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    pub async fn log(&self, message: impl AsRef<str>) -> ImportResult<()> {
        let message = message.as_ref();
        info!(run_id = self.run_id, "ImportRun: {message}");
        self.runs
            .append_log(self.run_id, &format!("{message}\n"))
            .await
    }

    /// 写入失败只记录警告，用于不能因为日志失败而改变控制流的地方
    pub async fn log_best_effort(&self, message: impl AsRef<str>) {
        if let Err(e) = self.log(message).await {
            warn!(run_id = self.run_id, "写入导入日志失败: {e}");
        }
    }
}

impl std::fmt::Debug for RunLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLog").field("run_id", &self.run_id).finish()
    }
}
