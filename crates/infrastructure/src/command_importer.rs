//! 以外部程序形式实现的导入器
//!
//! 每个数据源对应一个可执行程序，导入参数通过环境变量传入，
//! 程序的stdout/stderr逐行写入导入日志。

use std::process::{ExitStatus, Stdio};
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use student_import_core::{
    CommandSpec, ImportError, ImportResult, ImporterContext, ImporterFactory, ImporterUnit,
    RunLog,
};

pub const ENV_SOURCE: &str = "IMPORT_SOURCE";
pub const ENV_SCHOOL_SCOPE: &str = "IMPORT_SCHOOL_SCOPE";
pub const ENV_ONLY_RECENT_ATTENDANCE: &str = "IMPORT_ONLY_RECENT_ATTENDANCE";
pub const ENV_SKIP_OLD_RECORDS: &str = "IMPORT_SKIP_OLD_RECORDS";

/// 导致子进程退出时按中断处理的信号
#[cfg(unix)]
const INTERRUPTING_SIGNALS: [(i32, &str); 4] = [
    (1, "SIGHUP"),
    (2, "SIGINT"),
    (9, "SIGKILL"),
    (15, "SIGTERM"),
];

pub struct CommandImporter {
    spec: CommandSpec,
    context: ImporterContext,
}

impl CommandImporter {
    pub fn new(spec: CommandSpec, context: ImporterContext) -> Self {
        Self { spec, context }
    }

    fn build_command(&self) -> Command {
        let recency = self.context.recency;
        let mut cmd = Command::new(&self.spec.program);
        cmd.args(&self.spec.args)
            .envs(&self.spec.env)
            .env(ENV_SOURCE, self.context.source.as_str())
            .env(ENV_SCHOOL_SCOPE, self.context.school_scope.join(","))
            .env(
                ENV_ONLY_RECENT_ATTENDANCE,
                recency.only_recent_attendance.to_string(),
            )
            .env(ENV_SKIP_OLD_RECORDS, recency.skip_old_records.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // 导入被中断时future会被丢弃，子进程随之结束
            .kill_on_drop(true);

        if let Some(ref dir) = self.spec.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn check_exit(&self, status: ExitStatus) -> ImportResult<()> {
        if status.success() {
            return Ok(());
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                if let Some((_, name)) = INTERRUPTING_SIGNALS.iter().find(|(s, _)| *s == signal) {
                    return Err(ImportError::interrupted(format!(
                        "{} 被 {name} 终止",
                        self.name()
                    )));
                }
                return Err(ImportError::importer(
                    self.name(),
                    format!("进程被信号 {signal} 终止"),
                ));
            }
        }

        Err(ImportError::importer(
            self.name(),
            format!("命令执行失败，退出码: {:?}", status.code()),
        ))
    }
}

async fn forward_lines<R>(reader: R, log: &RunLog, prefix: &str)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => log.log_best_effort(format!("{prefix}{line}")).await,
            Ok(None) => break,
            Err(e) => {
                log.log_best_effort(format!("{prefix}读取输出失败: {e}")).await;
                break;
            }
        }
    }
}

#[async_trait]
impl ImporterUnit for CommandImporter {
    fn name(&self) -> &str {
        self.context.source.importer_name()
    }

    async fn import(&self) -> ImportResult<()> {
        let start_time = Instant::now();
        info!(
            "执行导入命令: importer={}, program={}, args={:?}",
            self.name(),
            self.spec.program,
            self.spec.args
        );

        let mut child = self.build_command().spawn().map_err(|e| {
            ImportError::importer(self.name(), format!("启动命令 {} 失败: {e}", self.spec.program))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ImportError::importer(self.name(), "无法获取stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ImportError::importer(self.name(), "无法获取stderr"))?;

        let log = &self.context.log;
        tokio::join!(
            forward_lines(stdout, log, ""),
            forward_lines(stderr, log, "[stderr] ")
        );

        let status = child
            .wait()
            .await
            .map_err(|e| ImportError::importer(self.name(), format!("等待进程结束失败: {e}")))?;

        debug!(
            "导入命令结束: importer={}, status={}, duration={}ms",
            self.name(),
            status,
            start_time.elapsed().as_millis()
        );
        self.check_exit(status)
    }
}

/// 为某个数据源构造 [`CommandImporter`] 的工厂
#[derive(Debug, Clone)]
pub struct CommandImporterFactory {
    spec: CommandSpec,
}

impl CommandImporterFactory {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }
}

impl ImporterFactory for CommandImporterFactory {
    fn create(&self, context: ImporterContext) -> ImportResult<Box<dyn ImporterUnit>> {
        if self.spec.program.trim().is_empty() {
            return Err(ImportError::importer(
                context.source.importer_name(),
                "未配置导入命令",
            ));
        }
        Ok(Box::new(CommandImporter::new(self.spec.clone(), context)))
    }
}
