use std::net::SocketAddr;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use student_import::{Application, ShutdownManager};
use student_import_core::{AppConfig, ImportRun, RunOptions};
use student_import_orchestrator::RunOutcome;

/// 被中断时的退出码（与shell对SIGINT的约定一致）
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "student-import")]
#[command(version = "1.0.0")]
#[command(about = "学生档案数据导入编排系统")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long, value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: Option<String>,

    /// 日志格式，覆盖配置文件
    #[arg(long, value_parser = ["json", "pretty"])]
    log_format: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 在当前进程中执行一次导入
    Run(RunArgs),
    /// 把导入请求放入任务队列
    Enqueue(RunArgs),
    /// 启动worker消费任务队列
    Work {
        /// 队列为空时退出
        #[arg(long)]
        drain: bool,
    },
    /// 查看最近的导入记录
    History {
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: i64,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// 学校编号，可重复；缺省为区配置中的全部学校
    #[arg(short, long = "school")]
    schools: Vec<String>,

    /// 数据源或数据源组名称，可重复；缺省使用配置中的默认数据源
    #[arg(short = 'S', long = "source")]
    sources: Vec<String>,

    #[arg(long)]
    only_recent_attendance: bool,

    #[arg(long)]
    skip_old_records: bool,

    #[arg(long)]
    skip_maintenance: bool,
}

impl RunArgs {
    fn into_options(self, app: &Application) -> RunOptions {
        app.options_with_defaults(self.schools, self.sources)
            .only_recent_attendance(self.only_recent_attendance)
            .skip_old_records(self.skip_old_records)
            .skip_maintenance(self.skip_maintenance)
            .build()
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("加载配置失败")?;
    let log_level = cli
        .log_level
        .as_deref()
        .unwrap_or(&config.observability.log_level);
    let log_format = cli
        .log_format
        .as_deref()
        .unwrap_or(&config.observability.log_format);
    init_logging(log_level, log_format)?;

    if let Some(ref listen) = config.observability.prometheus_listen {
        init_metrics(listen)?;
    }

    info!("启动学生档案数据导入系统");

    let shutdown_manager = ShutdownManager::new();
    let signal_listener = shutdown_manager.listen_for_signals();

    let app = Application::new(config, shutdown_manager.subscribe()).await?;
    let result = execute(&app, cli.command).await;

    signal_listener.abort();
    app.close().await;
    info!("学生档案数据导入系统已退出");
    result
}

async fn execute(app: &Application, command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Run(args) => {
            let options = args.into_options(app);
            match app.run_once(options).await? {
                RunOutcome::Completed {
                    run_id,
                    failed_units,
                    maintenance_tasks_run,
                    ..
                } => {
                    info!(
                        "导入完成: run_id={run_id}, 失败的导入器={failed_units:?}, 维护任务={maintenance_tasks_run}"
                    );
                    Ok(ExitCode::SUCCESS)
                }
                RunOutcome::Interrupted { run_id, retry } => {
                    warn!("导入被中断: run_id={run_id}, 重试={retry:?}");
                    Ok(ExitCode::from(EXIT_INTERRUPTED))
                }
            }
        }
        Commands::Enqueue(args) => {
            let options = args.into_options(app);
            let job = app.enqueue(options).await?;
            println!("{}", job.id);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Work { drain } => {
            let processed = app.work(drain).await?;
            info!("Worker共处理 {processed} 个导入任务");
            Ok(ExitCode::SUCCESS)
        }
        Commands::History { limit } => {
            for run in app.history(limit).await? {
                println!("{}", format_run(&run));
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn format_run(run: &ImportRun) -> String {
    let ended_at = run
        .ended_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "#{:<6} {:<12} 开始 {}  结束 {}  数据源 {:?}  第{}次尝试  导入器 {}",
        run.id,
        run.phase.as_str(),
        run.started_at.to_rfc3339(),
        ended_at,
        run.options.sources(),
        run.options.attempt(),
        run.timing.len()
    )
}

/// 初始化日志系统
fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        "pretty" => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
        _ => {
            return Err(anyhow::anyhow!("不支持的日志格式: {log_format}"));
        }
    }

    Ok(())
}

/// 安装Prometheus指标导出器
fn init_metrics(listen: &str) -> Result<()> {
    let addr: SocketAddr = listen
        .parse()
        .with_context(|| format!("Prometheus监听地址无效: {listen}"))?;
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("安装Prometheus导出器失败: {e}"))?;

    info!("Prometheus指标导出器监听 {addr}");
    Ok(())
}
