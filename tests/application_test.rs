#![cfg(unix)]

use std::fs;
use std::time::Duration;

use anyhow::Result;
use tempfile::TempDir;

use student_import::{Application, ShutdownManager};
use student_import_core::{
    AppConfig, CommandSpec, JobQueue, JobStatus, RunOptions, RunPhase, RuntimeEnvironment,
    SchoolRepository, SourceKind,
};
use student_import_orchestrator::{RetryDecision, RunOutcome};

const DEMO_DISTRICT: &str = r#"
key = "demo"
name = "Demo District"

[[schools]]
local_id = "SHS"
name = "Somerville High"
school_type = "HS"

[[schools]]
local_id = "HEA"
name = "Healey"
school_type = "ESMS"
"#;

fn shell(script: &str) -> CommandSpec {
    CommandSpec {
        program: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        ..CommandSpec::default()
    }
}

/// 所有导入器都只输出一行日志
fn test_config(dir: &TempDir) -> AppConfig {
    let districts = dir.path().join("districts");
    fs::create_dir_all(&districts).unwrap();
    fs::write(districts.join("demo.toml"), DEMO_DISTRICT).unwrap();

    let mut config = AppConfig::default();
    config.environment = RuntimeEnvironment::Test;
    config.district.key = "demo".to_string();
    config.district.config_dir = districts.to_string_lossy().into_owned();
    config.database.url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("import.db").display()
    );
    config.worker.poll_interval_seconds = 1;
    for kind in SourceKind::ALL {
        config.importers.commands.insert(
            kind.as_str().to_string(),
            shell("echo imported $IMPORT_SOURCE for $IMPORT_SCHOOL_SCOPE"),
        );
    }
    config
}

#[tokio::test]
async fn test_run_once_imports_in_dependency_order() -> Result<()> {
    let dir = TempDir::new()?;
    let shutdown = ShutdownManager::new();
    let app = Application::new(test_config(&dir), shutdown.subscribe()).await?;

    let options = RunOptions::builder().sources(["students", "educators"]).build();
    let outcome = app.run_once(options).await?;

    let (run_id, failed_units, maintenance_tasks_run) = match outcome {
        RunOutcome::Completed {
            run_id,
            failed_units,
            maintenance_tasks_run,
            ..
        } => (run_id, failed_units, maintenance_tasks_run),
        other => panic!("expected completed run, got {other:?}"),
    };
    assert!(failed_units.is_empty());
    assert_eq!(maintenance_tasks_run, 3);
    assert_eq!(app.database().school_repository().count().await?, 2);

    let history = app.history(10).await?;
    assert_eq!(history.len(), 1);
    let run = &history[0];
    assert_eq!(run.id, run_id);
    assert_eq!(run.phase, RunPhase::Done);
    assert!(run.ended_at.is_some());

    let sources: Vec<SourceKind> = run.timing.iter().map(|t| t.source).collect();
    assert_eq!(sources, vec![SourceKind::Educators, SourceKind::Students]);

    let educators = run.log.find("imported educators for SHS,HEA").unwrap();
    let students = run.log.find("imported students for SHS,HEA").unwrap();
    assert!(educators < students);

    app.close().await;
    Ok(())
}

#[tokio::test]
async fn test_failing_command_does_not_stop_the_run() -> Result<()> {
    let dir = TempDir::new()?;
    let mut config = test_config(&dir);
    config
        .importers
        .commands
        .insert("educators".to_string(), shell("echo broken feed >&2; exit 2"));

    let app = Application::new(config, ShutdownManager::new().subscribe()).await?;
    let options = RunOptions::builder().sources(["students", "educators"]).build();

    match app.run_once(options).await? {
        RunOutcome::Completed { failed_units, .. } => {
            assert_eq!(failed_units, vec![SourceKind::Educators]);
        }
        other => panic!("expected completed run, got {other:?}"),
    }

    let run = app.history(1).await?.remove(0);
    assert_eq!(run.phase, RunPhase::Done);
    assert!(run.log.contains("[stderr] broken feed"));
    assert!(run.log.contains("imported students"));

    app.close().await;
    Ok(())
}

#[tokio::test]
async fn test_unknown_school_aborts_before_import() -> Result<()> {
    let dir = TempDir::new()?;
    let app = Application::new(test_config(&dir), ShutdownManager::new().subscribe()).await?;

    let options = RunOptions::builder()
        .schools(["NOPE"])
        .sources(["students"])
        .build();
    assert!(app.run_once(options).await.is_err());

    let run = app.history(1).await?.remove(0);
    assert_eq!(run.phase, RunPhase::Aborted);
    assert!(run.timing.is_empty());

    app.close().await;
    Ok(())
}

#[tokio::test]
async fn test_worker_drains_queue() -> Result<()> {
    let dir = TempDir::new()?;
    let app = Application::new(test_config(&dir), ShutdownManager::new().subscribe()).await?;

    let job = app
        .enqueue(RunOptions::builder().sources(["educators"]).build())
        .await?;
    assert_eq!(app.database().job_queue().pending_count().await?, 1);

    let processed = app.work(true).await?;
    assert_eq!(processed, 1);

    let stored = app.database().job_queue().get(job.id).await?.unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(app.history(10).await?.len(), 1);

    app.close().await;
    Ok(())
}

#[tokio::test]
async fn test_shutdown_interrupts_run_and_schedules_retry() -> Result<()> {
    let dir = TempDir::new()?;
    let mut config = test_config(&dir);
    config
        .importers
        .commands
        .insert("students".to_string(), shell("sleep 5"));

    let shutdown = ShutdownManager::new();
    let app = Application::new(config, shutdown.subscribe()).await?;

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.shutdown("SIGTERM");
    });

    let options = RunOptions::builder().sources(["students", "educators"]).build();
    let outcome = tokio::time::timeout(Duration::from_secs(4), app.run_once(options)).await??;

    match outcome {
        RunOutcome::Interrupted { retry, .. } => {
            assert!(matches!(retry, RetryDecision::Scheduled { attempt: 1, .. }));
        }
        other => panic!("expected interrupted run, got {other:?}"),
    }

    let run = app.history(1).await?.remove(0);
    assert_eq!(run.phase, RunPhase::Interrupted);
    assert!(run.ended_at.is_none());

    let queue = app.database().job_queue();
    assert_eq!(queue.pending_count().await?, 1);
    let retry_job = queue.claim_next().await?.unwrap();
    assert_eq!(retry_job.attempt(), 1);
    assert_eq!(
        retry_job.options.sources(),
        &["students".to_string(), "educators".to_string()]
    );

    app.close().await;
    Ok(())
}
