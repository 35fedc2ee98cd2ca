use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::run_options::RunOptions;
use super::source::SourceKind;
use crate::{ImportError, ImportResult};

/// 导入运行的状态机阶段
///
/// `Init -> Validating -> Importing -> Finalizing -> Done`，
/// `Aborted` 只能从 `Validating` 进入；`Interrupted` 从 `Importing`/`Finalizing` 进入；
/// `Failed` 只在维护任务失败时从 `Finalizing` 进入。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    Init,
    Validating,
    Importing,
    Finalizing,
    Done,
    Aborted,
    Interrupted,
    Failed,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Init => "INIT",
            RunPhase::Validating => "VALIDATING",
            RunPhase::Importing => "IMPORTING",
            RunPhase::Finalizing => "FINALIZING",
            RunPhase::Done => "DONE",
            RunPhase::Aborted => "ABORTED",
            RunPhase::Interrupted => "INTERRUPTED",
            RunPhase::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunPhase::Done | RunPhase::Aborted | RunPhase::Interrupted | RunPhase::Failed
        )
    }

    pub fn can_transition_to(&self, next: RunPhase) -> bool {
        use RunPhase::*;
        matches!(
            (self, next),
            (Init, Validating)
                | (Validating, Importing)
                | (Validating, Aborted)
                | (Importing, Finalizing)
                | (Importing, Interrupted)
                | (Finalizing, Done)
                | (Finalizing, Interrupted)
                | (Finalizing, Failed)
        )
    }

    pub fn transition_to(&self, next: RunPhase) -> ImportResult<RunPhase> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(ImportError::InvalidPhaseTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunPhase {
    type Err = ImportError;

    fn from_str(s: &str) -> ImportResult<Self> {
        match s {
            "INIT" => Ok(RunPhase::Init),
            "VALIDATING" => Ok(RunPhase::Validating),
            "IMPORTING" => Ok(RunPhase::Importing),
            "FINALIZING" => Ok(RunPhase::Finalizing),
            "DONE" => Ok(RunPhase::Done),
            "ABORTED" => Ok(RunPhase::Aborted),
            "INTERRUPTED" => Ok(RunPhase::Interrupted),
            "FAILED" => Ok(RunPhase::Failed),
            _ => Err(ImportError::Serialization(format!("无效的运行阶段: {s}"))),
        }
    }
}

/// 单个导入器的执行结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitOutcome {
    Succeeded,
    Failed,
    Interrupted,
}

impl UnitOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitOutcome::Succeeded => "succeeded",
            UnitOutcome::Failed => "failed",
            UnitOutcome::Interrupted => "interrupted",
        }
    }
}

impl FromStr for UnitOutcome {
    type Err = ImportError;

    fn from_str(s: &str) -> ImportResult<Self> {
        match s {
            "succeeded" => Ok(UnitOutcome::Succeeded),
            "failed" => Ok(UnitOutcome::Failed),
            "interrupted" => Ok(UnitOutcome::Interrupted),
            _ => Err(ImportError::Serialization(format!("无效的执行结果: {s}"))),
        }
    }
}

/// 计时日志中的一条记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingEntry {
    pub importer: String,
    pub source: SourceKind,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub outcome: UnitOutcome,
}

impl TimingEntry {
    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }
}

/// 创建导入记录时的参数
#[derive(Debug, Clone)]
pub struct NewImportRun {
    pub options: RunOptions,
    pub started_at: DateTime<Utc>,
}

impl NewImportRun {
    pub fn new(options: RunOptions) -> Self {
        Self {
            options,
            started_at: Utc::now(),
        }
    }
}

/// 导入运行的审计记录，只追加、永不删除
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRun {
    pub id: i64,
    pub options: RunOptions,
    pub phase: RunPhase,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub timing: Vec<TimingEntry>,
    pub log: String,
}

impl ImportRun {
    pub fn is_finished(&self) -> bool {
        self.ended_at.is_some()
    }

    pub fn timing_for(&self, source: SourceKind) -> Option<&TimingEntry> {
        self.timing.iter().find(|entry| entry.source == source)
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.ended_at
            .map(|ended| (ended - self.started_at).num_milliseconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let phase = RunPhase::Init
            .transition_to(RunPhase::Validating)
            .and_then(|p| p.transition_to(RunPhase::Importing))
            .and_then(|p| p.transition_to(RunPhase::Finalizing))
            .and_then(|p| p.transition_to(RunPhase::Done))
            .unwrap();
        assert_eq!(phase, RunPhase::Done);
        assert!(phase.is_terminal());
    }

    #[test]
    fn test_aborted_only_from_validating() {
        assert!(RunPhase::Validating.can_transition_to(RunPhase::Aborted));
        assert!(!RunPhase::Importing.can_transition_to(RunPhase::Aborted));
        assert!(!RunPhase::Finalizing.can_transition_to(RunPhase::Aborted));
        assert!(RunPhase::Init.transition_to(RunPhase::Aborted).is_err());
    }

    #[test]
    fn test_interrupted_only_while_working() {
        assert!(RunPhase::Importing.can_transition_to(RunPhase::Interrupted));
        assert!(RunPhase::Finalizing.can_transition_to(RunPhase::Interrupted));
        assert!(!RunPhase::Validating.can_transition_to(RunPhase::Interrupted));
        assert!(!RunPhase::Done.can_transition_to(RunPhase::Interrupted));
    }

    #[test]
    fn test_phase_string_round_trip() {
        for phase in [
            RunPhase::Init,
            RunPhase::Validating,
            RunPhase::Importing,
            RunPhase::Finalizing,
            RunPhase::Done,
            RunPhase::Aborted,
            RunPhase::Interrupted,
            RunPhase::Failed,
        ] {
            assert_eq!(phase.as_str().parse::<RunPhase>().unwrap(), phase);
        }
        assert!("RUNNING".parse::<RunPhase>().is_err());
    }
}
