use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    ImporterFailure,
    MaintenanceFailure,
}

/// 发往告警通道的错误报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub error: String,
    pub context: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(kind: AlertKind, error: impl Into<String>) -> Self {
        Self {
            kind,
            error: error.into(),
            context: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}
