use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use student_import_core::{EntityCountSnapshot, EntityCounter, RunLog, TrackedEntity};

/// 导入前后的实体计数对比，只用于观察，不影响控制流
pub struct ImportTaskReport {
    counter: Arc<dyn EntityCounter>,
    entities: Vec<TrackedEntity>,
    initial: Option<EntityCountSnapshot>,
    final_counts: Option<EntityCountSnapshot>,
}

impl ImportTaskReport {
    pub fn new(counter: Arc<dyn EntityCounter>) -> Self {
        Self::with_entities(counter, TrackedEntity::ALL.to_vec())
    }

    pub fn with_entities(counter: Arc<dyn EntityCounter>, entities: Vec<TrackedEntity>) -> Self {
        Self {
            counter,
            entities,
            initial: None,
            final_counts: None,
        }
    }

    pub async fn capture_initial(&mut self, log: &RunLog) {
        let snapshot = self.capture(log).await;
        log.log_best_effort(format!("初始实体计数: {}", Self::summarize(&snapshot)))
            .await;
        self.initial = Some(snapshot);
    }

    pub async fn capture_final(&mut self, log: &RunLog) {
        self.final_counts = Some(self.capture(log).await);
    }

    pub fn initial(&self) -> Option<&EntityCountSnapshot> {
        self.initial.as_ref()
    }

    pub fn final_counts(&self) -> Option<&EntityCountSnapshot> {
        self.final_counts.as_ref()
    }

    /// 两次快照都存在时返回每个实体的增量
    pub fn diff(&self) -> BTreeMap<TrackedEntity, i64> {
        match (&self.initial, &self.final_counts) {
            (Some(initial), Some(final_counts)) => final_counts.diff_since(initial),
            _ => BTreeMap::new(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::from("=== 导入报告 ===\n");
        let (Some(initial), Some(final_counts)) = (&self.initial, &self.final_counts) else {
            out.push_str("实体计数不完整\n");
            return out;
        };

        let diff = final_counts.diff_since(initial);
        for entity in &self.entities {
            match (initial.get(*entity), final_counts.get(*entity)) {
                (Some(before), Some(after)) => {
                    let delta = diff.get(entity).copied().unwrap_or(0);
                    let _ = writeln!(
                        out,
                        "{:<30} {:>8} -> {:>8} ({:+})",
                        entity.table_name(),
                        before,
                        after,
                        delta
                    );
                }
                _ => {
                    let _ = writeln!(out, "{:<30} 计数不可用", entity.table_name());
                }
            }
        }
        out
    }

    /// 单个实体计数失败时记录日志并跳过该实体
    async fn capture(&self, log: &RunLog) -> EntityCountSnapshot {
        let mut counts = BTreeMap::new();
        for &entity in &self.entities {
            match self.counter.count(entity).await {
                Ok(count) => {
                    counts.insert(entity, count);
                }
                Err(e) => {
                    log.log_best_effort(format!("统计 {} 失败: {}", entity.table_name(), e))
                        .await;
                }
            }
        }
        EntityCountSnapshot::new(counts)
    }

    fn summarize(snapshot: &EntityCountSnapshot) -> String {
        snapshot
            .counts
            .iter()
            .map(|(entity, count)| format!("{}={}", entity.table_name(), count))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
