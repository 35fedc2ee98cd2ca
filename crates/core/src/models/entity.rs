use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 导入报告中跟踪数量的实体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TrackedEntity {
    Student,
    StudentAssessment,
    DisciplineIncident,
    Absence,
    Tardy,
    Educator,
    School,
    Course,
    Section,
    StudentSectionAssignment,
    EducatorSectionAssignment,
}

impl TrackedEntity {
    pub const ALL: [TrackedEntity; 11] = [
        TrackedEntity::Student,
        TrackedEntity::StudentAssessment,
        TrackedEntity::DisciplineIncident,
        TrackedEntity::Absence,
        TrackedEntity::Tardy,
        TrackedEntity::Educator,
        TrackedEntity::School,
        TrackedEntity::Course,
        TrackedEntity::Section,
        TrackedEntity::StudentSectionAssignment,
        TrackedEntity::EducatorSectionAssignment,
    ];

    /// 存储层中对应的表名
    pub fn table_name(&self) -> &'static str {
        match self {
            TrackedEntity::Student => "students",
            TrackedEntity::StudentAssessment => "student_assessments",
            TrackedEntity::DisciplineIncident => "discipline_incidents",
            TrackedEntity::Absence => "absences",
            TrackedEntity::Tardy => "tardies",
            TrackedEntity::Educator => "educators",
            TrackedEntity::School => "schools",
            TrackedEntity::Course => "courses",
            TrackedEntity::Section => "sections",
            TrackedEntity::StudentSectionAssignment => "student_section_assignments",
            TrackedEntity::EducatorSectionAssignment => "educator_section_assignments",
        }
    }
}

impl fmt::Display for TrackedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// 某一时刻各实体类型的数量快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityCountSnapshot {
    pub captured_at: DateTime<Utc>,
    pub counts: BTreeMap<TrackedEntity, u64>,
}

impl EntityCountSnapshot {
    pub fn new(counts: BTreeMap<TrackedEntity, u64>) -> Self {
        Self {
            captured_at: Utc::now(),
            counts,
        }
    }

    pub fn get(&self, entity: TrackedEntity) -> Option<u64> {
        self.counts.get(&entity).copied()
    }

    /// 与更早的快照比较，只包含两个快照都有数量的实体
    pub fn diff_since(&self, earlier: &EntityCountSnapshot) -> BTreeMap<TrackedEntity, i64> {
        self.counts
            .iter()
            .filter_map(|(entity, after)| {
                earlier
                    .get(*entity)
                    .map(|before| (*entity, *after as i64 - before as i64))
            })
            .collect()
    }
}
