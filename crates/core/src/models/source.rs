use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::entity::TrackedEntity;
use crate::{ImportError, ImportResult};

/// 导入器对应的外部数据源类型
///
/// 集合在启动时固定；每个类型的元数据由 [`SourceKind::data_flow`] 的穷举匹配声明。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Educators,
    CoursesSections,
    Students,
    StudentSectionAssignments,
    EducatorSectionAssignments,
    Attendance,
    Behavior,
    X2Assessments,
    StarMath,
    StarReading,
    TeacherTransitionNotes,
}

impl SourceKind {
    pub const ALL: [SourceKind; 11] = [
        SourceKind::Educators,
        SourceKind::CoursesSections,
        SourceKind::Students,
        SourceKind::StudentSectionAssignments,
        SourceKind::EducatorSectionAssignments,
        SourceKind::Attendance,
        SourceKind::Behavior,
        SourceKind::X2Assessments,
        SourceKind::StarMath,
        SourceKind::StarReading,
        SourceKind::TeacherTransitionNotes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Educators => "educators",
            SourceKind::CoursesSections => "courses_sections",
            SourceKind::Students => "students",
            SourceKind::StudentSectionAssignments => "student_section_assignments",
            SourceKind::EducatorSectionAssignments => "educator_section_assignments",
            SourceKind::Attendance => "attendance",
            SourceKind::Behavior => "behavior",
            SourceKind::X2Assessments => "x2_assessments",
            SourceKind::StarMath => "star_math",
            SourceKind::StarReading => "star_reading",
            SourceKind::TeacherTransitionNotes => "teacher_transition_notes",
        }
    }

    /// 导入器名称，用于日志和计时记录
    pub fn importer_name(&self) -> &'static str {
        match self {
            SourceKind::Educators => "EducatorsImporter",
            SourceKind::CoursesSections => "CoursesSectionsImporter",
            SourceKind::Students => "StudentsImporter",
            SourceKind::StudentSectionAssignments => "StudentSectionAssignmentsImporter",
            SourceKind::EducatorSectionAssignments => "EducatorSectionAssignmentsImporter",
            SourceKind::Attendance => "AttendanceImporter",
            SourceKind::Behavior => "BehaviorImporter",
            SourceKind::X2Assessments => "X2AssessmentImporter",
            SourceKind::StarMath => "StarMathImporter",
            SourceKind::StarReading => "StarReadingImporter",
            SourceKind::TeacherTransitionNotes => "TeacherTransitionNotesImporter",
        }
    }

    /// 声明的依赖：这些数据源必须先于本数据源导入
    pub fn dependencies(&self) -> &'static [SourceKind] {
        match self {
            SourceKind::Educators => &[],
            SourceKind::CoursesSections => &[],
            SourceKind::Students => &[SourceKind::Educators],
            SourceKind::StudentSectionAssignments => {
                &[SourceKind::Students, SourceKind::CoursesSections]
            }
            SourceKind::EducatorSectionAssignments => {
                &[SourceKind::Educators, SourceKind::CoursesSections]
            }
            SourceKind::Attendance => &[SourceKind::Students],
            SourceKind::Behavior => &[SourceKind::Students],
            SourceKind::X2Assessments => &[SourceKind::Students],
            SourceKind::StarMath => &[SourceKind::Students],
            SourceKind::StarReading => &[SourceKind::Students],
            SourceKind::TeacherTransitionNotes => &[SourceKind::Educators, SourceKind::Students],
        }
    }

    /// 拓扑排序时的优先级，数值越小越靠前
    pub fn priority(&self) -> u8 {
        match self {
            SourceKind::Educators | SourceKind::CoursesSections | SourceKind::Students => 10,
            SourceKind::StudentSectionAssignments | SourceKind::EducatorSectionAssignments => 20,
            SourceKind::Behavior | SourceKind::Attendance => 30,
            SourceKind::X2Assessments | SourceKind::StarMath | SourceKind::StarReading => 40,
            SourceKind::TeacherTransitionNotes => 50,
        }
    }

    pub fn data_flow(&self) -> DataFlow {
        use MergeStrategy::*;
        use SourceSystem::*;
        use SyncFrequency::*;
        use TrackedEntity as E;

        let (source, frequency, merge, touches, description): (
            SourceSystem,
            SyncFrequency,
            MergeStrategy,
            &[TrackedEntity],
            &str,
        ) = match self {
            SourceKind::Educators => (
                SisExport,
                Daily,
                ReconcileUpdate,
                &[E::Educator],
                "Educator roster exported nightly from the SIS",
            ),
            SourceKind::CoursesSections => (
                SisExport,
                Daily,
                ReconcileUpdate,
                &[E::Course, E::Section],
                "Courses and sections offered at each school",
            ),
            SourceKind::Students => (
                SisExport,
                Daily,
                ReconcileUpdate,
                &[E::Student],
                "Student demographics, enrollment and homeroom assignment",
            ),
            SourceKind::StudentSectionAssignments => (
                SisExport,
                Daily,
                ReconcileUpdate,
                &[E::StudentSectionAssignment],
                "Which students are enrolled in which sections",
            ),
            SourceKind::EducatorSectionAssignments => (
                SisExport,
                Daily,
                ReconcileUpdate,
                &[E::EducatorSectionAssignment],
                "Which educators teach which sections",
            ),
            SourceKind::Attendance => (
                SisExport,
                Daily,
                BlindCreate,
                &[E::Absence, E::Tardy],
                "Absences and tardies, optionally limited to recent records",
            ),
            SourceKind::Behavior => (
                SisExport,
                Daily,
                BlindCreate,
                &[E::DisciplineIncident],
                "Discipline incidents",
            ),
            SourceKind::X2Assessments => (
                SisExport,
                Daily,
                ReconcileUpdate,
                &[E::StudentAssessment],
                "State assessment results stored in the SIS",
            ),
            SourceKind::StarMath => (
                AssessmentVendor,
                Daily,
                ReconcileUpdate,
                &[E::StudentAssessment],
                "STAR Math results from the assessment vendor",
            ),
            SourceKind::StarReading => (
                AssessmentVendor,
                Daily,
                ReconcileUpdate,
                &[E::StudentAssessment],
                "STAR Reading results from the assessment vendor",
            ),
            SourceKind::TeacherTransitionNotes => (
                Spreadsheet,
                OneTimeBatch,
                BlindCreate,
                &[],
                "Transition notes from teachers, imported from shared sheets",
            ),
        };

        DataFlow {
            source_kind: *self,
            source_system: source,
            frequency,
            merge_strategy: merge,
            touches: touches.to_vec(),
            description: description.to_string(),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = ImportError;

    fn from_str(s: &str) -> ImportResult<Self> {
        SourceKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ImportError::UnknownSource {
                name: s.to_string(),
            })
    }
}

/// 调用方可以按组请求数据源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceGroup {
    X2,
    Star,
}

impl SourceGroup {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "x2" => Some(SourceGroup::X2),
            "star" => Some(SourceGroup::Star),
            _ => None,
        }
    }

    pub fn kinds(&self) -> &'static [SourceKind] {
        match self {
            SourceGroup::X2 => &[
                SourceKind::Educators,
                SourceKind::CoursesSections,
                SourceKind::Students,
                SourceKind::StudentSectionAssignments,
                SourceKind::EducatorSectionAssignments,
                SourceKind::Attendance,
                SourceKind::Behavior,
                SourceKind::X2Assessments,
            ],
            SourceGroup::Star => &[SourceKind::StarMath, SourceKind::StarReading],
        }
    }
}

/// 将请求的名称（数据源类型或组名）展开成去重后的数据源类型列表
///
/// 保持首次出现的顺序；未知名称返回 `UnknownSource`。
pub fn expand_source_names<S: AsRef<str>>(names: &[S]) -> ImportResult<Vec<SourceKind>> {
    let mut kinds = Vec::new();
    for name in names {
        let name = name.as_ref().trim();
        let expanded: Vec<SourceKind> = match SourceGroup::parse(name) {
            Some(group) => group.kinds().to_vec(),
            None => vec![name.parse::<SourceKind>()?],
        };
        for kind in expanded {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
    }
    Ok(kinds)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceSystem {
    SisExport,
    AssessmentVendor,
    Spreadsheet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncFrequency {
    Daily,
    OneTimeBatch,
}

/// 新数据与已存储数据的合并策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    BlindCreate,
    ReconcileUpdate,
}

/// 数据源元数据声明，仅用于排序和文档，运行时不做强制
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFlow {
    pub source_kind: SourceKind,
    pub source_system: SourceSystem,
    pub frequency: SyncFrequency,
    pub merge_strategy: MergeStrategy,
    pub touches: Vec<TrackedEntity>,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_names() {
        for kind in SourceKind::ALL {
            assert_eq!(kind.as_str().parse::<SourceKind>().unwrap(), kind);
            assert_eq!(kind.data_flow().source_kind, kind);
        }
    }

    #[test]
    fn test_unknown_name() {
        let err = "aspen".parse::<SourceKind>().unwrap_err();
        assert!(matches!(err, ImportError::UnknownSource { name } if name == "aspen"));
    }

    #[test]
    fn test_expand_groups_and_dedupe() {
        let kinds = expand_source_names(&["star", "students", "x2"]).unwrap();
        assert_eq!(kinds[0], SourceKind::StarMath);
        assert_eq!(kinds[1], SourceKind::StarReading);
        assert_eq!(kinds[2], SourceKind::Students);
        assert_eq!(kinds.len(), 2 + SourceGroup::X2.kinds().len());
        assert_eq!(
            kinds.iter().filter(|k| **k == SourceKind::Students).count(),
            1
        );
    }

    #[test]
    fn test_expand_rejects_unknown() {
        assert!(matches!(
            expand_source_names(&["x2", "ZZZ"]),
            Err(ImportError::UnknownSource { .. })
        ));
    }

    #[test]
    fn test_dependencies_are_known_kinds() {
        for kind in SourceKind::ALL {
            for dep in kind.dependencies() {
                assert_ne!(*dep, kind);
                assert!(SourceKind::ALL.contains(dep));
            }
        }
    }
}
