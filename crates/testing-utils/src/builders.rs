//! Test data builders for district configuration and audit records

use chrono::{DateTime, Duration, Utc};
use student_import_core::{DistrictConfig, SchoolRecord, SourceKind, TimingEntry, UnitOutcome};

/// Builder for creating test DistrictConfig values
pub struct DistrictConfigBuilder {
    district: DistrictConfig,
}

impl DistrictConfigBuilder {
    pub fn new(key: &str) -> Self {
        Self {
            district: DistrictConfig {
                key: key.to_string(),
                name: format!("{key} public schools"),
                schools: Vec::new(),
            },
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.district.name = name.to_string();
        self
    }

    pub fn with_school(mut self, local_id: &str, name: &str) -> Self {
        self.district.schools.push(SchoolRecord::new(local_id, name));
        self
    }

    pub fn with_school_type(mut self, local_id: &str, name: &str, school_type: &str) -> Self {
        let mut school = SchoolRecord::new(local_id, name);
        school.school_type = Some(school_type.to_string());
        self.district.schools.push(school);
        self
    }

    pub fn build(self) -> DistrictConfig {
        self.district
    }
}

/// A small district with a high school and two elementary schools
pub fn demo_district() -> DistrictConfig {
    DistrictConfigBuilder::new("demo")
        .with_name("Demo Public Schools")
        .with_school_type("SHS", "Somerville High", "HS")
        .with_school_type("HEA", "Healey", "ESMS")
        .with_school_type("BRN", "Brown", "ES")
        .build()
}

/// Builder for creating test TimingEntry values
pub struct TimingEntryBuilder {
    entry: TimingEntry,
}

impl TimingEntryBuilder {
    pub fn new(source: SourceKind) -> Self {
        let started_at = Utc::now();
        Self {
            entry: TimingEntry {
                importer: source.importer_name().to_string(),
                source,
                started_at,
                ended_at: started_at + Duration::seconds(1),
                outcome: UnitOutcome::Succeeded,
            },
        }
    }

    pub fn started_at(mut self, started_at: DateTime<Utc>) -> Self {
        let duration = self.entry.ended_at - self.entry.started_at;
        self.entry.started_at = started_at;
        self.entry.ended_at = started_at + duration;
        self
    }

    pub fn lasting(mut self, duration: Duration) -> Self {
        self.entry.ended_at = self.entry.started_at + duration;
        self
    }

    pub fn failed(mut self) -> Self {
        self.entry.outcome = UnitOutcome::Failed;
        self
    }

    pub fn interrupted(mut self) -> Self {
        self.entry.outcome = UnitOutcome::Interrupted;
        self
    }

    pub fn build(self) -> TimingEntry {
        self.entry
    }
}
