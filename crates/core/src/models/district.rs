use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{ImportError, ImportResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolRecord {
    pub local_id: String,
    pub name: String,
    #[serde(default)]
    pub school_type: Option<String>,
}

impl SchoolRecord {
    pub fn new(local_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            local_id: local_id.into(),
            name: name.into(),
            school_type: None,
        }
    }
}

/// 区的规范配置：学校列表是校验和范围默认值的唯一来源
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistrictConfig {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub schools: Vec<SchoolRecord>,
}

impl DistrictConfig {
    pub fn school_ids(&self) -> Vec<String> {
        self.schools.iter().map(|s| s.local_id.clone()).collect()
    }

    pub fn contains_school(&self, local_id: &str) -> bool {
        self.schools.iter().any(|s| s.local_id == local_id)
    }

    /// 检查配置是否完整：至少一所学校，编号非空且不重复
    pub fn validate(&self) -> ImportResult<()> {
        if self.key.trim().is_empty() {
            return Err(ImportError::Configuration("区配置缺少key".to_string()));
        }
        if self.schools.is_empty() {
            return Err(ImportError::Configuration(format!(
                "区 {} 的配置中没有学校",
                self.key
            )));
        }

        let mut seen = HashSet::new();
        for school in &self.schools {
            if school.local_id.trim().is_empty() {
                return Err(ImportError::Configuration(format!(
                    "区 {} 的配置中存在空的学校编号",
                    self.key
                )));
            }
            if !seen.insert(school.local_id.as_str()) {
                return Err(ImportError::Configuration(format!(
                    "区 {} 的配置中学校编号重复: {}",
                    self.key, school.local_id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn district(schools: Vec<SchoolRecord>) -> DistrictConfig {
        DistrictConfig {
            key: "somerville".to_string(),
            name: "Somerville".to_string(),
            schools,
        }
    }

    #[test]
    fn test_valid_config() {
        let config = district(vec![
            SchoolRecord::new("SHS", "Somerville High"),
            SchoolRecord::new("HEA", "Healey"),
        ]);
        assert!(config.validate().is_ok());
        assert_eq!(config.school_ids(), vec!["SHS", "HEA"]);
        assert!(config.contains_school("HEA"));
        assert!(!config.contains_school("ZZZ"));
    }

    #[test]
    fn test_empty_and_duplicate_schools_are_malformed() {
        assert!(matches!(
            district(vec![]).validate(),
            Err(ImportError::Configuration(_))
        ));
        assert!(matches!(
            district(vec![
                SchoolRecord::new("SHS", "a"),
                SchoolRecord::new("SHS", "b")
            ])
            .validate(),
            Err(ImportError::Configuration(_))
        ));
        assert!(matches!(
            district(vec![SchoolRecord::new(" ", "blank")]).validate(),
            Err(ImportError::Configuration(_))
        ));
    }
}
