use std::sync::Arc;

use tracing::{info, instrument};

use student_import_core::{
    DistrictConfigProvider, ImportError, ImportResult, RunLog, RunOptions, SchoolRepository,
    SchoolScope,
};

/// 校验通过的学校范围
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedScope {
    pub district_key: String,
    pub school_ids: Vec<String>,
    /// 本次校验首次播种写入的学校数量
    pub seeded: u64,
}

/// 在任何导入器运行之前，根据区的规范配置校验请求的学校范围
pub struct ConfigValidator {
    district_key: String,
    districts: Arc<dyn DistrictConfigProvider>,
    schools: Arc<dyn SchoolRepository>,
}

impl ConfigValidator {
    pub fn new(
        district_key: impl Into<String>,
        districts: Arc<dyn DistrictConfigProvider>,
        schools: Arc<dyn SchoolRepository>,
    ) -> Self {
        Self {
            district_key: district_key.into(),
            districts,
            schools,
        }
    }

    pub fn district_key(&self) -> &str {
        &self.district_key
    }

    #[instrument(skip(self, options, log), fields(district = %self.district_key))]
    pub async fn validate(&self, options: &RunOptions, log: &RunLog) -> ImportResult<ValidatedScope> {
        let district = self.districts.load(&self.district_key).await?;
        district.validate()?;

        // 学校表为空时从区配置播种，只会发生一次
        let mut seeded = 0;
        if self.schools.count().await? == 0 {
            seeded = self.schools.seed(&district.schools).await?;
            info!("学校表为空，已从区配置写入 {} 所学校", seeded);
            log.log(format!("从区配置播种了 {seeded} 所学校")).await?;
        }

        let school_ids = match options.school_scope() {
            SchoolScope::Explicit(ids) if !ids.is_empty() => {
                if let Some(id) = ids.iter().find(|id| !district.contains_school(id.as_str())) {
                    return Err(ImportError::SchoolNotFound {
                        local_id: id.clone(),
                    });
                }
                ids.clone()
            }
            _ => district.school_ids(),
        };

        // 默认范围同样要求每所学校都已存在于存储中
        for id in &school_ids {
            if self.schools.find_by_local_id(id).await?.is_none() {
                return Err(ImportError::SchoolNotFound {
                    local_id: id.clone(),
                });
            }
        }

        log.log(format!(
            "区 {} 的学校范围: {}",
            self.district_key,
            school_ids.join(", ")
        ))
        .await?;

        Ok(ValidatedScope {
            district_key: self.district_key.clone(),
            school_ids,
            seeded,
        })
    }
}
