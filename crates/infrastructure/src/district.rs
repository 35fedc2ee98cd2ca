use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use student_import_core::{DistrictConfig, DistrictConfigProvider, ImportError, ImportResult};

/// 从 `<config_dir>/<key>.toml` 读取区配置
///
/// 文件示例：
///
/// ```toml
/// key = "demo"
/// name = "Demo District"
///
/// [[schools]]
/// local_id = "SHS"
/// name = "Somerville High"
/// school_type = "HS"
/// ```
#[derive(Debug, Clone)]
pub struct FileDistrictConfigProvider {
    config_dir: PathBuf,
}

impl FileDistrictConfigProvider {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn path_for(&self, district_key: &str) -> PathBuf {
        self.config_dir.join(format!("{district_key}.toml"))
    }

    fn parse(path: &Path, content: &str) -> ImportResult<DistrictConfig> {
        toml::from_str(content).map_err(|e| {
            ImportError::Configuration(format!("区配置文件 {} 格式错误: {e}", path.display()))
        })
    }
}

#[async_trait]
impl DistrictConfigProvider for FileDistrictConfigProvider {
    async fn load(&self, district_key: &str) -> ImportResult<DistrictConfig> {
        let path = self.path_for(district_key);
        debug!("读取区配置: {}", path.display());

        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            ImportError::Configuration(format!("无法读取区配置文件 {}: {e}", path.display()))
        })?;

        let config = Self::parse(&path, &content)?;
        if config.key != district_key {
            return Err(ImportError::Configuration(format!(
                "区配置文件 {} 中的key为 {}，期望 {}",
                path.display(),
                config.key,
                district_key
            )));
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    #[tokio::test]
    async fn test_load_district_file() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "bedford.toml",
            r#"
key = "bedford"
name = "Bedford Public Schools"

[[schools]]
local_id = "BHS"
name = "Bedford High"
school_type = "HS"

[[schools]]
local_id = "DAV"
name = "Davis Elementary"
"#,
        );

        let provider = FileDistrictConfigProvider::new(dir.path());
        let district = provider.load("bedford").await.unwrap();
        assert_eq!(district.name, "Bedford Public Schools");
        assert_eq!(district.school_ids(), vec!["BHS", "DAV"]);
        assert_eq!(district.schools[0].school_type.as_deref(), Some("HS"));
        assert_eq!(district.schools[1].school_type, None);
    }

    #[tokio::test]
    async fn test_missing_file_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let provider = FileDistrictConfigProvider::new(dir.path());
        let err = provider.load("nowhere").await.unwrap_err();
        assert!(matches!(err, ImportError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_malformed_and_empty_files_are_rejected() {
        let dir = TempDir::new().unwrap();
        write(&dir, "broken.toml", "key = \"broken\"\nschools = 3\n");
        write(&dir, "empty.toml", "key = \"empty\"\nname = \"Empty\"\n");
        write(
            &dir,
            "mismatch.toml",
            "key = \"other\"\nname = \"Other\"\n[[schools]]\nlocal_id = \"A\"\nname = \"A\"\n",
        );

        let provider = FileDistrictConfigProvider::new(dir.path());
        for key in ["broken", "empty", "mismatch"] {
            let err = provider.load(key).await.unwrap_err();
            assert!(
                matches!(err, ImportError::Configuration(_)),
                "{key}: {err:?}"
            );
        }
    }
}
