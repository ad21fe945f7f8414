//! 프로비저닝 매니페스트
//!
//! 보호 대상 리소스 목록을 코드 밖의 YAML로 관리할 수 있게 합니다.
//!
//! ```yaml
//! schema: public
//! principal: anon
//! resources:
//!   - users
//!   - referrals
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::policy::{policy_name_for, Principal};
use crate::resource::{validate_identifier, ResourceSet};

fn default_schema() -> String {
    "public".to_string()
}

/// 프로비저닝 대상 정의
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionManifest {
    /// 스키마 네임스페이스
    #[serde(default = "default_schema")]
    pub schema: String,

    /// deny 정책 대상 principal
    #[serde(default)]
    pub principal: Principal,

    /// 보호 대상 리소스
    pub resources: ResourceSet,
}

impl Default for ProvisionManifest {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ProvisionManifest {
    /// 내장 리소스 목록을 사용하는 매니페스트
    pub fn builtin() -> Self {
        Self {
            schema: default_schema(),
            principal: Principal::Anonymous,
            resources: ResourceSet::builtin(),
        }
    }

    /// YAML 문자열에서 파싱
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let manifest: ProvisionManifest = serde_yaml::from_str(yaml)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// 파일에서 로드
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| match e {
            Error::Yaml(inner) => Error::ManifestParse {
                message: format!("{}: {}", path.display(), inner),
            },
            other => other,
        })
    }

    /// 스키마/principal 및 파생 정책 이름 검증
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.schema)?;
        self.principal.validate()?;
        for resource in &self.resources {
            policy_name_for(&self.principal, resource)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest_defaults() {
        let yaml = r#"
resources:
  - users
  - shop_items
"#;
        let manifest = ProvisionManifest::from_yaml(yaml).unwrap();
        assert_eq!(manifest.schema, "public");
        assert_eq!(manifest.principal, Principal::Anonymous);
        assert_eq!(manifest.resources.len(), 2);
    }

    #[test]
    fn test_parse_manifest_explicit() {
        let yaml = r#"
schema: app
principal: web_anon
resources: [users]
"#;
        let manifest = ProvisionManifest::from_yaml(yaml).unwrap();
        assert_eq!(manifest.schema, "app");
        assert_eq!(manifest.principal, Principal::Role("web_anon".into()));
    }

    #[test]
    fn test_parse_manifest_rejects_bad_input() {
        assert!(ProvisionManifest::from_yaml("schema: public\n").is_err());
        assert!(ProvisionManifest::from_yaml("resources: []\n").is_err());

        let err = ProvisionManifest::from_yaml("schema: \"Public\"\nresources: [users]\n")
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_IDENTIFIER");
    }

    #[test]
    fn test_load_missing_file() {
        let err = ProvisionManifest::load(Path::new("/nonexistent/rlsp.yaml")).unwrap_err();
        assert_eq!(err.code(), "IO_ERROR");
    }

    #[test]
    fn test_shipped_manifest_matches_builtin() {
        let manifest = ProvisionManifest::from_yaml(include_str!("../../../../config/rlsp.yaml"))
            .unwrap();
        assert_eq!(manifest, ProvisionManifest::builtin());
    }

    #[test]
    fn test_builtin_manifest_is_valid() {
        let manifest = ProvisionManifest::builtin();
        assert!(manifest.validate().is_ok());
        assert_eq!(manifest.resources.len(), 28);
    }
}
