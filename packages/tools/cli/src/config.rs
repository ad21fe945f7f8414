//! CLI 설정
//!
//! 환경변수에서 기본값을 읽고, CLI 옵션이 있으면 그 값을 우선합니다.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use sqlx::postgres::{PgPool, PgPoolOptions};

use rlsp_core::ProvisionManifest;

/// CLI 설정
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    /// Postgres 접속 URL
    pub database_url: Option<String>,

    /// 매니페스트 파일 경로 (없으면 내장 목록)
    pub manifest_path: Option<PathBuf>,

    /// 커넥션 풀 크기
    pub max_connections: u32,

    /// 접속 타임아웃 (초)
    pub connect_timeout_secs: u64,
}

impl ProvisionConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),

            manifest_path: env::var("RLSP_MANIFEST")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),

            max_connections: env::var("RLSP_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .context("RLSP_MAX_CONNECTIONS must be a positive integer")?,

            connect_timeout_secs: env::var("RLSP_CONNECT_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("RLSP_CONNECT_TIMEOUT_SECS must be an integer")?,
        })
    }

    /// CLI 옵션 적용 (CLI 옵션 > 환경변수)
    pub fn with_overrides(mut self, database_url: Option<String>, manifest: Option<PathBuf>) -> Self {
        if database_url.is_some() {
            self.database_url = database_url;
        }
        if manifest.is_some() {
            self.manifest_path = manifest;
        }
        self
    }

    /// database_url 필수 검증
    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Database URL not configured. Use --database-url or set DATABASE_URL"))
    }

    /// 매니페스트 결정
    pub fn load_manifest(&self) -> anyhow::Result<ProvisionManifest> {
        match &self.manifest_path {
            Some(path) => {
                let manifest = ProvisionManifest::load(path)?;
                tracing::debug!("Loaded manifest from {}", path.display());
                Ok(manifest)
            }
            None => Ok(ProvisionManifest::builtin()),
        }
    }

    /// 커넥션 풀 생성
    pub async fn connect(&self) -> anyhow::Result<PgPool> {
        let url = self.require_database_url()?;
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(self.connect_timeout_secs))
            .connect(url)
            .await
            .context("db connect failed")?;
        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ProvisionConfig {
        ProvisionConfig {
            database_url: Some("postgres://env/db".to_string()),
            manifest_path: None,
            max_connections: 1,
            connect_timeout_secs: 10,
        }
    }

    #[test]
    fn test_cli_overrides_env() {
        let config = base().with_overrides(
            Some("postgres://cli/db".to_string()),
            Some(PathBuf::from("rlsp.yaml")),
        );
        assert_eq!(config.database_url.as_deref(), Some("postgres://cli/db"));
        assert_eq!(config.manifest_path, Some(PathBuf::from("rlsp.yaml")));
    }

    #[test]
    fn test_missing_override_keeps_env() {
        let config = base().with_overrides(None, None);
        assert_eq!(config.require_database_url().unwrap(), "postgres://env/db");
    }

    #[test]
    fn test_require_database_url() {
        let config = ProvisionConfig {
            database_url: None,
            ..base()
        };
        assert!(config.require_database_url().is_err());
    }

    #[test]
    fn test_builtin_manifest_when_no_path() {
        let manifest = base().load_manifest().unwrap();
        assert_eq!(manifest.resources.len(), 28);
    }
}
