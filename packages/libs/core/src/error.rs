//! 공통 에러 타입
//!
//! 프로비저너 전체에서 사용되는 에러 타입을 정의합니다.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// rlsp 공통 에러
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────────
    // Manifest Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("manifest parse error: {message}")]
    ManifestParse { message: String },

    #[error("invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },

    #[error("duplicate resource name: {name}")]
    DuplicateResource { name: String },

    #[error("resource set is empty")]
    EmptyResourceSet,

    // ─────────────────────────────────────────────────────────────────────────────
    // Provisioning Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("resource not found: {schema}.{resource}")]
    ResourceNotFound { schema: String, resource: String },

    #[error("permission denied: {message}")]
    Permission { message: String },

    #[error("policy conflict on '{resource}': policy '{policy}' {reason}")]
    PolicyConflict {
        resource: String,
        policy: String,
        reason: String,
    },

    #[error("catalog error: {message}")]
    Catalog { message: String },

    // ─────────────────────────────────────────────────────────────────────────────
    // IO/Serialization Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// 에러 코드 (출력용)
    pub fn code(&self) -> &'static str {
        match self {
            Error::ManifestParse { .. } => "MANIFEST_PARSE_ERROR",
            Error::InvalidIdentifier { .. } => "INVALID_IDENTIFIER",
            Error::DuplicateResource { .. } => "DUPLICATE_RESOURCE",
            Error::EmptyResourceSet => "EMPTY_RESOURCE_SET",
            Error::ResourceNotFound { .. } => "RESOURCE_NOT_FOUND",
            Error::Permission { .. } => "PERMISSION_DENIED",
            Error::PolicyConflict { .. } => "POLICY_CONFLICT",
            Error::Catalog { .. } => "CATALOG_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Yaml(_) => "YAML_ERROR",
            Error::Json(_) => "JSON_ERROR",
        }
    }

    /// 프로세스 종료 코드로 변환
    pub fn exit_code(&self) -> i32 {
        match self {
            // 설정/입력 오류
            Error::ManifestParse { .. }
            | Error::InvalidIdentifier { .. }
            | Error::DuplicateResource { .. }
            | Error::EmptyResourceSet
            | Error::Yaml(_)
            | Error::Json(_) => 2,

            Error::ResourceNotFound { .. } => 3,
            Error::Permission { .. } => 4,
            Error::PolicyConflict { .. } => 5,

            Error::Catalog { .. } | Error::Io(_) => 1,
        }
    }

    pub fn resource_not_found(schema: &str, resource: &str) -> Self {
        Error::ResourceNotFound {
            schema: schema.to_string(),
            resource: resource.to_string(),
        }
    }
}
