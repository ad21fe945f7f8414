//! 정책 카탈로그 추상화
//!
//! 프로비저너는 RLS 플래그와 정책 카탈로그에만 접근합니다.
//! 실제 Postgres 구현은 `rlsp-sql`에 있고, 여기서는 트레이트와
//! 테스트/dry-run용 인메모리 구현을 제공합니다.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::policy::AccessPolicy;
use crate::resource::ResourceName;

/// RLS 플래그 + 정책 카탈로그
#[async_trait]
pub trait PolicyCatalog: Send {
    /// 리소스(테이블) 존재 여부
    async fn resource_exists(&mut self, schema: &str, resource: &ResourceName) -> Result<bool>;

    /// RLS 활성화 여부 (리소스가 없으면 `ResourceNotFound`)
    async fn is_enforced(&mut self, schema: &str, resource: &ResourceName) -> Result<bool>;

    /// RLS 활성화 (이미 활성화된 경우 no-op)
    async fn enable_enforcement(&mut self, schema: &str, resource: &ResourceName) -> Result<()>;

    /// `(resource, name)`으로 정책 조회
    async fn find_policy(
        &mut self,
        schema: &str,
        resource: &ResourceName,
        name: &str,
    ) -> Result<Option<AccessPolicy>>;

    /// 정책 생성 (같은 이름이 이미 있으면 `PolicyConflict`)
    async fn create_policy(&mut self, schema: &str, policy: &AccessPolicy) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
struct TableState {
    enforced: bool,
    policies: Vec<AccessPolicy>,
}

/// 인메모리 카탈로그
#[derive(Debug, Clone)]
pub struct MemoryCatalog {
    tables: BTreeMap<(String, String), TableState>,
    privileged: bool,
    created: usize,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self {
            tables: BTreeMap::new(),
            privileged: true,
            created: 0,
        }
    }
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 주어진 테이블들이 존재하는 카탈로그
    pub fn with_tables<I, S>(schema: &str, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut catalog = Self::new();
        for name in names {
            catalog.add_table(schema, name.as_ref());
        }
        catalog
    }

    pub fn add_table(&mut self, schema: &str, name: &str) {
        self.tables
            .entry((schema.to_string(), name.to_string()))
            .or_default();
    }

    /// 실행 주체의 권한 설정 (false면 변경 작업이 `Permission`으로 실패)
    pub fn set_privileged(&mut self, privileged: bool) {
        self.privileged = privileged;
    }

    /// 기존 정책 주입 (프로비저너를 거치지 않음)
    pub fn insert_policy(&mut self, schema: &str, policy: AccessPolicy) {
        self.tables
            .entry((schema.to_string(), policy.resource.to_string()))
            .or_default()
            .policies
            .push(policy);
    }

    /// 리소스에 부착된 정책 목록
    pub fn policies(&self, schema: &str, resource: &str) -> &[AccessPolicy] {
        self.tables
            .get(&(schema.to_string(), resource.to_string()))
            .map(|t| t.policies.as_slice())
            .unwrap_or(&[])
    }

    pub fn enforced(&self, schema: &str, resource: &str) -> bool {
        self.tables
            .get(&(schema.to_string(), resource.to_string()))
            .map(|t| t.enforced)
            .unwrap_or(false)
    }

    /// 지금까지 생성된 정책 수
    pub fn created_count(&self) -> usize {
        self.created
    }

    fn table_mut(&mut self, schema: &str, resource: &ResourceName) -> Result<&mut TableState> {
        self.tables
            .get_mut(&(schema.to_string(), resource.to_string()))
            .ok_or_else(|| Error::resource_not_found(schema, resource.as_str()))
    }

    fn require_privilege(&self, resource: &ResourceName) -> Result<()> {
        if self.privileged {
            Ok(())
        } else {
            Err(Error::Permission {
                message: format!("must be owner of table {}", resource),
            })
        }
    }
}

#[async_trait]
impl PolicyCatalog for MemoryCatalog {
    async fn resource_exists(&mut self, schema: &str, resource: &ResourceName) -> Result<bool> {
        Ok(self
            .tables
            .contains_key(&(schema.to_string(), resource.to_string())))
    }

    async fn is_enforced(&mut self, schema: &str, resource: &ResourceName) -> Result<bool> {
        Ok(self.table_mut(schema, resource)?.enforced)
    }

    async fn enable_enforcement(&mut self, schema: &str, resource: &ResourceName) -> Result<()> {
        self.table_mut(schema, resource)?;
        self.require_privilege(resource)?;
        self.table_mut(schema, resource)?.enforced = true;
        Ok(())
    }

    async fn find_policy(
        &mut self,
        schema: &str,
        resource: &ResourceName,
        name: &str,
    ) -> Result<Option<AccessPolicy>> {
        Ok(self
            .policies(schema, resource.as_str())
            .iter()
            .find(|p| p.name == name)
            .cloned())
    }

    async fn create_policy(&mut self, schema: &str, policy: &AccessPolicy) -> Result<()> {
        self.table_mut(schema, &policy.resource)?;
        self.require_privilege(&policy.resource)?;

        let table = self.table_mut(schema, &policy.resource)?;
        if table.policies.iter().any(|p| p.name == policy.name) {
            return Err(Error::PolicyConflict {
                resource: policy.resource.to_string(),
                policy: policy.name.clone(),
                reason: "already exists".to_string(),
            });
        }
        table.policies.push(policy.clone());
        self.created += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Principal;

    fn users() -> ResourceName {
        ResourceName::parse("users").unwrap()
    }

    #[tokio::test]
    async fn test_memory_catalog_create_twice_conflicts() {
        let mut catalog = MemoryCatalog::with_tables("public", ["users"]);
        let policy = AccessPolicy::deny_all(&users(), &Principal::Anonymous).unwrap();

        catalog.create_policy("public", &policy).await.unwrap();
        let err = catalog.create_policy("public", &policy).await.unwrap_err();
        assert_eq!(err.code(), "POLICY_CONFLICT");
        assert_eq!(catalog.policies("public", "users").len(), 1);
    }

    #[tokio::test]
    async fn test_memory_catalog_missing_table() {
        let mut catalog = MemoryCatalog::new();
        assert!(!catalog.resource_exists("public", &users()).await.unwrap());

        let err = catalog.enable_enforcement("public", &users()).await.unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound { .. }));
    }

    #[tokio::test]
    async fn test_memory_catalog_schema_scoped() {
        let mut catalog = MemoryCatalog::with_tables("app", ["users"]);
        assert!(catalog.resource_exists("app", &users()).await.unwrap());
        assert!(!catalog.resource_exists("public", &users()).await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_catalog_unprivileged() {
        let mut catalog = MemoryCatalog::with_tables("public", ["users"]);
        catalog.set_privileged(false);

        let err = catalog.enable_enforcement("public", &users()).await.unwrap_err();
        assert!(matches!(err, Error::Permission { .. }));
        assert!(!catalog.enforced("public", "users"));
    }
}
