//! Postgres 정책 카탈로그
//!
//! `pg_tables` / `pg_class.relrowsecurity` / `pg_policies`를 조회하고
//! DDL을 실행합니다. 트랜잭션 여부는 호출자가 넘기는 커넥션이 결정합니다.

use async_trait::async_trait;
use sqlx::{PgConnection, Row};

use rlsp_core::catalog::PolicyCatalog;
use rlsp_core::policy::{AccessPolicy, PolicyCommand, Principal};
use rlsp_core::resource::ResourceName;
use rlsp_core::{Error, Result};

use crate::ddl::PolicyDdl;

const RESOURCE_EXISTS_SQL: &str = r#"SELECT EXISTS (
    SELECT 1 FROM pg_catalog.pg_tables
    WHERE schemaname = $1 AND tablename = $2
)"#;

const IS_ENFORCED_SQL: &str = r#"SELECT c.relrowsecurity
    FROM pg_catalog.pg_class c
    JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
    WHERE n.nspname = $1 AND c.relname = $2 AND c.relkind IN ('r', 'p')"#;

const FIND_POLICY_SQL: &str = r#"SELECT policyname::text AS policyname,
       permissive,
       roles::text[] AS roles,
       cmd,
       qual
    FROM pg_catalog.pg_policies
    WHERE schemaname = $1 AND tablename = $2 AND policyname = $3"#;

/// sqlx 에러를 공통 에러로 변환
///
/// - `42501` insufficient_privilege → `Permission`
/// - `42P01` undefined_table → `ResourceNotFound`
/// - `42710` duplicate_object → `PolicyConflict`
pub fn map_db_error(err: sqlx::Error, schema: &str, resource: &str, policy: Option<&str>) -> Error {
    if let Some(db_err) = err.as_database_error() {
        match db_err.code().as_deref() {
            Some("42501") => {
                return Error::Permission {
                    message: db_err.message().to_string(),
                }
            }
            Some("42P01") => return Error::resource_not_found(schema, resource),
            Some("42710") => {
                return Error::PolicyConflict {
                    resource: resource.to_string(),
                    policy: policy.unwrap_or_default().to_string(),
                    reason: "was created concurrently".to_string(),
                }
            }
            _ => {}
        }
    }
    Error::Catalog {
        message: err.to_string(),
    }
}

/// `pg_policies.roles` → principal
fn principal_from_roles(roles: &[String]) -> Principal {
    match roles {
        [single] => Principal::from_str(single),
        many => Principal::Role(many.join(",")),
    }
}

/// sqlx 커넥션 기반 카탈로그
pub struct PgCatalog<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgCatalog<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    async fn execute(&mut self, sql: &str, schema: &str, resource: &str, policy: Option<&str>) -> Result<()> {
        tracing::debug!("{}", sql);
        sqlx::query(sql)
            .execute(&mut *self.conn)
            .await
            .map_err(|e| map_db_error(e, schema, resource, policy))?;
        Ok(())
    }
}

#[async_trait]
impl PolicyCatalog for PgCatalog<'_> {
    async fn resource_exists(&mut self, schema: &str, resource: &ResourceName) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(RESOURCE_EXISTS_SQL)
            .bind(schema)
            .bind(resource.as_str())
            .fetch_one(&mut *self.conn)
            .await
            .map_err(|e| map_db_error(e, schema, resource.as_str(), None))
    }

    async fn is_enforced(&mut self, schema: &str, resource: &ResourceName) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(IS_ENFORCED_SQL)
            .bind(schema)
            .bind(resource.as_str())
            .fetch_optional(&mut *self.conn)
            .await
            .map_err(|e| map_db_error(e, schema, resource.as_str(), None))?
            .ok_or_else(|| Error::resource_not_found(schema, resource.as_str()))
    }

    async fn enable_enforcement(&mut self, schema: &str, resource: &ResourceName) -> Result<()> {
        let sql = PolicyDdl::enable_rls(schema, resource);
        self.execute(&sql, schema, resource.as_str(), None).await
    }

    async fn find_policy(
        &mut self,
        schema: &str,
        resource: &ResourceName,
        name: &str,
    ) -> Result<Option<AccessPolicy>> {
        let row = sqlx::query(FIND_POLICY_SQL)
            .bind(schema)
            .bind(resource.as_str())
            .bind(name)
            .fetch_optional(&mut *self.conn)
            .await
            .map_err(|e| map_db_error(e, schema, resource.as_str(), Some(name)))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let decode = |e: sqlx::Error| Error::Catalog {
            message: format!("unexpected pg_policies row for {}: {}", name, e),
        };
        let policy_name: String = row.try_get("policyname").map_err(decode)?;
        let permissive: String = row.try_get("permissive").map_err(decode)?;
        let roles: Vec<String> = row.try_get("roles").map_err(decode)?;
        let cmd: String = row.try_get("cmd").map_err(decode)?;
        let qual: Option<String> = row.try_get("qual").map_err(decode)?;

        let command = PolicyCommand::from_str(&cmd).ok_or_else(|| Error::Catalog {
            message: format!("unknown policy command '{}' on {}", cmd, name),
        })?;

        Ok(Some(AccessPolicy {
            resource: resource.clone(),
            name: policy_name,
            principal: principal_from_roles(&roles),
            command,
            permissive: permissive.eq_ignore_ascii_case("PERMISSIVE"),
            predicate: qual,
        }))
    }

    async fn create_policy(&mut self, schema: &str, policy: &AccessPolicy) -> Result<()> {
        let sql = PolicyDdl::create_policy(schema, policy);
        self.execute(&sql, schema, policy.resource.as_str(), Some(&policy.name))
            .await
    }
}
