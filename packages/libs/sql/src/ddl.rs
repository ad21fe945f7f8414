//! RLS 관련 DDL 생성기
//!
//! SeaQuery에는 `ENABLE ROW LEVEL SECURITY` / `CREATE POLICY` 빌더가 없으므로
//! 문장 골격은 직접 조립하고, 식별자 quoting만 SeaQuery의 Postgres 규칙을 사용합니다.

use sea_query::{Iden, PostgresQueryBuilder, QuotedBuilder};

use rlsp_core::policy::{AccessPolicy, Principal};
use rlsp_core::provisioner::ProvisionStep;
use rlsp_core::resource::ResourceName;

/// 동적 식별자
#[derive(Debug, Clone)]
struct DynIden(String);

impl Iden for DynIden {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(s, "{}", self.0).unwrap();
    }
}

/// `"name"` 형태로 quoting
fn quote_ident(name: &str) -> String {
    let mut s = String::new();
    DynIden(name.to_string()).prepare(&mut s, PostgresQueryBuilder.quote());
    s
}

/// `'value'` 형태의 문자열 리터럴
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `"schema"."table"`
fn qualified_table(schema: &str, resource: &ResourceName) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(resource.as_str()))
}

fn role_spec(principal: &Principal) -> String {
    match principal {
        // PUBLIC은 키워드이므로 quoting하면 다른 role이 됨
        Principal::Public => "PUBLIC".to_string(),
        other => quote_ident(other.as_str()),
    }
}

pub struct PolicyDdl;

impl PolicyDdl {
    /// `ALTER TABLE ... ENABLE ROW LEVEL SECURITY`
    pub fn enable_rls(schema: &str, resource: &ResourceName) -> String {
        format!(
            "ALTER TABLE {} ENABLE ROW LEVEL SECURITY",
            qualified_table(schema, resource)
        )
    }

    /// `CREATE POLICY ...`
    ///
    /// predicate는 그대로 삽입되므로 프로비저너가 만든 정책에만 사용합니다.
    pub fn create_policy(schema: &str, policy: &AccessPolicy) -> String {
        let mut sql = format!(
            "CREATE POLICY {} ON {} AS {} FOR {} TO {}",
            quote_ident(&policy.name),
            qualified_table(schema, &policy.resource),
            if policy.permissive { "PERMISSIVE" } else { "RESTRICTIVE" },
            policy.command.as_sql(),
            role_spec(&policy.principal),
        );
        if let Some(predicate) = &policy.predicate {
            sql.push_str(&format!(" USING ({})", predicate));
        }
        sql
    }

    /// 정책이 없을 때만 생성하는 `DO` 블록 (psql 등에서 단독 실행 가능)
    pub fn create_policy_if_absent(schema: &str, policy: &AccessPolicy) -> String {
        format!(
            "DO $$\nBEGIN\n    IF NOT EXISTS (\n        SELECT 1 FROM pg_catalog.pg_policies\n        WHERE schemaname = {} AND tablename = {} AND policyname = {}\n    ) THEN\n        {};\n    END IF;\nEND\n$$",
            quote_literal(schema),
            quote_literal(policy.resource.as_str()),
            quote_literal(&policy.name),
            Self::create_policy(schema, policy),
        )
    }

    /// 계획 단계를 SQL로 변환
    pub fn render_step(schema: &str, step: &ProvisionStep) -> String {
        match step {
            ProvisionStep::Enforce { resource } => Self::enable_rls(schema, resource),
            ProvisionStep::EnsurePolicy { policy } => Self::create_policy_if_absent(schema, policy),
        }
    }

    /// 전체 계획을 하나의 스크립트로 변환
    pub fn render_script(schema: &str, steps: &[ProvisionStep], transactional: bool) -> String {
        let mut out = String::new();
        if transactional {
            out.push_str("BEGIN;\n\n");
        }
        for step in steps {
            out.push_str(&Self::render_step(schema, step));
            out.push_str(";\n");
        }
        if transactional {
            out.push_str("\nCOMMIT;\n");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rlsp_core::{ProvisionManifest, Provisioner, ResourceSet};

    fn users() -> ResourceName {
        ResourceName::parse("users").unwrap()
    }

    #[test]
    fn test_enable_rls() {
        let sql = PolicyDdl::enable_rls("public", &users());
        assert_eq!(sql, "ALTER TABLE \"public\".\"users\" ENABLE ROW LEVEL SECURITY");
    }

    #[test]
    fn test_create_deny_policy() {
        let policy = AccessPolicy::deny_all(&users(), &Principal::Anonymous).unwrap();
        let sql = PolicyDdl::create_policy("public", &policy);
        assert_eq!(
            sql,
            "CREATE POLICY \"deny_anon_users\" ON \"public\".\"users\" AS PERMISSIVE FOR ALL TO \"anon\" USING (false)"
        );
    }

    #[test]
    fn test_public_role_is_keyword() {
        let policy = AccessPolicy::deny_all(&users(), &Principal::Public).unwrap();
        let sql = PolicyDdl::create_policy("public", &policy);
        assert!(sql.contains("TO PUBLIC USING"));
    }

    #[test]
    fn test_create_policy_if_absent() {
        let policy = AccessPolicy::deny_all(&users(), &Principal::Anonymous).unwrap();
        let sql = PolicyDdl::create_policy_if_absent("public", &policy);

        assert!(sql.starts_with("DO $$"));
        assert!(sql.contains(
            "WHERE schemaname = 'public' AND tablename = 'users' AND policyname = 'deny_anon_users'"
        ));
        assert!(sql.contains("CREATE POLICY \"deny_anon_users\""));
        assert!(sql.ends_with("$$"));
    }

    #[test]
    fn test_render_script() {
        let manifest = ProvisionManifest {
            resources: ResourceSet::from_names(["users", "offers"]).unwrap(),
            ..ProvisionManifest::builtin()
        };
        let steps = Provisioner::new(&manifest).plan().unwrap();
        let script = PolicyDdl::render_script(&manifest.schema, &steps, true);

        assert!(script.starts_with("BEGIN;"));
        assert!(script.trim_end().ends_with("COMMIT;"));
        assert_eq!(script.matches("ENABLE ROW LEVEL SECURITY").count(), 2);
        assert_eq!(script.matches("CREATE POLICY").count(), 2);

        let enable_offers = script.find("\"offers\" ENABLE").unwrap();
        let first_policy = script.find("DO $$").unwrap();
        assert!(enable_offers < first_policy);
    }
}
