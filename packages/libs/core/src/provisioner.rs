//! 정책 프로비저너
//!
//! 1. 모든 리소스에 RLS 활성화
//! 2. 각 리소스에 `deny_anon_<resource>` 정책이 없으면 생성
//!
//! 두 단계 모두 재실행해도 같은 결과가 되도록 구성되어 있습니다.
//! 같은 이름의 정책이 다른 형태로 이미 존재하면 수정하지 않고 drift로 보고합니다.

use serde::Serialize;

use crate::catalog::PolicyCatalog;
use crate::error::{Error, Result};
use crate::manifest::ProvisionManifest;
use crate::policy::AccessPolicy;
use crate::resource::ResourceName;

/// 실행 계획의 한 단계
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ProvisionStep {
    /// RLS 활성화
    Enforce { resource: ResourceName },

    /// 정책이 없으면 생성
    EnsurePolicy { policy: AccessPolicy },
}

/// 기대 형태와 다른 기존 정책
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftEntry {
    pub resource: ResourceName,
    pub policy: String,
    pub issues: Vec<String>,
}

/// `run` 결과
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProvisionReport {
    pub schema: String,

    /// RLS를 활성화한 리소스
    pub enforced: Vec<ResourceName>,

    /// 새로 생성한 정책
    pub created: Vec<String>,

    /// 이미 존재하던 정책
    pub existing: Vec<String>,

    /// 이미 존재하지만 형태가 다른 정책 (수정하지 않음)
    pub drifted: Vec<DriftEntry>,
}

impl ProvisionReport {
    /// 변경 없이 끝난 실행인지
    pub fn is_noop(&self) -> bool {
        self.created.is_empty()
    }
}

/// 리소스별 정책 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PolicyState {
    Missing,
    Present,
    Drifted { issues: Vec<String> },
}

/// 리소스별 점검 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceStatus {
    pub resource: ResourceName,
    pub exists: bool,
    pub enforced: bool,
    pub policy_name: String,
    pub policy: PolicyState,
}

impl ResourceStatus {
    pub fn is_compliant(&self) -> bool {
        self.exists && self.enforced && self.policy == PolicyState::Present
    }
}

/// `check` 결과
#[derive(Debug, Clone, Default, Serialize)]
pub struct ComplianceReport {
    pub schema: String,
    pub resources: Vec<ResourceStatus>,
}

impl ComplianceReport {
    pub fn is_compliant(&self) -> bool {
        self.resources.iter().all(ResourceStatus::is_compliant)
    }

    pub fn non_compliant(&self) -> impl Iterator<Item = &ResourceStatus> {
        self.resources.iter().filter(|s| !s.is_compliant())
    }
}

/// 정책 프로비저너
pub struct Provisioner<'a> {
    manifest: &'a ProvisionManifest,
}

impl<'a> Provisioner<'a> {
    pub fn new(manifest: &'a ProvisionManifest) -> Self {
        Self { manifest }
    }

    /// 리소스별 기대 정책
    fn expected_policy(&self, resource: &ResourceName) -> Result<AccessPolicy> {
        AccessPolicy::deny_all(resource, &self.manifest.principal)
    }

    /// 실행 계획 생성 (카탈로그 접근 없음)
    ///
    /// 모든 Enforce 단계가 EnsurePolicy 단계보다 앞에 옵니다.
    pub fn plan(&self) -> Result<Vec<ProvisionStep>> {
        let resources = &self.manifest.resources;
        let mut steps = Vec::with_capacity(resources.len() * 2);

        for resource in resources {
            steps.push(ProvisionStep::Enforce {
                resource: resource.clone(),
            });
        }
        for resource in resources {
            steps.push(ProvisionStep::EnsurePolicy {
                policy: self.expected_policy(resource)?,
            });
        }

        Ok(steps)
    }

    /// 프로비저닝 실행
    ///
    /// 첫 에러에서 즉시 중단합니다. 이미 적용된 변경의 롤백 여부는
    /// 호출자가 카탈로그를 트랜잭션으로 감쌌는지에 따릅니다.
    pub async fn run<C>(&self, catalog: &mut C) -> Result<ProvisionReport>
    where
        C: PolicyCatalog + ?Sized,
    {
        let schema = self.manifest.schema.as_str();
        let mut report = ProvisionReport {
            schema: schema.to_string(),
            ..Default::default()
        };

        tracing::info!(
            schema,
            resources = self.manifest.resources.len(),
            principal = %self.manifest.principal,
            "Provisioning row-level security"
        );

        // Operation A: enforce
        for resource in &self.manifest.resources {
            if !catalog.resource_exists(schema, resource).await? {
                return Err(Error::resource_not_found(schema, resource.as_str()));
            }
            catalog.enable_enforcement(schema, resource).await?;
            tracing::debug!(resource = %resource, "RLS enabled");
            report.enforced.push(resource.clone());
        }

        // Operation B: deny-provision
        for resource in &self.manifest.resources {
            let expected = self.expected_policy(resource)?;

            match catalog.find_policy(schema, resource, &expected.name).await? {
                None => {
                    catalog.create_policy(schema, &expected).await?;
                    tracing::info!(resource = %resource, policy = %expected.name, "Policy created");
                    report.created.push(expected.name);
                }
                Some(existing) => {
                    let issues = existing.drift_from(&expected);
                    if issues.is_empty() {
                        tracing::debug!(resource = %resource, policy = %expected.name, "Policy already present");
                        report.existing.push(expected.name);
                    } else {
                        tracing::warn!(
                            resource = %resource,
                            policy = %expected.name,
                            "Policy exists with different definition, leaving as is: {}",
                            issues.join("; ")
                        );
                        report.drifted.push(DriftEntry {
                            resource: resource.clone(),
                            policy: expected.name,
                            issues,
                        });
                    }
                }
            }
        }

        tracing::info!(
            enforced = report.enforced.len(),
            created = report.created.len(),
            existing = report.existing.len(),
            drifted = report.drifted.len(),
            "Provisioning finished"
        );

        Ok(report)
    }

    /// 현재 상태 점검 (읽기 전용)
    pub async fn check<C>(&self, catalog: &mut C) -> Result<ComplianceReport>
    where
        C: PolicyCatalog + ?Sized,
    {
        let schema = self.manifest.schema.as_str();
        let mut report = ComplianceReport {
            schema: schema.to_string(),
            resources: Vec::with_capacity(self.manifest.resources.len()),
        };

        for resource in &self.manifest.resources {
            let expected = self.expected_policy(resource)?;

            if !catalog.resource_exists(schema, resource).await? {
                report.resources.push(ResourceStatus {
                    resource: resource.clone(),
                    exists: false,
                    enforced: false,
                    policy_name: expected.name,
                    policy: PolicyState::Missing,
                });
                continue;
            }

            let enforced = catalog.is_enforced(schema, resource).await?;
            let policy = match catalog.find_policy(schema, resource, &expected.name).await? {
                None => PolicyState::Missing,
                Some(existing) => {
                    let issues = existing.drift_from(&expected);
                    if issues.is_empty() {
                        PolicyState::Present
                    } else {
                        PolicyState::Drifted { issues }
                    }
                }
            };

            report.resources.push(ResourceStatus {
                resource: resource.clone(),
                exists: true,
                enforced,
                policy_name: expected.name,
                policy,
            });
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::policy::{PolicyCommand, Principal};
    use crate::resource::ResourceSet;

    fn manifest(names: &[&str]) -> ProvisionManifest {
        ProvisionManifest {
            schema: "public".to_string(),
            principal: Principal::Anonymous,
            resources: ResourceSet::from_names(names.iter().copied()).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_run_creates_policy_and_enforces() {
        let manifest = manifest(&["users"]);
        let mut catalog = MemoryCatalog::with_tables("public", ["users"]);

        let report = Provisioner::new(&manifest).run(&mut catalog).await.unwrap();

        assert!(catalog.enforced("public", "users"));
        let policies = catalog.policies("public", "users");
        assert_eq!(policies.len(), 1);
        assert_eq!(policies[0].name, "deny_anon_users");
        assert_eq!(policies[0].principal, Principal::Anonymous);
        assert_eq!(policies[0].command, PolicyCommand::All);
        assert_eq!(policies[0].predicate.as_deref(), Some("false"));
        assert_eq!(report.created, vec!["deny_anon_users"]);
    }

    #[tokio::test]
    async fn test_run_skips_existing_policy() {
        let manifest = manifest(&["users"]);
        let mut catalog = MemoryCatalog::with_tables("public", ["users"]);
        let users = ResourceName::parse("users").unwrap();
        catalog.insert_policy(
            "public",
            AccessPolicy::deny_all(&users, &Principal::Anonymous).unwrap(),
        );

        let report = Provisioner::new(&manifest).run(&mut catalog).await.unwrap();

        assert!(report.is_noop());
        assert_eq!(report.existing, vec!["deny_anon_users"]);
        assert_eq!(catalog.created_count(), 0);
        assert_eq!(catalog.policies("public", "users").len(), 1);
        assert!(catalog.enforced("public", "users"));
    }

    #[tokio::test]
    async fn test_run_twice_is_idempotent() {
        let manifest = ProvisionManifest::builtin();
        let names: Vec<String> = manifest.resources.iter().map(|r| r.to_string()).collect();
        let mut catalog = MemoryCatalog::with_tables("public", &names);
        let provisioner = Provisioner::new(&manifest);

        let first = provisioner.run(&mut catalog).await.unwrap();
        let after_first = catalog.clone();
        let second = provisioner.run(&mut catalog).await.unwrap();

        assert_eq!(first.created.len(), 28);
        assert!(second.is_noop());
        assert_eq!(second.existing.len(), 28);
        for name in &names {
            assert!(catalog.enforced("public", name));
            assert_eq!(catalog.policies("public", name).len(), 1);
            assert_eq!(
                catalog.policies("public", name),
                after_first.policies("public", name)
            );
        }
        assert!(provisioner.check(&mut catalog).await.unwrap().is_compliant());
    }

    #[tokio::test]
    async fn test_run_missing_resource_fails() {
        let manifest = manifest(&["users", "ghosts", "offers"]);
        let mut catalog = MemoryCatalog::with_tables("public", ["users", "offers"]);

        let err = Provisioner::new(&manifest).run(&mut catalog).await.unwrap_err();

        assert!(matches!(
            &err,
            Error::ResourceNotFound { resource, .. } if resource == "ghosts"
        ));
        // 트랜잭션 없이 실행하면 앞선 리소스 변경은 남고 정책 단계는 시작되지 않음
        assert!(catalog.enforced("public", "users"));
        assert!(!catalog.enforced("public", "offers"));
        assert_eq!(catalog.created_count(), 0);
    }

    #[tokio::test]
    async fn test_run_without_privilege_fails() {
        let manifest = manifest(&["users"]);
        let mut catalog = MemoryCatalog::with_tables("public", ["users"]);
        catalog.set_privileged(false);

        let err = Provisioner::new(&manifest).run(&mut catalog).await.unwrap_err();
        assert_eq!(err.code(), "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn test_drifted_policy_is_left_alone() {
        let manifest = manifest(&["users"]);
        let mut catalog = MemoryCatalog::with_tables("public", ["users"]);
        let users = ResourceName::parse("users").unwrap();
        let mut manual = AccessPolicy::deny_all(&users, &Principal::Anonymous).unwrap();
        manual.predicate = Some("(auth.uid() IS NOT NULL)".to_string());
        catalog.insert_policy("public", manual.clone());

        let provisioner = Provisioner::new(&manifest);
        let report = provisioner.run(&mut catalog).await.unwrap();

        assert_eq!(report.drifted.len(), 1);
        assert_eq!(report.drifted[0].policy, "deny_anon_users");
        assert_eq!(catalog.policies("public", "users"), &[manual]);

        let status = provisioner.check(&mut catalog).await.unwrap();
        assert!(!status.is_compliant());
        assert!(matches!(
            status.resources[0].policy,
            PolicyState::Drifted { .. }
        ));
    }

    #[tokio::test]
    async fn test_check_does_not_mutate() {
        let manifest = manifest(&["users", "offers"]);
        let mut catalog = MemoryCatalog::with_tables("public", ["users"]);

        let report = Provisioner::new(&manifest).check(&mut catalog).await.unwrap();

        assert!(!report.is_compliant());
        assert_eq!(report.non_compliant().count(), 2);
        assert!(report.resources[0].exists);
        assert!(!report.resources[0].enforced);
        assert_eq!(report.resources[0].policy, PolicyState::Missing);
        assert!(!report.resources[1].exists);
        assert!(!catalog.enforced("public", "users"));
        assert_eq!(catalog.created_count(), 0);
    }

    #[test]
    fn test_plan_orders_enforce_before_policies() {
        let manifest = manifest(&["users", "offers"]);
        let steps = Provisioner::new(&manifest).plan().unwrap();

        assert_eq!(steps.len(), 4);
        assert!(matches!(&steps[0], ProvisionStep::Enforce { resource } if resource.as_str() == "users"));
        assert!(matches!(&steps[1], ProvisionStep::Enforce { resource } if resource.as_str() == "offers"));
        assert!(matches!(&steps[2], ProvisionStep::EnsurePolicy { policy } if policy.name == "deny_anon_users"));
        assert!(matches!(&steps[3], ProvisionStep::EnsurePolicy { policy } if policy.name == "deny_anon_offers"));
    }
}
