//! 접근 정책 정의
//!
//! Postgres `CREATE POLICY`로 생성되는 정책의 구조와,
//! 프로비저너가 설치하는 deny-all 정책의 고정 형태를 정의합니다.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::resource::{validate_identifier, ResourceName, MAX_IDENTIFIER_LEN};

/// deny-all 정책의 predicate
pub const DENY_PREDICATE: &str = "false";

/// 정책 대상 principal (Postgres role)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Principal {
    /// 인증되지 않은 호출자 (`anon`)
    #[default]
    Anonymous,

    /// 모든 role (`PUBLIC`)
    Public,

    /// 특정 role
    Role(String),
}

impl Principal {
    /// 문자열에서 파싱
    pub fn from_str(s: &str) -> Self {
        match s {
            "anon" => Principal::Anonymous,
            "public" | "PUBLIC" => Principal::Public,
            role => Principal::Role(role.to_string()),
        }
    }

    /// role 이름
    pub fn as_str(&self) -> &str {
        match self {
            Principal::Anonymous => "anon",
            Principal::Public => "public",
            Principal::Role(role) => role,
        }
    }

    /// DDL에 사용 가능한 role 이름인지 검증
    pub fn validate(&self) -> Result<()> {
        match self {
            Principal::Anonymous | Principal::Public => Ok(()),
            Principal::Role(role) => validate_identifier(role),
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Principal {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        let principal = Principal::from_str(value.as_str());
        principal.validate().map_err(serde::de::Error::custom)?;
        Ok(principal)
    }
}

/// 정책이 적용되는 작업 범위 (`FOR ...`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyCommand {
    All,
    Select,
    Insert,
    Update,
    Delete,
}

impl PolicyCommand {
    /// 문자열에서 파싱 (`pg_policies.cmd` 값 포함)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "all" | "*" => Some(PolicyCommand::All),
            "select" | "r" => Some(PolicyCommand::Select),
            "insert" | "a" => Some(PolicyCommand::Insert),
            "update" | "w" => Some(PolicyCommand::Update),
            "delete" | "d" => Some(PolicyCommand::Delete),
            _ => None,
        }
    }

    /// SQL 키워드
    pub fn as_sql(&self) -> &'static str {
        match self {
            PolicyCommand::All => "ALL",
            PolicyCommand::Select => "SELECT",
            PolicyCommand::Insert => "INSERT",
            PolicyCommand::Update => "UPDATE",
            PolicyCommand::Delete => "DELETE",
        }
    }
}

/// 리소스에 부착된 정책
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessPolicy {
    /// 대상 리소스
    pub resource: ResourceName,

    /// 정책 이름 (리소스 내에서 유일)
    pub name: String,

    /// 대상 principal
    pub principal: Principal,

    /// 작업 범위
    pub command: PolicyCommand,

    /// PERMISSIVE 여부 (false = RESTRICTIVE)
    pub permissive: bool,

    /// USING 조건식
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
}

/// deny 정책 이름 결정: `deny_<principal>_<resource>`
///
/// anonymous principal의 경우 `deny_anon_<resource>`가 됩니다.
pub fn policy_name_for(principal: &Principal, resource: &ResourceName) -> Result<String> {
    let name = format!("deny_{}_{}", principal.as_str(), resource.as_str());
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(Error::InvalidIdentifier {
            name,
            reason: "derived policy name is longer than 63 bytes".to_string(),
        });
    }
    Ok(name)
}

impl AccessPolicy {
    /// deny-all 정책 생성
    ///
    /// 모든 작업(`FOR ALL`)에 대해 항상 false인 조건을 가지는 정책입니다.
    pub fn deny_all(resource: &ResourceName, principal: &Principal) -> Result<Self> {
        Ok(Self {
            resource: resource.clone(),
            name: policy_name_for(principal, resource)?,
            principal: principal.clone(),
            command: PolicyCommand::All,
            permissive: true,
            predicate: Some(DENY_PREDICATE.to_string()),
        })
    }

    /// 주어진 principal에 이 정책이 적용되는지 여부
    pub fn restricts(&self, principal: &Principal) -> bool {
        match &self.principal {
            Principal::Public => true,
            own => own == principal,
        }
    }

    /// 기대 형태와의 차이 목록 (비어 있으면 일치)
    pub fn drift_from(&self, expected: &AccessPolicy) -> Vec<String> {
        let mut issues = Vec::new();

        if self.principal != expected.principal {
            issues.push(format!(
                "principal is '{}', expected '{}'",
                self.principal, expected.principal
            ));
        }
        if self.command != expected.command {
            issues.push(format!(
                "command is {}, expected {}",
                self.command.as_sql(),
                expected.command.as_sql()
            ));
        }
        if self.permissive != expected.permissive {
            issues.push(format!(
                "policy is {}, expected {}",
                permissive_label(self.permissive),
                permissive_label(expected.permissive)
            ));
        }

        let actual = self.predicate.as_deref().map(normalize_predicate);
        let wanted = expected.predicate.as_deref().map(normalize_predicate);
        if actual != wanted {
            issues.push(format!(
                "predicate is {}, expected {}",
                actual.as_deref().unwrap_or("<none>"),
                wanted.as_deref().unwrap_or("<none>")
            ));
        }

        issues
    }
}

fn permissive_label(permissive: bool) -> &'static str {
    if permissive {
        "PERMISSIVE"
    } else {
        "RESTRICTIVE"
    }
}

/// `pg_policies.qual`은 `(false)`처럼 괄호가 붙어 나올 수 있으므로 정규화
///
/// 바깥 괄호가 식 전체를 감쌀 때만 벗겨냅니다. `(a) OR (b)`는 그대로 둡니다.
fn normalize_predicate(predicate: &str) -> String {
    let mut p = predicate.trim();
    while let Some(inner) = strip_enclosing_parens(p) {
        p = inner.trim();
    }
    p.to_lowercase()
}

fn strip_enclosing_parens(p: &str) -> Option<&str> {
    if !(p.starts_with('(') && p.ends_with(')')) {
        return None;
    }

    // 첫 '('에 대응하는 ')'가 마지막 문자여야 함
    let mut depth = 0usize;
    for (i, c) in p.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return (i == p.len() - 1).then(|| &p[1..i]);
                }
            }
            _ => {}
        }
    }
    None
}
