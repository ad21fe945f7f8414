//! 보호 대상 리소스(테이블) 정의
//!
//! 리소스 이름은 Postgres 식별자 규칙을 따르며, 프로비저너는 이 이름을
//! 그대로 DDL에 사용하므로 생성 시점에 검증합니다.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Postgres 식별자 최대 길이 (NAMEDATALEN - 1)
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// 기본 보호 대상 테이블 목록
const BUILTIN_RESOURCES: [&str; 28] = [
    // users
    "users",
    // referral / reward tracking
    "referrals",
    "pending_referrals",
    "achievements",
    "user_achievements",
    "balance_history",
    // AI subsystem
    "ai_conversations",
    "user_ai_sessions",
    "ai_knowledge_base",
    "ai_learned_facts",
    "ai_learned_data",
    "ai_usage_log",
    "lead_cards",
    // admin audit / messaging
    "admin_audit_log",
    "admin_actions",
    "admin_messages",
    "admin_settings",
    "broadcast_history",
    // support / application workflow
    "applications",
    "sos_requests",
    "support_tickets",
    "offers",
    "university_lessons",
    "university_progress",
    // commerce
    "shop_items",
    "shop_purchases",
    "user_cart",
    "news_subscriptions",
];

/// 검증된 리소스 이름
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ResourceName(String);

impl ResourceName {
    /// 문자열에서 파싱 (식별자 검증 포함)
    pub fn parse(name: &str) -> Result<Self> {
        validate_identifier(name)?;
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ResourceName {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        ResourceName::parse(&value).map_err(serde::de::Error::custom)
    }
}

/// 소문자 unquoted Postgres 식별자 검증
///
/// 대문자나 공백이 들어간 이름은 quoting 여부에 따라 다른 객체를 가리키게
/// 되므로 허용하지 않습니다.
pub fn validate_identifier(name: &str) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidIdentifier {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let mut chars = name.chars();
    let first = chars.next().ok_or_else(|| invalid("empty identifier"))?;

    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(invalid("longer than 63 bytes"));
    }
    if !(first.is_ascii_lowercase() || first == '_') {
        return Err(invalid("must start with a lowercase letter or underscore"));
    }
    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '$') {
        return Err(invalid("only lowercase letters, digits, '_' and '$' are allowed"));
    }

    Ok(())
}

/// 순서가 있는 중복 없는 리소스 집합
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResourceSet {
    resources: Vec<ResourceName>,
}

impl ResourceSet {
    /// 리소스 목록으로 생성 (빈 목록, 중복 거부)
    pub fn new(resources: Vec<ResourceName>) -> Result<Self> {
        if resources.is_empty() {
            return Err(Error::EmptyResourceSet);
        }

        let mut seen = std::collections::HashSet::new();
        for r in &resources {
            if !seen.insert(r.as_str()) {
                return Err(Error::DuplicateResource {
                    name: r.to_string(),
                });
            }
        }

        Ok(Self { resources })
    }

    /// 문자열 목록에서 생성
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let resources = names
            .into_iter()
            .map(|n| ResourceName::parse(n.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::new(resources)
    }

    /// 기본 내장 목록
    pub fn builtin() -> Self {
        Self {
            resources: BUILTIN_RESOURCES
                .iter()
                .map(|n| ResourceName(n.to_string()))
                .collect(),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResourceName> {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl<'a> IntoIterator for &'a ResourceSet {
    type Item = &'a ResourceName;
    type IntoIter = std::slice::Iter<'a, ResourceName>;

    fn into_iter(self) -> Self::IntoIter {
        self.resources.iter()
    }
}

impl<'de> Deserialize<'de> for ResourceSet {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let resources = Vec::<ResourceName>::deserialize(deserializer)?;
        ResourceSet::new(resources).map_err(serde::de::Error::custom)
    }
}
