//! rlsp-core: RLS 프로비저닝 핵심 라이브러리
//!
//! 보호 대상 테이블에 row-level security를 활성화하고,
//! anonymous role에 대한 deny-all 정책을 멱등적으로 설치합니다.
//!
//! # 모듈 구조
//!
//! - `resource`: 리소스 이름 검증 및 리소스 집합
//! - `manifest`: 프로비저닝 대상 정의 (YAML)
//! - `policy`: 정책 구조 및 deny-all 형태
//! - `catalog`: 카탈로그 트레이트와 인메모리 구현
//! - `provisioner`: plan / run / check
//! - `error`: 공통 에러 타입

pub mod catalog;
pub mod error;
pub mod manifest;
pub mod policy;
pub mod provisioner;
pub mod resource;

pub use catalog::{MemoryCatalog, PolicyCatalog};
pub use error::{Error, Result};
pub use manifest::ProvisionManifest;
pub use policy::{AccessPolicy, PolicyCommand, Principal};
pub use provisioner::{
    ComplianceReport, PolicyState, ProvisionReport, ProvisionStep, Provisioner, ResourceStatus,
};
pub use resource::{ResourceName, ResourceSet};
