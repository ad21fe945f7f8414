//! rlsp-sql: Postgres 백엔드
//!
//! RLS/정책 DDL 생성과 sqlx 기반 카탈로그 구현을 제공합니다.
//!
//! # 모듈 구조
//!
//! - `ddl`: `ENABLE ROW LEVEL SECURITY` / `CREATE POLICY` 생성기
//! - `catalog`: `PolicyCatalog`의 Postgres 구현

pub mod catalog;
pub mod ddl;

pub use catalog::{map_db_error, PgCatalog};
pub use ddl::PolicyDdl;
