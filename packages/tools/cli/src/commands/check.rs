//! Check 명령어
//!
//! 현재 DB 상태를 읽기 전용으로 점검합니다.

use rlsp_core::{ComplianceReport, PolicyState, Provisioner};
use rlsp_sql::PgCatalog;

use crate::commands::{is_json, print_json};
use crate::config::ProvisionConfig;
use crate::OutputFormat;

/// 모든 리소스가 기대 상태면 `true`
pub async fn check(config: &ProvisionConfig, format: OutputFormat) -> anyhow::Result<bool> {
    let manifest = config.load_manifest()?;
    let pool = config.connect().await?;

    let report = {
        let mut conn = pool.acquire().await?;
        Provisioner::new(&manifest)
            .check(&mut PgCatalog::new(&mut conn))
            .await?
    };
    pool.close().await;

    let compliant = report.is_compliant();
    if is_json(format) {
        print_json(&serde_json::json!({
            "compliant": compliant,
            "report": &report,
        }))?;
    } else {
        print_report(&report);
    }

    Ok(compliant)
}

fn print_report(report: &ComplianceReport) {
    println!("Row-level security status for schema '{}'", report.schema);
    for status in &report.resources {
        let detail = if !status.exists {
            "table missing".to_string()
        } else {
            let rls = if status.enforced { "rls on" } else { "rls OFF" };
            let policy = match &status.policy {
                PolicyState::Present => format!("{} present", status.policy_name),
                PolicyState::Missing => format!("{} MISSING", status.policy_name),
                PolicyState::Drifted { issues } => {
                    format!("{} differs: {}", status.policy_name, issues.join("; "))
                }
            };
            format!("{}, {}", rls, policy)
        };
        let mark = if status.is_compliant() { "ok" } else { "!!" };
        println!("  [{}] {}: {}", mark, status.resource, detail);
    }

    let failing = report.non_compliant().count();
    if failing == 0 {
        println!("All {} resources compliant", report.resources.len());
    } else {
        println!("{} of {} resources not compliant", failing, report.resources.len());
    }
}
