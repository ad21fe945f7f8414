//! Apply 명령어
//!
//! RLS 활성화와 deny 정책 생성을 한 번에 적용합니다.
//! 기본적으로 하나의 트랜잭션 안에서 실행되어 중간 실패 시 모두 롤백됩니다.

use rlsp_core::{ProvisionReport, Provisioner};
use rlsp_sql::PgCatalog;

use crate::commands::{is_json, plan, print_json};
use crate::config::ProvisionConfig;
use crate::OutputFormat;

pub async fn apply(
    config: &ProvisionConfig,
    format: OutputFormat,
    dry_run: bool,
    no_transaction: bool,
) -> anyhow::Result<()> {
    if dry_run {
        if !is_json(format) {
            println!("-- [DRY RUN] Would apply the following:");
        }
        return plan::plan(config, format, !no_transaction);
    }

    let manifest = config.load_manifest()?;
    let provisioner = Provisioner::new(&manifest);
    let pool = config.connect().await?;

    let report = if no_transaction {
        tracing::warn!("Running without a transaction; a failure leaves earlier changes in place");
        let mut conn = pool.acquire().await?;
        provisioner.run(&mut PgCatalog::new(&mut conn)).await?
    } else {
        let mut tx = pool.begin().await?;
        let report = provisioner.run(&mut PgCatalog::new(&mut tx)).await?;
        tx.commit().await?;
        report
    };

    pool.close().await;

    if is_json(format) {
        return print_json(&report);
    }
    print_report(&report);
    Ok(())
}

fn print_report(report: &ProvisionReport) {
    println!("Applied to schema '{}'", report.schema);
    println!("  RLS enabled: {} tables", report.enforced.len());
    println!("  Policies created: {}", report.created.len());
    for name in &report.created {
        println!("    + {}", name);
    }
    println!("  Policies already present: {}", report.existing.len());

    if !report.drifted.is_empty() {
        println!("  Policies left unchanged with a different definition: {}", report.drifted.len());
        for entry in &report.drifted {
            println!("    ! {} ({})", entry.policy, entry.issues.join("; "));
        }
    }
}
