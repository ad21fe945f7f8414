//! Plan 명령어
//!
//! DB 접속 없이 실행될 SQL을 출력합니다.

use rlsp_core::Provisioner;
use rlsp_sql::PolicyDdl;

use crate::commands::{is_json, print_json};
use crate::config::ProvisionConfig;
use crate::OutputFormat;

pub fn plan(config: &ProvisionConfig, format: OutputFormat, transactional: bool) -> anyhow::Result<()> {
    let manifest = config.load_manifest()?;
    let steps = Provisioner::new(&manifest).plan()?;

    if is_json(format) {
        let statements: Vec<String> = steps
            .iter()
            .map(|step| PolicyDdl::render_step(&manifest.schema, step))
            .collect();
        return print_json(&serde_json::json!({
            "schema": manifest.schema,
            "steps": steps,
            "statements": statements,
        }));
    }

    print!("{}", PolicyDdl::render_script(&manifest.schema, &steps, transactional));
    Ok(())
}
