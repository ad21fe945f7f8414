//! 보호 대상 리소스 목록

use serde::Serialize;

use rlsp_core::policy::policy_name_for;

use crate::commands::{is_json, print_json};
use crate::config::ProvisionConfig;
use crate::OutputFormat;

#[derive(Serialize)]
struct Entry {
    resource: String,
    policy: String,
}

pub fn list(config: &ProvisionConfig, format: OutputFormat) -> anyhow::Result<()> {
    let manifest = config.load_manifest()?;

    let entries = manifest
        .resources
        .iter()
        .map(|r| {
            Ok(Entry {
                resource: r.to_string(),
                policy: policy_name_for(&manifest.principal, r)?,
            })
        })
        .collect::<rlsp_core::Result<Vec<_>>>()?;

    if is_json(format) {
        return print_json(&serde_json::json!({
            "schema": manifest.schema,
            "principal": manifest.principal,
            "resources": entries,
        }));
    }

    println!(
        "{} resources in schema '{}' (principal: {})",
        entries.len(),
        manifest.schema,
        manifest.principal
    );
    let width = entries.iter().map(|e| e.resource.len()).max().unwrap_or(0);
    for entry in entries {
        println!("  {:<width$}  {}", entry.resource, entry.policy, width = width);
    }

    Ok(())
}
