//! CLI 명령어 구현

pub mod apply;
pub mod check;
pub mod plan;
pub mod resources;

use serde::Serialize;

use crate::OutputFormat;

/// JSON 출력 (`--format json`)
pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn is_json(format: OutputFormat) -> bool {
    matches!(format, OutputFormat::Json)
}
