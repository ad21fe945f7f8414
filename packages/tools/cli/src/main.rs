//! rlsp CLI
//!
//! 보호 대상 테이블에 row-level security를 활성화하고
//! anonymous role에 대한 deny-all 정책을 멱등적으로 설치하는 Operator 도구입니다.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use config::ProvisionConfig;

#[derive(Parser)]
#[command(name = "rlsp")]
#[command(author, version, about = "Enable row-level security and provision deny-all anon policies", long_about = None)]
struct Cli {
    /// Postgres URL (overrides DATABASE_URL)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Manifest file (overrides RLSP_MANIFEST, built-in table list when unset)
    #[arg(long, global = true)]
    manifest: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List protected resources and their deny policy names
    Resources,

    /// Print the SQL that apply would run (no database access)
    Plan {
        /// Do not wrap the script in BEGIN/COMMIT
        #[arg(long)]
        no_transaction: bool,
    },

    /// Enable RLS and create missing deny policies
    Apply {
        /// Plan only, no changes
        #[arg(long)]
        dry_run: bool,

        /// Run statements without a surrounding transaction
        #[arg(long)]
        no_transaction: bool,
    },

    /// Report RLS and policy state without changing anything
    Check,
}

/// `check`에서 비준수 리소스가 있을 때의 종료 코드
const EXIT_NOT_COMPLIANT: u8 = 6;

#[tokio::main]
async fn main() -> ExitCode {
    // 환경변수 로드
    dotenvy::dotenv().ok();

    // 로깅 초기화 (stdout은 결과 출력용)
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "rlsp=info,rlsp_core=info,rlsp_sql=info".into()
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            let code = e
                .downcast_ref::<rlsp_core::Error>()
                .map(|err| {
                    eprintln!("error [{}]: {}", err.code(), err);
                    err.exit_code()
                })
                .unwrap_or_else(|| {
                    eprintln!("error: {:#}", e);
                    1
                });
            ExitCode::from(code as u8)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    // 설정 결정 (CLI 옵션 > 환경변수)
    let config = ProvisionConfig::from_env()?.with_overrides(cli.database_url, cli.manifest);

    // 명령 실행
    match cli.command {
        Commands::Resources => commands::resources::list(&config, cli.format)?,

        Commands::Plan { no_transaction } => {
            commands::plan::plan(&config, cli.format, !no_transaction)?
        }

        Commands::Apply { dry_run, no_transaction } => {
            commands::apply::apply(&config, cli.format, dry_run, no_transaction).await?
        }

        Commands::Check => {
            if !commands::check::check(&config, cli.format).await? {
                return Ok(ExitCode::from(EXIT_NOT_COMPLIANT));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
