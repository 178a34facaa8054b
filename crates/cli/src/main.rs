//! # Kinect Stream CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 设备会话生命周期管理
//! - 优雅关闭处理

mod cli;
mod commands;
mod error;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_info, run_pipeline, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging based on CLI options
    init_logging(&cli)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Kinect Stream CLI starting"
    );

    // Execute command
    let result = match &cli.command {
        Commands::Run(args) => run_pipeline(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging (and the metrics endpoint for `run`) based on CLI options
fn init_logging(cli: &Cli) -> Result<()> {
    let metrics_port = match &cli.command {
        Commands::Run(args) if args.metrics_port != 0 && !args.dry_run => Some(args.metrics_port),
        _ => None,
    };

    let config = ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port,
        ..Default::default()
    }
    .with_verbosity(cli.verbose, cli.quiet);

    observability::init_with_config(config)
}
