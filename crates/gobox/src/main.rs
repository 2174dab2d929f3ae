use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use gobox_vfs::BackendKind;
use tracing_subscriber::EnvFilter;

mod build;
mod config;
mod export;
mod run;
mod session;
mod util;

use config::EnvConfig;
use session::{progress_logger, Session};

#[derive(Parser, Debug)]
#[command(name = "gobox")]
#[command(about = "Build and run Go programs inside an in-memory sandbox.", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(long, value_enum, default_value_t = BackendKind::Memory, global = true)]
    backend: BackendKind,

    #[arg(long, value_name = "ID", default_value = "default", global = true)]
    instance: String,

    /// ZIP extracted at `/` before the command runs (the toolchain image).
    #[arg(long, value_name = "PATH", global = true)]
    image: Option<PathBuf>,

    /// ZIP of sources extracted at --dest before the command runs.
    #[arg(long, value_name = "PATH", global = true)]
    source: Option<PathBuf>,

    #[arg(long, value_name = "DIR", default_value = "/src", global = true)]
    dest: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Build a source file or package directory.
    Build(build::BuildArgs),
    /// Run a guest module.
    Run(run::RunArgs),
    /// Export instance paths to a ZIP file on the host.
    Export(export::ExportArgs),
}

fn main() -> ExitCode {
    match try_main() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(2)
        }
    }
}

fn try_main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = EnvConfig::from_env()?;
    init_tracing(&config.log_filter);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("build tokio runtime")?;
    rt.block_on(run_session(cli, config))
}

async fn run_session(cli: Cli, config: EnvConfig) -> Result<ExitCode> {
    let session = Session::open(config, cli.backend, &cli.instance)?;
    if let Some(image) = &cli.image {
        session.load(image, "/", &progress_logger("image")).await?;
    }
    if let Some(source) = &cli.source {
        session
            .load(source, &cli.dest, &progress_logger("source"))
            .await?;
    }

    let code = match cli.command {
        Command::Build(args) => build::cmd_build(&session, args).await?,
        Command::Run(args) => run::cmd_run(&session, args).await?,
        Command::Export(args) => export::cmd_export(&session, args).await?,
    };
    session.close();
    Ok(code)
}

fn init_tracing(filter: &str) {
    let filter =
        EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(config::DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
