use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use gobox_archive::export_zip;

use crate::session::{progress_logger, Session};

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Instance paths to include.
    #[arg(required = true, value_name = "PATH")]
    pub roots: Vec<String>,

    /// Host file the ZIP is written to.
    #[arg(long, value_name = "PATH")]
    pub out: PathBuf,
}

pub async fn cmd_export(session: &Session, args: ExportArgs) -> Result<ExitCode> {
    let bytes = export_zip(&session.fs, &args.roots, &progress_logger("export"))
        .await
        .with_context(|| format!("export {}", args.roots.join(", ")))?;
    std::fs::write(&args.out, &bytes)
        .with_context(|| format!("write archive: {}", args.out.display()))?;
    tracing::info!(target: "gobox::cli", out = %args.out.display(), bytes = bytes.len(), "archive written");
    Ok(ExitCode::SUCCESS)
}
