use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use gobox_build::BuildRequest;
use gobox_contracts::{DEFAULT_TARGET_ARCH, DEFAULT_TARGET_OS};

use crate::session::{progress_logger, Session};
use crate::util::{parse_key_val, parse_target};

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Source file or package directory inside the instance.
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Where the artifact lands inside the instance.
    #[arg(long, short = 'o', value_name = "PATH", default_value = "/out.wasm")]
    pub output: String,

    /// Build tags, comma separated or repeated.
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    #[arg(long, value_name = "OS/ARCH", value_parser = parse_target)]
    pub target: Option<(String, String)>,

    /// Extra build environment entries, applied last.
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub env: Vec<(String, String)>,

    /// Also copy the artifact to this host path.
    #[arg(long, value_name = "PATH")]
    pub save: Option<PathBuf>,
}

pub async fn cmd_build(session: &Session, args: BuildArgs) -> Result<ExitCode> {
    let (os, arch) = args
        .target
        .unwrap_or_else(|| (DEFAULT_TARGET_OS.to_string(), DEFAULT_TARGET_ARCH.to_string()));
    let mut req = BuildRequest::new(args.path, args.output).target(os, arch);
    for tag in args.tags.into_iter().filter(|t| !t.is_empty()) {
        req = req.tag(tag);
    }
    for (k, v) in args.env {
        req = req.env(k, v);
    }

    if let Err(err) = session.builder().build(&req, &progress_logger("build")).await {
        eprintln!("build failed: {err}");
        return Ok(ExitCode::from(1));
    }

    if let Some(host) = &args.save {
        let bytes = session
            .fs
            .read_file(&req.output)
            .with_context(|| format!("read artifact {}", req.output))?;
        std::fs::write(host, &bytes[..])
            .with_context(|| format!("write artifact: {}", host.display()))?;
    }
    Ok(ExitCode::SUCCESS)
}
