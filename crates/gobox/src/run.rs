use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use gobox_sandbox::RunRequest;

use crate::session::Session;
use crate::util::{exit_code, parse_key_val};

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Guest module path inside the instance.
    #[arg(value_name = "MODULE")]
    pub module: String,

    /// Working directory of the guest.
    #[arg(long, value_name = "DIR", default_value = "/")]
    pub cwd: String,

    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub env: Vec<(String, String)>,

    /// Cancel the guest through its hook after this many milliseconds.
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

pub async fn cmd_run(session: &Session, args: RunArgs) -> Result<ExitCode> {
    let mut req = RunRequest::new(args.module, args.cwd).args(args.args);
    for (k, v) in args.env {
        req = req.env(k, v);
    }

    let handle = session.sandbox.run(&session.fs, req);
    let code = match args.timeout_ms {
        None => handle.wait().await,
        Some(ms) => {
            let canceller = handle.canceller();
            let mut wait = Box::pin(handle.wait());
            match tokio::time::timeout(Duration::from_millis(ms), &mut wait).await {
                Ok(code) => code,
                Err(_) => {
                    if let Err(err) = canceller.cancel().await {
                        tracing::warn!(target: "gobox::cli", "cannot cancel guest: {err}");
                    }
                    wait.await
                }
            }
        }
    };
    tracing::debug!(target: "gobox::cli", code, "guest finished");
    Ok(exit_code(code))
}
