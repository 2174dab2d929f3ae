use std::io::Write as _;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use gobox_archive::import_zip;
use gobox_build::Builder;
use gobox_contracts::PROGRESS_IDLE;
use gobox_sandbox::Sandbox;
use gobox_vfs::{BackendKind, Progress, Registry, Vfs};

use crate::config::EnvConfig;

/// Share of a host load spent reading the archive; the import gets the rest.
const HOST_READ_SHARE: f64 = 0.5;

/// One filesystem instance plus the sandbox that runs guests on it.
pub struct Session {
    pub fs: Vfs,
    pub sandbox: Sandbox,
    pub config: EnvConfig,
    registry: Registry,
}

impl Session {
    pub fn open(config: EnvConfig, backend: BackendKind, instance: &str) -> Result<Self> {
        let registry = Registry::new(config.vfs_config());
        let fs = registry
            .open(backend, instance)
            .with_context(|| format!("open {backend} instance {instance:?}"))?;
        fs.set_output_sink(|line| {
            let mut out = std::io::stdout().lock();
            let _ = writeln!(out, "{line}");
        });
        let sandbox = Sandbox::new(config.sandbox_config()).context("create sandbox")?;
        tracing::debug!(target: "gobox::cli", instance, %backend, "session opened");
        Ok(Session {
            fs,
            sandbox,
            config,
            registry,
        })
    }

    pub fn builder(&self) -> Builder {
        Builder::new(self.fs.clone(), self.sandbox.clone(), self.config.toolchain())
    }

    /// Extracts a host ZIP file into `dest` inside the instance.
    pub async fn load(&self, host: &Path, dest: &str, progress: &Progress) -> Result<()> {
        let bytes =
            std::fs::read(host).with_context(|| format!("read archive: {}", host.display()))?;
        progress.report(HOST_READ_SHARE);
        import_zip(&self.fs, &bytes, dest, &progress.scoped(HOST_READ_SHARE, 1.0))
            .await
            .with_context(|| format!("import {} at {dest}", host.display()))?;
        tracing::info!(target: "gobox::cli", archive = %host.display(), dest, "archive loaded");
        Ok(())
    }

    pub fn close(self) {
        self.fs.flush_output();
        self.registry.close(self.fs.id());
    }
}

/// Progress sink that logs whenever the fraction moved by a tenth or finished.
pub fn progress_logger(task: &'static str) -> Progress {
    let last = Mutex::new(PROGRESS_IDLE);
    Progress::new(move |fraction| {
        let mut last = last.lock().unwrap_or_else(PoisonError::into_inner);
        if fraction >= 1.0 || fraction - *last >= 0.1 {
            *last = fraction;
            tracing::info!(
                target: "gobox::cli",
                task,
                percent = (fraction * 100.0).round() as u32,
                "progress"
            );
        }
        if fraction >= 1.0 {
            *last = PROGRESS_IDLE;
        }
    })
}
