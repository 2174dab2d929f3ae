use std::collections::{BTreeMap, BTreeSet};

use gobox_contracts::{
    ARTIFACT_FILE_NAME, DEFAULT_DIR_MODE, DEFAULT_TARGET_ARCH, DEFAULT_TARGET_OS,
    ENV_TARGET_ARCH_GUEST, ENV_TARGET_OS_GUEST, ENV_TOOLCHAIN_ROOT_GUEST, PLAN_FILE_NAME,
};
use gobox_sandbox::{RunRequest, Sandbox};
use gobox_vfs::{path, FileType, FsError, Progress, Vfs};
use sha2::{Digest, Sha256};

use crate::error::BuildError;
use crate::plan::parse_plan;
use crate::toolchain::Toolchain;

/// Share of the progress range the driver step accounts for.
const DRIVER_SHARE: f64 = 0.25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub source: String,
    pub output: String,
    pub tags: Vec<String>,
    pub target_os: String,
    pub target_arch: String,
    /// Applied over the default build environment.
    pub env: BTreeMap<String, String>,
}

impl BuildRequest {
    pub fn new(source: impl Into<String>, output: impl Into<String>) -> Self {
        BuildRequest {
            source: source.into(),
            output: output.into(),
            tags: Vec::new(),
            target_os: DEFAULT_TARGET_OS.to_string(),
            target_arch: DEFAULT_TARGET_ARCH.to_string(),
            env: BTreeMap::new(),
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn target(mut self, os: impl Into<String>, arch: impl Into<String>) -> Self {
        self.target_os = os.into();
        self.target_arch = arch.into();
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    fn sorted_tags(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self.tags.iter().map(String::as_str).collect();
        set.into_iter().collect()
    }
}

/// Drives the toolchain's helper modules to turn a source tree into an artifact.
#[derive(Debug, Clone)]
pub struct Builder {
    fs: Vfs,
    sandbox: Sandbox,
    toolchain: Toolchain,
}

impl Builder {
    pub fn new(fs: Vfs, sandbox: Sandbox, toolchain: Toolchain) -> Self {
        Builder {
            fs,
            sandbox,
            toolchain,
        }
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    /// Scratch directory shared by every build with the same target and tag set.
    pub fn scratch_dir(&self, req: &BuildRequest) -> String {
        let tags = req.sorted_tags().join(",");
        let digest = format!("{:x}", Sha256::digest(tags.as_bytes()));
        let key = format!("{}_{}_{}", req.target_os, req.target_arch, &digest[..16]);
        path::join(&self.toolchain.scratch_root, &key)
    }

    pub fn build_env(&self, req: &BuildRequest) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert(
            ENV_TOOLCHAIN_ROOT_GUEST.to_string(),
            self.toolchain.root.clone(),
        );
        env.insert(ENV_TARGET_OS_GUEST.to_string(), req.target_os.clone());
        env.insert(ENV_TARGET_ARCH_GUEST.to_string(), req.target_arch.clone());
        env.extend(req.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        env
    }

    /// Runs the driver, then every plan step in order, then moves the
    /// artifact to `req.output`.
    ///
    /// Any failure ends the build before anything is written at the output
    /// path. The plan and artifact of an earlier build in the same scratch
    /// directory are removed first; everything else there is left as is.
    pub async fn build(&self, req: &BuildRequest, progress: &Progress) -> Result<(), BuildError> {
        let fs = &self.fs;
        // resolve up front: guest runs move the instance's cwd
        let source = path::normalize(&fs.resolve(&req.source));
        let output = path::normalize(&fs.resolve(&req.output));
        let scratch = self.scratch_dir(req);
        let env = self.build_env(req);
        tracing::info!(target: "gobox::build", source = %source, output = %output, scratch = %scratch, "build started");

        fs.mkdir_all(&scratch, DEFAULT_DIR_MODE)?;
        let plan_path = path::join(&scratch, PLAN_FILE_NAME);
        let artifact_path = path::join(&scratch, ARTIFACT_FILE_NAME);
        for stale in [&plan_path, &artifact_path] {
            match fs.unlink(stale) {
                Ok(()) | Err(FsError::NotFound(_)) => {}
                Err(err) => return Err(err.into()),
            }
        }

        let stat = fs.stat(&source)?;
        let (target, cwd) = match stat.file_type() {
            FileType::Directory => (".".to_string(), source.clone()),
            FileType::File => match path::split_parent(&source) {
                Some((parent, name)) => (name.to_string(), parent.to_string()),
                None => (source.clone(), path::ROOT.to_string()),
            },
            kind => {
                return Err(BuildError::UnsupportedSource { path: source, kind });
            }
        };

        let driver = RunRequest {
            module: self.toolchain.driver.clone(),
            args: vec![target, scratch.clone(), req.sorted_tags().join(",")],
            working_dir: cwd,
            env: env.clone(),
        };
        self.step(driver).await?;
        progress.report(DRIVER_SHARE);

        let plan_bytes = match fs.read_file(&plan_path) {
            Ok(bytes) => bytes,
            Err(FsError::NotFound(_)) => return Err(BuildError::PlanMissing { path: plan_path }),
            Err(err) => return Err(err.into()),
        };
        let plan = parse_plan(&plan_path, &plan_bytes)?;
        tracing::debug!(target: "gobox::build", steps = plan.len(), "plan loaded");

        let total = plan.len();
        for (i, command) in plan.into_iter().enumerate() {
            let step = RunRequest {
                module: self.toolchain.tool_path(&command.tool),
                args: command.args,
                working_dir: scratch.clone(),
                env: env.clone(),
            };
            self.step(step).await.map_err(|err| match err {
                BuildError::ToolFailure { code, .. } => BuildError::ToolFailure {
                    tool: command.tool.clone(),
                    code,
                },
                other => other,
            })?;
            progress.report(DRIVER_SHARE + (1.0 - DRIVER_SHARE) * (i + 1) as f64 / total as f64);
        }

        fs.rename(&artifact_path, &output)?;
        if total == 0 {
            progress.report(1.0);
        }
        tracing::info!(target: "gobox::build", output = %output, "build finished");
        Ok(())
    }

    async fn step(&self, req: RunRequest) -> Result<(), BuildError> {
        tracing::debug!(target: "gobox::build", module = %req.module, args = ?req.args, "running step");
        let module = req.module.clone();
        let code = self.sandbox.run(&self.fs, req).wait().await;
        if code != 0 {
            tracing::warn!(target: "gobox::build", module = %module, code, "build step failed");
            return Err(BuildError::ToolFailure { tool: module, code });
        }
        Ok(())
    }
}
