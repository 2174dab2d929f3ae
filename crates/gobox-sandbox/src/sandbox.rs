use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context as _;
use gobox_contracts::{
    CANCELLED_EXIT_CODE, CANCEL_HOOK_PREFIX, ENV_CANCEL_HOOK, FAULT_EXIT_CODE, GUEST_ENTRY_EXPORT,
};
use gobox_vfs::Vfs;
use tokio::task::JoinHandle;
use wasmtime::{Config, Engine, Linker, Module, Store, UpdateDeadline};

use crate::config::SandboxConfig;
use crate::context::{HookTable, RuntimeContext};
use crate::error::{Cancelled, GuestExit, SandboxError};

/// One guest invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunRequest {
    /// Module to load, resolved against `working_dir`.
    pub module: String,
    /// Arguments after `argv[0]`, which is always the resolved module path.
    pub args: Vec<String>,
    pub working_dir: String,
    pub env: BTreeMap<String, String>,
}

impl RunRequest {
    pub fn new(module: impl Into<String>, working_dir: impl Into<String>) -> Self {
        RunRequest {
            module: module.into(),
            working_dir: working_dir.into(),
            ..RunRequest::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Runs WebAssembly guests against filesystem instances.
#[derive(Clone)]
pub struct Sandbox {
    engine: Engine,
    linker: Arc<Linker<RuntimeContext>>,
    config: SandboxConfig,
}

impl std::fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sandbox")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Sandbox {
    pub fn new(config: SandboxConfig) -> Result<Self, SandboxError> {
        let mut wasm = Config::new();
        wasm.async_support(true);
        wasm.consume_fuel(true);
        wasm.epoch_interruption(true);
        let engine = Engine::new(&wasm).map_err(SandboxError::Engine)?;

        let mut linker = Linker::new(&engine);
        crate::abi::link(&mut linker).map_err(SandboxError::Engine)?;

        Ok(Sandbox {
            engine,
            linker: Arc::new(linker),
            config,
        })
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Starts `req` on `fs` and returns immediately.
    ///
    /// The guest runs as a task on the current Tokio runtime once it holds
    /// the instance's execution queue, so runs on one instance never overlap.
    /// Failures never surface here: they are logged and the completion
    /// resolves to `-1`.
    pub fn run(&self, fs: &Vfs, req: RunRequest) -> ExecutionHandle {
        let hook_name = hook_name();
        let hooks = HookTable::default();
        let canceller = Canceller {
            hook_name: hook_name.clone(),
            hooks: hooks.clone(),
            poll_interval: self.config.cancel_poll_interval,
        };

        let sandbox = self.clone();
        let fs = fs.clone();
        let task = tokio::spawn(async move { sandbox.execute(fs, req, hook_name, hooks).await });
        ExecutionHandle { task, canceller }
    }

    async fn execute(&self, fs: Vfs, req: RunRequest, hook_name: String, hooks: HookTable) -> i32 {
        if !self.config.readiness_delay.is_zero() {
            tokio::time::sleep(self.config.readiness_delay).await;
        }
        let queue = fs.execution_queue();
        let _turn = queue.lock().await;

        tracing::debug!(
            target: "gobox::sandbox",
            instance = fs.id(),
            module = %req.module,
            cwd = %req.working_dir,
            "starting guest"
        );
        let outcome = {
            let _cleanup = RunCleanup { fs: &fs, hooks: &hooks };
            self.start(&fs, &req, &hook_name, &hooks).await
        };

        let code = match outcome {
            Ok(code) => code,
            Err(err) => exit_code_for(&req.module, err),
        };
        tracing::debug!(target: "gobox::sandbox", module = %req.module, code, "guest finished");
        code
    }

    async fn start(
        &self,
        fs: &Vfs,
        req: &RunRequest,
        hook_name: &str,
        hooks: &HookTable,
    ) -> anyhow::Result<i32> {
        fs.chdir(&req.working_dir)
            .with_context(|| format!("enter working directory {}", req.working_dir))?;
        let module_path = fs.resolve(&req.module);
        let bytes = fs
            .read_file(&module_path)
            .with_context(|| format!("load module {module_path}"))?;
        let module = Module::new(&self.engine, &bytes[..])
            .with_context(|| format!("compile module {module_path}"))?;

        let mut env = req.env.clone();
        env.insert(ENV_CANCEL_HOOK.to_string(), hook_name.to_string());
        let mut args = Vec::with_capacity(req.args.len() + 1);
        args.push(module_path);
        args.extend(req.args.iter().cloned());

        let ctx = RuntimeContext {
            fs: fs.clone(),
            process: fs.process(),
            args,
            env,
            hooks: hooks.clone(),
            cancel: Arc::new(AtomicBool::new(false)),
            engine: self.engine.clone(),
        };
        let mut store = Store::new(&self.engine, ctx);
        store.set_fuel(u64::MAX)?;
        store.fuel_async_yield_interval(Some(self.config.yield_interval_fuel))?;
        store.set_epoch_deadline(1);
        store.epoch_deadline_callback(|ctx| {
            if ctx.data().cancelled() {
                return Err(Cancelled.into());
            }
            Ok(UpdateDeadline::Continue(1))
        });

        let instance = self.linker.instantiate_async(&mut store, &module).await?;
        let entry = instance.get_typed_func::<(), ()>(&mut store, GUEST_ENTRY_EXPORT)?;
        entry.call_async(&mut store, ()).await?;
        Ok(0)
    }
}

/// Unbinds the run's hooks and flushes buffered guest output when dropped,
/// so a panicking run still releases waiting cancellers.
struct RunCleanup<'a> {
    fs: &'a Vfs,
    hooks: &'a HookTable,
}

impl Drop for RunCleanup<'_> {
    fn drop(&mut self) {
        self.hooks.clear();
        self.fs.flush_output();
    }
}

fn exit_code_for(module: &str, err: anyhow::Error) -> i32 {
    if let Some(GuestExit(code)) = err.downcast_ref::<GuestExit>() {
        return *code;
    }
    if err.downcast_ref::<Cancelled>().is_some() {
        tracing::info!(target: "gobox::sandbox", module, "guest cancelled");
        return CANCELLED_EXIT_CODE;
    }
    tracing::error!(target: "gobox::sandbox", module, "guest failed: {err:#}");
    FAULT_EXIT_CODE
}

/// Completion of one run plus the means to stop it early.
#[derive(Debug)]
pub struct ExecutionHandle {
    task: JoinHandle<i32>,
    canceller: Canceller,
}

impl ExecutionHandle {
    pub fn canceller(&self) -> Canceller {
        self.canceller.clone()
    }

    pub fn hook_name(&self) -> &str {
        &self.canceller.hook_name
    }

    /// Waits for the guest to terminate and returns its exit code.
    pub async fn wait(self) -> i32 {
        match self.task.await {
            Ok(code) => code,
            Err(err) => {
                tracing::error!(target: "gobox::sandbox", "guest task failed: {err}");
                FAULT_EXIT_CODE
            }
        }
    }
}

#[derive(Clone)]
pub struct Canceller {
    hook_name: String,
    hooks: HookTable,
    poll_interval: Duration,
}

impl std::fmt::Debug for Canceller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canceller")
            .field("hook_name", &self.hook_name)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl Canceller {
    /// Fires the guest's hook and waits until the guest has terminated.
    ///
    /// Fails with `CancellationUnavailable`, leaving the guest alone, when
    /// no hook is bound under this run's name.
    pub async fn cancel(&self) -> Result<(), SandboxError> {
        let Some(hook) = self.hooks.get(&self.hook_name) else {
            return Err(SandboxError::CancellationUnavailable);
        };
        tracing::debug!(target: "gobox::sandbox", hook = %self.hook_name, "cancelling guest");
        hook();
        while self.hooks.contains(&self.hook_name) {
            tokio::time::sleep(self.poll_interval).await;
        }
        Ok(())
    }
}

fn hook_name() -> String {
    static FALLBACK: AtomicU64 = AtomicU64::new(0);

    let mut bytes = [0u8; 8];
    if let Err(err) = getrandom::getrandom(&mut bytes) {
        tracing::warn!(target: "gobox::sandbox", "getrandom failed, using clock for hook name: {err}");
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        bytes = (nanos ^ FALLBACK.fetch_add(1, Ordering::Relaxed)).to_le_bytes();
    }
    format!("{CANCEL_HOOK_PREFIX}{}", hex_lower(&bytes))
}

fn hex_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(nybble_to_hex((b >> 4) & 0x0f));
        out.push(nybble_to_hex(b & 0x0f));
    }
    out
}

fn nybble_to_hex(n: u8) -> char {
    match n {
        0..=9 => (b'0' + n) as char,
        10..=15 => (b'a' + (n - 10)) as char,
        _ => '0',
    }
}
