use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gobox_vfs::{ProcessShim, Vfs};
use wasmtime::Engine;

/// Zero-argument function a guest binds so the host can stop it.
pub(crate) type Hook = Arc<dyn Fn() + Send + Sync>;

/// Named bindings a guest registered during its run.
#[derive(Clone, Default)]
pub(crate) struct HookTable(Arc<Mutex<HashMap<String, Hook>>>);

impl HookTable {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Hook>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn bind(&self, name: String, hook: Hook) {
        self.lock().insert(name, hook);
    }

    pub fn get(&self, name: &str) -> Option<Hook> {
        self.lock().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// Everything a single guest invocation can reach. Built fresh per run.
pub(crate) struct RuntimeContext {
    pub fs: Vfs,
    pub process: ProcessShim,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub hooks: HookTable,
    pub cancel: Arc<AtomicBool>,
    pub engine: Engine,
}

impl RuntimeContext {
    pub fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Hook that flags this run as cancelled and bumps the engine epoch so
    /// the running guest notices at its next interruption point.
    pub fn cancel_hook(&self) -> Hook {
        let cancel = self.cancel.clone();
        let engine = self.engine.clone();
        Arc::new(move || {
            cancel.store(true, Ordering::SeqCst);
            engine.increment_epoch();
        })
    }
}
