//! Module load hook - process-wide runtime binding
//!
//! The host runtime invokes the load hook once when the native module is
//! loaded. All symbol resolution that later runs from restricted
//! contexts (worker threads on platforms that forbid dynamic lookup
//! there) happens here, up front. The hook hands back a version token or
//! a negative failure sentinel.

use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{error, info};

use super::manager::HandleManager;
use crate::error::Result;
use crate::runtime::ManagedRuntime;

/// Version token returned by a successful load
pub const BINDING_VERSION_1: i32 = 0x0001_0000;

/// Negative sentinel returned when the load hook fails
pub const LOAD_FAILED: i32 = -1;

static GLOBAL_BINDING: OnceCell<RuntimeBinding> = OnceCell::new();

/// Process-wide association between native code and the managed runtime
#[derive(Debug)]
pub struct RuntimeBinding {
    manager: Arc<HandleManager>,
    version: i32,
}

impl RuntimeBinding {
    /// Establish a binding, preresolving the named classes so worker
    /// threads never need dynamic lookup
    pub fn on_load(runtime: Arc<ManagedRuntime>, preresolve: &[&str]) -> Result<Self> {
        crate::logging::init();

        let manager = Arc::new(HandleManager::new(runtime));
        for name in preresolve {
            manager.lookup_class(name)?;
        }

        info!(
            event = "module_load",
            preresolved_classes = preresolve.len(),
            "Runtime binding established"
        );
        Ok(Self {
            manager,
            version: BINDING_VERSION_1,
        })
    }

    pub fn manager(&self) -> &Arc<HandleManager> {
        &self.manager
    }

    pub fn version_token(&self) -> i32 {
        self.version
    }
}

/// Install the one-per-process binding and return its version token, or
/// `LOAD_FAILED` if resolution failed or a binding is already installed
pub fn module_load(runtime: Arc<ManagedRuntime>, preresolve: &[&str]) -> i32 {
    match RuntimeBinding::on_load(runtime, preresolve) {
        Ok(binding) => {
            let version = binding.version_token();
            if GLOBAL_BINDING.set(binding).is_err() {
                error!(event = "module_load_failed", "module loaded twice");
                return LOAD_FAILED;
            }
            version
        }
        Err(e) => {
            error!(event = "module_load_failed", error = %e, "Runtime binding failed");
            LOAD_FAILED
        }
    }
}

/// The process-wide binding, if `module_load` succeeded
pub fn global_binding() -> Option<&'static RuntimeBinding> {
    GLOBAL_BINDING.get()
}
