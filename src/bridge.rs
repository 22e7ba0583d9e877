//! The hook bridge: runtime, handler, hook store and configuration.

use log::{error, info};

use crate::config::BridgeConfig;
use crate::env::JniEnv;
use crate::error::{HookError, Result};
use crate::handler::{HookHandler, JavaHandler};
use crate::heap::{Heap, JniHeap, WellKnownClasses};
use crate::hook::{HookRecord, HookStore};
use crate::runtime::{MethodId, Runtime};
use crate::sys::jni;

/// One activated interception core.
///
/// [`Bridge::attach`] builds it against a live VM. [`Bridge::new`] takes
/// the collaborators directly, for hosts that drive the core with their
/// own [`Heap`] implementation.
pub struct Bridge {
    runtime: Box<dyn Runtime>,
    handler: Box<dyn HookHandler>,
    store: HookStore,
    config: BridgeConfig,
    classes: Option<WellKnownClasses>,
}

impl Bridge {
    pub fn new(runtime: Box<dyn Runtime>, handler: Box<dyn HookHandler>, config: BridgeConfig) -> Self {
        Bridge {
            runtime,
            handler,
            store: HookStore::new(),
            config,
            classes: None,
        }
    }

    /// Activates the bridge on the current thread's VM.
    ///
    /// Resolves the bridge class, its dispatch method and the boxing
    /// classes, then registers `natives` on the bridge class. Nothing is
    /// registered unless every lookup succeeded.
    pub fn attach(
        env: &JniEnv,
        runtime: Box<dyn Runtime>,
        config: BridgeConfig,
        natives: &[jni::JNINativeMethod],
    ) -> Result<Self> {
        let handler = JavaHandler::find(env, &config.bridge_class, &config.handler_name, &config.handler_signature)?;
        let class = handler.class();
        let classes = WellKnownClasses::resolve(env)?;

        env.register_natives(class.get(), natives).map_err(|code| {
            env.exception_clear();
            error!("RegisterNatives on {} failed: {}", config.bridge_class, code);
            HookError::RegisterNatives(code)
        })?;
        info!("registered {} natives on {}", natives.len(), config.bridge_class);

        Ok(Bridge {
            runtime,
            handler: Box::new(handler),
            store: HookStore::new(),
            config,
            classes: Some(classes),
        })
    }

    pub fn runtime(&self) -> &dyn Runtime {
        self.runtime.as_ref()
    }

    pub fn handler(&self) -> &dyn HookHandler {
        self.handler.as_ref()
    }

    pub fn store(&self) -> &HookStore {
        &self.store
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// A [`JniHeap`] for `env`. Only available on attached bridges.
    pub fn jni_heap(&self, env: JniEnv) -> Result<JniHeap<'_>> {
        let classes = self.classes.as_ref().ok_or(HookError::NotInitialized)?;
        Ok(JniHeap::new(env, classes))
    }

    /// Hooks the method behind a reflected `Method` or `Constructor`.
    pub fn hook_method(
        &self,
        heap: &dyn Heap,
        reflected: jni::jobject,
        payload: jni::jobject,
    ) -> Result<&'static HookRecord> {
        let method = self.resolve_reflected(heap, reflected)?;
        self.store.install(self.runtime(), heap, method, payload)
    }

    pub fn is_hooked(&self, method: MethodId) -> bool {
        self.store.is_hooked(self.runtime(), method)
    }

    pub(crate) fn resolve_reflected(&self, heap: &dyn Heap, reflected: jni::jobject) -> Result<MethodId> {
        if reflected.is_null() {
            return Err(HookError::InvalidMethod);
        }
        heap.from_reflected_method(reflected)
            .filter(|m| !m.is_null())
            .ok_or(HookError::InvalidMethod)
    }
}
