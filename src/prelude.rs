//! Common imports for embedding the hook bridge.
//!
//! Covers what a [`Runtime`] implementation and its `export_bridge!`
//! invocation need, without re-exporting the whole crate.

pub use crate::args::{QuickFrameLayout, RawArgumentBuffer};
pub use crate::config::BridgeConfig;
pub use crate::env::{JniEnv, LocalRef, StaticRef};
pub use crate::error::{HookError, Result};
pub use crate::export_bridge;
pub use crate::method_layout::MethodLayout;
pub use crate::runtime::{AccessFlags, DispatchMode, EntryPoint, MethodId, Runtime};
pub use crate::shorty::TypeDescriptor;
pub use crate::sys::jni;
pub use crate::value::RawObject;
pub use crate::Bridge;
