//! Errors raised by the interception core.

use crate::shorty::TypeTag;
use crate::sys::jni;

/// Every failure the core can report.
///
/// A managed exception that is pending surfaces as
/// [`HookError::ExceptionPending`] and is left in place for the caller of the
/// intercepted method to observe. The only exception the core raises itself
/// is the `NullPointerException` for a null primitive handler result.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("class {0} not found")]
    ClassNotFound(String),

    #[error("method {class}.{name}{signature} not found")]
    MethodNotFound {
        class: String,
        name: String,
        signature: String,
    },

    #[error("RegisterNatives failed with code {0}")]
    RegisterNatives(jni::jint),

    #[error("GetEnv failed with code {0}")]
    JniVersion(jni::jint),

    #[error("hook bridge is not initialized")]
    NotInitialized,

    #[error("hook bridge is already initialized")]
    AlreadyInitialized,

    #[error("invalid bridge option {0:?}")]
    InvalidOption(String),

    #[error("reflected object does not name a method")]
    InvalidMethod,

    #[error("{0} is already hooked")]
    AlreadyHooked(String),

    #[error("{0} is not hooked")]
    NotHooked(String),

    #[error("{0} is hooked, refusing to invoke it as the original")]
    ReentrantOriginal(String),

    #[error("{0} does not override an ancestor method")]
    NoSuperMethod(String),

    #[error("an exception is pending")]
    ExceptionPending,

    #[error("malformed type descriptor {0:?}")]
    MalformedDescriptor(String),

    #[error("expected a boxed {expected} but found {found}")]
    TypeMismatch { expected: TypeTag, found: String },

    #[error("expected {expected} arguments but got {actual}")]
    ArgumentCount { expected: usize, actual: usize },
}

impl HookError {
    /// Contract violations the core cannot recover from.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HookError::MalformedDescriptor(_)
                | HookError::TypeMismatch { .. }
                | HookError::ArgumentCount { .. }
                | HookError::NotHooked(_)
        )
    }

    /// Failures that keep the subsystem from activating.
    pub fn is_setup_failure(&self) -> bool {
        matches!(
            self,
            HookError::ClassNotFound(_)
                | HookError::MethodNotFound { .. }
                | HookError::RegisterNatives(_)
                | HookError::JniVersion(_)
                | HookError::AlreadyInitialized
                | HookError::InvalidOption(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, HookError>;
