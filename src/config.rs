//! Bridge configuration.
//!
//! ```rust
//! use arthook::BridgeConfig;
//!
//! let config = BridgeConfig::parse("class=com/example/HookBridge,legacy_sdk=19").unwrap();
//! assert_eq!(config.bridge_class, "com/example/HookBridge");
//! assert_eq!(config.legacy_empty_args_max_sdk, 19);
//! ```

use crate::error::{HookError, Result};
use crate::sys::jni;

/// Where the managed half of the bridge lives, and call-shape policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Class owning the natives and the dispatch method.
    pub bridge_class: String,
    pub handler_name: String,
    pub handler_signature: String,
    /// Zero-argument calls get a non-null empty array when the target SDK
    /// is known and no greater than this.
    pub legacy_empty_args_max_sdk: i32,
    /// Version requested from `GetEnv` and returned from `JNI_OnLoad`.
    pub jni_version: jni::jint,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            bridge_class: "com/taobao/android/dexposed/DexposedBridge".to_string(),
            handler_name: "handleHookedMethod".to_string(),
            handler_signature: "(Ljava/lang/reflect/Member;ILjava/lang/Object;Ljava/lang/Object;[Ljava/lang/Object;)Ljava/lang/Object;"
                .to_string(),
            legacy_empty_args_max_sdk: 21,
            jni_version: jni::JNI_VERSION_1_6,
        }
    }
}

impl BridgeConfig {
    /// Parses comma-separated `key=value` options over the defaults.
    ///
    /// Keys: `class`, `handler`, `handler_sig`, `legacy_sdk`.
    pub fn parse(options: &str) -> Result<Self> {
        let mut config = BridgeConfig::default();
        for option in options.split(',').map(str::trim).filter(|o| !o.is_empty()) {
            let (key, value) = option
                .split_once('=')
                .ok_or_else(|| HookError::InvalidOption(option.to_string()))?;
            let value = value.trim();
            match key.trim() {
                "class" => config.bridge_class = value.replace('.', "/"),
                "handler" => config.handler_name = value.to_string(),
                "handler_sig" => config.handler_signature = value.to_string(),
                "legacy_sdk" => {
                    config.legacy_empty_args_max_sdk =
                        value.parse().map_err(|_| HookError::InvalidOption(option.to_string()))?;
                }
                _ => return Err(HookError::InvalidOption(option.to_string())),
            }
        }
        Ok(config)
    }

    pub fn with_bridge_class(mut self, class: impl Into<String>) -> Self {
        self.bridge_class = class.into();
        self
    }

    pub fn with_handler(mut self, name: impl Into<String>, signature: impl Into<String>) -> Self {
        self.handler_name = name.into();
        self.handler_signature = signature.into();
        self
    }

    pub fn with_legacy_empty_args_max_sdk(mut self, sdk: i32) -> Self {
        self.legacy_empty_args_max_sdk = sdk;
        self
    }

    pub fn with_jni_version(mut self, version: jni::jint) -> Self {
        self.jni_version = version;
        self
    }
}
