//! Error taxonomy shared by every bridge layer

use thiserror::Error;

/// Result alias used throughout the bridge crates
pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Bad selector, disallowed routing combination or out-of-range value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Hardware not locked or signal absent
    #[error("Not ready: {0}")]
    NotReady(String),
    /// Device guard could not be acquired
    #[error("Device busy")]
    Busy,
    /// A debounced status read never stabilized within its retry budget
    #[error("Timed out: {0}")]
    Timeout(String),
    /// No matching registry entry, device or catalogue row
    #[error("Not found: {0}")]
    NotFound(String),
    /// At least one register transaction failed
    #[error("Register transport failed: {0}")]
    Transport(String),
    /// The backing device does not implement the requested capability
    #[error("{device} does not support {operation}")]
    NotSupported {
        device: String,
        operation: &'static str,
    },
    /// The input catalogue could not be loaded
    #[error("Catalogue error: {0}")]
    Catalogue(String),
}

impl BridgeError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn not_ready(msg: impl Into<String>) -> Self {
        Self::NotReady(msg.into())
    }

    pub fn not_supported(device: &str, operation: &'static str) -> Self {
        Self::NotSupported {
            device: device.to_string(),
            operation,
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for BridgeError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::Busy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_poisoned_guard_is_busy() {
        let guard = Arc::new(Mutex::new(0u32));
        let clone = guard.clone();
        let _ = std::thread::spawn(move || {
            let _held = clone.lock().unwrap();
            panic!("poison the guard");
        })
        .join();

        let err: BridgeError = guard.lock().unwrap_err().into();
        assert_eq!(err, BridgeError::Busy);
    }

    #[test]
    fn test_not_supported_message() {
        let err = BridgeError::not_supported("adv7180", "query_timings");
        assert_eq!(err.to_string(), "adv7180 does not support query_timings");
    }
}
