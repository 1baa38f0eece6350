//! Configuration utility functions
//!
//! This module provides helper functions for reading configuration
//! overrides from environment variables.

/// Get a u64 value from an environment variable or use the default
pub fn get_env_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}

/// Get an optional usize value from an environment variable.
///
/// Unset or unparsable values yield `None`.
pub fn get_env_opt_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|val| val.trim().parse().ok())
}

/// Get an optional u64 value from an environment variable.
///
/// Unset or unparsable values yield `None`.
pub fn get_env_opt_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|val| val.trim().parse().ok())
}
