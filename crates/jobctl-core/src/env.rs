//! Environment variable utilities
//!
//! ```ignore
//! use jobctl_core::env::{env_get, env_get_bool};
//!
//! let workers: usize = env_get("JOBCTL_WORKER_THREADS", 2);
//! let debug: bool = env_get_bool("JOBCTL_DEBUG", false);
//! ```

use std::str::FromStr;

/// Get environment variable parsed as type T, or return default
///
/// Unset and unparsable values both fall back to `default`.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Get environment variable as boolean
///
/// Accepts: "1", "true", "yes", "on" (case-insensitive) as true.
/// Any other value is false; unset returns the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Get environment variable as optional value
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_get_default() {
        let val: usize = env_get("__JOBCTL_TEST_UNSET_VAR__", 42);
        assert_eq!(val, 42);
    }

    #[test]
    fn test_env_get_bool_default() {
        assert!(env_get_bool("__JOBCTL_TEST_UNSET_VAR__", true));
        assert!(!env_get_bool("__JOBCTL_TEST_UNSET_VAR__", false));
    }

    #[test]
    fn test_env_get_opt_none() {
        let val: Option<usize> = env_get_opt("__JOBCTL_TEST_UNSET_VAR__");
        assert!(val.is_none());
    }

    #[test]
    fn test_env_get_with_set_var() {
        std::env::set_var("__JOBCTL_TEST_NUM__", " 123 ");
        let val: usize = env_get("__JOBCTL_TEST_NUM__", 0);
        assert_eq!(val, 123);
        std::env::remove_var("__JOBCTL_TEST_NUM__");
    }

    #[test]
    fn test_env_get_bool_variants() {
        for v in ["1", "true", "TRUE", "yes", "on"] {
            std::env::set_var("__JOBCTL_TEST_BOOL__", v);
            assert!(env_get_bool("__JOBCTL_TEST_BOOL__", false), "{}", v);
        }
        for v in ["0", "false", "garbage"] {
            std::env::set_var("__JOBCTL_TEST_BOOL__", v);
            assert!(!env_get_bool("__JOBCTL_TEST_BOOL__", true), "{}", v);
        }
        std::env::remove_var("__JOBCTL_TEST_BOOL__");
    }

    #[test]
    fn test_env_get_invalid_parse() {
        std::env::set_var("__JOBCTL_TEST_INVALID__", "not_a_number");
        let val: usize = env_get("__JOBCTL_TEST_INVALID__", 99);
        assert_eq!(val, 99);
        std::env::remove_var("__JOBCTL_TEST_INVALID__");
    }
}
