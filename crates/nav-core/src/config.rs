use anyhow::{anyhow, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// Reads a variable, treating unset and blank values alike.
pub fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn socket_addr_from_env(name: &str, default: &str) -> Result<SocketAddr> {
    let value = optional_env(name).unwrap_or_else(|| default.to_string());
    SocketAddr::from_str(&value).map_err(|err| anyhow!("invalid socket addr for {name}: {err}"))
}

/// Unparseable values fall back to `default` with a warning instead of failing startup.
pub fn u64_from_env(name: &str, default: u64) -> u64 {
    match optional_env(name) {
        Some(raw) => raw.parse::<u64>().unwrap_or_else(|err| {
            tracing::warn!(env = name, value = %raw, error = %err, "ignoring invalid numeric env");
            default
        }),
        None => default,
    }
}

pub fn path_from_env(name: &str) -> Option<PathBuf> {
    optional_env(name).map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard, OnceLock};

    fn env_lock() -> MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    struct EnvGuard {
        key: &'static str,
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            env::remove_var(self.key);
        }
    }

    fn set_env(key: &'static str, value: &str) -> EnvGuard {
        env::set_var(key, value);
        EnvGuard { key }
    }


    #[test]
    fn optional_env_treats_blank_as_unset() {
        let _lock = env_lock();
        let _blank = set_env("NAV_TEST_OPTIONAL_ENV_BLANK", "   ");
        assert_eq!(optional_env("NAV_TEST_OPTIONAL_ENV_BLANK"), None);

        let _padded = set_env("NAV_TEST_OPTIONAL_ENV_PADDED", "  value ");
        assert_eq!(
            optional_env("NAV_TEST_OPTIONAL_ENV_PADDED").as_deref(),
            Some("value")
        );
    }

    #[test]
    fn socket_addr_from_env_uses_default() {
        let _lock = env_lock();
        env::remove_var("NAV_TEST_SOCKET_DEFAULT");
        let addr = socket_addr_from_env("NAV_TEST_SOCKET_DEFAULT", "127.0.0.1:1234").unwrap();
        assert_eq!(addr, "127.0.0.1:1234".parse().unwrap());
    }

    #[test]
    fn socket_addr_from_env_invalid_returns_error() {
        let _lock = env_lock();
        let _guard = set_env("NAV_TEST_SOCKET_INVALID", "not-a-socket");
        assert!(socket_addr_from_env("NAV_TEST_SOCKET_INVALID", "127.0.0.1:1234").is_err());
    }

    #[test]
    fn u64_from_env_parses_and_falls_back() {
        let _lock = env_lock();
        let _guard = set_env("NAV_TEST_U64_VALID", "42");
        assert_eq!(u64_from_env("NAV_TEST_U64_VALID", 7), 42);

        let _invalid = set_env("NAV_TEST_U64_INVALID", "forty-two");
        assert_eq!(u64_from_env("NAV_TEST_U64_INVALID", 7), 7);

        env::remove_var("NAV_TEST_U64_MISSING");
        assert_eq!(u64_from_env("NAV_TEST_U64_MISSING", 7), 7);
    }
}
