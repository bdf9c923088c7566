//! Shared test utilities for integration tests
//!
//! Serializes access to process environment variables so config tests that set
//! XDG or COURSEGRADE_* variables do not race when tests run in parallel.

use std::sync::Mutex;
use tempfile::TempDir;

/// Global mutex to serialize environment variable access across all tests
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Environment variable state to restore after test
struct EnvState {
    saved: Vec<(String, Option<String>)>,
}

impl EnvState {
    fn capture(keys: &[&str]) -> Self {
        Self {
            saved: keys
                .iter()
                .map(|k| (k.to_string(), std::env::var(k).ok()))
                .collect(),
        }
    }

    fn restore(self) {
        for (key, value) in self.saved {
            match value {
                Some(orig) => std::env::set_var(&key, orig),
                None => std::env::remove_var(&key),
            }
        }
    }
}

/// Run `f` with isolated XDG directories under `test_dir` and the given
/// variables set; the original environment is restored afterwards.
pub fn with_env<F, R>(test_dir: &TempDir, vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

    let mut keys = vec!["HOME", "XDG_CONFIG_HOME", "XDG_DATA_HOME"];
    keys.extend(vars.iter().map(|(k, _)| *k));
    let env_state = EnvState::capture(&keys);

    let test_config_home = test_dir.path().join("config-home");
    let test_data_home = test_dir.path().join("data");
    let test_home = test_dir.path().join("home");
    std::fs::create_dir_all(&test_config_home).unwrap();
    std::fs::create_dir_all(&test_data_home).unwrap();
    std::fs::create_dir_all(&test_home).unwrap();

    std::env::set_var("HOME", &test_home);
    std::env::set_var("XDG_CONFIG_HOME", &test_config_home);
    std::env::set_var("XDG_DATA_HOME", &test_data_home);
    for (key, value) in vars {
        std::env::set_var(key, value);
    }

    let result = f();

    env_state.restore();

    result
}
