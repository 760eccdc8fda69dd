//! Engine configuration surface (spec §6.4): bounds read from the process
//! environment at startup, with defaults matching the suggested values.

use std::path::PathBuf;
use std::time::Duration;

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Bounds and knobs for the `OrchestrationEngine` and its built-in filesystem tools.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Upper bound on dispatch-loop passes per turn.
    pub max_iterations: u32,
    /// Upper bound on tool invocations per turn.
    pub max_tool_calls: u32,
    /// Default deadline for each tool invocation.
    pub per_tool_deadline: Duration,
    /// Total messages kept after windowing, inclusive of system and original-user.
    pub sliding_window: usize,
    /// Byte threshold above which a tool result is delivered as chunks.
    pub chunk_soft_cap: usize,
    /// Default page size for `list_directory` (hard cap 1000).
    pub list_dir_default: usize,
    /// Optional allow-list of roots filesystem tools may touch.
    pub allowed_filesystem_roots: Option<Vec<PathBuf>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            max_tool_calls: 50,
            per_tool_deadline: Duration::from_secs(30),
            sliding_window: 6,
            chunk_soft_cap: 10 * 1024,
            list_dir_default: 100,
            allowed_filesystem_roots: None,
        }
    }
}

impl EngineConfig {
    /// Loads values from the process environment, falling back to defaults for
    /// any key that is unset or fails to parse.
    pub fn from_env() -> Self {
        let default = Self::default();
        let allowed_filesystem_roots = std::env::var("ALLOWED_FILESYSTEM_ROOTS")
            .ok()
            .map(|v| v.split(':').map(PathBuf::from).collect::<Vec<_>>())
            .filter(|v: &Vec<PathBuf>| !v.is_empty());

        Self {
            max_iterations: env_parse("MAX_ITERATIONS", default.max_iterations),
            max_tool_calls: env_parse("MAX_TOOL_CALLS", default.max_tool_calls),
            per_tool_deadline: Duration::from_secs(env_parse(
                "PER_TOOL_DEADLINE_SECS",
                default.per_tool_deadline.as_secs(),
            )),
            sliding_window: env_parse("SLIDING_WINDOW", default.sliding_window),
            chunk_soft_cap: env_parse("CHUNK_SOFT_CAP", default.chunk_soft_cap),
            list_dir_default: env_parse("LIST_DIR_DEFAULT", default.list_dir_default)
                .min(1000),
            allowed_filesystem_roots,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_suggested_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.max_iterations, 100);
        assert_eq!(cfg.max_tool_calls, 50);
        assert_eq!(cfg.per_tool_deadline, Duration::from_secs(30));
        assert_eq!(cfg.sliding_window, 6);
        assert_eq!(cfg.chunk_soft_cap, 10 * 1024);
        assert_eq!(cfg.list_dir_default, 100);
        assert!(cfg.allowed_filesystem_roots.is_none());
    }

    #[test]
    fn from_env_overrides_and_caps_list_dir_default() {
        std::env::set_var("LIST_DIR_DEFAULT_TEST_GUARD", "1");
        std::env::set_var("LIST_DIR_DEFAULT", "5000");
        let cfg = EngineConfig::from_env();
        assert_eq!(cfg.list_dir_default, 1000);
        std::env::remove_var("LIST_DIR_DEFAULT");
        std::env::remove_var("LIST_DIR_DEFAULT_TEST_GUARD");
    }
}
