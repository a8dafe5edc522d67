//! Run configuration and normalization.
//!
//! A [`RunConfig`] is the raw parameter set a run is invoked with, however it
//! was populated (flags, environment, API). Calling [`RunConfig::normalize`]
//! validates the required fields and applies the documented defaults exactly
//! once, producing an [`EffectiveConfig`] that is immutable for the rest of
//! the run.

use serde::{Deserialize, Serialize};

use crate::error::RunError;

/// Well-known staging endpoint used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://staging-bh.boozang.com";

/// Branch used when none is configured.
pub const DEFAULT_BRANCH: &str = "main";

/// Test name used when none is configured.
pub const DEFAULT_TEST: &str = "default_test";

/// Total worker count (master included) used when none is configured.
pub const DEFAULT_WORKERS: u32 = 2;

/// Worker group used when none is configured.
pub const DEFAULT_GROUP: &str = "1";

/// Container image the workers run as.
pub const WORKER_IMAGE: &str = "styrman/boozang-playwright-ex3";

/// Path inside the worker container where the run's working directory is mounted.
pub const CONTAINER_MOUNT_PATH: &str = "/var/boozang/";

/// Prefix for per-worker container names; the worker key is appended.
pub const CONTAINER_NAME_PREFIX: &str = "bzworker";

/// Raw run parameters, prior to validation and defaulting.
///
/// Empty strings and zero counts mean "unset"; [`RunConfig::normalize`]
/// resolves them. Only `token` and `project` are required.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunConfig {
    /// Base URL of the remote test orchestration service.
    pub base_url: String,

    /// Authentication token (required).
    pub token: String,

    /// Project ID (required).
    pub project: String,

    /// Project branch to run against.
    pub branch: String,

    /// Name of the test the master executes.
    pub test: String,

    /// Total worker count including the master. Zero means unset.
    pub workers: u32,

    /// Worker group. Zero means unset.
    pub group: u32,

    /// Test filter applied by the master.
    pub filter: String,

    /// Environment selector passed to the service.
    pub env: u32,

    /// Whether the workers run in self mode.
    pub self_mode: bool,

    /// Scope restriction passed to the service.
    pub scope: String,

    /// Free-form parameter forwarded to the service.
    pub parameter: String,
}

impl RunConfig {
    /// Config with the two required fields set and everything else unset.
    pub fn new(token: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            project: project.into(),
            ..Self::default()
        }
    }

    /// Validate required fields and apply defaults, exactly once.
    ///
    /// Fails with [`RunError::Configuration`] when `token` or `project` is
    /// empty; this happens before any planning or launching. A zero worker
    /// count is treated as unset and becomes [`DEFAULT_WORKERS`]; negative
    /// counts are unrepresentable by construction.
    pub fn normalize(&self) -> Result<EffectiveConfig, RunError> {
        if self.token.is_empty() {
            return Err(RunError::Configuration(
                "Authentication token is not set. Provide the Boozang token in the run configuration.".to_string(),
            ));
        }
        if self.project.is_empty() {
            return Err(RunError::Configuration(
                "Project ID is not set. Provide the project ID in the run configuration.".to_string(),
            ));
        }

        let base_url = if self.base_url.is_empty() {
            DEFAULT_BASE_URL.to_string()
        } else {
            self.base_url.trim_end_matches('/').to_string()
        };

        Ok(EffectiveConfig {
            base_url,
            token: self.token.clone(),
            project: self.project.clone(),
            branch: default_if_empty(&self.branch, DEFAULT_BRANCH),
            test: default_if_empty(&self.test, DEFAULT_TEST),
            workers: if self.workers != 0 {
                self.workers
            } else {
                DEFAULT_WORKERS
            },
            group: if self.group != 0 {
                self.group.to_string()
            } else {
                DEFAULT_GROUP.to_string()
            },
            filter: self.filter.clone(),
            env: self.env.to_string(),
            self_mode: if self.self_mode { "1" } else { "0" }.to_string(),
            scope: self.scope.clone(),
            parameter: self.parameter.clone(),
        })
    }
}

fn default_if_empty(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

/// Normalized run parameters, immutable for the duration of a run.
///
/// Numeric fields that travel as URL query values (`group`, `env`, `self`)
/// are already serialized to the strings the wire contract expects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EffectiveConfig {
    /// Base URL without a trailing slash.
    pub base_url: String,

    /// Authentication token, never empty.
    pub token: String,

    /// Project ID, never empty.
    pub project: String,

    /// Branch, never empty.
    pub branch: String,

    /// Test name, never empty.
    pub test: String,

    /// Total worker count including the master, always >= 1.
    pub workers: u32,

    /// Worker group as a query value.
    pub group: String,

    /// Test filter (may be empty), master-only query value.
    pub filter: String,

    /// Environment selector as a query value.
    pub env: String,

    /// Self mode serialized as "1" or "0".
    pub self_mode: String,

    /// Scope restriction (may be empty).
    pub scope: String,

    /// Free-form parameter (may be empty).
    pub parameter: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> RunConfig {
        RunConfig::new("tok", "proj")
    }

    #[test]
    fn test_missing_token_rejected() {
        let config = RunConfig::new("", "proj");
        let err = config.normalize().unwrap_err();
        assert!(matches!(err, RunError::Configuration(_)));
        assert!(err.to_string().contains("token"));
    }

    #[test]
    fn test_missing_project_rejected() {
        let config = RunConfig::new("tok", "");
        let err = config.normalize().unwrap_err();
        assert!(matches!(err, RunError::Configuration(_)));
        assert!(err.to_string().contains("Project ID"));
    }

    #[test]
    fn test_defaults_applied() {
        let effective = minimal().normalize().expect("normalize failed");
        assert_eq!(effective.base_url, DEFAULT_BASE_URL);
        assert_eq!(effective.branch, "main");
        assert_eq!(effective.test, "default_test");
        assert_eq!(effective.workers, 2);
        assert_eq!(effective.group, "1");
        assert_eq!(effective.filter, "");
        assert_eq!(effective.env, "0");
        assert_eq!(effective.self_mode, "0");
        assert_eq!(effective.scope, "");
        assert_eq!(effective.parameter, "");
    }

    #[test]
    fn test_explicit_values_kept() {
        let config = RunConfig {
            base_url: "https://bh.example.com".to_string(),
            branch: "release".to_string(),
            test: "smoke".to_string(),
            workers: 5,
            group: 3,
            filter: "tag:fast".to_string(),
            env: 2,
            self_mode: true,
            scope: "ci".to_string(),
            parameter: "p=1".to_string(),
            ..minimal()
        };
        let effective = config.normalize().expect("normalize failed");
        assert_eq!(effective.base_url, "https://bh.example.com");
        assert_eq!(effective.branch, "release");
        assert_eq!(effective.test, "smoke");
        assert_eq!(effective.workers, 5);
        assert_eq!(effective.group, "3");
        assert_eq!(effective.filter, "tag:fast");
        assert_eq!(effective.env, "2");
        assert_eq!(effective.self_mode, "1");
        assert_eq!(effective.scope, "ci");
        assert_eq!(effective.parameter, "p=1");
    }

    #[test]
    fn test_zero_workers_means_default() {
        let config = RunConfig {
            workers: 0,
            ..minimal()
        };
        let effective = config.normalize().expect("normalize failed");
        assert_eq!(effective.workers, DEFAULT_WORKERS);
    }

    #[test]
    fn test_single_worker_allowed() {
        let config = RunConfig {
            workers: 1,
            ..minimal()
        };
        let effective = config.normalize().expect("normalize failed");
        assert_eq!(effective.workers, 1);
    }

    #[test]
    fn test_trailing_slash_trimmed_from_base_url() {
        let config = RunConfig {
            base_url: "https://bh.example.com/".to_string(),
            ..minimal()
        };
        let effective = config.normalize().expect("normalize failed");
        assert_eq!(effective.base_url, "https://bh.example.com");
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let config = minimal();
        let a = config.normalize().expect("normalize failed");
        let b = config.normalize().expect("normalize failed");
        assert_eq!(a, b);
    }

    #[test]
    fn test_effective_config_serde_roundtrip() {
        let effective = minimal().normalize().expect("normalize failed");
        let json = serde_json::to_string(&effective).expect("serialize");
        let back: EffectiveConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(effective, back);
    }
}
