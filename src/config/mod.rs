//! # Operator Configuration
//!
//! Operator-level configuration loaded from environment variables.
//!
//! All configuration has sensible defaults and can be overridden via environment variables.
//! Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
//!
//! Configuration is read once at startup and is immutable afterwards. It is shared by
//! reference (`Arc<OperatorConfig>`) with every control loop instead of living in globals.

mod operator;

pub use operator::{OperatorConfig, Platform};

/// Load configuration from environment variables with defaults
#[must_use]
pub fn load_config() -> OperatorConfig {
    OperatorConfig::from_env()
}

/// Read environment variable or return default value
pub(crate) fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
