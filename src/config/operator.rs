//! # Operator Settings
//!
//! Settings that shape reconciliation (platform flavour, scheduling delays,
//! credential refresh cadence) and where the probe server listens.

use super::env_var_or_default;
use crate::constants::*;
use std::time::Duration;

/// Environment the operator is deployed into
///
/// Managed platforms create service accounts asynchronously and slowly, so
/// prerequisite waits are longer there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Platform {
    #[default]
    Standard,
    Managed,
}

impl Platform {
    /// How long the credential issuer waits for its service account
    #[must_use]
    pub fn account_timeout(self) -> Duration {
        match self {
            Platform::Managed => MANAGED_PLATFORM_ACCOUNT_TIMEOUT,
            Platform::Standard => DEFAULT_ACCOUNT_TIMEOUT,
        }
    }
}

/// Operator configuration
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    /// Namespace the operator itself runs in
    pub operator_namespace: String,
    /// Platform flavour, selects prerequisite timeouts
    pub platform: Platform,
    /// Image used when a specification does not name one
    pub default_image: String,
    /// Delay applied when a pass asks to be requeued
    pub requeue_delay: Duration,
    /// Interval of the credential loop; the expiry watcher rotates at `expiry - 2 * interval`
    pub token_refresh_interval: Duration,
    /// Error backoff bounds (seconds)
    pub error_backoff_min_secs: u64,
    pub error_backoff_max_secs: u64,
    /// Port of the `/metrics`, `/healthz` and `/readyz` listener
    pub metrics_port: u16,
    /// Startup fails if the listener is not bound within this window
    pub server_startup_timeout: Duration,
    pub server_poll_interval: Duration,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            operator_namespace: DEFAULT_OPERATOR_NAMESPACE.to_string(),
            platform: Platform::Standard,
            default_image: DEFAULT_AGENT_IMAGE.to_string(),
            requeue_delay: Duration::from_secs(DEFAULT_REQUEUE_DELAY_SECS),
            token_refresh_interval: Duration::from_secs(DEFAULT_TOKEN_REFRESH_INTERVAL_SECS),
            error_backoff_min_secs: DEFAULT_ERROR_BACKOFF_MIN_SECS,
            error_backoff_max_secs: DEFAULT_ERROR_BACKOFF_MAX_SECS,
            metrics_port: DEFAULT_METRICS_PORT,
            server_startup_timeout: Duration::from_secs(DEFAULT_SERVER_STARTUP_TIMEOUT_SECS),
            server_poll_interval: Duration::from_millis(DEFAULT_SERVER_POLL_INTERVAL_MS),
        }
    }
}

impl OperatorConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let platform = if env_var_or_default("MANAGED_PLATFORM", false) {
            Platform::Managed
        } else {
            Platform::Standard
        };

        Self {
            operator_namespace: std::env::var("OPERATOR_NAMESPACE")
                .or_else(|_| std::env::var("POD_NAMESPACE"))
                .unwrap_or_else(|_| DEFAULT_OPERATOR_NAMESPACE.to_string()),
            platform,
            default_image: std::env::var("DEFAULT_AGENT_IMAGE")
                .unwrap_or_else(|_| DEFAULT_AGENT_IMAGE.to_string()),
            requeue_delay: Duration::from_secs(env_var_or_default(
                "REQUEUE_DELAY_SECS",
                DEFAULT_REQUEUE_DELAY_SECS,
            )),
            token_refresh_interval: Duration::from_secs(env_var_or_default(
                "TOKEN_REFRESH_INTERVAL_SECS",
                DEFAULT_TOKEN_REFRESH_INTERVAL_SECS,
            )),
            error_backoff_min_secs: env_var_or_default(
                "ERROR_BACKOFF_MIN_SECS",
                DEFAULT_ERROR_BACKOFF_MIN_SECS,
            ),
            error_backoff_max_secs: env_var_or_default(
                "ERROR_BACKOFF_MAX_SECS",
                DEFAULT_ERROR_BACKOFF_MAX_SECS,
            ),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            server_startup_timeout: Duration::from_secs(env_var_or_default(
                "SERVER_STARTUP_TIMEOUT_SECS",
                DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            )),
            server_poll_interval: Duration::from_millis(env_var_or_default(
                "SERVER_POLL_INTERVAL_MS",
                DEFAULT_SERVER_POLL_INTERVAL_MS,
            )),
        }
    }
}
