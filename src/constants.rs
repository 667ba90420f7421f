//! # Constants
//!
//! Default values and well-known names shared across the operator.

use std::time::Duration;

/// API group for all operator-owned kinds
pub const API_GROUP: &str = "agents.nodeagent.dev";

/// Field manager identity used for every server-side apply
pub const FIELD_MANAGER: &str = "node-agent-operator";

/// Marker that gates physical deletion of a specification instance
pub const CLEANUP_FINALIZER: &str = "agents.nodeagent.dev/cleanup";

/// Condition type reporting whether the last control-loop pass succeeded
pub const CONDITION_RECONCILED: &str = "Reconciled";

/// Condition type reporting whether the managed workload is healthy
pub const CONDITION_AVAILABLE: &str = "Available";

/// Condition types that must always be present on a status
pub const REQUIRED_CONDITIONS: [&str; 2] = [CONDITION_RECONCILED, CONDITION_AVAILABLE];

// Labels and annotations

/// Label identifying the application of every managed resource
pub const LABEL_APP_NAME: &str = "app.kubernetes.io/name";

/// Application names carried in `LABEL_APP_NAME`
pub const AGENT_APP_NAME: &str = "node-agent";
pub const SCANNER_APP_NAME: &str = "node-scanner";

/// Label identifying the owning specification instance
pub const LABEL_INSTANCE: &str = "app.kubernetes.io/instance";

/// Label identifying the operator as the manager of a resource
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Label selecting credential secrets for the expiry watcher
pub const LABEL_CREDENTIAL: &str = "agents.nodeagent.dev/credential";

/// Annotation recording the absolute expiration time (RFC3339) of a credential secret
pub const ANNOTATION_TOKEN_EXPIRATION: &str = "agents.nodeagent.dev/token-expiration";

/// Key of the bearer token inside the credential secret
pub const TOKEN_SECRET_KEY: &str = "token";

// Credential lifecycle

/// Audiences requested for every issued token
pub const TOKEN_AUDIENCES: [&str; 1] = ["agents.nodeagent.dev"];

/// Lifetime of an issued token
pub const TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// A credential closer than this to its expiration is reissued
pub const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(10 * 60);

/// Interval between polls for asynchronous prerequisites
pub const CREDENTIAL_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How long to wait for the service account on a managed platform
pub const MANAGED_PLATFORM_ACCOUNT_TIMEOUT: Duration = Duration::from_secs(60);

/// How long to wait for the service account elsewhere
pub const DEFAULT_ACCOUNT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long to look for an existing credential secret before issuing a new one
pub const EXISTING_SECRET_TIMEOUT: Duration = Duration::from_secs(2);

/// Default refresh interval of the credential loop (seconds)
pub const DEFAULT_TOKEN_REFRESH_INTERVAL_SECS: u64 = 10 * 60;

// Scheduling

/// Delay before re-running a pass that asked to be requeued (seconds)
pub const DEFAULT_REQUEUE_DELAY_SECS: u64 = 5;

/// Minimum error backoff (seconds)
pub const DEFAULT_ERROR_BACKOFF_MIN_SECS: u64 = 1;

/// Maximum error backoff (seconds)
pub const DEFAULT_ERROR_BACKOFF_MAX_SECS: u64 = 300;

// Runtime defaults

/// Namespace the operator runs in
pub const DEFAULT_OPERATOR_NAMESPACE: &str = "node-agent-system";

/// Image used when a specification does not name one
pub const DEFAULT_AGENT_IMAGE: &str = "ghcr.io/nodeagent/agent:latest";

/// Port the agent listens on when a specification does not name one
pub const DEFAULT_AGENT_PORT: i32 = 9100;

/// Default HTTP server port for metrics and probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Server startup timeout (seconds)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Server readiness poll interval (milliseconds)
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;
