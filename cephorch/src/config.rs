//! Orchestrator connection settings.

use crate::reconciler::RetryPolicy;

/// Default orchestrator binary.
pub const DEFAULT_BINARY: &str = "cephadm";

/// How commands reach the cluster and how long convergence is awaited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchConfig {
    /// Path or name of the cephadm binary.
    pub binary: String,
    /// Use docker instead of podman.
    pub docker: bool,
    /// Container image passed as `--image`.
    pub image: Option<String>,
    /// Cluster fsid passed to `shell --fsid`.
    pub fsid: Option<String>,
    pub retry: RetryPolicy,
}

impl Default for OrchConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            docker: false,
            image: None,
            fsid: None,
            retry: RetryPolicy::default(),
        }
    }
}
