//! Reconcilers for orchestrator-managed resources.
//!
//! Each reconciler fetches the observed state once, compares it with the
//! desired state and issues only the actions needed to converge.

pub mod convergence;
pub mod daemon;
pub mod host;

use std::future::Future;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{MutationError, QueryError, Result};
use crate::clients::CommandOutput;

pub use convergence::{confirm_convergence, Convergence, RetryPolicy};
pub use daemon::{DaemonReconciler, DaemonSpec, DaemonState};
pub use host::{HostReconciler, HostSpec, HostState, LabelChange};

/// Outcome of comparing observed state against desired state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Difference<A> {
    /// Observed state already matches.
    None,
    /// Already satisfied, with a call-site specific reason.
    Satisfied(String),
    /// One corrective action per divergent attribute, in issue order.
    Diverged(Vec<A>),
}

/// Result of one reconciliation. Built once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub changed: bool,
    /// Skip reason, or the concatenated output of every issued action.
    pub message: String,
    /// Exit code of the last issued action (0 when skipped).
    pub rc: i32,
    /// Command of the last issued action (empty when skipped).
    pub cmd: Vec<String>,
    pub stderr: String,
}

impl Reconciliation {
    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            changed: false,
            message: message.into(),
            rc: 0,
            cmd: Vec::new(),
            stderr: String::new(),
        }
    }
}

/// Compare desired and observed state and issue the corrective actions.
///
/// `fetch_observed` runs exactly once; a failure aborts before anything is
/// mutated. `mutate` runs once per diff item in order and the first failure
/// aborts the rest. Actions already applied are left in place.
pub async fn reconcile<D, O, A, F, FFut, C, M, MFut>(
    target: &str,
    desired: &D,
    fetch_observed: F,
    compare: C,
    mut mutate: M,
) -> Result<Reconciliation>
where
    F: FnOnce() -> FFut,
    FFut: Future<Output = std::result::Result<O, QueryError>>,
    C: FnOnce(&O, &D) -> Difference<A>,
    M: FnMut(A) -> MFut,
    MFut: Future<Output = std::result::Result<CommandOutput, MutationError>>,
{
    let observed = fetch_observed().await?;

    let actions = match compare(&observed, desired) {
        Difference::None => {
            debug!(resource = target, "Observed state matches desired state");
            return Ok(Reconciliation::skipped(format!(
                "{} already matches desired state, skipping.",
                target
            )));
        }
        Difference::Satisfied(reason) => {
            debug!(resource = target, reason = %reason, "Nothing to do");
            return Ok(Reconciliation::skipped(reason));
        }
        Difference::Diverged(actions) if actions.is_empty() => {
            return Ok(Reconciliation::skipped(format!(
                "{} already matches desired state, skipping.",
                target
            )));
        }
        Difference::Diverged(actions) => actions,
    };

    info!(resource = target, actions = actions.len(), "Reconciling");

    let mut outputs = Vec::with_capacity(actions.len());
    let mut last = CommandOutput::default();
    for action in actions {
        let output = mutate(action).await?;
        if !output.success() {
            return Err(MutationError::from_output(&output).into());
        }
        let text = output.stdout.trim_end_matches(['\r', '\n']);
        if !text.is_empty() {
            outputs.push(text.to_string());
        }
        last = output;
    }

    Ok(Reconciliation {
        changed: true,
        message: outputs.join("\n"),
        rc: last.rc,
        cmd: last.cmd,
        stderr: last.stderr,
    })
}

/// Trait for resource reconcilers.
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// Desired state supplied by the caller.
    type Spec: Sync;

    /// Bring the resource to `spec`, issuing only the needed actions.
    async fn reconcile(&self, spec: &Self::Spec) -> Result<Reconciliation>;
}
