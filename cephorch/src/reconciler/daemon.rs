//! Daemon reconciler - start/stop/restart via `ceph orch daemon`.
//!
//! Lifecycle of one call: the daemon is queried, compared against the desired
//! state and either left alone or sent exactly one action. Start and stop are
//! then confirmed by polling `ceph orch ps` until the reported status flips.
//! A restart is always issued and never confirmed.

use async_trait::async_trait;
use clap::ValueEnum;
use tracing::{debug, info, warn};

use super::convergence::{confirm_convergence, RetryPolicy};
use super::{reconcile, Difference, Reconciler, Reconciliation};
use crate::clients::{CephadmClient, DaemonAction, DaemonRecord};
use crate::error::Result;

/// Desired daemon state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DaemonState {
    Started,
    Stopped,
    Restarted,
}

impl DaemonState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DaemonState::Started => "started",
            DaemonState::Stopped => "stopped",
            DaemonState::Restarted => "restarted",
        }
    }

    /// The action that moves a daemon into this state.
    pub fn action(&self) -> DaemonAction {
        match self {
            DaemonState::Started => DaemonAction::Start,
            DaemonState::Stopped => DaemonAction::Stop,
            DaemonState::Restarted => DaemonAction::Restart,
        }
    }

    /// Running flag to wait for after the action, if any.
    fn expected_running(&self) -> Option<bool> {
        match self {
            DaemonState::Started => Some(true),
            DaemonState::Stopped => Some(false),
            DaemonState::Restarted => None,
        }
    }
}

/// Desired state for one daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonSpec {
    pub daemon_type: String,
    pub daemon_id: String,
    pub state: DaemonState,
}

impl DaemonSpec {
    pub fn new(
        daemon_type: impl Into<String>,
        daemon_id: impl Into<String>,
        state: DaemonState,
    ) -> Self {
        Self {
            daemon_type: daemon_type.into(),
            daemon_id: daemon_id.into(),
            state,
        }
    }

    /// `<type>.<id>`, as the orchestrator names daemons.
    pub fn name(&self) -> String {
        format!("{}.{}", self.daemon_type, self.daemon_id)
    }
}

/// Compare the reported daemon status against the desired state.
pub fn compare_daemon(observed: &DaemonRecord, spec: &DaemonSpec) -> Difference<DaemonAction> {
    let Some(wanted_running) = spec.state.expected_running() else {
        return Difference::Diverged(vec![spec.state.action()]);
    };

    if observed.is_running() == wanted_running {
        Difference::Satisfied(format!(
            "{} is already {}, skipping.",
            spec.name(),
            spec.state.as_str()
        ))
    } else {
        Difference::Diverged(vec![spec.state.action()])
    }
}

/// Daemon reconciler that drives `ceph orch daemon`.
///
/// Start and stop are confirmed with the client's configured retry policy.
pub struct DaemonReconciler {
    client: CephadmClient,
}

impl DaemonReconciler {
    pub fn new(client: CephadmClient) -> Self {
        Self { client }
    }

    fn policy(&self) -> &RetryPolicy {
        &self.client.config().retry
    }
}

#[async_trait]
impl Reconciler for DaemonReconciler {
    type Spec = DaemonSpec;

    async fn reconcile(&self, spec: &Self::Spec) -> Result<Reconciliation> {
        let name = spec.name();
        debug!("Reconciling daemon {} ({})", name, spec.state.as_str());

        let result = reconcile(
            &name,
            spec,
            || self.client.daemon_status(&spec.daemon_type, &spec.daemon_id),
            |observed: &DaemonRecord, spec: &DaemonSpec| compare_daemon(observed, spec),
            |action: DaemonAction| self.client.daemon_action(action, &name),
        )
        .await?;

        if !result.changed {
            return Ok(result);
        }

        if let Some(running) = spec.state.expected_running() {
            let convergence = confirm_convergence(
                || self.client.daemon_status(&spec.daemon_type, &spec.daemon_id),
                |daemon: &DaemonRecord| daemon.is_running() == running,
                self.policy(),
            )
            .await?;

            if convergence.converged {
                info!(daemon = %name, attempts = convergence.attempts, "Daemon reached desired state");
            } else {
                warn!(
                    daemon = %name,
                    attempts = convergence.attempts,
                    status = convergence.observed.status,
                    "Status for {} isn't reported as expected",
                    name
                );
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrchConfig;
    use crate::error::Error;
    use crate::test_util::MockRunner;
    use std::sync::Arc;
    use std::time::Duration;

    const STOPPED: &str = r#"[{"daemon_type": "osd", "daemon_id": "0", "hostname": "ceph-node1", "status": 0, "status_desc": "stopped"}]"#;
    const RUNNING: &str = r#"[{"daemon_type": "osd", "daemon_id": "0", "hostname": "ceph-node1", "status": 1, "status_desc": "running"}]"#;

    fn reconciler(runner: &Arc<MockRunner>, attempts: u32) -> DaemonReconciler {
        let config = OrchConfig {
            retry: RetryPolicy::new(attempts, Duration::ZERO),
            ..Default::default()
        };
        DaemonReconciler::new(CephadmClient::new(config, runner.clone()))
    }

    #[tokio::test]
    async fn already_started_is_skipped() {
        let runner = Arc::new(MockRunner::new());
        runner.respond_ok(RUNNING);

        let result = reconciler(&runner, 3)
            .reconcile(&DaemonSpec::new("osd", "0", DaemonState::Started))
            .await
            .unwrap();

        assert!(!result.changed);
        assert_eq!(result.message, "osd.0 is already started, skipping.");
        assert_eq!(runner.call_count(), 1);
        assert_eq!(
            runner.commands()[0],
            [
                "cephadm", "shell", "ceph", "orch", "ps", "--daemon_type", "osd", "--daemon_id",
                "0", "--format", "json", "--refresh"
            ]
        );
    }

    #[tokio::test]
    async fn start_is_confirmed_by_polling() {
        let runner = Arc::new(MockRunner::new());
        runner
            .respond_ok(STOPPED)
            .respond_ok("Scheduled to start osd.0 on host 'ceph-node1'")
            .respond_ok(STOPPED)
            .respond_ok(RUNNING);

        let result = reconciler(&runner, 5)
            .reconcile(&DaemonSpec::new("osd", "0", DaemonState::Started))
            .await
            .unwrap();

        assert!(result.changed);
        assert_eq!(result.message, "Scheduled to start osd.0 on host 'ceph-node1'");
        assert_eq!(result.cmd[4..], ["daemon", "start", "osd.0"]);
        // initial ps, start, two confirmation polls
        assert_eq!(runner.call_count(), 4);
    }

    #[tokio::test]
    async fn unconfirmed_stop_still_succeeds() {
        let runner = Arc::new(MockRunner::new());
        runner
            .respond_ok(RUNNING)
            .respond_ok("Scheduled to stop osd.0 on host 'ceph-node1'")
            .respond_ok(RUNNING)
            .respond_ok(RUNNING);

        let result = reconciler(&runner, 2)
            .reconcile(&DaemonSpec::new("osd", "0", DaemonState::Stopped))
            .await
            .unwrap();

        assert!(result.changed);
        assert_eq!(runner.call_count(), 4);
    }

    #[tokio::test]
    async fn restart_always_issues_action() {
        let runner = Arc::new(MockRunner::new());
        runner
            .respond_ok(RUNNING)
            .respond_ok("Scheduled to restart osd.0 on host 'ceph-node1'");

        let result = reconciler(&runner, 3)
            .reconcile(&DaemonSpec::new("osd", "0", DaemonState::Restarted))
            .await
            .unwrap();

        assert!(result.changed);
        assert_eq!(result.cmd[4..], ["daemon", "restart", "osd.0"]);
        assert_eq!(runner.call_count(), 2);
    }

    #[tokio::test]
    async fn unknown_daemon_is_query_error() {
        let runner = Arc::new(MockRunner::new());
        runner.respond_ok("[]");

        let err = reconciler(&runner, 3)
            .reconcile(&DaemonSpec::new("osd", "42", DaemonState::Started))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Query(_)));
        assert_eq!(err.stderr(), "osd.42 not found");
        assert_eq!(runner.call_count(), 1);
    }

    #[tokio::test]
    async fn failed_start_is_mutation_error() {
        let runner = Arc::new(MockRunner::new());
        runner
            .respond_ok(STOPPED)
            .respond(22, "", "Error EINVAL: Unable to start osd.0");

        let err = reconciler(&runner, 3)
            .reconcile(&DaemonSpec::new("osd", "0", DaemonState::Started))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Mutation(_)));
        assert_eq!(err.stderr(), "Error EINVAL: Unable to start osd.0");
        // no confirmation polling after a failed action
        assert_eq!(runner.call_count(), 2);
    }

    #[test]
    fn compare_stopped_daemon() {
        let record = DaemonRecord {
            daemon_type: "mgr".into(),
            daemon_id: "x".into(),
            hostname: None,
            status: 0,
            status_desc: None,
        };
        assert_eq!(
            compare_daemon(&record, &DaemonSpec::new("mgr", "x", DaemonState::Stopped)),
            Difference::Satisfied("mgr.x is already stopped, skipping.".to_string())
        );
        assert_eq!(
            compare_daemon(&record, &DaemonSpec::new("mgr", "x", DaemonState::Started)),
            Difference::Diverged(vec![DaemonAction::Start])
        );
    }
}
