//! Host reconciler - host presence and labels via `ceph orch host`.

use async_trait::async_trait;
use clap::ValueEnum;
use tracing::{debug, info};

use super::{reconcile, Difference, Reconciler, Reconciliation};
use crate::clients::{CephadmClient, CommandOutput, HostRecord, LabelAction};
use crate::error::{MutationError, Result};

/// Label every admin host carries.
pub const ADMIN_LABEL: &str = "_admin";

/// Desired host state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum HostState {
    /// Host is part of the cluster with exactly the requested labels.
    #[default]
    Present,
    /// Host is removed from the cluster.
    Absent,
    /// All daemons are scheduled for removal from the host.
    Drain,
}

/// Desired state for one host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostSpec {
    pub name: String,
    pub address: Option<String>,
    pub labels: Vec<String>,
    /// Enforce the `_admin` label.
    pub set_admin_label: bool,
    pub state: HostState,
}

impl HostSpec {
    pub fn new(name: impl Into<String>, state: HostState) -> Self {
        Self {
            name: name.into(),
            state,
            ..Default::default()
        }
    }

    /// Requested labels, deduplicated, with `_admin` appended when enforced.
    pub fn desired_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = Vec::with_capacity(self.labels.len() + 1);
        for label in &self.labels {
            if !labels.contains(label) {
                labels.push(label.clone());
            }
        }
        if self.set_admin_label && !labels.iter().any(|l| l == ADMIN_LABEL) {
            labels.push(ADMIN_LABEL.to_string());
        }
        labels
    }
}

/// A single label to add to or remove from a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelChange {
    pub action: LabelAction,
    pub label: String,
}

/// A corrective action for a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostAction {
    Add {
        address: Option<String>,
        labels: Vec<String>,
    },
    Remove,
    Drain,
    Label(LabelChange),
}

/// Label changes turning `observed` into `desired`.
///
/// Missing labels are added in desired order, then extra labels are removed
/// in observed order.
pub fn label_changes(desired: &[String], observed: &[String]) -> Vec<LabelChange> {
    let adds = desired
        .iter()
        .filter(|l| !observed.contains(l))
        .map(|l| LabelChange {
            action: LabelAction::Add,
            label: l.clone(),
        });
    let removals = observed
        .iter()
        .filter(|l| !desired.contains(l))
        .map(|l| LabelChange {
            action: LabelAction::Rm,
            label: l.clone(),
        });
    adds.chain(removals).collect()
}

/// Compare the host listing against the desired host state.
pub fn compare_hosts(observed: &[HostRecord], spec: &HostSpec) -> Difference<HostAction> {
    let current = observed.iter().find(|h| h.hostname == spec.name);

    match (spec.state, current) {
        (HostState::Present, None) => Difference::Diverged(vec![HostAction::Add {
            address: spec.address.clone(),
            labels: spec.desired_labels(),
        }]),
        (HostState::Present, Some(host)) => {
            let changes = label_changes(&spec.desired_labels(), &host.labels);
            if changes.is_empty() {
                Difference::Satisfied(format!("{} is already present, skipping.", spec.name))
            } else {
                Difference::Diverged(changes.into_iter().map(HostAction::Label).collect())
            }
        }
        (HostState::Absent | HostState::Drain, None) => {
            Difference::Satisfied(format!("{} is not present, skipping.", spec.name))
        }
        (HostState::Absent, Some(_)) => Difference::Diverged(vec![HostAction::Remove]),
        (HostState::Drain, Some(_)) => Difference::Diverged(vec![HostAction::Drain]),
    }
}

/// Host reconciler that drives `ceph orch host`.
pub struct HostReconciler {
    client: CephadmClient,
}

impl HostReconciler {
    pub fn new(client: CephadmClient) -> Self {
        Self { client }
    }

    async fn apply(
        &self,
        host: &str,
        action: HostAction,
    ) -> std::result::Result<CommandOutput, MutationError> {
        match action {
            HostAction::Add { address, labels } => {
                info!(host, "Adding host");
                self.client.add_host(host, address.as_deref(), &labels).await
            }
            HostAction::Remove => {
                info!(host, "Removing host");
                self.client.remove_host(host).await
            }
            HostAction::Drain => {
                info!(host, "Draining host");
                self.client.drain_host(host).await
            }
            HostAction::Label(change) => {
                info!(host, label = %change.label, action = change.action.as_str(), "Updating label");
                self.client
                    .update_label(change.action, host, &change.label)
                    .await
            }
        }
    }
}

#[async_trait]
impl Reconciler for HostReconciler {
    type Spec = HostSpec;

    async fn reconcile(&self, spec: &Self::Spec) -> Result<Reconciliation> {
        let name = spec.name.as_str();
        debug!("Reconciling host {} ({:?})", name, spec.state);

        reconcile(
            name,
            spec,
            || self.client.list_hosts(),
            |observed: &Vec<HostRecord>, spec: &HostSpec| compare_hosts(observed, spec),
            move |action: HostAction| self.apply(name, action),
        )
        .await
    }
}
