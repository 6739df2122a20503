//! CLI tasks and their mapping onto the reconcilers and reports.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use clap::Subcommand;
use tokio::io::AsyncReadExt;
use tracing::info;

use crate::clients::CephadmClient;
use crate::error::Error;
use crate::reconciler::{
    DaemonReconciler, DaemonSpec, DaemonState, HostReconciler, HostSpec, HostState, Reconciler,
};
use crate::report::{ExecutionReport, FailureReport};

#[derive(Subcommand, Debug, Clone)]
pub enum Task {
    /// Add, remove or drain a host
    Host {
        /// Name of the host
        #[arg(long)]
        name: String,

        /// Address of the host (used when adding it)
        #[arg(long)]
        address: Option<String>,

        /// Labels to apply (repeatable or comma separated)
        #[arg(long = "label", value_delimiter = ',')]
        labels: Vec<String>,

        /// Enforce the '_admin' label
        #[arg(long)]
        set_admin_label: bool,

        #[arg(long, value_enum, default_value_t = HostState::Present)]
        state: HostState,
    },

    /// Start, stop or restart a daemon
    Daemon {
        /// Daemon type, e.g. osd
        #[arg(long)]
        daemon_type: String,

        /// Daemon id, e.g. 0
        #[arg(long)]
        daemon_id: String,

        #[arg(long, value_enum)]
        state: DaemonState,
    },

    /// Apply a service spec
    Apply {
        /// Spec file, '-' reads stdin
        #[arg(long)]
        spec: PathBuf,
    },

    /// Run a ceph command
    Command {
        /// The command is a full command line, not prefixed with 'cephadm shell ceph'
        #[arg(long)]
        cli_binary: bool,

        /// Data fed to the command's stdin
        #[arg(long)]
        stdin: Option<String>,

        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

/// What a task run ends with.
#[derive(Debug)]
pub enum Outcome {
    Done(ExecutionReport),
    Failed(FailureReport),
}

/// Run one task against the cluster.
///
/// Task-level failures (a failed query or command) become
/// [`Outcome::Failed`]. `Err` is reserved for local problems such as an
/// unreadable spec file.
pub async fn run_task(client: &CephadmClient, task: Task, check: bool) -> Result<Outcome> {
    let started = Local::now();

    if check {
        info!("Check mode, nothing will be run");
        return Ok(Outcome::Done(ExecutionReport::check_mode(started)));
    }

    let outcome = match task {
        Task::Host {
            name,
            address,
            labels,
            set_admin_label,
            state,
        } => {
            let spec = HostSpec {
                name,
                address,
                labels,
                set_admin_label,
                state,
            };
            match HostReconciler::new(client.clone()).reconcile(&spec).await {
                Ok(result) => Outcome::Done(ExecutionReport::from_reconciliation(started, &result)),
                Err(e) => Outcome::Failed(FailureReport::new(
                    format!("Can't reconcile host {}: {}", spec.name, e.stderr()),
                    &e,
                )),
            }
        }
        Task::Daemon {
            daemon_type,
            daemon_id,
            state,
        } => {
            let spec = DaemonSpec::new(daemon_type, daemon_id, state);
            match DaemonReconciler::new(client.clone()).reconcile(&spec).await {
                Ok(result) => Outcome::Done(ExecutionReport::from_reconciliation(started, &result)),
                Err(e) => {
                    let msg = match &e {
                        Error::Query(q) => {
                            format!("Can't get current status of {}: {}", spec.name(), q.stderr)
                        }
                        Error::Mutation(m) => format!(
                            "Can't {} {}: {}",
                            spec.state.action(),
                            spec.name(),
                            m.stderr
                        ),
                    };
                    Outcome::Failed(FailureReport::new(msg, &e))
                }
            }
        }
        Task::Apply { spec } => {
            let data = read_spec(&spec).await?;
            match client.apply_spec(&data).await {
                Ok(output) => Outcome::Done(ExecutionReport::from_output(started, &output, true)),
                Err(e) => {
                    let e = Error::from(e);
                    Outcome::Failed(FailureReport::new(
                        format!("Can't apply spec: {}", e.stderr()),
                        &e,
                    ))
                }
            }
        }
        Task::Command {
            cli_binary,
            stdin,
            command,
        } => match client
            .run_raw(&command.join(" "), cli_binary, stdin.as_deref())
            .await
        {
            Ok(output) => Outcome::Done(ExecutionReport::from_output(started, &output, false)),
            Err(e) => {
                let e = Error::from(e);
                Outcome::Failed(FailureReport::new(e.to_string(), &e))
            }
        },
    };

    Ok(outcome)
}

async fn read_spec(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut data = String::new();
        tokio::io::stdin()
            .read_to_string(&mut data)
            .await
            .context("Failed to read spec from stdin")?;
        return Ok(data);
    }

    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read spec file {}", path.display()))
}
