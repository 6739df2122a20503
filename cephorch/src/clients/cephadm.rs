//! Client for the cephadm orchestrator CLI.
//!
//! Every call builds an argument vector of the form
//! `cephadm [--docker] [--image IMG] shell [--fsid FSID] ceph orch ...`
//! and runs it through a [`CommandRunner`]. Queries fail with [`QueryError`],
//! mutations with [`MutationError`].

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use super::runner::{CommandOutput, CommandRunner};
use crate::config::OrchConfig;
use crate::error::{MutationError, QueryError};

/// One entry of `ceph orch host ls --format json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostRecord {
    pub hostname: String,
    #[serde(default)]
    pub addr: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// One entry of `ceph orch ps --format json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DaemonRecord {
    pub daemon_type: String,
    pub daemon_id: String,
    #[serde(default)]
    pub hostname: Option<String>,
    /// 1 running, 0 stopped, -1 error.
    #[serde(default)]
    pub status: i32,
    #[serde(default)]
    pub status_desc: Option<String>,
}

impl DaemonRecord {
    pub fn is_running(&self) -> bool {
        self.status == 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelAction {
    Add,
    Rm,
}

impl LabelAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelAction::Add => "add",
            LabelAction::Rm => "rm",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonAction {
    Start,
    Stop,
    Restart,
}

impl DaemonAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DaemonAction::Start => "start",
            DaemonAction::Stop => "stop",
            DaemonAction::Restart => "restart",
        }
    }
}

impl fmt::Display for DaemonAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client for `cephadm shell ceph orch`.
#[derive(Clone)]
pub struct CephadmClient {
    config: OrchConfig,
    runner: Arc<dyn CommandRunner>,
}

impl CephadmClient {
    pub fn new(config: OrchConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self { config, runner }
    }

    pub fn config(&self) -> &OrchConfig {
        &self.config
    }

    /// `cephadm [--docker] [--image IMG] shell [--fsid FSID]`
    pub fn base_cmd(&self) -> Vec<String> {
        let mut cmd = vec![self.config.binary.clone()];
        if self.config.docker {
            cmd.push("--docker".to_string());
        }
        if let Some(image) = &self.config.image {
            cmd.push("--image".to_string());
            cmd.push(image.clone());
        }
        cmd.push("shell".to_string());
        if let Some(fsid) = &self.config.fsid {
            cmd.push("--fsid".to_string());
            cmd.push(fsid.clone());
        }
        cmd
    }

    /// Base command followed by `ceph orch`.
    pub fn orch_cmd(&self) -> Vec<String> {
        let mut cmd = self.base_cmd();
        cmd.push("ceph".to_string());
        cmd.push("orch".to_string());
        cmd
    }

    fn orch(&self, args: &[&str]) -> Vec<String> {
        let mut cmd = self.orch_cmd();
        cmd.extend(args.iter().map(|a| a.to_string()));
        cmd
    }

    async fn query(&self, cmd: Vec<String>) -> Result<CommandOutput, QueryError> {
        let output = self
            .runner
            .run(&cmd, None)
            .await
            .map_err(|e| QueryError::spawn(&cmd, e))?;

        if !output.success() {
            return Err(QueryError::from_output(&output));
        }

        Ok(output)
    }

    async fn mutate(
        &self,
        cmd: Vec<String>,
        stdin: Option<&str>,
    ) -> Result<CommandOutput, MutationError> {
        info!(cmd = %cmd.join(" "), "Issuing orchestrator command");

        let output = self
            .runner
            .run(&cmd, stdin)
            .await
            .map_err(|e| MutationError::spawn(&cmd, e))?;

        if !output.success() {
            return Err(MutationError::from_output(&output));
        }

        Ok(output)
    }

    fn parse_json<T: for<'de> Deserialize<'de>>(output: &CommandOutput) -> Result<T, QueryError> {
        serde_json::from_str(&output.stdout).map_err(|e| {
            QueryError::new(
                output.cmd.clone(),
                output.rc,
                format!("unparsable output: {}", e),
            )
        })
    }

    // === Hosts ===

    /// `ceph orch host ls --format json`
    pub async fn list_hosts(&self) -> Result<Vec<HostRecord>, QueryError> {
        let output = self
            .query(self.orch(&["host", "ls", "--format", "json"]))
            .await?;
        let hosts: Vec<HostRecord> = Self::parse_json(&output)?;
        debug!(count = hosts.len(), "Fetched host list");
        Ok(hosts)
    }

    /// `ceph orch host add NAME [ADDR] [--labels a,b]`
    pub async fn add_host(
        &self,
        name: &str,
        address: Option<&str>,
        labels: &[String],
    ) -> Result<CommandOutput, MutationError> {
        let mut cmd = self.orch(&["host", "add", name]);
        if let Some(addr) = address.filter(|a| !a.is_empty()) {
            cmd.push(addr.to_string());
        }
        if !labels.is_empty() {
            cmd.push("--labels".to_string());
            cmd.push(labels.join(","));
        }
        self.mutate(cmd, None).await
    }

    /// `ceph orch host rm NAME`
    pub async fn remove_host(&self, name: &str) -> Result<CommandOutput, MutationError> {
        self.mutate(self.orch(&["host", "rm", name]), None).await
    }

    /// `ceph orch host drain NAME`
    pub async fn drain_host(&self, name: &str) -> Result<CommandOutput, MutationError> {
        self.mutate(self.orch(&["host", "drain", name]), None).await
    }

    /// `ceph orch host label add|rm HOST LABEL`
    pub async fn update_label(
        &self,
        action: LabelAction,
        host: &str,
        label: &str,
    ) -> Result<CommandOutput, MutationError> {
        self.mutate(
            self.orch(&["host", "label", action.as_str(), host, label]),
            None,
        )
        .await
    }

    // === Daemons ===

    /// `ceph orch ps --daemon_type T --daemon_id I --format json --refresh`
    pub async fn list_daemons(
        &self,
        daemon_type: &str,
        daemon_id: &str,
    ) -> Result<Vec<DaemonRecord>, QueryError> {
        let output = self
            .query(self.orch(&[
                "ps",
                "--daemon_type",
                daemon_type,
                "--daemon_id",
                daemon_id,
                "--format",
                "json",
                "--refresh",
            ]))
            .await?;
        Self::parse_json(&output)
    }

    /// First `ps` record for the daemon; an empty listing is an error.
    pub async fn daemon_status(
        &self,
        daemon_type: &str,
        daemon_id: &str,
    ) -> Result<DaemonRecord, QueryError> {
        let mut daemons = self.list_daemons(daemon_type, daemon_id).await?;
        if daemons.is_empty() {
            return Err(QueryError::new(
                self.orch(&["ps", "--daemon_type", daemon_type, "--daemon_id", daemon_id]),
                0,
                format!("{}.{} not found", daemon_type, daemon_id),
            ));
        }
        let daemon = daemons.swap_remove(0);
        debug!(
            daemon = %format!("{}.{}", daemon.daemon_type, daemon.daemon_id),
            status = daemon.status,
            "Fetched daemon status"
        );
        Ok(daemon)
    }

    /// `ceph orch daemon start|stop|restart TYPE.ID`
    pub async fn daemon_action(
        &self,
        action: DaemonAction,
        daemon_name: &str,
    ) -> Result<CommandOutput, MutationError> {
        self.mutate(
            self.orch(&["daemon", action.as_str(), daemon_name]),
            None,
        )
        .await
    }

    // === Services ===

    /// `ceph orch apply -i -` with the service spec on stdin.
    pub async fn apply_spec(&self, spec: &str) -> Result<CommandOutput, MutationError> {
        self.mutate(self.orch(&["apply", "-i", "-"]), Some(spec))
            .await
    }

    /// Runs an arbitrary space-separated command.
    ///
    /// Without `cli_binary` the command is prefixed with `cephadm ... shell ceph`.
    /// A nonzero exit is returned as output, not as an error.
    pub async fn run_raw(
        &self,
        command: &str,
        cli_binary: bool,
        stdin: Option<&str>,
    ) -> Result<CommandOutput, MutationError> {
        let mut cmd = if cli_binary {
            Vec::new()
        } else {
            let mut base = self.base_cmd();
            base.push("ceph".to_string());
            base
        };
        cmd.extend(command.split(' ').filter(|s| !s.is_empty()).map(String::from));

        self.runner
            .run(&cmd, stdin)
            .await
            .map_err(|e| MutationError::spawn(&cmd, e))
    }
}
