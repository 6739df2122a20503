//! Error types for orchestrator queries and mutations.

use thiserror::Error;

use crate::clients::CommandOutput;

/// Fetching the observed state failed.
///
/// Covers a nonzero exit of the query command, a failure to spawn it and
/// output that could not be parsed. Never retried.
#[derive(Debug, Clone, Error)]
#[error("query `{}` failed (rc={rc}): {stderr}", .cmd.join(" "))]
pub struct QueryError {
    pub cmd: Vec<String>,
    pub rc: i32,
    pub stderr: String,
}

impl QueryError {
    pub fn new(cmd: Vec<String>, rc: i32, stderr: impl Into<String>) -> Self {
        Self {
            cmd,
            rc,
            stderr: stderr.into(),
        }
    }

    /// Error for a command that exited nonzero.
    pub fn from_output(output: &CommandOutput) -> Self {
        Self::new(output.cmd.clone(), output.rc, output.stderr.clone())
    }

    /// Error for a command that could not be spawned at all.
    pub fn spawn(cmd: &[String], err: std::io::Error) -> Self {
        Self::new(cmd.to_vec(), -1, format!("failed to execute: {}", err))
    }
}

/// A corrective action failed.
#[derive(Debug, Clone, Error)]
#[error("command `{}` failed (rc={rc}): {stderr}", .cmd.join(" "))]
pub struct MutationError {
    pub cmd: Vec<String>,
    pub rc: i32,
    pub stderr: String,
}

impl MutationError {
    pub fn new(cmd: Vec<String>, rc: i32, stderr: impl Into<String>) -> Self {
        Self {
            cmd,
            rc,
            stderr: stderr.into(),
        }
    }

    pub fn from_output(output: &CommandOutput) -> Self {
        Self::new(output.cmd.clone(), output.rc, output.stderr.clone())
    }

    pub fn spawn(cmd: &[String], err: std::io::Error) -> Self {
        Self::new(cmd.to_vec(), -1, format!("failed to execute: {}", err))
    }
}

/// Errors surfaced by a reconciliation.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Mutation(#[from] MutationError),
}

impl Error {
    /// The command that failed.
    pub fn cmd(&self) -> &[String] {
        match self {
            Error::Query(e) => &e.cmd,
            Error::Mutation(e) => &e.cmd,
        }
    }

    pub fn rc(&self) -> i32 {
        match self {
            Error::Query(e) => e.rc,
            Error::Mutation(e) => e.rc,
        }
    }

    pub fn stderr(&self) -> &str {
        match self {
            Error::Query(e) => &e.stderr,
            Error::Mutation(e) => &e.stderr,
        }
    }
}

/// Result type for reconciliations.
pub type Result<T> = std::result::Result<T, Error>;
