//! Clients for the external orchestrator.
//!
//! - runner: spawns processes and captures their output
//! - cephadm: builds `cephadm shell ceph orch` command lines and parses results

pub mod cephadm;
pub mod runner;

pub use cephadm::{CephadmClient, DaemonAction, DaemonRecord, HostRecord, LabelAction};
pub use runner::{CommandOutput, CommandRunner, SystemRunner};
