//! cephorch: idempotent cluster tasks on top of cephadm.
//!
//! Each invocation runs one task and prints a JSON report on stdout:
//! - host: add, remove or drain a host and keep its labels in sync
//! - daemon: start, stop or restart a daemon and wait for the status to flip
//! - apply: apply a service spec
//! - command: run an arbitrary `ceph` command
//!
//! Logs go to stderr and are controlled with RUST_LOG.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use tracing::error;
use tracing_subscriber::EnvFilter;

use cephorch::clients::{CephadmClient, SystemRunner};
use cephorch::config::{OrchConfig, DEFAULT_BINARY};
use cephorch::reconciler::RetryPolicy;
use cephorch::task::{run_task, Outcome, Task};

/// Idempotent cephadm cluster tasks
#[derive(Parser, Debug)]
#[command(name = "cephorch", version, about)]
struct Args {
    /// cephadm binary to invoke
    #[arg(long, default_value = DEFAULT_BINARY)]
    cephadm: String,

    /// Use docker instead of podman
    #[arg(long)]
    docker: bool,

    /// Ceph container image
    #[arg(long)]
    image: Option<String>,

    /// fsid of the cluster to interact with
    #[arg(long)]
    fsid: Option<String>,

    /// Report without running anything
    #[arg(long)]
    check: bool,

    /// Status polls after a daemon start/stop
    #[arg(long, default_value = "20")]
    retries: u32,

    /// Seconds between status polls
    #[arg(long, default_value = "1")]
    retry_delay: u64,

    #[command(subcommand)]
    task: Task,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cephorch=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args).await? {
        Outcome::Done(report) => {
            print_json(&report)?;
            Ok(ExitCode::SUCCESS)
        }
        Outcome::Failed(failure) => {
            error!("{}", failure.msg);
            print_json(&failure)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

async fn run(args: Args) -> Result<Outcome> {
    let config = OrchConfig {
        binary: args.cephadm,
        docker: args.docker,
        image: args.image,
        fsid: args.fsid,
        retry: RetryPolicy::new(args.retries, Duration::from_secs(args.retry_delay)),
    };
    let client = CephadmClient::new(config, Arc::new(SystemRunner));

    run_task(&client, args.task, args.check).await
}
