//! cephorch: idempotent host and daemon management for cephadm clusters.
//!
//! The library shells out to `cephadm shell ceph orch`, compares the reported
//! state with the requested one and only issues the commands needed to
//! converge.

pub mod clients;
pub mod config;
pub mod error;
pub mod reconciler;
pub mod report;
pub mod task;

#[cfg(any(test, feature = "test-util"))]
pub mod test_util;

pub use config::OrchConfig;
pub use error::{Error, MutationError, QueryError, Result};
pub use reconciler::{Reconciler, Reconciliation};
