//! Normalized execution reports printed for the calling automation engine.

use chrono::{DateTime, Duration, Local};
use serde::Serialize;

use crate::clients::CommandOutput;
use crate::error::Error;
use crate::reconciler::Reconciliation;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportDiff {
    pub before: String,
    pub after: String,
}

/// Result of one task run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    pub cmd: Vec<String>,
    pub start: String,
    pub end: String,
    pub delta: String,
    pub rc: i32,
    pub stdout: String,
    pub stderr: String,
    pub changed: bool,
    pub diff: ReportDiff,
}

impl ExecutionReport {
    /// Build a report for a task that started at `started` and ends now.
    pub fn new(
        started: DateTime<Local>,
        cmd: Vec<String>,
        rc: i32,
        stdout: &str,
        stderr: &str,
        changed: bool,
    ) -> Self {
        Self::between(started, Local::now(), cmd, rc, stdout, stderr, changed)
    }

    fn between(
        started: DateTime<Local>,
        ended: DateTime<Local>,
        cmd: Vec<String>,
        rc: i32,
        stdout: &str,
        stderr: &str,
        changed: bool,
    ) -> Self {
        Self {
            cmd,
            start: started.format(TIMESTAMP_FORMAT).to_string(),
            end: ended.format(TIMESTAMP_FORMAT).to_string(),
            delta: format_delta(ended - started),
            rc,
            stdout: stdout.trim_end_matches(['\r', '\n']).to_string(),
            stderr: stderr.trim_end_matches(['\r', '\n']).to_string(),
            changed,
            diff: ReportDiff::default(),
        }
    }

    pub fn from_reconciliation(started: DateTime<Local>, result: &Reconciliation) -> Self {
        Self::new(
            started,
            result.cmd.clone(),
            result.rc,
            &result.message,
            &result.stderr,
            result.changed,
        )
    }

    pub fn from_output(started: DateTime<Local>, output: &CommandOutput, changed: bool) -> Self {
        Self::new(
            started,
            output.cmd.clone(),
            output.rc,
            &output.stdout,
            &output.stderr,
            changed,
        )
    }

    /// Report for check mode: nothing is run and nothing changes.
    pub fn check_mode(started: DateTime<Local>) -> Self {
        Self::new(started, Vec::new(), 0, "", "", false)
    }
}

/// Report for a failed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureReport {
    pub failed: bool,
    pub msg: String,
    pub rc: i32,
    pub cmd: Vec<String>,
    pub stderr: String,
}

impl FailureReport {
    pub fn new(msg: impl Into<String>, err: &Error) -> Self {
        Self {
            failed: true,
            msg: msg.into(),
            // a query that exited 0 but could not be used still fails the task
            rc: if err.rc() == 0 { 1 } else { err.rc() },
            cmd: err.cmd().to_vec(),
            stderr: err.stderr().trim_end_matches(['\r', '\n']).to_string(),
        }
    }
}

/// `H:MM:SS.ffffff`
pub fn format_delta(delta: Duration) -> String {
    let micros = delta.num_microseconds().unwrap_or(i64::MAX).max(0);
    let secs = micros / 1_000_000;
    format!(
        "{}:{:02}:{:02}.{:06}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        micros % 1_000_000
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MutationError, QueryError};
    use chrono::TimeZone;

    #[test]
    fn delta_formatting() {
        assert_eq!(format_delta(Duration::zero()), "0:00:00.000000");
        assert_eq!(
            format_delta(Duration::milliseconds(3_723_500)),
            "1:02:03.500000"
        );
        assert_eq!(format_delta(Duration::microseconds(42)), "0:00:00.000042");
    }

    #[test]
    fn report_strips_trailing_newlines() {
        let started = Local.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let ended = started + Duration::milliseconds(1500);

        let report = ExecutionReport::between(
            started,
            ended,
            vec!["cephadm".into()],
            0,
            "Added host 'node1'\r\n",
            "warning\n",
            true,
        );

        assert_eq!(report.stdout, "Added host 'node1'");
        assert_eq!(report.stderr, "warning");
        assert_eq!(report.start, "2024-05-01 10:00:00.000000");
        assert_eq!(report.end, "2024-05-01 10:00:01.500000");
        assert_eq!(report.delta, "0:00:01.500000");
    }

    #[test]
    fn report_serializes_with_diff() {
        let report = ExecutionReport::check_mode(Local::now());
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["changed"], false);
        assert_eq!(value["rc"], 0);
        assert_eq!(value["cmd"], serde_json::json!([]));
        assert_eq!(value["diff"], serde_json::json!({"before": "", "after": ""}));
    }

    #[test]
    fn skipped_reconciliation_report() {
        let report = ExecutionReport::from_reconciliation(
            Local::now(),
            &Reconciliation::skipped("node1 is not present, skipping."),
        );
        assert!(!report.changed);
        assert_eq!(report.stdout, "node1 is not present, skipping.");
    }

    #[test]
    fn failure_report_from_errors() {
        let err: Error = MutationError::new(vec!["x".into()], 22, "Error EINVAL\n").into();
        let report = FailureReport::new("Can't start osd.0", &err);
        assert!(report.failed);
        assert_eq!(report.rc, 22);
        assert_eq!(report.stderr, "Error EINVAL");

        let err: Error = QueryError::new(vec!["ps".into()], 0, "osd.9 not found").into();
        assert_eq!(FailureReport::new("missing", &err).rc, 1);
    }
}
