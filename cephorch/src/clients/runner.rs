//! Process execution for orchestrator commands.

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Captured result of one external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub cmd: Vec<String>,
    pub rc: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.rc == 0
    }
}

/// Runs an argument vector and captures its output.
///
/// Implemented by [`SystemRunner`] for real processes and by
/// `test_util::MockRunner` for tests.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, cmd: &[String], stdin: Option<&str>) -> io::Result<CommandOutput>;
}

/// Spawns commands on the local host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, cmd: &[String], stdin: Option<&str>) -> io::Result<CommandOutput> {
        let (program, args) = cmd
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;

        debug!(cmd = %cmd.join(" "), "Running command");

        let mut child = Command::new(program)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // stdin is fed while stdout/stderr are drained, otherwise a chatty
        // child and a pending write block each other.
        let pipe = stdin.zip(child.stdin.take());
        let feed = async move {
            if let Some((data, mut pipe)) = pipe {
                match pipe.write_all(data.as_bytes()).await {
                    // the child exited without reading all of its input
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
                    other => other?,
                }
                // dropping the handle closes stdin so the child sees EOF
            }
            Ok::<_, io::Error>(())
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output?;
        fed?;

        Ok(CommandOutput {
            cmd: cmd.to_vec(),
            rc: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let err = SystemRunner.run(&[], None).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn missing_binary_fails_to_spawn() {
        let result = SystemRunner
            .run(&argv(&["/nonexistent/cephorch-test-binary"]), None)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let out = SystemRunner
            .run(&argv(&["sh", "-c", "echo hello; echo oops >&2; exit 3"]), None)
            .await
            .unwrap();
        assert_eq!(out.rc, 3);
        assert_eq!(out.stdout, "hello\n");
        assert_eq!(out.stderr, "oops\n");
        assert!(!out.success());
    }

    #[tokio::test]
    async fn feeds_stdin() {
        let out = SystemRunner
            .run(&argv(&["cat"]), Some("service_type: osd\n"))
            .await
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "service_type: osd\n");
    }

    #[tokio::test]
    async fn unread_stdin_is_not_an_error() {
        let input = "x".repeat(200_000);
        let out = SystemRunner
            .run(&argv(&["sh", "-c", "echo done; exit 0"]), Some(&input))
            .await
            .unwrap();
        assert_eq!(out.rc, 0);
        assert_eq!(out.stdout, "done\n");
    }

    #[tokio::test]
    async fn large_stdin_and_stdout_do_not_deadlock() {
        let input = "x".repeat(200_000);
        let args = argv(&["sh", "-c", "head -c 200000 /dev/zero; cat >/dev/null"]);
        let run = SystemRunner.run(
            &args,
            Some(&input),
        );
        let out = tokio::time::timeout(std::time::Duration::from_secs(10), run)
            .await
            .expect("command did not finish")
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.len(), 200_000);
    }

    #[tokio::test]
    async fn killed_by_signal_reports_minus_one() {
        let out = SystemRunner
            .run(&argv(&["sh", "-c", "kill -9 $$"]), None)
            .await
            .unwrap();
        assert_eq!(out.rc, -1);
        assert!(!out.success());
    }
}
