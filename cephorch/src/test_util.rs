//! Test doubles for the command layer.
//!
//! `MockRunner` records every command it is asked to run and replays
//! pre-configured responses in order. Once the script is exhausted it answers
//! with an empty successful output.

use std::collections::VecDeque;
use std::io;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::clients::{CommandOutput, CommandRunner};

enum Scripted {
    Output { rc: i32, stdout: String, stderr: String },
    SpawnError(String),
}

/// Records commands and returns scripted outputs.
#[derive(Default)]
pub struct MockRunner {
    responses: Mutex<VecDeque<Scripted>>,
    commands: Mutex<Vec<Vec<String>>>,
    stdin: Mutex<Vec<Option<String>>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response with the given exit code and output.
    pub fn respond(&self, rc: i32, stdout: &str, stderr: &str) -> &Self {
        self.responses.lock().unwrap().push_back(Scripted::Output {
            rc,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        });
        self
    }

    /// Queue a successful response.
    pub fn respond_ok(&self, stdout: &str) -> &Self {
        self.respond(0, stdout, "")
    }

    /// Queue a failure to spawn the process.
    pub fn fail_spawn(&self, message: &str) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Scripted::SpawnError(message.to_string()));
        self
    }

    /// Every command run so far, in order.
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.commands.lock().unwrap().clone()
    }

    /// The stdin passed with each command, in order.
    pub fn stdin_inputs(&self) -> Vec<Option<String>> {
        self.stdin.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.commands.lock().unwrap().len()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, cmd: &[String], stdin: Option<&str>) -> io::Result<CommandOutput> {
        self.commands.lock().unwrap().push(cmd.to_vec());
        self.stdin.lock().unwrap().push(stdin.map(String::from));

        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Output { rc, stdout, stderr }) => Ok(CommandOutput {
                cmd: cmd.to_vec(),
                rc,
                stdout,
                stderr,
            }),
            Some(Scripted::SpawnError(message)) => {
                Err(io::Error::new(io::ErrorKind::NotFound, message))
            }
            None => Ok(CommandOutput {
                cmd: cmd.to_vec(),
                ..Default::default()
            }),
        }
    }
}
