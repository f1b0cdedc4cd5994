//! The command-execution seam.
//!
//! Every external effect in the orchestrator (container manager calls,
//! broker admin CLI invocations) flows through the [`CommandRunner`] trait.
//! This is the single abstraction point that keeps the core testable:
//!
//! - [`ProcessRunner`]: production implementation over `tokio::process`
//! - [`MockRunner`]: in-memory scripted implementation for tests
//!
//! A command that *runs* but exits non-zero is not a runner error; the exit
//! status and captured output are returned in [`CommandOutput`] and each
//! component maps failures into its own typed error (supervisor, topic,
//! format, ...). The runner itself only fails when the program cannot be
//! spawned at all.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{Error, Result};

/// A fully-specified external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    stdin: Option<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Data to feed to the child's stdin (used by the console producer).
    pub fn stdin(mut self, data: impl Into<String>) -> Self {
        self.stdin = Some(data.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// The command line as a single display string, for logs and mock
    /// matching.
    pub fn rendered(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// A zero-exit output with the given stdout. Convenient for tests.
    pub fn ok_with(stdout: impl Into<String>) -> Self {
        CommandOutput {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A non-zero-exit output with the given stderr. Convenient for tests.
    pub fn err_with(status: i32, stderr: impl Into<String>) -> Self {
        CommandOutput {
            status,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    #[inline]
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// The most useful error text a failed tool produced: stderr if any,
    /// otherwise stdout (some Kafka tools print errors to stdout).
    pub fn error_text(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

/// Async seam over external process execution.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command to completion, capturing output.
    ///
    /// Returns `Err` only when the command could not be spawned or waited
    /// on; a non-zero exit is reported through [`CommandOutput::status`].
    async fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput>;
}

// ============================================================================
// Production runner
// ============================================================================

/// Runs commands as real child processes via `tokio::process`.
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        ProcessRunner
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput> {
        debug!(command = %cmd.rendered(), "Running external command");

        let mut child = tokio::process::Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(if cmd.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::CommandFailed {
                program: cmd.program.clone(),
                message: e.to_string(),
            })?;

        if let Some(input) = &cmd.stdin {
            // stdin handle exists because we requested a pipe above
            if let Some(mut handle) = child.stdin.take() {
                handle
                    .write_all(input.as_bytes())
                    .await
                    .map_err(|e| Error::CommandFailed {
                        program: cmd.program.clone(),
                        message: format!("failed to write stdin: {}", e),
                    })?;
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::CommandFailed {
                program: cmd.program.clone(),
                message: e.to_string(),
            })?;

        let result = CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        debug!(
            command = %cmd.rendered(),
            status = result.status,
            "External command finished"
        );

        Ok(result)
    }
}

// ============================================================================
// Mock runner
// ============================================================================

struct Rule {
    needle: String,
    response: MockResponse,
}

enum MockResponse {
    Output(CommandOutput),
    SpawnFailure(String),
}

#[derive(Default)]
struct MockState {
    once: Vec<Rule>,
    always: Vec<Rule>,
    calls: Vec<CommandSpec>,
}

/// In-memory scripted runner for tests.
///
/// Rules match on a substring of the rendered command line. One-shot rules
/// (registered with [`on_once`](MockRunner::on_once)) are consumed in
/// registration order before persistent rules (registered with
/// [`on`](MockRunner::on)) are considered; among persistent rules the first
/// match in registration order wins. A command matching no rule succeeds
/// with empty output, so tests only script the calls they care about.
///
/// Every call is recorded and can be inspected afterwards; the
/// confirmation-gate tests assert on the *absence* of a recorded destructive
/// call.
#[derive(Default)]
pub struct MockRunner {
    state: std::sync::Mutex<MockState>,
}

impl MockRunner {
    pub fn new() -> Self {
        MockRunner::default()
    }

    /// Respond with `output` every time the rendered command contains
    /// `needle`.
    pub fn on(&self, needle: impl Into<String>, output: CommandOutput) {
        self.state.lock().unwrap().always.push(Rule {
            needle: needle.into(),
            response: MockResponse::Output(output),
        });
    }

    /// Respond with `output` the next time the rendered command contains
    /// `needle`, then discard the rule. One-shot rules model sequences such
    /// as "unhealthy, unhealthy, healthy".
    pub fn on_once(&self, needle: impl Into<String>, output: CommandOutput) {
        self.state.lock().unwrap().once.push(Rule {
            needle: needle.into(),
            response: MockResponse::Output(output),
        });
    }

    /// Simulate an unspawnable program (e.g. docker not installed) for
    /// commands containing `needle`.
    pub fn fail_spawn(&self, needle: impl Into<String>, message: impl Into<String>) {
        self.state.lock().unwrap().always.push(Rule {
            needle: needle.into(),
            response: MockResponse::SpawnFailure(message.into()),
        });
    }

    /// All commands run so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of recorded commands whose rendered line contains `needle`.
    pub fn calls_matching(&self, needle: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.rendered().contains(needle))
            .count()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput> {
        let rendered = cmd.rendered();
        let mut state = self.state.lock().unwrap();
        state.calls.push(cmd.clone());

        if let Some(pos) = state
            .once
            .iter()
            .position(|r| rendered.contains(&r.needle))
        {
            let rule = state.once.remove(pos);
            return match rule.response {
                MockResponse::Output(out) => Ok(out),
                MockResponse::SpawnFailure(msg) => Err(Error::CommandFailed {
                    program: cmd.program().to_string(),
                    message: msg,
                }),
            };
        }

        if let Some(rule) = state.always.iter().find(|r| rendered.contains(&r.needle)) {
            return match &rule.response {
                MockResponse::Output(out) => Ok(out.clone()),
                MockResponse::SpawnFailure(msg) => Err(Error::CommandFailed {
                    program: cmd.program().to_string(),
                    message: msg.clone(),
                }),
            };
        }

        Ok(CommandOutput::ok_with(""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spec_rendering() {
        let cmd = CommandSpec::new("docker")
            .arg("compose")
            .args(["-f", "docker-compose.yml", "up", "-d"]);
        assert_eq!(cmd.rendered(), "docker compose -f docker-compose.yml up -d");
        assert_eq!(CommandSpec::new("docker").rendered(), "docker");
    }

    #[test]
    fn test_output_error_text_prefers_stderr() {
        let out = CommandOutput {
            status: 1,
            stdout: "partial stdout".to_string(),
            stderr: "real error\n".to_string(),
        };
        assert_eq!(out.error_text(), "real error");

        let out = CommandOutput {
            status: 1,
            stdout: "Error: Topic 'x' does not exist\n".to_string(),
            stderr: String::new(),
        };
        assert_eq!(out.error_text(), "Error: Topic 'x' does not exist");
    }

    #[tokio::test]
    async fn test_mock_unmatched_commands_succeed() {
        let mock = MockRunner::new();
        let out = mock.run(&CommandSpec::new("anything")).await.unwrap();
        assert!(out.success());
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_once_rules_are_consumed_in_order() {
        let mock = MockRunner::new();
        mock.on_once("ps", CommandOutput::ok_with("first"));
        mock.on_once("ps", CommandOutput::ok_with("second"));
        mock.on("ps", CommandOutput::ok_with("steady"));

        let cmd = CommandSpec::new("docker").args(["compose", "ps"]);
        assert_eq!(mock.run(&cmd).await.unwrap().stdout, "first");
        assert_eq!(mock.run(&cmd).await.unwrap().stdout, "second");
        assert_eq!(mock.run(&cmd).await.unwrap().stdout, "steady");
        assert_eq!(mock.calls_matching("ps"), 3);
    }

    #[tokio::test]
    async fn test_mock_spawn_failure() {
        let mock = MockRunner::new();
        mock.fail_spawn("docker", "No such file or directory");
        let err = mock
            .run(&CommandSpec::new("docker").arg("info"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn test_process_runner_captures_output() {
        let runner = ProcessRunner::new();
        let out = runner
            .run(&CommandSpec::new("sh").args(["-c", "echo hello; echo oops >&2; exit 3"]))
            .await
            .unwrap();
        assert_eq!(out.status, 3);
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn test_process_runner_feeds_stdin() {
        let runner = ProcessRunner::new();
        let out = runner
            .run(&CommandSpec::new("cat").stdin("line-1\nline-2\n"))
            .await
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "line-1\nline-2\n");
    }

    #[tokio::test]
    async fn test_process_runner_missing_program() {
        let runner = ProcessRunner::new();
        let err = runner
            .run(&CommandSpec::new("definitely-not-a-real-program-xyz"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CommandFailed { .. }));
    }
}
