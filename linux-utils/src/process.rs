// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A process executor.
//!
//! All utility invocations flow through the [`Executor`] trait so that the
//! reconciliation engine can be exercised against a [`FakeExecutor`] in tests
//! while production uses a [`HostExecutor`].

use slog::{debug, info, Logger};
use std::collections::HashSet;
use std::env;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitStatus};
use std::str::from_utf8;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub use std::process::Output;

/// The commonly-used "safe-to-reference" type describing the Executor as a
/// trait object.
pub type BoxedExecutor = Arc<dyn Executor>;

/// Describes an "executor", which can run [Command]s and return a response.
///
/// - In production, this is usually a [HostExecutor].
/// - Under test, a [FakeExecutor] may be used.
pub trait Executor: Send + Sync {
    fn execute(&self, command: &mut Command) -> Result<Output, ExecutionError>;
}

#[derive(Debug)]
pub struct FailureInfo {
    pub command: String,
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl std::fmt::Display for FailureInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "Command [{}] executed and failed with status: {}.",
            self.command, self.status
        )?;
        let stdout = self.stdout.trim_end();
        let stderr = self.stderr.trim_end();
        if !stdout.is_empty() {
            write!(f, " stdout: {}.", stdout)?;
        }
        if !stderr.is_empty() {
            write!(f, " stderr: {}", stderr)?;
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ExecutionError {
    #[error("{program} is either not installed or accessible from $PATH")]
    NotFound { program: String },

    #[error("Failed to start execution of [{command}]: {err}")]
    ExecutionStart { command: String, err: std::io::Error },

    #[error("{0}")]
    CommandFailure(Box<FailureInfo>),
}

/// Wrapper around the input of a [`Command`] as strings.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Input {
    pub program: String,
    pub args: Vec<String>,
}

impl Input {
    pub fn new<S: AsRef<str>>(program: S, args: Vec<S>) -> Self {
        Self {
            program: program.as_ref().to_string(),
            args: args.into_iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }

    /// Short-hand for a whitespace-separated string, which can be provided
    /// "like a shell command".
    pub fn shell<S: AsRef<str>>(input: S) -> Self {
        let mut args = input.as_ref().split_whitespace();
        Self::new(
            args.next().expect("Needs at least a program"),
            args.collect(),
        )
    }
}

impl std::fmt::Display for Input {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

fn os_str_to_string(s: &std::ffi::OsStr) -> String {
    s.to_string_lossy().to_string()
}

impl From<&Command> for Input {
    fn from(command: &Command) -> Self {
        Self {
            program: os_str_to_string(command.get_program()),
            args: command.get_args().map(os_str_to_string).collect(),
        }
    }
}

fn log_command(log: &Logger, id: u64, command: &Command) {
    info!(log, "{id} - Running Command: [{}]", Input::from(command));
}

fn log_output(log: &Logger, id: u64, output: &Output) {
    info!(
        log,
        "{id} - {} (status code: {})",
        if output.status.success() { "OK" } else { "ERROR" },
        output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "none".to_string()),
    );
    if !output.stdout.is_empty() {
        debug!(
            log,
            "{id} - stdout: {}",
            from_utf8(&output.stdout).unwrap_or("<Not valid UTF-8>"),
        );
    }
    if !output.stderr.is_empty() {
        debug!(
            log,
            "{id} - stderr: {}",
            from_utf8(&output.stderr).unwrap_or("<Not valid UTF-8>"),
        );
    }
}

fn output_to_exec_error(
    command: &Command,
    output: &Output,
) -> ExecutionError {
    ExecutionError::CommandFailure(Box::new(FailureInfo {
        command: Input::from(command).to_string(),
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }))
}

/// Convenience functions for usage in tests, to perform common operations
/// with minimal boilerplate.
pub trait OutputExt: Sized {
    fn success() -> Self;
    fn failure() -> Self;
    fn set_stdout<S: AsRef<str>>(self, stdout: S) -> Self;
    fn set_stderr<S: AsRef<str>>(self, stderr: S) -> Self;
}

impl OutputExt for Output {
    fn success() -> Self {
        Output { status: ExitStatus::from_raw(0), stdout: vec![], stderr: vec![] }
    }

    fn failure() -> Self {
        Output {
            status: ExitStatus::from_raw(1 << 8),
            stdout: vec![],
            stderr: vec![],
        }
    }

    fn set_stdout<S: AsRef<str>>(mut self, stdout: S) -> Self {
        self.stdout = stdout.as_ref().as_bytes().to_vec();
        self
    }

    fn set_stderr<S: AsRef<str>>(mut self, stderr: S) -> Self {
        self.stderr = stderr.as_ref().as_bytes().to_vec();
        self
    }
}

/// Describes a fully-completed command.
#[derive(Clone)]
pub struct CompletedCommand {
    pub input: Input,
    pub output: Output,
}

impl CompletedCommand {
    fn new(command: &Command, output: Output) -> Self {
        Self { input: Input::from(command), output }
    }
}

/// A handler that may be used for setting inputs/outputs to the executor
/// when these commands are known ahead-of-time.
///
/// See: [FakeExecutor::set_static_handler] for usage.
pub struct StaticHandler {
    expected: Vec<(Input, Output)>,
    index: usize,
}

impl StaticHandler {
    pub fn new() -> Self {
        Self { expected: Vec::new(), index: 0 }
    }

    pub fn expect(&mut self, input: Input, output: Output) {
        self.expected.push((input, output));
    }

    pub fn expect_ok<S: AsRef<str>>(&mut self, input: S) {
        self.expect(Input::shell(input), Output::success())
    }

    pub fn expect_fail<S: AsRef<str>>(&mut self, input: S) {
        self.expect(Input::shell(input), Output::failure())
    }

    fn execute(&mut self, command: &Command) -> Output {
        let input = Input::from(command);
        let expected = &self
            .expected
            .get(self.index)
            .unwrap_or_else(|| panic!("Unexpected command: {input}"));
        self.index += 1;
        assert_eq!(input, expected.0);
        expected.1.clone()
    }
}

impl Default for StaticHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for StaticHandler {
    fn drop(&mut self) {
        let expected = self.expected.len();
        let actual = self.index;
        if actual < expected && !std::thread::panicking() {
            let next = &self.expected[actual].0;
            panic!(
                "Only saw {actual} calls, expected {expected}\n\
                 Next would have been: {next}"
            );
        }
    }
}

pub type ExecutorFn = dyn FnMut(&Command) -> Output + Send + Sync;
pub type BoxedExecutorFn = Box<ExecutorFn>;

/// An executor which can expect certain inputs, and respond with specific
/// outputs.
pub struct FakeExecutor {
    log: Logger,
    counter: AtomicU64,
    all_operations: Mutex<Vec<CompletedCommand>>,
    handler: Mutex<BoxedExecutorFn>,
}

impl FakeExecutor {
    pub fn new(log: Logger) -> Arc<FakeExecutor> {
        Arc::new(Self {
            log,
            counter: AtomicU64::new(0),
            all_operations: Mutex::new(vec![]),
            handler: Mutex::new(Box::new(|_cmd| Output::success())),
        })
    }

    /// Set the request handler to an arbitrary function.
    pub fn set_handler(&self, f: BoxedExecutorFn) {
        *self.handler.lock().unwrap() = f;
    }

    /// Set the request handler to a static set of inputs and outputs.
    pub fn set_static_handler(&self, mut handler: StaticHandler) {
        self.set_handler(Box::new(move |cmd| -> Output { handler.execute(cmd) }));
    }

    /// Perform some type coercion to access a commonly-used trait object.
    pub fn as_executor(self: Arc<Self>) -> BoxedExecutor {
        self
    }

    pub fn all_operations(&self) -> Vec<CompletedCommand> {
        (*self.all_operations.lock().unwrap()).clone()
    }
}

impl Executor for FakeExecutor {
    fn execute(&self, command: &mut Command) -> Result<Output, ExecutionError> {
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        log_command(&self.log, id, command);

        let output = self.handler.lock().unwrap()(command);
        if !output.status.success() {
            return Err(output_to_exec_error(command, &output));
        }
        log_output(&self.log, id, &output);
        self.all_operations
            .lock()
            .unwrap()
            .push(CompletedCommand::new(command, output.clone()));
        Ok(output)
    }
}

/// Returns true if `$PATH` contains an executable regular file with the
/// given name.
fn find_in_path(program: &str) -> bool {
    let Some(path) = env::var_os("PATH") else {
        return false;
    };
    for dir in env::split_paths(&path) {
        let candidate = dir.join(program);
        let Ok(metadata) = candidate.metadata() else {
            continue;
        };
        if metadata.is_file() && metadata.permissions().mode() & 0o111 != 0 {
            return true;
        }
    }
    false
}

/// Executor which runs commands on the host.
///
/// The presence of each distinct program is resolved against `$PATH` on
/// first use and cached for the life of the executor, so a missing utility
/// is reported by name rather than as a raw spawn failure.
pub struct HostExecutor {
    log: Logger,
    counter: AtomicU64,
    verified: Mutex<HashSet<String>>,
}

impl HostExecutor {
    pub fn new(log: Logger) -> Arc<Self> {
        Arc::new(Self {
            log,
            counter: AtomicU64::new(0),
            verified: Mutex::new(HashSet::new()),
        })
    }

    pub fn as_executor(self: Arc<Self>) -> BoxedExecutor {
        self
    }

    fn verify_presence(&self, program: &str) -> Result<(), ExecutionError> {
        let mut verified = self.verified.lock().unwrap();
        if verified.contains(program) {
            return Ok(());
        }
        if !find_in_path(program) {
            return Err(ExecutionError::NotFound { program: program.to_string() });
        }
        verified.insert(program.to_string());
        Ok(())
    }
}

impl Executor for HostExecutor {
    fn execute(&self, command: &mut Command) -> Result<Output, ExecutionError> {
        self.verify_presence(&os_str_to_string(command.get_program()))?;

        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        log_command(&self.log, id, command);
        let output = command.output().map_err(|err| {
            ExecutionError::ExecutionStart {
                command: Input::from(&*command).to_string(),
                err,
            }
        })?;
        log_output(&self.log, id, &output);

        if !output.status.success() {
            return Err(output_to_exec_error(command, &output));
        }
        Ok(output)
    }
}

/// The trimmed stdout of a completed command, for wrappers that parse
/// single-value responses.
pub fn stdout_string(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim_end_matches('\n').to_string()
}

#[cfg(test)]
mod test {
    use super::*;
    use slog::o;

    fn test_log() -> Logger {
        Logger::root(slog::Discard, o!())
    }

    #[test]
    fn test_static_handler_round_trip() {
        let executor = FakeExecutor::new(test_log());
        let mut handler = StaticHandler::new();
        handler.expect(
            Input::shell("blockdev --getsize64 /dev/xvdf"),
            Output::success().set_stdout("1073741824\n"),
        );
        executor.set_static_handler(handler);

        let mut command = Command::new("blockdev");
        command.args(["--getsize64", "/dev/xvdf"]);
        let output = executor.execute(&mut command).unwrap();
        assert_eq!(stdout_string(&output), "1073741824");
        assert_eq!(executor.all_operations().len(), 1);
    }

    #[test]
    fn test_failure_surfaces_stderr() {
        let executor = FakeExecutor::new(test_log());
        let mut handler = StaticHandler::new();
        handler.expect(
            Input::shell("mount /dev/xvdf /mnt/app"),
            Output::failure().set_stderr("mount: unknown filesystem type"),
        );
        executor.set_static_handler(handler);

        let mut command = Command::new("mount");
        command.args(["/dev/xvdf", "/mnt/app"]);
        let err = executor.execute(&mut command).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("mount /dev/xvdf /mnt/app"), "{message}");
        assert!(message.contains("unknown filesystem type"), "{message}");
    }

    #[test]
    fn test_host_executor_reports_missing_utility() {
        let executor = HostExecutor::new(test_log());
        let mut command = Command::new("utility-that-does-not-exist");
        let err = executor.execute(&mut command).unwrap_err();
        assert_eq!(
            err.to_string(),
            "utility-that-does-not-exist is either not installed or \
             accessible from $PATH"
        );
    }
}
