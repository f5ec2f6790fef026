// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::os;
use crate::{entry::CLASSPATH_ENV, errors::LaunchError, runner::ExitClass};
use bytesize::ByteSize;
use camino::{Utf8Path, Utf8PathBuf};
use std::{collections::BTreeMap, fmt, time::Duration};
use tracing::{debug, error, warn};

/// How often a child with a timeout is polled for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A child process running the testforge entry point.
///
/// The full command line is, in order:
///
/// 1. the debugger command, if any;
/// 2. the program;
/// 3. one `-D key=value` argument per property;
/// 4. `--enable-assertions`, if assertions are enabled;
/// 5. the arguments added with [`arg`](Self::arg), which end with the test classes directory.
///
/// Property values are passed through unchanged, so the child expands `${name}` references in
/// them. Every other argument should be escaped with
/// [`escape_property_sigil`](crate::helpers::escape_property_sigil) by the caller.
#[derive(Clone, Debug)]
pub struct ChildCommand {
    program: Utf8PathBuf,
    args: Vec<String>,
    classpath: Vec<Utf8PathBuf>,
    properties: BTreeMap<String, String>,
    env: BTreeMap<String, String>,
    current_dir: Option<Utf8PathBuf>,
    max_memory: Option<ByteSize>,
    enable_assertions: bool,
    debugger: Vec<String>,
    timeout: Option<Duration>,
}

impl ChildCommand {
    /// Creates a new command running `program`.
    pub fn new(program: impl Into<Utf8PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            classpath: Vec::new(),
            properties: BTreeMap::new(),
            env: BTreeMap::new(),
            current_dir: None,
            max_memory: None,
            enable_assertions: false,
            debugger: Vec::new(),
            timeout: None,
        }
    }

    /// Returns the program.
    pub fn program(&self) -> &Utf8Path {
        &self.program
    }

    /// Replaces the program, for example with a coverage runner.
    pub fn set_program(&mut self, program: impl Into<Utf8PathBuf>) -> &mut Self {
        self.program = program.into();
        self
    }

    /// Appends an argument.
    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    /// Appends arguments.
    pub fn args(&mut self, args: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the process-level classpath of the child.
    pub fn classpath(
        &mut self,
        classpath: impl IntoIterator<Item = impl Into<Utf8PathBuf>>,
    ) -> &mut Self {
        self.classpath = classpath.into_iter().map(Into::into).collect();
        self
    }

    /// Limits the address space of the child.
    pub fn max_memory(&mut self, max_memory: Option<ByteSize>) -> &mut Self {
        self.max_memory = max_memory;
        self
    }

    /// Adds properties passed to the child with `-D`.
    pub fn properties<K, V>(&mut self, properties: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.properties.extend(
            properties
                .into_iter()
                .map(|(key, value)| (key.into(), value.into())),
        );
        self
    }

    /// Adds environment variables for the child.
    pub fn env<K, V>(&mut self, env: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(env.into_iter().map(|(key, value)| (key.into(), value.into())));
        self
    }

    /// Sets the working directory of the child.
    pub fn current_dir(&mut self, dir: Option<impl Into<Utf8PathBuf>>) -> &mut Self {
        self.current_dir = dir.map(Into::into);
        self
    }

    /// Sets whether assertions are enabled in the child.
    pub fn enable_assertions(&mut self, enable: bool) -> &mut Self {
        self.enable_assertions = enable;
        self
    }

    /// Runs the child under a debugger command, such as `gdb --args`.
    pub fn debugger(&mut self, command: Option<&str>) -> Result<&mut Self, LaunchError> {
        self.debugger = match command {
            Some(command) => {
                shell_words::split(command).map_err(|error| LaunchError::DebuggerParse {
                    command: command.to_owned(),
                    error,
                })?
            }
            None => Vec::new(),
        };
        Ok(self)
    }

    /// Kills the child if it runs for longer than `timeout`.
    pub fn timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.timeout = timeout;
        self
    }

    /// Returns the full command line, debugger included.
    pub fn command_line(&self) -> Vec<String> {
        let mut argv = self.debugger.clone();
        argv.push(self.program.to_string());
        for (key, value) in &self.properties {
            argv.push("-D".to_owned());
            argv.push(format!("{key}={value}"));
        }
        if self.enable_assertions {
            argv.push("--enable-assertions".to_owned());
        }
        argv.extend(self.args.iter().cloned());
        argv
    }

    fn to_expression(&self) -> Result<duct::Expression, LaunchError> {
        let mut argv = self.command_line();
        let program = argv.remove(0);
        let mut expression = duct::cmd(program, argv).unchecked();

        if !self.classpath.is_empty() {
            let classpath =
                std::env::join_paths(&self.classpath).map_err(LaunchError::JoinClasspath)?;
            expression = expression.env(CLASSPATH_ENV, classpath);
        }
        for (key, value) in &self.env {
            expression = expression.env(key, value);
        }
        if let Some(dir) = &self.current_dir {
            expression = expression.dir(dir);
        }
        if let Some(max_memory) = self.max_memory {
            expression =
                expression.before_spawn(move |cmd| os::limit_memory(cmd, max_memory));
        }
        Ok(expression)
    }

    /// Runs the child to completion and classifies its exit status.
    ///
    /// A child that cannot be started, is killed by a signal, times out or exits with an
    /// undocumented code is classified as [`ExitClass::Error`].
    pub fn execute(&self) -> Result<ExitClass, LaunchError> {
        let expression = self.to_expression()?;
        debug!("running child: {self}");

        let handle = match expression.start() {
            Ok(handle) => handle,
            Err(err) => {
                error!("failed to start `{}`: {err}", self.program);
                return Ok(ExitClass::Error);
            }
        };

        let status = match self.timeout {
            Some(timeout) => wait_with_timeout(&handle, timeout),
            None => handle.wait().map(|output| Some(output.status)),
        };
        match status {
            Ok(Some(status)) => {
                let exit_class = ExitClass::from_status(status.code());
                debug!("child exited with {status} ({exit_class:?})");
                Ok(exit_class)
            }
            Ok(None) => {
                warn!(
                    "child `{}` timed out after {:?} and was killed",
                    self.program,
                    self.timeout.unwrap_or_default(),
                );
                Ok(ExitClass::Error)
            }
            Err(err) => {
                error!("failed to wait for `{}`: {err}", self.program);
                Ok(ExitClass::Error)
            }
        }
    }
}

fn wait_with_timeout(
    handle: &duct::Handle,
    timeout: Duration,
) -> std::io::Result<Option<std::process::ExitStatus>> {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        if let Some(output) = handle.try_wait()? {
            return Ok(Some(output.status));
        }
        if std::time::Instant::now() >= deadline {
            handle.kill()?;
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

impl fmt::Display for ChildCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&shell_words::join(self.command_line()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn command_line_order() {
        let mut command = ChildCommand::new("/bin/harness");
        command
            .properties([("b", "2"), ("a", "${user}")])
            .enable_assertions(true)
            .args(["-v", "-i", "**/*.class", "/tests"]);
        command.debugger(Some("gdb --args")).unwrap();

        assert_eq!(
            command.command_line(),
            [
                "gdb",
                "--args",
                "/bin/harness",
                "-D",
                "a=${user}",
                "-D",
                "b=2",
                "--enable-assertions",
                "-v",
                "-i",
                "**/*.class",
                "/tests",
            ]
        );
        assert_eq!(
            shell_words::split(&command.to_string()).unwrap(),
            command.command_line(),
            "display is a shell-quoted command line"
        );
    }

    #[test]
    fn invalid_debugger() {
        let err = ChildCommand::new("x")
            .debugger(Some("gdb 'unterminated"))
            .unwrap_err();
        assert!(
            matches!(err, LaunchError::DebuggerParse { .. }),
            "{err:?}"
        );
    }

    #[test]
    fn spawn_failure_is_an_error() {
        let dir = camino_tempfile::tempdir().unwrap();
        let command = ChildCommand::new(dir.path().join("does-not-exist"));
        assert_eq!(command.execute().unwrap(), ExitClass::Error);
    }

    #[cfg(unix)]
    #[test]
    fn exit_codes_and_timeout() {
        let mut ok = ChildCommand::new("/bin/sh");
        ok.args(["-c", "exit 0"]);
        assert_eq!(ok.execute().unwrap(), ExitClass::Ok);

        let mut failure = ChildCommand::new("/bin/sh");
        failure.args(["-c", "exit 254"]);
        assert_eq!(failure.execute().unwrap(), ExitClass::Failure);

        let mut env = ChildCommand::new("/bin/sh");
        env.args(["-c", "test \"$TESTFORGE_CLASSPATH\" = /a:/b && test \"$MODE\" = ci"])
            .classpath(["/a", "/b"])
            .env([("MODE", "ci")]);
        assert_eq!(env.execute().unwrap(), ExitClass::Ok);

        let mut slow = ChildCommand::new("/bin/sh");
        slow.args(["-c", "sleep 30"])
            .timeout(Some(Duration::from_millis(200)));
        assert_eq!(slow.execute().unwrap(), ExitClass::Error);
    }
}
