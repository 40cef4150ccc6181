//! Command execution on the host.
//!
//! Every mutation the provisioner performs goes through [`CommandRunner`], so
//! the stage logic can be exercised against a recording fake.

use std::fmt;
use std::io::Write;
use std::process::{Command, Stdio};

use crate::error::{ProvisionError, Result};

/// A single external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment for this invocation only.
    pub env: Vec<(String, String)>,
    /// Bytes written to the child's stdin.
    pub stdin: Option<String>,
    /// Needs root; prefixed with `sudo` when the tool runs unprivileged.
    pub privileged: bool,
}

impl CommandSpec {
    pub fn new(program: &str) -> Self {
        CommandSpec {
            program: program.to_string(),
            args: Vec::new(),
            env: Vec::new(),
            stdin: None,
            privileged: false,
        }
    }

    /// Same as [`CommandSpec::new`] but marked as requiring root.
    pub fn root(program: &str) -> Self {
        CommandSpec {
            privileged: true,
            ..CommandSpec::new(program)
        }
    }

    /// `sh -s` as root with `script` on stdin, for upstream installer scripts.
    pub fn script(script: impl Into<String>) -> Self {
        CommandSpec::root("sh").arg("-s").stdin(script)
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

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// True when `needle` appears as one of the arguments.
    pub fn has_arg(&self, needle: &str) -> bool {
        self.args.iter().any(|a| a == needle)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: &str) -> Self {
        CommandOutput {
            success: true,
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: &str) -> Self {
        CommandOutput {
            success: false,
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    fn describe_code(&self) -> String {
        match self.code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs commands against the host.
pub trait CommandRunner {
    /// Run a command and return its output whatever the exit status.
    fn output(&self, cmd: &CommandSpec) -> Result<CommandOutput>;

    /// Run a command, treating a non-zero exit as fatal.
    fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput> {
        let out = self.output(cmd)?;
        if out.success {
            Ok(out)
        } else {
            Err(ProvisionError::CommandFailed {
                command: cmd.to_string(),
                code: out.describe_code(),
                stderr: out.stderr,
            })
        }
    }
}

/// Runs commands with `std::process::Command`.
///
/// Output is captured rather than streamed so failures can be reported with
/// the command's stderr; long steps (upgrades, pulls) stay silent until done.
pub struct SystemRunner {
    use_sudo: bool,
}

impl SystemRunner {
    /// Detects whether we are root; if not, privileged commands go through `sudo`.
    pub fn detect() -> Self {
        let is_root = Command::new("id")
            .arg("-u")
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .map(|s| s.trim() == "0")
            .unwrap_or(false);

        tracing::debug!(is_root, "command runner initialized");
        SystemRunner { use_sudo: !is_root }
    }

    fn build(&self, cmd: &CommandSpec) -> Command {
        let mut command = if cmd.privileged && self.use_sudo {
            let mut c = Command::new("sudo");
            // sudo drops the caller's environment; pass ours explicitly.
            for (key, value) in &cmd.env {
                c.arg(format!("{}={}", key, value));
            }
            c.arg(&cmd.program);
            c
        } else {
            let mut c = Command::new(&cmd.program);
            c.envs(cmd.env.iter().map(|(k, v)| (k, v)));
            c
        };
        command.args(&cmd.args);
        command
    }
}

impl CommandRunner for SystemRunner {
    fn output(&self, cmd: &CommandSpec) -> Result<CommandOutput> {
        tracing::debug!(command = %cmd, privileged = cmd.privileged, "running");

        let spawn_err = |source| ProvisionError::Spawn {
            command: cmd.to_string(),
            source,
        };

        let mut command = self.build(cmd);
        command
            .stdin(if cmd.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(spawn_err)?;
        // Feed stdin from its own thread: a script that writes more than a
        // pipe buffer before reading the rest of its input would otherwise
        // block both sides.
        let feeder = match (cmd.stdin.clone(), child.stdin.take()) {
            (Some(input), Some(mut stdin)) => {
                Some(std::thread::spawn(move || stdin.write_all(input.as_bytes())))
            }
            _ => None,
        };
        let output = child.wait_with_output().map_err(spawn_err)?;
        if let Some(feeder) = feeder {
            // A child that exits early closes the pipe; its status says why.
            if let Ok(Err(e)) = feeder.join() {
                tracing::debug!(command = %cmd, error = %e, "stdin not fully consumed");
            }
        }

        let result = CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        tracing::debug!(command = %cmd, code = ?result.code, "finished");
        Ok(result)
    }
}

/// Searches `PATH` for an executable named `program`.
pub fn command_exists(program: &str) -> bool {
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| {
        let candidate = dir.join(program);
        candidate.is_file() && is_executable(&candidate)
    })
}

#[cfg(unix)]
fn is_executable(path: &std::path::Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &std::path::Path) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_quotes_arguments_with_spaces() {
        let cmd = CommandSpec::root("ufw")
            .args(["allow", "from", "10.0.0.0/8"])
            .arg("comment")
            .arg("Ollama API");
        assert_eq!(cmd.to_string(), "ufw allow from 10.0.0.0/8 comment 'Ollama API'");
    }

    #[test]
    fn scripts_run_privileged_from_stdin() {
        let cmd = CommandSpec::script("#!/bin/sh\necho hi\n");
        assert!(cmd.privileged);
        assert_eq!(cmd.to_string(), "sh -s");
        assert_eq!(cmd.stdin.as_deref(), Some("#!/bin/sh\necho hi\n"));
    }

    #[test]
    fn run_turns_nonzero_exit_into_error() {
        struct Failing;
        impl CommandRunner for Failing {
            fn output(&self, _cmd: &CommandSpec) -> Result<CommandOutput> {
                Ok(CommandOutput::failed(100, "lock held"))
            }
        }

        let err = Failing.run(&CommandSpec::root("apt-get").arg("update")).unwrap_err();
        match err {
            ProvisionError::CommandFailed { command, code, stderr } => {
                assert_eq!(command, "apt-get update");
                assert_eq!(code, "exit status 100");
                assert_eq!(stderr, "lock held");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_captures_stdout_and_feeds_stdin() {
        let runner = SystemRunner { use_sudo: false };
        let out = runner
            .run(&CommandSpec::new("cat").stdin("hello\n"))
            .unwrap();
        assert_eq!(out.stdout, "hello\n");

        let failed = runner.output(&CommandSpec::new("sh").args(["-c", "exit 3"])).unwrap();
        assert!(!failed.success);
        assert_eq!(failed.code, Some(3));
    }

    #[cfg(unix)]
    #[test]
    fn script_exit_status_is_reported() {
        let runner = SystemRunner { use_sudo: false };
        let script = CommandSpec {
            privileged: false,
            ..CommandSpec::script("echo starting\nexit 4\n")
        };
        let err = runner.run(&script).unwrap_err();
        assert!(matches!(err, ProvisionError::CommandFailed { ref code, .. } if code == "exit status 4"));
    }

    #[cfg(unix)]
    #[test]
    fn large_stdin_and_stdout_do_not_block() {
        let runner = SystemRunner { use_sudo: false };
        let input = "x".repeat(256 * 1024);
        let cmd = CommandSpec::new("sh")
            .args(["-c", "head -c 200000 /dev/zero; wc -c"])
            .stdin(input);
        let out = runner.run(&cmd).unwrap();
        assert!(out.stdout.trim_end().ends_with("262144"));
    }

    #[test]
    fn missing_program_is_not_found() {
        assert!(!command_exists("llmhost-definitely-not-a-real-binary"));
    }
}
