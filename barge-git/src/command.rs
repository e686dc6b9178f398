//! Builder for git plumbing subprocess invocations.
//!
//! Every interaction with a repository goes through `git` itself. The
//! builder assembles `git <subcommand> <flags> <args> [-- <post args>]`,
//! runs it against a working directory, captures stdout, and turns a
//! non-zero exit into a structured [`CommandError`] carrying the exit
//! code and stderr so callers can classify specific git failures.

use std::io::Write;
use std::path::Path;
use std::process::Stdio;

/// Structured failure of a git subprocess.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The process could not be started or its stdio could not be fed.
    #[error("failed to run `git {subcommand}`: {source}")]
    Spawn {
        subcommand: String,
        #[source]
        source: std::io::Error,
    },

    /// The process ran and exited with a non-zero status.
    #[error("`git {subcommand}` exited with code {code}: {stderr}")]
    Exited {
        subcommand: String,
        code: i32,
        stderr: String,
        stdout: Vec<u8>,
    },
}

impl CommandError {
    /// The subprocess exit code, if it ran at all.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            CommandError::Spawn { .. } => None,
            CommandError::Exited { code, .. } => Some(*code),
        }
    }

    pub fn is_exit_code(&self, want: i32) -> bool {
        self.exit_code() == Some(want)
    }

    /// Captured stderr; empty if the process never ran.
    pub fn stderr(&self) -> &str {
        match self {
            CommandError::Spawn { .. } => "",
            CommandError::Exited { stderr, .. } => stderr,
        }
    }

    /// Stdout captured before the process failed. Some subcommands
    /// (notably `merge-tree`) report results on stdout with a non-zero
    /// exit.
    pub fn stdout(&self) -> &[u8] {
        match self {
            CommandError::Spawn { .. } => &[],
            CommandError::Exited { stdout, .. } => stdout,
        }
    }
}

/// Captured output of a successful run.
#[derive(Debug)]
pub struct Output {
    pub stdout: Vec<u8>,
}

impl Output {
    /// Stdout as trimmed UTF-8, invalid sequences replaced.
    pub fn stdout_trimmed(&self) -> String {
        String::from_utf8_lossy(&self.stdout).trim().to_string()
    }
}

/// One git subprocess invocation in the making.
///
/// Flags come before positional arguments; arguments after the `--`
/// separator are appended last. Environment variables are added on top
/// of the inherited environment.
#[derive(Debug, Clone)]
pub struct Command {
    subcommand: String,
    flags: Vec<String>,
    args: Vec<String>,
    post_sep_args: Vec<String>,
    envs: Vec<(String, String)>,
    stdin: Option<Vec<u8>>,
}

impl Command {
    pub fn new(subcommand: impl Into<String>) -> Self {
        Self {
            subcommand: subcommand.into(),
            flags: Vec::new(),
            args: Vec::new(),
            post_sep_args: Vec::new(),
            envs: Vec::new(),
            stdin: None,
        }
    }

    pub fn flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.push(flag.into());
        self
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

    /// Add an argument after the `--` separator.
    pub fn post_sep_arg(mut self, arg: impl Into<String>) -> Self {
        self.post_sep_args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn stdin(mut self, data: Vec<u8>) -> Self {
        self.stdin = Some(data);
        self
    }

    /// Run the command with `dir` as working directory, waiting for
    /// completion and capturing stdout.
    pub fn run(self, dir: &Path) -> Result<Output, CommandError> {
        tracing::debug!(subcommand = %self.subcommand, dir = %dir.display(), "running git command");

        let mut cmd = std::process::Command::new("git");
        cmd.arg(&self.subcommand)
            .args(&self.flags)
            .args(&self.args);
        if !self.post_sep_args.is_empty() {
            cmd.arg("--").args(&self.post_sep_args);
        }
        cmd.current_dir(dir)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(if self.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|source| CommandError::Spawn {
            subcommand: self.subcommand.clone(),
            source,
        })?;

        if let Some(data) = &self.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                // A broken pipe means git exited early; let the exit
                // status below carry the real failure.
                match stdin.write_all(data) {
                    Ok(()) => {}
                    Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => {}
                    Err(source) => {
                        return Err(CommandError::Spawn {
                            subcommand: self.subcommand.clone(),
                            source,
                        })
                    }
                }
            }
        }

        let out = child
            .wait_with_output()
            .map_err(|source| CommandError::Spawn {
                subcommand: self.subcommand.clone(),
                source,
            })?;

        if !out.status.success() {
            let code = out.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
            tracing::debug!(subcommand = %self.subcommand, code, "git command failed");
            return Err(CommandError::Exited {
                subcommand: self.subcommand,
                code,
                stderr,
                stdout: out.stdout,
            });
        }

        Ok(Output { stdout: out.stdout })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let out = Command::new("version").run(dir.path()).unwrap();
        assert!(out.stdout_trimmed().starts_with("git version"));
    }

    #[test]
    fn nonzero_exit_carries_code_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let err = Command::new("rev-parse")
            .flag("--verify")
            .arg("definitely-not-a-rev")
            .run(dir.path())
            .unwrap_err();
        assert!(err.exit_code().is_some());
        assert!(!err.stderr().is_empty());
    }

    #[test]
    fn stdin_is_fed_to_the_subprocess() {
        let dir = tempfile::tempdir().unwrap();
        Command::new("init").flag("-q").run(dir.path()).unwrap();
        let out = Command::new("hash-object")
            .flag("--stdin")
            .stdin(b"hello\n".to_vec())
            .run(dir.path())
            .unwrap();
        assert_eq!(out.stdout_trimmed().len(), 40);
    }
}
