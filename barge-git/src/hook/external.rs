//! Out-of-process hook execution.
//!
//! Runs the standard server-side hook scripts (`pre-receive`, `update`,
//! `post-receive`) from a repository's hooks directory via
//! `gix-command`. A missing script counts as success. Hook output is
//! captured with a size bound, and a wall-clock budget keeps a hung
//! script from blocking a push indefinitely.

use std::io::Read;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::env::HookEnvironment;
use super::{
    stdin, Environment, HookClient, Output, PostReceiveInput, PreReceiveInput, UpdateInput,
};
use crate::error::Error;

/// Configuration for script hook execution.
#[derive(Debug, Clone)]
pub struct ScriptHookConfig {
    /// Directory containing the hook scripts.
    pub hooks_dir: PathBuf,
    /// Wall-clock budget for one hook execution.
    pub timeout: Duration,
    /// Maximum captured output size (stdout and stderr combined).
    pub max_output_size: usize,
}

impl Default for ScriptHookConfig {
    fn default() -> Self {
        Self {
            hooks_dir: PathBuf::from("hooks"),
            timeout: Duration::from_secs(30),
            max_output_size: 1024 * 1024,
        }
    }
}

struct HookRun {
    success: bool,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

/// Hook client that executes external hook scripts.
pub struct ScriptHooks {
    config: ScriptHookConfig,
    environment: HookEnvironment,
}

impl ScriptHooks {
    pub fn new(config: ScriptHookConfig, environment: HookEnvironment) -> Self {
        Self { config, environment }
    }

    pub fn with_defaults(environment: HookEnvironment) -> Self {
        Self::new(ScriptHookConfig::default(), environment)
    }

    fn execute(
        &self,
        hook_name: &str,
        args: &[String],
        stdin_data: Option<Vec<u8>>,
        environment: &Environment,
    ) -> Result<HookRun, Error> {
        let hook_path = self.config.hooks_dir.join(hook_name);
        if !hook_path.exists() {
            // No hook installed: nothing to gate on.
            return Ok(HookRun {
                success: true,
                stdout: Vec::new(),
                stderr: Vec::new(),
            });
        }

        let started = Instant::now();

        let mut prepare = gix_command::prepare(&hook_path)
            .args(args.iter().map(String::as_str))
            .stdin(if stdin_data.is_some() {
                std::process::Stdio::piped()
            } else {
                std::process::Stdio::null()
            })
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        for (key, value) in self.environment.build(environment) {
            prepare = prepare.env(key, value);
        }

        let mut child = prepare
            .spawn()
            .map_err(|err| Error::io(format!("failed to spawn hook {hook_name:?}"), err))?;

        if let Some(data) = stdin_data {
            if let Some(mut child_stdin) = child.stdin.take() {
                use std::io::Write;
                match child_stdin.write_all(&data) {
                    Ok(()) => {}
                    Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => {}
                    Err(err) => {
                        let _ = child.kill();
                        return Err(Error::io(
                            format!("failed to feed stdin to hook {hook_name:?}"),
                            err,
                        ));
                    }
                }
            }
        }

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut total = 0usize;

        if let Some(mut stream) = child.stdout.take() {
            if let Err(err) =
                self.read_bounded(hook_name, &mut stream, &mut stdout, &mut total, started)
            {
                let _ = child.kill();
                let _ = child.wait();
                return Err(err);
            }
        }
        if let Some(mut stream) = child.stderr.take() {
            if let Err(err) =
                self.read_bounded(hook_name, &mut stream, &mut stderr, &mut total, started)
            {
                let _ = child.kill();
                let _ = child.wait();
                return Err(err);
            }
        }

        let status = child
            .wait()
            .map_err(|err| Error::io(format!("failed to wait for hook {hook_name:?}"), err))?;

        if started.elapsed() > self.config.timeout {
            return Err(Error::internal(format!(
                "hook {hook_name:?} exceeded its execution budget of {}s",
                self.config.timeout.as_secs()
            )));
        }

        Ok(HookRun {
            success: status.success(),
            stdout,
            stderr,
        })
    }

    fn read_bounded(
        &self,
        hook_name: &str,
        stream: &mut dyn Read,
        buffer: &mut Vec<u8>,
        total: &mut usize,
        started: Instant,
    ) -> Result<(), Error> {
        let mut chunk = [0u8; 8192];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => return Ok(()),
                Ok(n) => {
                    *total += n;
                    if *total > self.config.max_output_size {
                        return Err(Error::internal(format!(
                            "hook {hook_name:?} produced more than {} bytes of output",
                            self.config.max_output_size
                        )));
                    }
                    buffer.extend_from_slice(&chunk[..n]);
                }
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    return Err(Error::io(
                        format!("failed to read output of hook {hook_name:?}"),
                        err,
                    ))
                }
            }
            if started.elapsed() > self.config.timeout {
                return Err(Error::internal(format!(
                    "hook {hook_name:?} exceeded its execution budget of {}s",
                    self.config.timeout.as_secs()
                )));
            }
        }
    }

    fn run_to_output(hook_name: &str, run: HookRun) -> Output {
        let messages = String::from_utf8_lossy(&run.stdout)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(ToString::to_string)
            .collect();
        let error = if run.success {
            None
        } else {
            let stderr = String::from_utf8_lossy(&run.stderr).trim().to_string();
            Some(if stderr.is_empty() {
                format!("hook {hook_name} declined the update")
            } else {
                stderr
            })
        };
        Output { messages, error }
    }
}

impl HookClient for ScriptHooks {
    fn pre_receive(&self, input: PreReceiveInput) -> Result<Output, Error> {
        let data = stdin::encode(&input.ref_updates);
        let run = self.execute("pre-receive", &[], Some(data), &input.environment)?;
        Ok(Self::run_to_output("pre-receive", run))
    }

    fn update(&self, input: UpdateInput) -> Result<Output, Error> {
        let update = &input.ref_update;
        let args = vec![
            update.ref_name.clone(),
            update.old.to_string(),
            update.new.to_string(),
        ];
        let run = self.execute("update", &args, None, &input.environment)?;
        Ok(Self::run_to_output("update", run))
    }

    fn post_receive(&self, input: PostReceiveInput) -> Result<Output, Error> {
        let data = stdin::encode(&input.ref_updates);
        let run = self.execute("post-receive", &[], Some(data), &input.environment)?;
        Ok(Self::run_to_output("post-receive", run))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::ReferenceUpdate;
    use crate::sha::Sha;

    fn sample_input() -> PreReceiveInput {
        PreReceiveInput {
            ref_updates: vec![ReferenceUpdate {
                ref_name: "refs/heads/main".to_string(),
                old: Sha::nil(),
                new: Sha::from_hex("2d5a1e1b58b15e89d4d732252debaf550acc6e2a").unwrap(),
            }],
            environment: Environment::default(),
        }
    }

    #[test]
    fn config_defaults() {
        let config = ScriptHookConfig::default();
        assert_eq!(config.hooks_dir, PathBuf::from("hooks"));
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_output_size, 1024 * 1024);
    }

    #[test]
    fn missing_hook_allows() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScriptHookConfig {
            hooks_dir: dir.path().join("hooks"),
            ..ScriptHookConfig::default()
        };
        let hooks = ScriptHooks::new(config, HookEnvironment::new());
        let output = hooks.pre_receive(sample_input()).unwrap();
        assert!(!output.is_vetoed());
        assert!(output.messages.is_empty());
    }

    #[cfg(unix)]
    fn install_hook(dir: &std::path::Path, name: &str, script: &str) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn failing_hook_vetoes_with_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let hooks_dir = dir.path().join("hooks");
        install_hook(
            &hooks_dir,
            "pre-receive",
            "#!/bin/sh\necho advisory\necho refused >&2\nexit 1\n",
        );
        let config = ScriptHookConfig {
            hooks_dir,
            ..ScriptHookConfig::default()
        };
        let hooks = ScriptHooks::new(config, HookEnvironment::new());
        let output = hooks.pre_receive(sample_input()).unwrap();
        assert_eq!(output.error.as_deref(), Some("refused"));
        assert_eq!(output.messages, vec!["advisory".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn hook_receives_stdin_lines() {
        let dir = tempfile::tempdir().unwrap();
        let hooks_dir = dir.path().join("hooks");
        // refuse unless stdin carries exactly one well-formed line
        install_hook(
            &hooks_dir,
            "pre-receive",
            "#!/bin/sh\nlines=$(wc -l)\n[ \"$lines\" -eq 1 ] || exit 1\nexit 0\n",
        );
        let config = ScriptHookConfig {
            hooks_dir,
            ..ScriptHookConfig::default()
        };
        let hooks = ScriptHooks::new(config, HookEnvironment::new());
        let output = hooks.pre_receive(sample_input()).unwrap();
        assert!(!output.is_vetoed());
    }
}
