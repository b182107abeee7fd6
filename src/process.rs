//! Child-process runner.
//!
//! Targets shell out to publisher binaries (`npm`, `twine`, `cargo`, `pod`).
//! Both output streams are forwarded line by line to the debug log; failures
//! carry the exit code, the argument list, and a scrubbed copy of the spawn
//! options in which environment values are replaced by key names.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::dry_run;
use crate::error::{Error, Result, ScrubbedOptions};

/// Options for a spawned command. `env` entries are added on top of the
/// inherited environment.
#[derive(Debug, Clone, Default)]
pub struct SpawnOptions {
    pub env: HashMap<String, String>,
    pub cwd: Option<PathBuf>,
}

impl SpawnOptions {
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    fn scrubbed(&self) -> ScrubbedOptions {
        ScrubbedOptions::new(&self.env, self.cwd.as_ref())
    }
}

/// Run `command` with `args`, forwarding output to the debug log, and return
/// the accumulated standard output on success.
///
/// In dry-run mode the command line is logged and an empty output returned
/// without spawning anything.
pub async fn spawn(command: &str, args: &[&str], options: &SpawnOptions) -> Result<Vec<u8>> {
    if command.trim().is_empty() {
        return Err(Error::InvalidArgument(
            "command name must be a non-empty string".to_string(),
        ));
    }

    if !dry_run::should_perform() {
        tracing::info!("[dry-run] would run: {} {}", command, args.join(" "));
        return Ok(Vec::new());
    }

    tracing::debug!("running: {} {}", command, args.join(" "));

    let mut cmd = Command::new(command);
    cmd.args(args)
        .envs(&options.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }

    let mut child = cmd.spawn().map_err(|err| Error::SpawnFailed {
        command: command.to_string(),
        message: err.to_string(),
    })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let stdout_task = tokio::spawn(forward_lines(command.to_string(), stdout, true));
    let stderr_task = tokio::spawn(forward_lines(command.to_string(), stderr, false));

    let status = child.wait().await?;

    // Join both readers so every buffered line is logged (and stdout fully
    // captured) before this call resolves.
    let captured = stdout_task.await.unwrap_or_default();
    stderr_task.await.unwrap_or_default();

    if status.success() {
        Ok(captured)
    } else {
        Err(Error::ProcessFailed {
            command: command.to_string(),
            code: status.code(),
            args: args.iter().map(|s| s.to_string()).collect(),
            options: options.scrubbed(),
        })
    }
}

async fn forward_lines(
    command: String,
    stream: Option<impl AsyncRead + Unpin>,
    capture: bool,
) -> Vec<u8> {
    let mut captured = Vec::new();
    let Some(stream) = stream else {
        return captured;
    };

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                tracing::debug!("{}: {}", command, line.trim_end_matches('\n'));
                if capture {
                    captured.extend_from_slice(line.as_bytes());
                }
            }
            Err(err) => {
                tracing::debug!("{}: output read error: {}", command, err);
                break;
            }
        }
    }

    captured
}
