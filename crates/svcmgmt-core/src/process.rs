//! Blocking external-process invocation.
//!
//! Commands are explicit argument lists; nothing here goes through a shell.
//! Calls block until the child exits — timeouts are the caller's concern.

use std::process::{Command, ExitStatus};
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    Exited {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// Captured output of a finished process.
#[derive(Debug)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run `program` with `args` to completion, capturing stdout and stderr.
pub fn run(program: &str, args: &[&str]) -> Result<ProcessOutput, ProcessError> {
    let command = std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ");
    trace!("exec: {}", command);

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| ProcessError::Launch {
            command: command.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(ProcessError::Exited {
            command,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let out = ProcessOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    trace!("exec output: {}{}", out.stdout, out.stderr);
    Ok(out)
}
