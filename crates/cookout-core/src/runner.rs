//! Child process execution with streamed output.
//!
//! A command runs inside an [`ExecContext`]: the working directory and extra
//! environment variables travel with the call instead of being set on the
//! current process. Stdout is echoed line by line and captured; stderr goes to
//! the log.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use tracing::{debug, warn};

use crate::error::{DeployError, Result};

/// A program and its argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
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

    /// Render for logs, replacing the value after `flag` with `<redacted>`.
    pub fn redacted(&self, flag: &str) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        let mut hide_next = false;
        for arg in &self.args {
            if hide_next {
                parts.push("<redacted>".to_string());
                hide_next = false;
            } else {
                hide_next = arg == flag;
                parts.push(arg.clone());
            }
        }
        parts.join(" ")
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Working directory and environment overlay for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecContext {
    working_dir: PathBuf,
    env: BTreeMap<String, String>,
}

impl ExecContext {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            env: BTreeMap::new(),
        }
    }

    /// Copy of this context with one more environment variable.
    pub fn with_env(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.env.insert(key.into(), value.into());
        next
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }
}

/// Runs an invocation to completion and returns its captured stdout.
///
/// Any failure (spawn, stream read, non-zero exit) is an
/// [`DeployError::Execution`].
pub trait CommandRunner {
    fn run(&self, invocation: &Invocation, ctx: &ExecContext) -> Result<String>;
}

/// Spawns real child processes, echoing their stdout to the console.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }

    /// Run with an explicit sink for echoed stdout lines.
    pub fn run_with_echo<W: Write>(
        &self,
        invocation: &Invocation,
        ctx: &ExecContext,
        echo: &mut W,
    ) -> Result<String> {
        let rendered = invocation.to_string();
        debug!(
            program = %invocation.program,
            working_dir = %ctx.working_dir.display(),
            "spawning child process"
        );

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .current_dir(&ctx.working_dir)
            .envs(&ctx.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| DeployError::execution(&rendered, format!("spawn failed: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DeployError::execution(&rendered, "stdout was not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DeployError::execution(&rendered, "stderr was not piped"))?;

        // Drain stderr concurrently so a chatty child can't block on a full pipe.
        let stderr_handle = thread::spawn(move || log_stderr_lines(stderr));

        let stdout_result = collect_stdout_lines(stdout, echo);

        let status = child
            .wait()
            .map_err(|e| DeployError::execution(&rendered, format!("wait failed: {}", e)))?;

        let stderr_result = stderr_handle
            .join()
            .map_err(|_| DeployError::execution(&rendered, "stderr reader thread panicked"))?;

        let output = stdout_result.map_err(|e| {
            DeployError::execution(&rendered, format!("error reading standard output: {}", e))
        })?;
        stderr_result.map_err(|e| {
            DeployError::execution(&rendered, format!("error reading standard error: {}", e))
        })?;

        if !status.success() {
            let reason = match status.code() {
                Some(code) => format!("exited with status {}", code),
                None => "terminated by signal".to_string(),
            };
            return Err(DeployError::execution(&rendered, reason));
        }

        debug!(exit_code = ?status.code(), "command finished");
        Ok(output)
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation, ctx: &ExecContext) -> Result<String> {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        self.run_with_echo(invocation, ctx, &mut lock)
    }
}

fn collect_stdout_lines<R: Read, W: Write>(reader: R, echo: &mut W) -> std::io::Result<String> {
    let mut lines = Vec::new();
    for_each_line(reader, |line| {
        writeln!(echo, "{}", line)?;
        lines.push(line);
        Ok(())
    })?;
    echo.flush()?;
    Ok(lines.join("\n"))
}

fn log_stderr_lines<R: Read>(reader: R) -> std::io::Result<()> {
    for_each_line(reader, |line| {
        warn!(target: "cookout::child", "{}", line);
        Ok(())
    })
}

/// Feed each line to `f` without its terminator. Bytes that aren't UTF-8 are
/// replaced rather than treated as a read error.
fn for_each_line<R, F>(reader: R, mut f: F) -> std::io::Result<()>
where
    R: Read,
    F: FnMut(String) -> std::io::Result<()>,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }
        let mut line = buf.as_slice();
        if let Some(rest) = line.strip_suffix(b"\n") {
            line = rest.strip_suffix(b"\r").unwrap_or(rest);
        }
        f(String::from_utf8_lossy(line).into_owned())?;
    }
}
