use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::ReadError;
use crate::system::platform;
use crate::system::snapshot::clamp_percent;

/// A program invocation whose trimmed stdout is the answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShellQuery {
    pub program: String,
    pub args: Vec<String>,
}

impl ShellQuery {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
        }
    }
}

pub trait CommandRunner: Send {
    /// Run `query`, returning trimmed stdout. Must give up after `timeout`.
    fn run(&self, query: &ShellQuery, timeout: Duration) -> Result<String, ReadError>;
}

/// Runs queries as child processes with no console window, polling for exit
/// and killing the child once the deadline passes.
pub struct ProcessRunner {
    poll_interval: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(20),
        }
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, query: &ShellQuery, timeout: Duration) -> Result<String, ReadError> {
        let mut cmd = Command::new(&query.program);
        cmd.args(&query.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        platform::hide_console_window(&mut cmd);

        let mut child = cmd.spawn().map_err(|source| ReadError::Spawn {
            program: query.program.clone(),
            source,
        })?;

        // Drain stdout while the child runs so a chatty query cannot fill the
        // pipe and stall until the deadline.
        let (output_tx, output_rx) = mpsc::channel();
        if let Some(mut pipe) = child.stdout.take() {
            thread::spawn(move || {
                let mut stdout = String::new();
                let result = pipe.read_to_string(&mut stdout).map(|_| stdout);
                let _ = output_tx.send(result);
            });
        } else {
            let _ = output_tx.send(Ok(String::new()));
        }

        let deadline = Instant::now() + timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() < deadline => thread::sleep(self.poll_interval),
                Ok(None) => {
                    reap(&mut child);
                    return Err(ReadError::Timeout(timeout));
                }
                Err(err) => {
                    reap(&mut child);
                    return Err(ReadError::Sensor(format!(
                        "waiting for `{}` failed: {err}",
                        query.program
                    )));
                }
            }
        };

        if !status.success() {
            return Err(ReadError::NonZeroExit {
                code: status.code(),
            });
        }

        // A grandchild may still hold the pipe open; the deadline bounds that too.
        let remaining = deadline.saturating_duration_since(Instant::now());
        match output_rx.recv_timeout(remaining.max(self.poll_interval)) {
            Ok(Ok(stdout)) => Ok(stdout.trim().to_string()),
            Ok(Err(err)) => Err(ReadError::Sensor(format!(
                "reading `{}` output failed: {err}",
                query.program
            ))),
            Err(_) => Err(ReadError::Timeout(timeout)),
        }
    }
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Parse a counter query's output as one percentage, clamped to `[0, 100]`.
/// A lone decimal comma is accepted for locales that print `12,5`.
pub fn parse_percent(output: &str) -> Result<f32, ReadError> {
    let trimmed = output.trim();
    let normalized = if trimmed.contains(',') && !trimmed.contains('.') {
        trimmed.replace(',', ".")
    } else {
        trimmed.to_string()
    };

    match normalized.parse::<f32>() {
        Ok(value) if value.is_finite() => Ok(clamp_percent(value)),
        _ => Err(ReadError::Parse {
            input: trimmed.to_string(),
        }),
    }
}
