//! Narrow command interface to the external simulation engine.
//!
//! A worker opens one [`EngineSession`] when it starts and keeps it for every
//! job it executes; dropping the session releases the engine.

use std::ffi::OsString;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use camp_core::errors::{CampaignError, ErrorInfo};
use tracing::{debug, warn};

use crate::config::{read_job_config, JobConfig};

/// Environment variable carrying the worker id into engine processes.
pub const WORKER_ENV: &str = "CAMP_WORKER";

/// How long a released engine process may take to exit after `quit`.
pub const DEFAULT_QUIT_GRACE: Duration = Duration::from_secs(5);

const EXIT_POLL: Duration = Duration::from_millis(10);

/// Factory for engine sessions. Shared by every worker of a dispatch.
pub trait Engine: Send + Sync {
    /// Starts a session owned by `worker_id`.
    fn open_session(&self, worker_id: usize) -> Result<Box<dyn EngineSession>, CampaignError>;
}

/// Long-lived handle to one engine instance.
pub trait EngineSession: Send {
    /// Loads the job artifact at `config`.
    fn load(&mut self, config: &Path) -> Result<(), CampaignError>;
    /// Resets engine state for the loaded configuration.
    fn reset(&mut self) -> Result<(), CampaignError>;
    /// Advances the model by `steps` steps.
    fn run(&mut self, steps: u32) -> Result<(), CampaignError>;
    /// Whether the session can take another job.
    ///
    /// Returns `false` once the engine is gone or out of step with its
    /// caller; the worker then releases the session and stops.
    fn is_alive(&mut self) -> bool {
        true
    }
}

fn engine_error(code: &str, message: impl Into<String>, worker_id: usize) -> ErrorInfo {
    ErrorInfo::new(code, message).with_context("worker", worker_id.to_string())
}

/// Engine backed by one child process per session.
///
/// The child reads commands from stdin, one per line (`load <path>`, `reset`,
/// `run <steps>`, `quit`), and answers each but `quit` with a single line:
/// `ok` or `error <message>`. Stderr is inherited. A child still running
/// after the quit grace period is killed.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    program: OsString,
    args: Vec<OsString>,
    quit_grace: Duration,
}

impl ProcessEngine {
    /// Creates an engine that launches `program` with `args`.
    pub fn new<P, I, A>(program: P, args: I) -> Self
    where
        P: Into<OsString>,
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            quit_grace: DEFAULT_QUIT_GRACE,
        }
    }

    /// Overrides how long a child may take to exit after `quit`.
    pub fn with_quit_grace(mut self, grace: Duration) -> Self {
        self.quit_grace = grace;
        self
    }
}

impl Engine for ProcessEngine {
    fn open_session(&self, worker_id: usize) -> Result<Box<dyn EngineSession>, CampaignError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env(WORKER_ENV, worker_id.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|err| {
                CampaignError::Engine(
                    engine_error("engine-spawn", "failed to start engine process", worker_id)
                        .with_context("program", self.program.to_string_lossy())
                        .with_hint(err.to_string()),
                )
            })?;
        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(CampaignError::Engine(engine_error(
                "engine-pipes",
                "engine process has no stdio pipes",
                worker_id,
            )));
        };
        debug!(worker = worker_id, pid = child.id(), "engine process started");
        Ok(Box::new(ProcessSession {
            worker_id,
            child,
            stdin,
            stdout: BufReader::new(stdout),
            quit_grace: self.quit_grace,
            broken: false,
        }))
    }
}

struct ProcessSession {
    worker_id: usize,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    quit_grace: Duration,
    broken: bool,
}

impl ProcessSession {
    fn send(&mut self, command: &str) -> std::io::Result<()> {
        writeln!(self.stdin, "{command}")?;
        self.stdin.flush()
    }

    /// Sends one command and reads its reply. Any failure other than an
    /// `error` reply leaves the session broken.
    fn command(&mut self, command: &str) -> Result<(), CampaignError> {
        let result = self.exchange(command);
        if let Err(CampaignError::Engine(info)) = &result {
            if info.code != "engine-command" {
                self.broken = true;
            }
        }
        result
    }

    fn exchange(&mut self, command: &str) -> Result<(), CampaignError> {
        let worker_id = self.worker_id;
        let io_failure = |code: &str, err: std::io::Error| {
            CampaignError::Engine(
                engine_error(code, "engine pipe failure", worker_id)
                    .with_context("command", command)
                    .with_hint(err.to_string()),
            )
        };
        self.send(command)
            .map_err(|err| io_failure("engine-write", err))?;
        let mut reply = String::new();
        let read = self
            .stdout
            .read_line(&mut reply)
            .map_err(|err| io_failure("engine-read", err))?;
        if read == 0 {
            return Err(CampaignError::Engine(
                engine_error("engine-closed", "engine exited before replying", worker_id)
                    .with_context("command", command),
            ));
        }
        let reply = reply.trim_end();
        if reply == "ok" {
            return Ok(());
        }
        let info = match reply.strip_prefix("error") {
            Some(message) => engine_error("engine-command", message.trim(), worker_id),
            None => engine_error("engine-protocol", "unexpected engine reply", worker_id)
                .with_context("reply", reply),
        };
        Err(CampaignError::Engine(info.with_context("command", command)))
    }

    fn wait_for_exit(&mut self) -> std::io::Result<Option<std::process::ExitStatus>> {
        let deadline = Instant::now() + self.quit_grace;
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Ok(Some(status));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            thread::sleep(EXIT_POLL);
        }
    }
}

impl EngineSession for ProcessSession {
    fn load(&mut self, config: &Path) -> Result<(), CampaignError> {
        self.command(&format!("load {}", config.display()))
    }

    fn reset(&mut self) -> Result<(), CampaignError> {
        self.command("reset")
    }

    fn run(&mut self, steps: u32) -> Result<(), CampaignError> {
        self.command(&format!("run {steps}"))
    }

    fn is_alive(&mut self) -> bool {
        if self.broken {
            return false;
        }
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                warn!(worker = self.worker_id, %status, "engine process exited");
                self.broken = true;
                false
            }
            Err(err) => {
                warn!(worker = self.worker_id, error = %err, "cannot poll engine process");
                self.broken = true;
                false
            }
        }
    }
}

impl Drop for ProcessSession {
    fn drop(&mut self) {
        if self.send("quit").is_err() {
            warn!(worker = self.worker_id, "engine did not accept quit; killing");
            let _ = self.child.kill();
        } else {
            match self.wait_for_exit() {
                Ok(Some(_)) => {}
                Ok(None) => {
                    warn!(
                        worker = self.worker_id,
                        grace_ms = self.quit_grace.as_millis() as u64,
                        "engine ignored quit; killing"
                    );
                    let _ = self.child.kill();
                }
                Err(err) => {
                    warn!(worker = self.worker_id, error = %err, "cannot poll engine process");
                    let _ = self.child.kill();
                }
            }
        }
        match self.child.wait() {
            Ok(status) => debug!(worker = self.worker_id, %status, "engine process exited"),
            Err(err) => {
                warn!(worker = self.worker_id, error = %err, "failed to reap engine process")
            }
        }
    }
}

/// Engine whose sessions only validate job artifacts.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunEngine;

impl Engine for DryRunEngine {
    fn open_session(&self, worker_id: usize) -> Result<Box<dyn EngineSession>, CampaignError> {
        Ok(Box::new(DryRunSession {
            worker_id,
            loaded: None,
        }))
    }
}

struct DryRunSession {
    worker_id: usize,
    loaded: Option<JobConfig>,
}

impl EngineSession for DryRunSession {
    fn load(&mut self, config: &Path) -> Result<(), CampaignError> {
        self.loaded = Some(read_job_config(config)?);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), CampaignError> {
        Ok(())
    }

    fn run(&mut self, steps: u32) -> Result<(), CampaignError> {
        let Some(config) = self.loaded.as_ref() else {
            return Err(CampaignError::Engine(engine_error(
                "engine-not-loaded",
                "run requested before load",
                self.worker_id,
            )));
        };
        debug!(
            worker = self.worker_id,
            label = %config.general.label,
            steps,
            "dry run"
        );
        Ok(())
    }
}
