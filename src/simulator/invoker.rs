use super::command::SimCommand;
use crate::error::{BridgeError, Result};
use log::{debug, error, info};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Structured result of one simulator run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimOutcome {
  /// `None` when the process was terminated by a signal.
  pub code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
  pub elapsed: Duration,
}

impl SimOutcome {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }
}

/// Runs the simulator once over the artifacts in `work_dir`.
///
/// Implementations return `Err` for anything other than a clean exit.
pub trait SimulatorInvoker {
  fn name(&self) -> String;
  fn invoke(&mut self, work_dir: &Path) -> Result<SimOutcome>;
}

/// Launches an external simulator process per call and blocks until it exits.
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
  command: SimCommand,
}

impl ProcessInvoker {
  pub fn new(command: SimCommand) -> Self {
    info!("Simulator command: {}", command.display());
    if let Some(t) = command.timeout {
      info!("Simulator timeout: {:?}", t);
    }
    Self { command }
  }

  /// Spawns the process and collects its exit code and output, whatever the
  /// exit code. Only launch errors, wait errors and timeouts are `Err`.
  pub fn run(&self, work_dir: &Path) -> Result<SimOutcome> {
    let program = resolve_program(&self.command.program, work_dir);
    let start = Instant::now();

    let mut child = Command::new(&program)
      .args(&self.command.args)
      .current_dir(work_dir)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .spawn()
      .map_err(|source| BridgeError::SimulatorLaunch {
        program: self.command.display(),
        source,
      })?;

    let stdout = child.stdout.take().map(drain_pipe);
    let stderr = child.stderr.take().map(drain_pipe);

    let wait_failed = |source| BridgeError::SimulatorWait {
      program: self.command.display(),
      source,
    };
    let status = match self.command.timeout {
      None => child.wait().map_err(wait_failed)?,
      Some(timeout) => match wait_with_timeout(&mut child, timeout).map_err(wait_failed)? {
        Some(status) => status,
        None => {
          error!(
            "Simulator `{}` exceeded {:?}, killed",
            self.command.display(),
            timeout
          );
          return Err(BridgeError::SimulatorTimeout {
            program: self.command.display(),
            timeout,
          });
        },
      },
    };

    Ok(SimOutcome {
      code: status.code(),
      stdout: join_pipe(stdout),
      stderr: join_pipe(stderr),
      elapsed: start.elapsed(),
    })
  }
}

impl SimulatorInvoker for ProcessInvoker {
  fn name(&self) -> String {
    self.command.display()
  }

  fn invoke(&mut self, work_dir: &Path) -> Result<SimOutcome> {
    let outcome = self.run(work_dir)?;
    if !outcome.stdout.is_empty() {
      debug!("simulator stdout:\n{}", outcome.stdout.trim_end());
    }
    if !outcome.success() {
      error!("Simulation failed: `{}` exited with {:?}", self.name(), outcome.code);
      return Err(BridgeError::SimulatorFailed {
        program: self.name(),
        code: outcome.code,
        stderr: outcome.stderr.trim_end().to_string(),
      });
    }
    Ok(outcome)
  }
}

/// Relative paths with a directory part (`./simv`) are taken relative to the
/// work dir; bare names go through `PATH`.
fn resolve_program(program: &str, work_dir: &Path) -> PathBuf {
  let path = Path::new(program);
  if path.is_absolute() || path.components().count() <= 1 {
    path.to_path_buf()
  } else {
    work_dir.join(path)
  }
}

fn drain_pipe<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<String> {
  thread::spawn(move || {
    let mut buf = Vec::new();
    let _ = pipe.read_to_end(&mut buf);
    String::from_utf8_lossy(&buf).into_owned()
  })
}

fn join_pipe(handle: Option<JoinHandle<String>>) -> String {
  handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// `Ok(None)` if the child was still running at the deadline; it is killed.
/// Only the direct child is signalled, so a wrapper script should `exec` the
/// simulator for the kill to reach it.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
  let deadline = Instant::now() + timeout;
  loop {
    if let Some(status) = child.try_wait()? {
      return Ok(Some(status));
    }
    if Instant::now() >= deadline {
      let _ = child.kill();
      let _ = child.wait();
      return Ok(None);
    }
    thread::sleep(POLL_INTERVAL);
  }
}
