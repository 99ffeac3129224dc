use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Every variant aborts the offload call that raised it.
#[derive(Debug, Error)]
pub enum BridgeError {
  #[error("cannot create artifact {path:?}: {source}")]
  ArtifactCreate { path: PathBuf, source: io::Error },

  #[error("cannot open artifact {path:?} for reading: {source}")]
  ArtifactOpen { path: PathBuf, source: io::Error },

  #[error("read from artifact {path:?} failed: {source}")]
  ArtifactRead { path: PathBuf, source: io::Error },

  #[error("cannot remove stale artifact {path:?}: {source}")]
  ArtifactRemove { path: PathBuf, source: io::Error },

  #[error("write to artifact {path:?} failed: {source}")]
  ArtifactWrite { path: PathBuf, source: io::Error },

  #[error("failed to launch simulator `{program}`: {source}")]
  SimulatorLaunch { program: String, source: io::Error },

  #[error("waiting for simulator `{program}` failed: {source}")]
  SimulatorWait { program: String, source: io::Error },

  /// Non-zero exit; `code` is `None` when the process died from a signal.
  #[error("simulator `{program}` failed (exit code {code:?}): {stderr}")]
  SimulatorFailed {
    program: String,
    code: Option<i32>,
    stderr: String,
  },

  #[error("simulator `{program}` did not finish within {timeout:?}")]
  SimulatorTimeout { program: String, timeout: Duration },

  #[error("group size must be non-zero")]
  InvalidGroupSize,

  #[error("shape mismatch for {what}: need at least {expected} elements, got {actual}")]
  ShapeMismatch {
    what: &'static str,
    expected: usize,
    actual: usize,
  },

  #[error(
    "scale index out of range at row {row}, col_base {col_base}: weight scale {w_index} (of {w_len}), activation scale {x_index} (of {x_len})"
  )]
  ScaleIndexOutOfRange {
    row: usize,
    col_base: usize,
    w_index: usize,
    w_len: usize,
    x_index: usize,
    x_len: usize,
  },

  #[error("IO error: {0}")]
  Io(#[from] io::Error),
}
