use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Which hardware simulation the bridge drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimBackend {
  /// Synopsys VCS compiled executable `./simv`.
  Vcs,
  /// Icarus Verilog: `vvp tpu_sim`.
  Vvp,
  /// In-process software model, no external simulator.
  Reference,
}

impl SimBackend {
  /// Backend chosen at build time: `./simv` with the `vcs` feature, else `vvp`.
  pub fn build_default() -> Self {
    if cfg!(feature = "vcs") {
      SimBackend::Vcs
    } else {
      SimBackend::Vvp
    }
  }

  pub fn parse(name: &str) -> Option<Self> {
    match name.to_lowercase().as_str() {
      "vcs" | "simv" => Some(SimBackend::Vcs),
      "vvp" | "icarus" => Some(SimBackend::Vvp),
      "reference" | "ref" => Some(SimBackend::Reference),
      _ => None,
    }
  }

  /// Program and arguments for external backends.
  pub fn default_command(&self) -> Option<(String, Vec<String>)> {
    match self {
      SimBackend::Vcs => Some(("./simv".to_string(), Vec::new())),
      SimBackend::Vvp => Some(("vvp".to_string(), vec!["tpu_sim".to_string()])),
      SimBackend::Reference => None,
    }
  }
}

impl fmt::Display for SimBackend {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      SimBackend::Vcs => "vcs",
      SimBackend::Vvp => "vvp",
      SimBackend::Reference => "reference",
    };
    write!(f, "{}", name)
  }
}

/// A fully resolved external simulator command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimCommand {
  pub program: String,
  pub args: Vec<String>,
  /// `None` waits forever.
  pub timeout: Option<Duration>,
}

impl SimCommand {
  pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
    Self {
      program: program.into(),
      args,
      timeout: None,
    }
  }

  pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn for_backend(backend: SimBackend) -> Option<Self> {
    backend
      .default_command()
      .map(|(program, args)| Self::new(program, args))
  }

  /// Program and args joined for diagnostics.
  pub fn display(&self) -> String {
    let mut s = self.program.clone();
    for arg in &self.args {
      s.push(' ');
      s.push_str(arg);
    }
    s
  }
}
