//! Software model of the accelerator's tile contract.
//!
//! Reads the same text artifacts the hardware testbench reads and produces a
//! result dump in the same format, so the bridge can be exercised end to end
//! without an HDL simulator.

use crate::bridge::tensor::HW_ARRAY_SIZE;
use crate::channel::file::ArtifactPaths;
use crate::error::{BridgeError, Result};
use crate::simulator::{SimOutcome, SimulatorInvoker};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::time::Instant;

const MODEL_NAME: &str = "reference";

/// Anything that turns (config, weight tile, vector tile) artifacts into a
/// result artifact.
pub trait TileSimulator {
  fn simulate(&mut self, config: &str, weights: &str, vector: &str) -> Result<String>;
}

/// Integer MAC array: each lane accumulates `depth` int8 x int8 products.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceTpu;

fn model_error(msg: String) -> BridgeError {
  BridgeError::SimulatorFailed {
    program: MODEL_NAME.to_string(),
    code: Some(1),
    stderr: msg,
  }
}

fn parse_bytes(text: &str, what: &str) -> Result<Vec<i8>> {
  text
    .lines()
    .map(str::trim)
    .filter(|l| !l.is_empty())
    .map(|l| {
      u8::from_str_radix(l, 16)
        .map(|b| b as i8)
        .map_err(|e| model_error(format!("bad {} byte {:?}: {}", what, l, e)))
    })
    .collect()
}

impl ReferenceTpu {
  pub fn compute(depth: usize, weights: &[i8], vector: &[i8]) -> [i32; HW_ARRAY_SIZE] {
    let mut lanes = [0i32; HW_ARRAY_SIZE];
    for (i, lane) in lanes.iter_mut().enumerate() {
      let row = &weights[i * depth..(i + 1) * depth];
      *lane = row
        .iter()
        .zip(vector)
        .fold(0i32, |acc, (&w, &x)| acc.wrapping_add(w as i32 * x as i32));
    }
    lanes
  }
}

impl TileSimulator for ReferenceTpu {
  fn simulate(&mut self, config: &str, weights: &str, vector: &str) -> Result<String> {
    let depth: usize = config
      .lines()
      .next()
      .map(str::trim)
      .and_then(|l| l.parse().ok())
      .ok_or_else(|| model_error(format!("bad accumulation depth {:?}", config)))?;

    let w = parse_bytes(weights, "weight")?;
    let x = parse_bytes(vector, "vector")?;
    if w.len() != HW_ARRAY_SIZE * depth || x.len() != depth {
      return Err(model_error(format!(
        "tile size mismatch: depth {}, {} weights, {} vector entries",
        depth,
        w.len(),
        x.len()
      )));
    }

    let lanes = Self::compute(depth, &w, &x);
    let mut out = String::new();
    let _ = writeln!(out, "// reference tpu, depth {}", depth);
    for v in lanes {
      let _ = writeln!(out, "{:08x}", v as u32);
    }
    Ok(out)
  }
}

/// Drives a `TileSimulator` over the artifact files of a `FileChannel`.
pub struct ReferenceInvoker<M: TileSimulator = ReferenceTpu> {
  paths: ArtifactPaths,
  model: M,
}

impl ReferenceInvoker<ReferenceTpu> {
  pub fn new(paths: ArtifactPaths) -> Self {
    Self::with_model(paths, ReferenceTpu)
  }
}

impl<M: TileSimulator> ReferenceInvoker<M> {
  pub fn with_model(paths: ArtifactPaths, model: M) -> Self {
    Self { paths, model }
  }
}

fn read_artifact(path: &Path) -> Result<String> {
  fs::read_to_string(path).map_err(|source| BridgeError::ArtifactOpen {
    path: path.to_path_buf(),
    source,
  })
}

impl<M: TileSimulator> SimulatorInvoker for ReferenceInvoker<M> {
  fn name(&self) -> String {
    MODEL_NAME.to_string()
  }

  fn invoke(&mut self, _work_dir: &Path) -> Result<SimOutcome> {
    let start = Instant::now();
    let config = read_artifact(&self.paths.config)?;
    let weights = read_artifact(&self.paths.weights)?;
    let vector = read_artifact(&self.paths.vector)?;

    let dump = self.model.simulate(&config, &weights, &vector)?;
    fs::write(&self.paths.result, dump).map_err(|source| BridgeError::ArtifactCreate {
      path: self.paths.result.clone(),
      source,
    })?;

    Ok(SimOutcome {
      code: Some(0),
      elapsed: start.elapsed(),
      ..Default::default()
    })
  }
}
