use super::SimulationChannel;
use crate::bridge::config_encoder::write_sim_config;
use crate::bridge::dump::{write_full_vector, write_full_weights};
use crate::bridge::result_decoder::{decode_results, DecodedResults};
use crate::bridge::tensor::{MatmulDims, QuantizedTensor};
use crate::bridge::tile::{write_vector_tile, write_weight_tile, Tile};
use crate::error::{BridgeError, Result};
use crate::simulator::{SimOutcome, SimulatorInvoker};
use log::{debug, error, warn};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "sim_config.txt";
pub const WEIGHTS_FILE: &str = "weights.txt";
pub const VECTOR_FILE: &str = "vector.txt";
pub const RESULT_FILE: &str = "memory_dump.txt";
pub const FULL_WEIGHTS_FILE: &str = "full_weights.txt";
pub const FULL_VECTOR_FILE: &str = "full_vector.txt";

/// Locations of every protocol artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
  pub config: PathBuf,
  pub weights: PathBuf,
  pub vector: PathBuf,
  pub result: PathBuf,
  pub full_weights: PathBuf,
  pub full_vector: PathBuf,
}

impl ArtifactPaths {
  /// Default artifact names inside `dir`.
  pub fn in_dir(dir: &Path) -> Self {
    Self {
      config: dir.join(CONFIG_FILE),
      weights: dir.join(WEIGHTS_FILE),
      vector: dir.join(VECTOR_FILE),
      result: dir.join(RESULT_FILE),
      full_weights: dir.join(FULL_WEIGHTS_FILE),
      full_vector: dir.join(FULL_VECTOR_FILE),
    }
  }
}

fn create_artifact(path: &Path) -> Result<BufWriter<File>> {
  File::create(path).map(BufWriter::new).map_err(|source| {
    error!("cannot create artifact {:?}: {}", path, source);
    BridgeError::ArtifactCreate {
      path: path.to_path_buf(),
      source,
    }
  })
}

fn write_artifact<F>(path: &Path, body: F) -> Result<()>
where
  F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
  let mut out = create_artifact(path)?;
  body(&mut out).map_err(|source| BridgeError::ArtifactWrite {
    path: path.to_path_buf(),
    source,
  })
}

/// File-based protocol: fixed artifact names in a work directory shared with
/// the simulator process.
pub struct FileChannel<I: SimulatorInvoker> {
  work_dir: PathBuf,
  paths: ArtifactPaths,
  invoker: I,
}

impl<I: SimulatorInvoker> FileChannel<I> {
  pub fn new(work_dir: impl Into<PathBuf>, paths: ArtifactPaths, invoker: I) -> Self {
    Self {
      work_dir: work_dir.into(),
      paths,
      invoker,
    }
  }

  /// Default artifact names directly inside `work_dir`.
  pub fn in_dir(work_dir: impl Into<PathBuf>, invoker: I) -> Self {
    let work_dir = work_dir.into();
    let paths = ArtifactPaths::in_dir(&work_dir);
    Self::new(work_dir, paths, invoker)
  }

  pub fn paths(&self) -> &ArtifactPaths {
    &self.paths
  }

  /// Drops the previous tile's result so a run that writes nothing cannot be
  /// mistaken for this tile's output.
  fn clear_result(&self) -> Result<()> {
    let path = &self.paths.result;
    match fs::remove_file(path) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      Err(source) => {
        error!("cannot remove stale result {:?}: {}", path, source);
        Err(BridgeError::ArtifactRemove {
          path: path.clone(),
          source,
        })
      },
    }
  }
}

impl<I: SimulatorInvoker> SimulationChannel for FileChannel<I> {
  fn write_config(&mut self, accum_depth: usize) -> Result<()> {
    write_artifact(&self.paths.config, |out| write_sim_config(out, accum_depth))
  }

  fn encode_tile(&mut self, tile: &Tile, x: &QuantizedTensor, w: &QuantizedTensor, dims: &MatmulDims) -> Result<()> {
    // both files must open before either is written
    let mut weights = create_artifact(&self.paths.weights)?;
    let mut vector = create_artifact(&self.paths.vector)?;

    write_weight_tile(&mut weights, w, dims, tile).map_err(|source| BridgeError::ArtifactWrite {
      path: self.paths.weights.clone(),
      source,
    })?;
    write_vector_tile(&mut vector, x, dims, tile).map_err(|source| BridgeError::ArtifactWrite {
      path: self.paths.vector.clone(),
      source,
    })
  }

  fn invoke(&mut self) -> Result<SimOutcome> {
    self.clear_result()?;
    debug!("running simulator `{}` in {:?}", self.invoker.name(), self.work_dir);
    self.invoker.invoke(&self.work_dir)
  }

  fn decode_result(&mut self) -> Result<DecodedResults> {
    let path = &self.paths.result;
    let file = File::open(path).map_err(|source| {
      error!("cannot open {:?} for reading: {}", path, source);
      BridgeError::ArtifactOpen {
        path: path.clone(),
        source,
      }
    })?;
    decode_results(BufReader::new(file)).map_err(|source| {
      error!("reading {:?} failed: {}", path, source);
      BridgeError::ArtifactRead {
        path: path.clone(),
        source,
      }
    })
  }

  fn dump_full(&mut self, x: &QuantizedTensor, w: &QuantizedTensor, dims: &MatmulDims) {
    let weights = File::create(&self.paths.full_weights);
    let vector = File::create(&self.paths.full_vector);
    let (weights, vector) = match (weights, vector) {
      (Ok(wf), Ok(vf)) => (wf, vf),
      (Err(e), _) | (_, Err(e)) => {
        warn!("cannot open full matrix dump files: {}", e);
        return;
      },
    };
    if let Err(e) = write_full_weights(&mut BufWriter::new(weights), w, dims) {
      warn!("full weight dump to {:?} failed: {}", self.paths.full_weights, e);
    }
    if let Err(e) = write_full_vector(&mut BufWriter::new(vector), x, dims) {
      warn!("full vector dump to {:?} failed: {}", self.paths.full_vector, e);
    }
  }
}
