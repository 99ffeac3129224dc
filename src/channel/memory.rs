use super::SimulationChannel;
use crate::bridge::config_encoder::write_sim_config;
use crate::bridge::result_decoder::{decode_results, DecodedResults};
use crate::bridge::tensor::{MatmulDims, QuantizedTensor};
use crate::bridge::tile::{write_vector_tile, write_weight_tile, Tile};
use crate::error::{BridgeError, Result};
use crate::reference::TileSimulator;
use crate::simulator::SimOutcome;
use std::io;
use std::path::PathBuf;
use std::time::Instant;

/// Same artifact texts as `FileChannel`, kept in memory and handed to an
/// in-process `TileSimulator`.
pub struct MemoryChannel<S: TileSimulator> {
  simulator: S,
  config: Vec<u8>,
  weights: Vec<u8>,
  vector: Vec<u8>,
  result: Option<String>,
  invocations: usize,
}

impl<S: TileSimulator> MemoryChannel<S> {
  pub fn new(simulator: S) -> Self {
    Self {
      simulator,
      config: Vec::new(),
      weights: Vec::new(),
      vector: Vec::new(),
      result: None,
      invocations: 0,
    }
  }

  pub fn config_text(&self) -> String {
    String::from_utf8_lossy(&self.config).into_owned()
  }

  pub fn weights_text(&self) -> String {
    String::from_utf8_lossy(&self.weights).into_owned()
  }

  pub fn vector_text(&self) -> String {
    String::from_utf8_lossy(&self.vector).into_owned()
  }

  pub fn invocations(&self) -> usize {
    self.invocations
  }
}

impl<S: TileSimulator> SimulationChannel for MemoryChannel<S> {
  fn write_config(&mut self, accum_depth: usize) -> Result<()> {
    self.config.clear();
    write_sim_config(&mut self.config, accum_depth)?;
    Ok(())
  }

  fn encode_tile(&mut self, tile: &Tile, x: &QuantizedTensor, w: &QuantizedTensor, dims: &MatmulDims) -> Result<()> {
    self.weights.clear();
    self.vector.clear();
    write_weight_tile(&mut self.weights, w, dims, tile)?;
    write_vector_tile(&mut self.vector, x, dims, tile)?;
    Ok(())
  }

  fn invoke(&mut self) -> Result<SimOutcome> {
    let start = Instant::now();
    self.result = None;
    self.invocations += 1;
    let config = self.config_text();
    let weights = self.weights_text();
    let vector = self.vector_text();
    self.result = Some(self.simulator.simulate(&config, &weights, &vector)?);
    Ok(SimOutcome {
      code: Some(0),
      elapsed: start.elapsed(),
      ..Default::default()
    })
  }

  fn decode_result(&mut self) -> Result<DecodedResults> {
    let text = self.result.as_deref().ok_or_else(|| BridgeError::ArtifactOpen {
      path: PathBuf::from("<memory>/result"),
      source: io::Error::new(io::ErrorKind::NotFound, "simulator produced no result"),
    })?;
    Ok(decode_results(text.as_bytes())?)
  }
}
