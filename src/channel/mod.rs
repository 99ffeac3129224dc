// Transport between the bridge and the simulator

pub mod file;
pub mod memory;

pub use file::{ArtifactPaths, FileChannel};
pub use memory::MemoryChannel;

use crate::bridge::result_decoder::DecodedResults;
use crate::bridge::tensor::{MatmulDims, QuantizedTensor};
use crate::bridge::tile::Tile;
use crate::error::Result;
use crate::simulator::SimOutcome;

/// One round trip with the simulator per tile: encode, invoke, decode.
///
/// Artifacts are overwritten on every call; nothing from a previous tile is
/// kept. Implementations are not reentrant.
pub trait SimulationChannel {
  /// Persists the accumulation depth read by the simulator before each run.
  fn write_config(&mut self, accum_depth: usize) -> Result<()>;

  fn encode_tile(&mut self, tile: &Tile, x: &QuantizedTensor, w: &QuantizedTensor, dims: &MatmulDims) -> Result<()>;

  /// Runs the simulator once; any unsuccessful run is `Err`.
  fn invoke(&mut self) -> Result<SimOutcome>;

  fn decode_result(&mut self) -> Result<DecodedResults>;

  /// Debug dump of the full operands. Failures are reported, never fatal.
  fn dump_full(&mut self, _x: &QuantizedTensor, _w: &QuantizedTensor, _dims: &MatmulDims) {}
}

impl<C: SimulationChannel + ?Sized> SimulationChannel for &mut C {
  fn write_config(&mut self, accum_depth: usize) -> Result<()> {
    (**self).write_config(accum_depth)
  }

  fn encode_tile(&mut self, tile: &Tile, x: &QuantizedTensor, w: &QuantizedTensor, dims: &MatmulDims) -> Result<()> {
    (**self).encode_tile(tile, x, w, dims)
  }

  fn invoke(&mut self) -> Result<SimOutcome> {
    (**self).invoke()
  }

  fn decode_result(&mut self) -> Result<DecodedResults> {
    (**self).decode_result()
  }

  fn dump_full(&mut self, x: &QuantizedTensor, w: &QuantizedTensor, dims: &MatmulDims) {
    (**self).dump_full(x, w, dims)
  }
}
