// Row/column tiling loop that offloads W * x to the accelerator

use super::dequant::DequantizeAccumulator;
use super::tensor::{MatmulDims, QuantizedTensor, HW_ARRAY_SIZE};
use super::tile::Tile;
use crate::channel::SimulationChannel;
use crate::error::Result;
use crate::simulator::SimOutcome;
use crate::utils::log::is_log_enabled;
use crate::utils::trace::TraceWriter;
use log::{debug, info, warn};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeOptions {
  /// Treat an out-of-range scale index as an error instead of skipping it.
  pub strict_scales: bool,
  /// Write `full_weights`/`full_vector` before the first tile.
  pub dump_full_matrices: bool,
  /// Suppress the per-call banner.
  pub quiet: bool,
}

/// Counters for one `matmul_hw` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffloadStats {
  pub row_blocks: usize,
  pub col_blocks: usize,
  pub invocations: usize,
  pub parse_warnings: usize,
  pub short_results: usize,
  pub skipped_groups: usize,
  pub sim_time: Duration,
}

impl OffloadStats {
  pub fn is_degraded(&self) -> bool {
    self.parse_warnings > 0 || self.short_results > 0 || self.skipped_groups > 0
  }
}

/// Offloads quantized matrix-vector products through a `SimulationChannel`.
pub struct TpuBridge<C: SimulationChannel> {
  channel: C,
  options: BridgeOptions,
  trace: Option<TraceWriter>,
}

impl<C: SimulationChannel> TpuBridge<C> {
  pub fn new(channel: C, options: BridgeOptions) -> Self {
    Self {
      channel,
      options,
      trace: None,
    }
  }

  pub fn with_trace(mut self, trace: TraceWriter) -> Self {
    self.trace = Some(trace);
    self
  }

  pub fn channel(&self) -> &C {
    &self.channel
  }

  /// `xout[..d] = W * x`, where `w` is `d x n` row-major and `gs` is both the
  /// quantization group size and the hardware accumulation depth.
  ///
  /// Any `Err` leaves `xout` partially written and must not be used.
  pub fn matmul_hw(
    &mut self,
    xout: &mut [f32],
    x: &QuantizedTensor,
    w: &QuantizedTensor,
    n: usize,
    d: usize,
    gs: usize,
  ) -> Result<OffloadStats> {
    let dims = MatmulDims::new(n, d, gs);
    dims.validate(xout, x, w)?;

    if !self.options.quiet && is_log_enabled() {
      info!("HW matmul: W {} x {}, x {} x 1, group size {}", d, n, n, gs);
    }

    self.channel.write_config(gs)?;
    if self.options.dump_full_matrices {
      self.channel.dump_full(x, w, &dims);
    }

    xout[..d].fill(0.0);

    let mut stats = OffloadStats {
      col_blocks: dims.col_blocks(),
      ..Default::default()
    };

    for row_base in (0..d).step_by(HW_ARRAY_SIZE) {
      let mut acc = DequantizeAccumulator::new(row_base, self.options.strict_scales);

      for col_base in (0..n).step_by(gs) {
        let tile = Tile::new(row_base, col_base, gs);
        self.offload_tile(&tile, x, w, &dims, &mut acc, &mut stats)?;
      }

      stats.row_blocks += 1;
      stats.skipped_groups += acc.skipped_groups();
      acc.commit(xout, &dims);
    }

    Ok(stats)
  }

  fn offload_tile(
    &mut self,
    tile: &Tile,
    x: &QuantizedTensor,
    w: &QuantizedTensor,
    dims: &MatmulDims,
    acc: &mut DequantizeAccumulator,
    stats: &mut OffloadStats,
  ) -> Result<()> {
    self.channel.encode_tile(tile, x, w, dims)?;

    let SimOutcome { elapsed, .. } = self.channel.invoke()?;
    stats.invocations += 1;
    stats.sim_time += elapsed;
    debug!("tile ({}, {}) simulated in {:?}", tile.row_base, tile.col_base, elapsed);

    let decoded = self.channel.decode_result()?;
    stats.parse_warnings += decoded.malformed.len();
    if decoded.is_short() {
      stats.short_results += 1;
    }

    if let Some(trace) = self.trace.as_mut() {
      if let Err(e) = trace.record(tile, decoded.parsed, &decoded.values, elapsed) {
        warn!("tile trace disabled: {}", e);
        self.trace = None;
      }
    }

    acc.accumulate(tile, &decoded.values, x, w, dims)
  }
}

/// One-shot offload with default options.
pub fn matmul_hw<C: SimulationChannel>(
  channel: &mut C,
  xout: &mut [f32],
  x: &QuantizedTensor,
  w: &QuantizedTensor,
  n: usize,
  d: usize,
  gs: usize,
) -> Result<OffloadStats> {
  TpuBridge::new(channel, BridgeOptions::default()).matmul_hw(xout, x, w, n, d, gs)
}
