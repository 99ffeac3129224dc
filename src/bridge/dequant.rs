use super::tensor::{MatmulDims, QuantizedTensor, ResultBuffer, HW_ARRAY_SIZE};
use super::tile::Tile;
use crate::error::{BridgeError, Result};
use log::warn;

/// Per-row float accumulators for one row block.
///
/// Each column block is exactly one quantization group, so a single
/// (weight scale, activation scale) pair applies to a whole lane of a tile.
#[derive(Debug, Clone)]
pub struct DequantizeAccumulator {
  row_base: usize,
  acc: [f32; HW_ARRAY_SIZE],
  strict_scales: bool,
  skipped_groups: usize,
}

impl DequantizeAccumulator {
  pub fn new(row_base: usize, strict_scales: bool) -> Self {
    Self {
      row_base,
      acc: [0.0; HW_ARRAY_SIZE],
      strict_scales,
      skipped_groups: 0,
    }
  }

  #[cfg(test)]
  fn lanes(&self) -> &[f32; HW_ARRAY_SIZE] {
    &self.acc
  }

  /// Lane contributions dropped because a scale index was out of range.
  pub fn skipped_groups(&self) -> usize {
    self.skipped_groups
  }

  /// Folds one tile's raw results into the accumulators.
  pub fn accumulate(
    &mut self,
    tile: &Tile,
    results: &ResultBuffer,
    x: &QuantizedTensor,
    w: &QuantizedTensor,
    dims: &MatmulDims,
  ) -> Result<()> {
    debug_assert_eq!(tile.row_base, self.row_base);
    let x_index = tile.col_base / dims.gs;

    for (i, &raw) in results.iter().enumerate() {
      let row = self.row_base + i;
      if row >= dims.d {
        break;
      }
      let w_index = (row * dims.n + tile.col_base) / dims.gs;

      let (s_w, s_x) = match (w.s.get(w_index), x.s.get(x_index)) {
        (Some(&s_w), Some(&s_x)) => (s_w, s_x),
        _ => {
          if self.strict_scales {
            return Err(BridgeError::ScaleIndexOutOfRange {
              row,
              col_base: tile.col_base,
              w_index,
              w_len: w.s.len(),
              x_index,
              x_len: x.s.len(),
            });
          }
          warn!(
            "skipping group at row {} col {}: scale index w={} x={} out of range",
            row, tile.col_base, w_index, x_index
          );
          self.skipped_groups += 1;
          continue;
        },
      };

      self.acc[i] += raw as f32 * s_w * s_x;
    }
    Ok(())
  }

  /// Copies the finished lanes into `xout`, only for rows inside `d`.
  pub fn commit(&self, xout: &mut [f32], dims: &MatmulDims) {
    for (i, &value) in self.acc.iter().enumerate() {
      let row = self.row_base + i;
      if row >= dims.d {
        break;
      }
      xout[row] = value;
    }
  }
}
