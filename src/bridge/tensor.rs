use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};

/// Number of parallel lanes (rows) the accelerator computes per invocation.
/// Must match the array width the hardware model was built with.
pub const HW_ARRAY_SIZE: usize = 8;

/// Raw, unscaled per-lane dot products returned by one simulator run.
pub type ResultBuffer = [i32; HW_ARRAY_SIZE];

/// Borrowed view of a quantized tensor: int8 codes plus one scale per group.
#[derive(Debug, Clone, Copy)]
pub struct QuantizedTensor<'a> {
  pub q: &'a [i8],
  pub s: &'a [f32],
}

impl<'a> QuantizedTensor<'a> {
  pub fn new(q: &'a [i8], s: &'a [f32]) -> Self {
    Self { q, s }
  }
}

/// Owned tensor, as loaded from a problem file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OwnedQuantizedTensor {
  pub q: Vec<i8>,
  pub s: Vec<f32>,
}

impl OwnedQuantizedTensor {
  pub fn view(&self) -> QuantizedTensor<'_> {
    QuantizedTensor::new(&self.q, &self.s)
  }
}

/// Shape of one matrix-vector product: `w` is `d x n`, `x` has `n` elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatmulDims {
  /// Columns of W, length of x.
  pub n: usize,
  /// Rows of W, length of the output.
  pub d: usize,
  /// Quantization group size, also the hardware accumulation depth.
  pub gs: usize,
}

impl MatmulDims {
  pub fn new(n: usize, d: usize, gs: usize) -> Self {
    Self { n, d, gs }
  }

  pub fn row_blocks(&self) -> usize {
    self.d.div_ceil(HW_ARRAY_SIZE)
  }

  pub fn col_blocks(&self) -> usize {
    if self.gs == 0 {
      return 0;
    }
    self.n.div_ceil(self.gs)
  }

  /// Checks that the borrowed buffers cover every index the tiling loop can
  /// address. Scale lengths are not checked here, see `DequantizeAccumulator`.
  pub fn validate(&self, xout: &[f32], x: &QuantizedTensor, w: &QuantizedTensor) -> Result<()> {
    if self.gs == 0 {
      return Err(BridgeError::InvalidGroupSize);
    }
    let checks = [
      ("weight codes", self.d * self.n, w.q.len()),
      ("activation codes", self.n, x.q.len()),
      ("output vector", self.d, xout.len()),
    ];
    for (what, expected, actual) in checks {
      if actual < expected {
        return Err(BridgeError::ShapeMismatch {
          what,
          expected,
          actual,
        });
      }
    }
    Ok(())
  }
}
