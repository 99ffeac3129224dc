// Tile extraction and hex encoding for the weight/vector input artifacts

use super::tensor::{MatmulDims, QuantizedTensor, HW_ARRAY_SIZE};
use std::io::{self, Write};

/// One row-block x column-block unit of work.
///
/// Covers rows `[row_base, row_base + HW_ARRAY_SIZE)` and columns
/// `[col_base, col_base + depth)`. Positions past the matrix bounds are padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
  pub row_base: usize,
  pub col_base: usize,
  pub depth: usize,
}

impl Tile {
  pub fn new(row_base: usize, col_base: usize, depth: usize) -> Self {
    Self {
      row_base,
      col_base,
      depth,
    }
  }

  /// Quantized weight at tile position `(i, j)`, or `None` when it lies outside
  /// the `d x n` matrix. Out-of-range positions are never read.
  pub fn weight_at(&self, w: &QuantizedTensor, dims: &MatmulDims, i: usize, j: usize) -> Option<i8> {
    let row = self.row_base + i;
    let col = self.col_base + j;
    if row < dims.d && col < dims.n {
      Some(w.q[row * dims.n + col])
    } else {
      None
    }
  }

  /// Quantized activation at tile column `j`, `None` past `n`.
  pub fn activation_at(&self, x: &QuantizedTensor, dims: &MatmulDims, j: usize) -> Option<i8> {
    let col = self.col_base + j;
    if col < dims.n {
      Some(x.q[col])
    } else {
      None
    }
  }
}

/// Writes a signed code as a two-digit hex byte, no sign extension.
fn write_hex_byte<W: Write>(out: &mut W, value: Option<i8>) -> io::Result<()> {
  let byte = value.map(|v| v as u8).unwrap_or(0);
  writeln!(out, "{:02x}", byte)
}

/// Emits `HW_ARRAY_SIZE * depth` lines, row-major over the tile.
pub fn write_weight_tile<W: Write>(out: &mut W, w: &QuantizedTensor, dims: &MatmulDims, tile: &Tile) -> io::Result<()> {
  for i in 0..HW_ARRAY_SIZE {
    for j in 0..tile.depth {
      write_hex_byte(out, tile.weight_at(w, dims, i, j))?;
    }
  }
  out.flush()
}

/// Emits `depth` lines covering `x[col_base .. col_base + depth)`.
pub fn write_vector_tile<W: Write>(out: &mut W, x: &QuantizedTensor, dims: &MatmulDims, tile: &Tile) -> io::Result<()> {
  for j in 0..tile.depth {
    write_hex_byte(out, tile.activation_at(x, dims, j))?;
  }
  out.flush()
}
