// Debug dump of the whole W / x operands in signed decimal

use super::tensor::{MatmulDims, QuantizedTensor};
use std::io::{self, Write};

/// One matrix row per line, each code followed by a space.
pub fn write_full_weights<W: Write>(out: &mut W, w: &QuantizedTensor, dims: &MatmulDims) -> io::Result<()> {
  for row in w.q[..dims.d * dims.n].chunks(dims.n.max(1)) {
    for v in row {
      write!(out, "{} ", v)?;
    }
    writeln!(out)?;
  }
  out.flush()
}

/// One code per line.
pub fn write_full_vector<W: Write>(out: &mut W, x: &QuantizedTensor, dims: &MatmulDims) -> io::Result<()> {
  for v in &x.q[..dims.n] {
    writeln!(out, "{}", v)?;
  }
  out.flush()
}
