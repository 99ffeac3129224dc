use std::io::{self, Write};

/// Writes the accumulation depth the simulator reads before every run.
pub fn write_sim_config<W: Write>(out: &mut W, accum_depth: usize) -> io::Result<()> {
  writeln!(out, "{}", accum_depth)?;
  out.flush()
}
