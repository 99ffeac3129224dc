use crate::bridge::tile::Tile;
use crate::error::{BridgeError, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

/// One line of the tile trace.
#[derive(Debug, Serialize)]
pub struct TileRecord<'a> {
  pub row_base: usize,
  pub col_base: usize,
  pub depth: usize,
  pub parsed: usize,
  pub results: &'a [i32],
  pub elapsed_us: u128,
}

/// JSON-lines log of every simulator invocation.
pub struct TraceWriter {
  out: Box<dyn Write>,
}

impl TraceWriter {
  pub fn create(path: &Path) -> Result<Self> {
    let file = File::create(path).map_err(|source| BridgeError::ArtifactCreate {
      path: path.to_path_buf(),
      source,
    })?;
    Ok(Self::from_writer(BufWriter::new(file)))
  }

  pub fn from_writer<W: Write + 'static>(out: W) -> Self {
    Self { out: Box::new(out) }
  }

  pub fn record(&mut self, tile: &Tile, parsed: usize, results: &[i32], elapsed: Duration) -> io::Result<()> {
    let entry = TileRecord {
      row_base: tile.row_base,
      col_base: tile.col_base,
      depth: tile.depth,
      parsed,
      results,
      elapsed_us: elapsed.as_micros(),
    };
    serde_json::to_writer(&mut self.out, &entry)?;
    writeln!(self.out)?;
    self.out.flush()
  }
}
