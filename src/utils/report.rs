use crate::bridge::matmul::OffloadStats;

pub fn print_offload_report(stats: &OffloadStats) {
  println!("\n--- Offload Report ---");
  println!("  Row blocks      : {}", stats.row_blocks);
  println!("  Column blocks   : {}", stats.col_blocks);
  println!("  Invocations     : {}", stats.invocations);
  println!("  Simulator time  : {:.3}s", stats.sim_time.as_secs_f64());
  if stats.is_degraded() {
    // soft failures, output may be partially zero
    println!("  Parse warnings  : {}", stats.parse_warnings);
    println!("  Short results   : {}", stats.short_results);
    println!("  Skipped groups  : {}", stats.skipped_groups);
  }
  println!("--- End Report ---\n");
}
