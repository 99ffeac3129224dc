use clap::Parser;
use log::error;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tpu_bridge::bridge::tensor::OwnedQuantizedTensor;
use tpu_bridge::channel::file::FileChannel;
use tpu_bridge::config::{load_and_merge_configs, AppConfig, CliOverrides};
use tpu_bridge::reference::ReferenceInvoker;
use tpu_bridge::simulator::ProcessInvoker;
use tpu_bridge::utils::log::{init_log, set_log};
use tpu_bridge::utils::report::print_offload_report;
use tpu_bridge::utils::trace::TraceWriter;
use tpu_bridge::{OffloadStats, SimulationChannel, TpuBridge};

/// tpu_bridge - offload a quantized mat-vec to the TPU simulator
#[derive(Parser, Debug)]
#[command(name = "tpu_bridge")]
#[command(version = "0.1.0")]
#[command(about = "Runs one quantized matrix-vector product on the TPU simulator", long_about = None)]
struct Args {
  /// Problem file (JSON with n, d, gs, x{q,s}, w{q,s})
  #[arg(short, long, value_name = "FILE")]
  problem: PathBuf,

  /// Custom TOML config merged over the built-in defaults
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Simulator backend: vvp, vcs or reference
  #[arg(short, long, value_name = "BACKEND")]
  backend: Option<String>,

  /// Explicit simulator program, overrides the backend's
  #[arg(long, value_name = "PATH")]
  program: Option<String>,

  /// Directory holding the protocol artifacts
  #[arg(short, long, value_name = "DIR")]
  work_dir: Option<String>,

  /// Kill the simulator after this many seconds (0 = never)
  #[arg(long, value_name = "SECS")]
  timeout: Option<u64>,

  /// Write a JSON-lines trace of every tile
  #[arg(long, value_name = "FILE")]
  trace_file: Option<String>,

  /// Dump the full W and x in decimal before offloading
  #[arg(long)]
  dump_full: bool,

  /// Fail on an out-of-range scale index instead of skipping the group
  #[arg(long)]
  strict_scales: bool,

  /// Quiet mode (suppress banner and report)
  #[arg(short, long)]
  quiet: bool,

  /// Write the output vector here instead of stdout
  #[arg(short, long, value_name = "FILE")]
  output: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct Problem {
  n: usize,
  d: usize,
  gs: usize,
  x: OwnedQuantizedTensor,
  w: OwnedQuantizedTensor,
}

fn load_problem(path: &Path) -> io::Result<Problem> {
  let content = fs::read_to_string(path)
    .map_err(|e| io::Error::new(io::ErrorKind::NotFound, format!("cannot read problem file {:?}: {}", path, e)))?;
  serde_json::from_str(&content)
    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("parse problem file failed: {}", e)))
}

fn offload<C: SimulationChannel>(
  channel: C,
  config: &AppConfig,
  problem: &Problem,
) -> tpu_bridge::Result<(Vec<f32>, OffloadStats)> {
  let mut bridge = TpuBridge::new(channel, config.bridge_options());
  if let Some(path) = config.trace_file() {
    bridge = bridge.with_trace(TraceWriter::create(&path)?);
  }

  let mut xout = vec![0.0f32; problem.d];
  let stats = bridge.matmul_hw(
    &mut xout,
    &problem.x.view(),
    &problem.w.view(),
    problem.n,
    problem.d,
    problem.gs,
  )?;
  Ok((xout, stats))
}

fn main() -> io::Result<()> {
  init_log();

  let args = Args::parse();

  let cli = CliOverrides {
    backend: args.backend,
    program: args.program,
    work_dir: args.work_dir,
    timeout_secs: args.timeout,
    trace_file: args.trace_file,
    dump_full_matrices: args.dump_full,
    strict_scales: args.strict_scales,
    quiet: args.quiet,
  };
  let root = std::env::current_dir()?;
  let config = load_and_merge_configs(args.config.as_deref(), &root, &cli)?;
  if config.bridge.quiet {
    set_log(false);
  }

  let problem = load_problem(&args.problem)?;

  let work_dir = config.work_dir();
  fs::create_dir_all(&work_dir)?;
  let paths = config.artifact_paths();

  let result = match config.sim_command()? {
    Some(cmd) => offload(FileChannel::new(&work_dir, paths, ProcessInvoker::new(cmd)), &config, &problem),
    None => {
      let invoker = ReferenceInvoker::new(paths.clone());
      offload(FileChannel::new(&work_dir, paths, invoker), &config, &problem)
    },
  };

  let (xout, stats) = result.map_err(|e| {
    error!("Offload aborted: {}", e);
    io::Error::other(e)
  })?;

  if !config.bridge.quiet {
    print_offload_report(&stats);
  }

  let json = serde_json::to_string(&xout)?;
  match args.output {
    Some(path) => fs::write(path, json + "\n")?,
    None => println!("{}", json),
  }

  Ok(())
}
