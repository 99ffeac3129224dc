use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tpu_bridge::bridge::result_decoder::decode_results;
use tpu_bridge::channel::file::{ArtifactPaths, FileChannel};
use tpu_bridge::reference::ReferenceInvoker;
use tpu_bridge::simulator::{SimOutcome, SimulatorInvoker};
use tpu_bridge::utils::log::init_log;
use tpu_bridge::utils::trace::TraceWriter;
use tpu_bridge::{matmul_hw, BridgeError, BridgeOptions, QuantizedTensor, TpuBridge, HW_ARRAY_SIZE};

fn reference_channel(dir: &TempDir) -> FileChannel<ReferenceInvoker> {
  let paths = ArtifactPaths::in_dir(dir.path());
  FileChannel::new(dir.path(), paths.clone(), ReferenceInvoker::new(paths))
}

fn read_lines(path: &Path) -> Vec<String> {
  fs::read_to_string(path)
    .unwrap()
    .lines()
    .map(|l| l.to_string())
    .collect()
}

#[test]
fn offload_through_files_matches_dequantized_dot_product() {
  init_log();
  let dir = TempDir::new().unwrap();
  let (n, d, gs) = (16, 16, 8);

  // w[row, j] = j - 8, x[j] = 1 or -1; one scale per group
  let wq: Vec<i8> = (0..d * n).map(|k| (k % n) as i8 - 8).collect();
  let ws: Vec<f32> = (0..d * n / gs).map(|g| if g % 2 == 0 { 0.5 } else { 0.25 }).collect();
  let xq: Vec<i8> = (0..n).map(|j| if j % 3 == 0 { -1 } else { 1 }).collect();
  let xs = vec![2.0f32, 4.0];
  let w = QuantizedTensor::new(&wq, &ws);
  let x = QuantizedTensor::new(&xq, &xs);

  let mut channel = reference_channel(&dir);
  let mut xout = vec![0.0f32; d];
  let stats = matmul_hw(&mut channel, &mut xout, &x, &w, n, d, gs).unwrap();
  assert_eq!(stats.invocations, 4);

  let expected: Vec<f32> = (0..d)
    .map(|row| {
      (0..n)
        .map(|j| {
          let k = row * n + j;
          wq[k] as f32 * ws[k / gs] * xq[j] as f32 * xs[j / gs]
        })
        .sum()
    })
    .collect();
  assert_eq!(xout, expected);

  // artifacts of the last tile stay behind
  let paths = channel.paths();
  assert_eq!(read_lines(&paths.config), vec!["8"]);
  assert_eq!(read_lines(&paths.weights).len(), HW_ARRAY_SIZE * gs);
  assert_eq!(read_lines(&paths.vector).len(), gs);
}

#[test]
fn ragged_problem_pads_and_never_writes_past_d() {
  let dir = TempDir::new().unwrap();
  let (n, d, gs): (usize, usize, usize) = (6, 5, 4);
  let wq: Vec<i8> = (0..d * n).map(|k| (k as i8 % 5) - 2).collect();
  let ws = vec![1.0f32; (d * n).div_ceil(gs)];
  let xq: Vec<i8> = vec![3, -1, 2, 0, 1, -4];
  let xs = vec![1.0f32; 2];
  let w = QuantizedTensor::new(&wq, &ws);
  let x = QuantizedTensor::new(&xq, &xs);

  let mut channel = reference_channel(&dir);
  let mut xout = vec![-1.0f32; d + 2];
  matmul_hw(&mut channel, &mut xout, &x, &w, n, d, gs).unwrap();

  for row in 0..d {
    let dot: i32 = (0..n).map(|j| wq[row * n + j] as i32 * xq[j] as i32).sum();
    assert_eq!(xout[row], dot as f32, "row {}", row);
  }
  assert_eq!(&xout[d..], &[-1.0, -1.0]);

  // second column block: columns 4, 5 real, 6, 7 padded
  let vector = read_lines(&channel.paths().vector);
  assert_eq!(vector, vec!["01", "fc", "00", "00"]);
}

/// A simulator that exits cleanly without writing any result.
struct SilentSimulator;

impl SimulatorInvoker for SilentSimulator {
  fn name(&self) -> String {
    "silent".to_string()
  }

  fn invoke(&mut self, _work_dir: &Path) -> tpu_bridge::Result<SimOutcome> {
    Ok(SimOutcome {
      code: Some(0),
      ..Default::default()
    })
  }
}

#[test]
fn missing_result_artifact_is_fatal() {
  let dir = TempDir::new().unwrap();
  let mut channel = FileChannel::in_dir(dir.path(), SilentSimulator);
  let q = vec![1i8; 64];
  let s = vec![1.0f32; 8];
  let w = QuantizedTensor::new(&q, &s);
  let x = QuantizedTensor::new(&q[..8], &s[..1]);
  let mut xout = vec![0.0f32; 8];

  let err = matmul_hw(&mut channel, &mut xout, &x, &w, 8, 8, 8).unwrap_err();
  match err {
    BridgeError::ArtifactOpen { path, .. } => assert!(path.ends_with("memory_dump.txt")),
    other => panic!("unexpected: {:?}", other),
  }
}

/// Runs the reference model once, then exits cleanly without writing.
struct OneShotSimulator {
  reference: ReferenceInvoker,
  calls: usize,
}

impl SimulatorInvoker for OneShotSimulator {
  fn name(&self) -> String {
    "one-shot".to_string()
  }

  fn invoke(&mut self, work_dir: &Path) -> tpu_bridge::Result<SimOutcome> {
    self.calls += 1;
    if self.calls == 1 {
      return self.reference.invoke(work_dir);
    }
    Ok(SimOutcome {
      code: Some(0),
      ..Default::default()
    })
  }
}

#[test]
fn previous_tile_result_is_never_reused() {
  let dir = TempDir::new().unwrap();
  let paths = ArtifactPaths::in_dir(dir.path());
  let invoker = OneShotSimulator {
    reference: ReferenceInvoker::new(paths.clone()),
    calls: 0,
  };
  let mut channel = FileChannel::new(dir.path(), paths, invoker);

  let (n, d, gs) = (8, 16, 8);
  let wq = vec![1i8; d * n];
  let ws = vec![1.0f32; d];
  let xq = vec![1i8; n];
  let xs = vec![1.0f32];
  let w = QuantizedTensor::new(&wq, &ws);
  let x = QuantizedTensor::new(&xq, &xs);
  let mut xout = vec![0.0f32; d];

  let err = matmul_hw(&mut channel, &mut xout, &x, &w, n, d, gs).unwrap_err();
  match err {
    BridgeError::ArtifactOpen { path, .. } => assert!(path.ends_with("memory_dump.txt")),
    other => panic!("unexpected: {:?}", other),
  }
  assert!(!channel.paths().result.exists());
}

#[test]
fn unwritable_work_dir_is_fatal() {
  let dir = TempDir::new().unwrap();
  let missing = dir.path().join("does-not-exist");
  let mut channel = FileChannel::in_dir(&missing, SilentSimulator);
  let q = vec![0i8; 8];
  let s = vec![1.0f32];
  let x = QuantizedTensor::new(&q, &s);
  let mut xout = vec![0.0f32; 1];

  let err = matmul_hw(&mut channel, &mut xout, &x, &x, 8, 1, 8).unwrap_err();
  match err {
    BridgeError::ArtifactCreate { path, .. } => assert!(path.ends_with("sim_config.txt")),
    other => panic!("unexpected: {:?}", other),
  }
}

#[test]
fn full_dump_and_trace_are_written() {
  let dir = TempDir::new().unwrap();
  let (n, d, gs) = (8, 10, 8);
  let wq: Vec<i8> = (0..d * n).map(|k| (k % 7) as i8 - 3).collect();
  let ws = vec![1.0f32; d];
  let xq = vec![1i8; n];
  let xs = vec![1.0f32];
  let w = QuantizedTensor::new(&wq, &ws);
  let x = QuantizedTensor::new(&xq, &xs);

  let trace_path = dir.path().join("trace.jsonl");
  let options = BridgeOptions {
    dump_full_matrices: true,
    quiet: true,
    ..Default::default()
  };
  let mut bridge = TpuBridge::new(reference_channel(&dir), options).with_trace(TraceWriter::create(&trace_path).unwrap());
  let mut xout = vec![0.0f32; d];
  let stats = bridge.matmul_hw(&mut xout, &x, &w, n, d, gs).unwrap();
  assert_eq!(stats.invocations, 2);

  let paths = bridge.channel().paths().clone();
  let full_weights = read_lines(&paths.full_weights);
  assert_eq!(full_weights.len(), d);
  assert_eq!(full_weights[0], "-3 -2 -1 0 1 2 3 -3 ");
  assert_eq!(read_lines(&paths.full_vector), vec!["1"; n]);

  let trace = read_lines(&trace_path);
  assert_eq!(trace.len(), 2);
  let second: serde_json::Value = serde_json::from_str(&trace[1]).unwrap();
  assert_eq!(second["row_base"], 8);
  assert_eq!(second["col_base"], 0);
  assert_eq!(second["parsed"], HW_ARRAY_SIZE);
  assert_eq!(second["results"].as_array().unwrap().len(), HW_ARRAY_SIZE);
}

#[test]
fn result_file_with_noise_decodes_like_clean_file() {
  let dir = TempDir::new().unwrap();
  let clean = dir.path().join("clean.txt");
  let noisy = dir.path().join("noisy.txt");
  fs::write(&clean, "0000000a\nfffffff6\n1\n2\n3\n4\n5\n6\n").unwrap();
  fs::write(
    &noisy,
    "// memory dump\n\n0000000a\n// lane 1\nfffffff6\n \n1\n2\n3\n\t\n4\n5\n6\n// done\n",
  )
  .unwrap();

  let a = decode_results(std::io::BufReader::new(fs::File::open(&clean).unwrap())).unwrap();
  let b = decode_results(std::io::BufReader::new(fs::File::open(&noisy).unwrap())).unwrap();
  assert_eq!(a, b);
  assert_eq!(a.values, [10, -10, 1, 2, 3, 4, 5, 6]);
}
