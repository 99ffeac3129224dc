use crate::bridge::matmul::BridgeOptions;
use crate::channel::file::{
  ArtifactPaths, CONFIG_FILE, FULL_VECTOR_FILE, FULL_WEIGHTS_FILE, RESULT_FILE, VECTOR_FILE, WEIGHTS_FILE,
};
use crate::simulator::{SimBackend, SimCommand};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG: &str = include_str!("default.toml");

/// 仿真器配置部分
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SimulatorSection {
  #[serde(default)]
  pub backend: String,
  #[serde(default)]
  pub program: String,
  #[serde(default)]
  pub args: Vec<String>,
  #[serde(default)]
  pub work_dir: String,
  #[serde(default)]
  pub timeout_secs: u64,
}

/// 协议文件名配置部分
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtifactsSection {
  #[serde(default = "default_config_file")]
  pub config_file: String,
  #[serde(default = "default_weights_file")]
  pub weights_file: String,
  #[serde(default = "default_vector_file")]
  pub vector_file: String,
  #[serde(default = "default_result_file")]
  pub result_file: String,
  #[serde(default = "default_full_weights_file")]
  pub full_weights_file: String,
  #[serde(default = "default_full_vector_file")]
  pub full_vector_file: String,
}

fn default_config_file() -> String {
  CONFIG_FILE.to_string()
}

fn default_weights_file() -> String {
  WEIGHTS_FILE.to_string()
}

fn default_vector_file() -> String {
  VECTOR_FILE.to_string()
}

fn default_result_file() -> String {
  RESULT_FILE.to_string()
}

fn default_full_weights_file() -> String {
  FULL_WEIGHTS_FILE.to_string()
}

fn default_full_vector_file() -> String {
  FULL_VECTOR_FILE.to_string()
}

impl Default for ArtifactsSection {
  fn default() -> Self {
    Self {
      config_file: default_config_file(),
      weights_file: default_weights_file(),
      vector_file: default_vector_file(),
      result_file: default_result_file(),
      full_weights_file: default_full_weights_file(),
      full_vector_file: default_full_vector_file(),
    }
  }
}

/// 卸载行为配置部分
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BridgeSection {
  #[serde(default)]
  pub dump_full_matrices: bool,
  #[serde(default)]
  pub strict_scales: bool,
  #[serde(default)]
  pub quiet: bool,
  #[serde(default)]
  pub trace_file: String,
}

/// 统一的应用配置
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
  #[serde(default)]
  pub simulator: SimulatorSection,
  #[serde(default)]
  pub artifacts: ArtifactsSection,
  #[serde(default)]
  pub bridge: BridgeSection,
}

impl AppConfig {
  /// Configured backend, or the build default when unset.
  pub fn backend(&self) -> io::Result<SimBackend> {
    if self.simulator.backend.trim().is_empty() {
      return Ok(SimBackend::build_default());
    }
    SimBackend::parse(&self.simulator.backend).ok_or_else(|| {
      io::Error::new(
        io::ErrorKind::InvalidData,
        format!("unsupported simulator backend: {}", self.simulator.backend),
      )
    })
  }

  pub fn timeout(&self) -> Option<Duration> {
    match self.simulator.timeout_secs {
      0 => None,
      secs => Some(Duration::from_secs(secs)),
    }
  }

  /// External command line, `None` for the in-process reference backend.
  pub fn sim_command(&self) -> io::Result<Option<SimCommand>> {
    let backend = self.backend()?;
    let command = if !self.simulator.program.is_empty() {
      Some(SimCommand::new(self.simulator.program.clone(), self.simulator.args.clone()))
    } else {
      SimCommand::for_backend(backend).map(|mut cmd| {
        if !self.simulator.args.is_empty() {
          cmd.args = self.simulator.args.clone();
        }
        cmd
      })
    };
    Ok(command.map(|cmd| cmd.with_timeout(self.timeout())))
  }

  pub fn work_dir(&self) -> PathBuf {
    PathBuf::from(&self.simulator.work_dir)
  }

  pub fn artifact_paths(&self) -> ArtifactPaths {
    let dir = self.work_dir();
    let a = &self.artifacts;
    ArtifactPaths {
      config: dir.join(&a.config_file),
      weights: dir.join(&a.weights_file),
      vector: dir.join(&a.vector_file),
      result: dir.join(&a.result_file),
      full_weights: dir.join(&a.full_weights_file),
      full_vector: dir.join(&a.full_vector_file),
    }
  }

  pub fn bridge_options(&self) -> BridgeOptions {
    BridgeOptions {
      strict_scales: self.bridge.strict_scales,
      dump_full_matrices: self.bridge.dump_full_matrices,
      quiet: self.bridge.quiet,
    }
  }

  pub fn trace_file(&self) -> Option<PathBuf> {
    if self.bridge.trace_file.is_empty() {
      None
    } else {
      Some(PathBuf::from(&self.bridge.trace_file))
    }
  }
}

/// CLI 参数覆写
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
  pub backend: Option<String>,
  pub program: Option<String>,
  pub work_dir: Option<String>,
  pub timeout_secs: Option<u64>,
  pub trace_file: Option<String>,
  pub dump_full_matrices: bool,
  pub strict_scales: bool,
  pub quiet: bool,
}

/// 加载内置默认配置
pub fn load_default_config() -> io::Result<AppConfig> {
  parse_config(DEFAULT_CONFIG)
}

/// 从指定文件加载配置
pub fn load_config_file(path: &Path) -> io::Result<AppConfig> {
  let content = fs::read_to_string(path)
    .map_err(|e| io::Error::new(io::ErrorKind::NotFound, format!("cannot read config file {:?}: {}", path, e)))?;
  parse_config(&content)
}

pub fn parse_config(content: &str) -> io::Result<AppConfig> {
  toml::from_str::<AppConfig>(content)
    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("parse TOML config failed: {}", e)))
}

fn override_string(base: &mut String, value: String) {
  if !value.is_empty() {
    *base = value;
  }
}

/// 合并两个配置（后者覆盖前者）
pub fn merge_config(mut base: AppConfig, override_config: AppConfig) -> AppConfig {
  let sim = override_config.simulator;
  override_string(&mut base.simulator.backend, sim.backend);
  override_string(&mut base.simulator.program, sim.program);
  override_string(&mut base.simulator.work_dir, sim.work_dir);
  if !sim.args.is_empty() {
    base.simulator.args = sim.args;
  }
  if sim.timeout_secs != 0 {
    base.simulator.timeout_secs = sim.timeout_secs;
  }

  // 文件名总是有值（serde 默认值），直接覆盖
  base.artifacts = override_config.artifacts;

  let bridge = override_config.bridge;
  base.bridge.dump_full_matrices |= bridge.dump_full_matrices;
  base.bridge.strict_scales |= bridge.strict_scales;
  base.bridge.quiet |= bridge.quiet;
  override_string(&mut base.bridge.trace_file, bridge.trace_file);

  base
}

/// 应用CLI参数覆写配置
pub fn apply_cli_overrides(config: &mut AppConfig, cli: &CliOverrides) {
  if let Some(backend) = &cli.backend {
    config.simulator.backend = backend.clone();
  }
  if let Some(program) = &cli.program {
    config.simulator.program = program.clone();
  }
  if let Some(dir) = &cli.work_dir {
    config.simulator.work_dir = dir.clone();
  }
  if let Some(secs) = cli.timeout_secs {
    config.simulator.timeout_secs = secs;
  }
  if let Some(file) = &cli.trace_file {
    config.bridge.trace_file = file.clone();
  }
  if cli.dump_full_matrices {
    config.bridge.dump_full_matrices = true;
  }
  if cli.strict_scales {
    config.bridge.strict_scales = true;
  }
  if cli.quiet {
    config.bridge.quiet = true;
  }
}

/// 验证配置
pub fn validate_config(config: &AppConfig) -> io::Result<()> {
  let backend = config.backend()?;

  if config.simulator.work_dir.trim().is_empty() {
    return Err(io::Error::new(io::ErrorKind::InvalidData, "work_dir cannot be empty"));
  }

  if backend == SimBackend::Reference && !config.simulator.program.is_empty() {
    return Err(io::Error::new(
      io::ErrorKind::InvalidData,
      "the reference backend runs in-process and takes no program",
    ));
  }

  let a = &config.artifacts;
  let names = [
    ("config_file", &a.config_file),
    ("weights_file", &a.weights_file),
    ("vector_file", &a.vector_file),
    ("result_file", &a.result_file),
    ("full_weights_file", &a.full_weights_file),
    ("full_vector_file", &a.full_vector_file),
  ];
  for (key, name) in names.iter() {
    if name.trim().is_empty() {
      return Err(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("artifact name {} cannot be empty", key),
      ));
    }
  }
  // the simulator must never overwrite one of its own inputs
  for (key, name) in &names[..3] {
    if *name == &a.result_file {
      return Err(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("result_file collides with {}", key),
      ));
    }
  }

  Ok(())
}

/// 补全相对路径
pub fn resolve_paths(config: &mut AppConfig, root: &Path) {
  config.simulator.work_dir = resolve_single_path(&config.simulator.work_dir, root);
  config.bridge.trace_file = resolve_single_path(&config.bridge.trace_file, root);
}

fn resolve_single_path(path_str: &str, root: &Path) -> String {
  if path_str.is_empty() {
    return path_str.to_string();
  }

  let path = Path::new(path_str);
  if path.is_absolute() {
    return path_str.to_string();
  }

  root.join(path).to_string_lossy().to_string()
}

/// 加载并合并配置
///
/// 流程：
/// 1. 加载默认配置
/// 2. 如果提供了自定义配置文件，加载并合并
/// 3. 应用CLI参数覆写
/// 4. 补全相对路径
/// 5. 验证配置
pub fn load_and_merge_configs(
  custom_config_path: Option<&Path>,
  root: &Path,
  cli: &CliOverrides,
) -> io::Result<AppConfig> {
  let mut config = load_default_config()?;

  if let Some(custom_path) = custom_config_path {
    let custom_path = if custom_path.is_absolute() {
      custom_path.to_path_buf()
    } else {
      root.join(custom_path)
    };
    let custom_config = load_config_file(&custom_path)?;
    config = merge_config(config, custom_config);
  }

  apply_cli_overrides(&mut config, cli);
  resolve_paths(&mut config, root);
  validate_config(&config)?;

  Ok(config)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_config() {
    let config = load_default_config().unwrap();
    assert_eq!(config.backend().unwrap(), SimBackend::build_default());
    assert_eq!(config.timeout(), None);
    assert_eq!(config.artifacts.result_file, "memory_dump.txt");
    assert!(!config.bridge.strict_scales);
    validate_config(&config).unwrap();
  }

  #[test]
  fn test_merge_and_cli_overrides() {
    let user = parse_config(
      r#"
      [simulator]
      backend = "vcs"
      timeout_secs = 30

      [bridge]
      strict_scales = true
      "#,
    )
    .unwrap();
    let mut config = merge_config(load_default_config().unwrap(), user);
    assert_eq!(config.backend().unwrap(), SimBackend::Vcs);
    assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
    assert!(config.bridge.strict_scales);
    // partial [artifacts] missing from user file keeps defaults
    assert_eq!(config.artifacts.weights_file, "weights.txt");

    let cli = CliOverrides {
      backend: Some("vvp".to_string()),
      work_dir: Some("run".to_string()),
      quiet: true,
      ..Default::default()
    };
    apply_cli_overrides(&mut config, &cli);
    resolve_paths(&mut config, Path::new("/srv/tpu"));

    let cmd = config.sim_command().unwrap().unwrap();
    assert_eq!(cmd.display(), "vvp tpu_sim");
    assert_eq!(cmd.timeout, Some(Duration::from_secs(30)));
    assert_eq!(config.artifact_paths().result, PathBuf::from("/srv/tpu/run/memory_dump.txt"));
    assert!(config.bridge_options().quiet);
  }

  #[test]
  fn test_validate_rejects_bad_values() {
    let mut config = load_default_config().unwrap();
    config.simulator.backend = "verilator".to_string();
    assert!(validate_config(&config).is_err());

    let mut config = load_default_config().unwrap();
    config.artifacts.result_file = "weights.txt".to_string();
    assert!(validate_config(&config).is_err());

    let mut config = load_default_config().unwrap();
    config.simulator.backend = "reference".to_string();
    assert!(config.sim_command().unwrap().is_none());
    config.simulator.program = "./simv".to_string();
    assert!(validate_config(&config).is_err());
  }
}
