/// Global logging configuration
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;

static ENABLE_LOG: AtomicBool = AtomicBool::new(true);
static INIT: Once = Once::new();

/// Install `env_logger` once; `RUST_LOG` overrides the default `info` level.
pub fn init_log() {
  INIT.call_once(|| {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
      .format_timestamp(None)
      .try_init();
  });
}

/// Set the per-call banner enabled
pub fn set_log(enabled: bool) {
  ENABLE_LOG.store(enabled, Ordering::Relaxed);
}

/// Check if the per-call banner is enabled, default is true
pub fn is_log_enabled() -> bool {
  ENABLE_LOG.load(Ordering::Relaxed)
}
