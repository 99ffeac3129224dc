//! Offloads quantized matrix-vector products to a cycle-accurate accelerator
//! simulator through a text file protocol.

pub mod bridge;
pub mod channel;
pub mod config;
pub mod error;
pub mod reference;
pub mod simulator;
pub mod utils;

pub use bridge::{matmul_hw, BridgeOptions, OffloadStats, QuantizedTensor, TpuBridge, HW_ARRAY_SIZE};
pub use channel::{FileChannel, MemoryChannel, SimulationChannel};
pub use error::{BridgeError, Result};
