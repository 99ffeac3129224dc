pub mod config_encoder;
pub mod dequant;
pub mod dump;
pub mod matmul;
pub mod result_decoder;
pub mod tensor;
pub mod tile;

pub use matmul::{matmul_hw, BridgeOptions, OffloadStats, TpuBridge};
pub use tensor::{MatmulDims, OwnedQuantizedTensor, QuantizedTensor, ResultBuffer, HW_ARRAY_SIZE};
pub use tile::Tile;
