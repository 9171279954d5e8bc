// 각 모듈이 자체 테스트를 포함함
pub mod adam;
pub mod config;

pub use adam::{AdamState, TensorAdam};
pub use config::{AdamConfig, OptimizerConfig};
