//! # 시스템 모듈
//!
//! 구성, 실행 컨텍스트, 오류 타입, 로깅 설정

pub mod config;
pub mod context;
pub mod error;
pub mod logging;

// 설정 관련 재수출
pub use config::{
    DataParameters, DenoiseConfig, DeviceKind, DiffusionParameters, GeneratorKind,
    IterationSchedule, ModelParameters, RuntimeParameters,
};
pub use context::RunContext;
pub use error::ConfigError;
pub use logging::init_logging;

// 테스트 모듈들
#[cfg(test)]
pub mod __tests__;
