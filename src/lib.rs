//! 저랭크 딥 프라이어 확산 디노이저 라이브러리
//!
//! 확산 역과정의 각 스텝에서 학습되지 않은 생성 네트워크들의 저랭크 곱으로
//! 볼륨 영상을 추정한다.

pub mod core;

// 핵심 모듈들 재수출
pub use core::{
    // 구성
    ConfigError, DenoiseConfig, ModelParameters, RunContext,
    // 엔진
    DiffusionSampler, InnerOptimizer, NoiseSchedule, OptimizeOutcome, OptimizeRequest,
    SampleOutcome,
    // 모델
    LowRankImageModel,
};
pub use core::matrix::{psnr, VolumeShape};
