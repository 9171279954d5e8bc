//! # 저랭크 디노이저 핵심 모듈
//!
//! 딥 이미지 프라이어 인자 분해와 역방향 확산 샘플링의 구성 요소들

pub mod convergence;
pub mod engine;
pub mod generator;
pub mod io;
pub mod loss;
pub mod matrix;
pub mod optimizers;
pub mod systems;

// 주요 타입들 재수출
pub use convergence::{BestResultTracker, ResultSnapshot, RunningAverageEstimator};
pub use engine::{
    DiffusionSampler, InnerOptimizer, IterationReport, NoiseSchedule, OptimizeOutcome,
    OptimizeRequest, SampleOutcome, SamplingPlan, StepSummary,
};
pub use generator::{FactorGenerator, LowRankImageModel};
pub use loss::{LossAssembly, LossBreakdown, LossValues};
pub use optimizers::{AdamConfig, OptimizerConfig, TensorAdam};
pub use systems::{ConfigError, DenoiseConfig, ModelParameters, RunContext};

// 각 모듈이 자체 테스트를 포함함
