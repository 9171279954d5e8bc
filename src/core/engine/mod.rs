//! # 디노이징 엔진
//!
//! 노이즈 스케줄, 내부 최적화기, 바깥 확산 샘플러

pub mod inner_optimizer;
pub mod sampler;
pub mod schedule;

// 테스트 모듈
#[cfg(test)]
mod __tests__;

// 재수출
pub use inner_optimizer::{format_iteration, InnerOptimizer, IterationReport, OptimizeOutcome, OptimizeRequest};
pub use sampler::{ddim_coefficients, ddim_step, DiffusionSampler, SampleOutcome, StepSummary};
pub use schedule::{NoiseSchedule, SamplingPlan};
