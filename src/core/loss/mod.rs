//! # 손실 조립
//!
//! 재구성 MSE, 3D TV 평활 항, 잔차 분포 KL(진단 전용)

pub mod assembly;
pub mod kl;
pub mod reconstruction;
pub mod total_variation;

pub use assembly::{LossAssembly, LossBreakdown, LossValues};
pub use kl::{residual_distribution_loss, ResidualMoments};
pub use reconstruction::reconstruction_loss;
pub use total_variation::total_variation_3d;

#[cfg(test)]
mod __tests__;
