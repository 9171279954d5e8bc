//! # 인자 생성기
//!
//! 저랭크 분해의 두 가지(이미지 / 마스크)를 만드는 학습되지 않은 네트워크들.
//! 코어는 `FactorGenerator` 인터페이스에만 의존한다.

pub mod conv3d;
pub mod direct;
pub mod image_net;
pub mod low_rank_model;
pub mod mask_net;

// 테스트 모듈
#[cfg(test)]
mod __tests__;

use anyhow::Result;
use candle_core::{Tensor, Var};

// 재수출
pub use conv3d::Conv3d;
pub use direct::DirectFactor;
pub use image_net::DeepPriorVolumeNet;
pub use low_rank_model::{GeneratorBlueprint, LowRankImageModel, RankComponent};
pub use mask_net::MaskNet;

/// LeakyReLU 음수 기울기
pub const LEAKY_SLOPE: f64 = 0.2;

/// 고정 잠재 입력 → 미분 가능한 인자 텐서
pub trait FactorGenerator {
    fn forward(&self, latent: &Tensor) -> Result<Tensor>;

    /// 학습 파라미터
    fn vars(&self) -> Vec<Var>;

    fn name(&self) -> &'static str;
}

/// relu(x) - slope * relu(-x)
pub fn leaky_relu(xs: &Tensor, slope: f64) -> Result<Tensor> {
    let positive = xs.relu()?;
    let negative = (xs.neg()?.relu()? * slope)?;
    Ok((positive - negative)?)
}
