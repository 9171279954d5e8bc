use anyhow::{bail, Result};
use candle_core::Tensor;

use super::kl::{residual_distribution_loss, ResidualMoments};
use super::reconstruction::reconstruction_loss;
use super::total_variation::total_variation_3d;

/// 한 반복의 손실 구성요소
#[derive(Debug, Clone)]
pub struct LossBreakdown {
    /// MSE 데이터 항 (그래프 포함)
    pub reconstruction: Tensor,
    /// beta * TV 의 TV 부분. beta = 0 이면 계산하지 않음
    pub smoothness: Option<Tensor>,
    /// 잔차 분포 KL (진단 전용, 그래프와 분리됨)
    pub residual_distribution: Tensor,
    /// 잔차 평균 / 분산
    pub moments: ResidualMoments,
    /// 역전파 대상
    pub total: Tensor,
}

/// 손실 스칼라 값 (로그 / 리포트용)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossValues {
    pub reconstruction: f32,
    pub smoothness: f32,
    pub residual_distribution: f32,
    pub total: f32,
    pub residual_mean: f32,
    pub residual_var: f32,
}

/// 손실 조립: total = reconstruction + beta * smoothness
#[derive(Debug, Clone, Copy)]
pub struct LossAssembly {
    beta: f64,
}

impl LossAssembly {
    pub fn new(beta: f64) -> Result<Self> {
        if !beta.is_finite() || beta < 0.0 {
            bail!("beta 는 음수가 아닌 유한값이어야 함: {}", beta);
        }
        Ok(Self { beta })
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// 확산 일관 잔차 et = (observed - sqrt(alpha) * recon_rescaled) / sqrt(1 - alpha)
    pub fn residual(observed: &Tensor, recon_rescaled: &Tensor, alpha: f64) -> Result<Tensor> {
        let signal = (recon_rescaled * alpha.sqrt())?;
        Ok(((observed - signal)? / (1.0 - alpha).sqrt())?)
    }

    /// 모든 항 계산
    ///
    /// * `recon_flat` - (픽셀, 채널), [-1, 1] 스케일
    /// * `recon_batched` - (1, C, H, W, D), [-1, 1] 스케일
    /// * `observed` - (픽셀, 채널) 관측
    pub fn assemble(
        &self,
        recon_flat: &Tensor,
        recon_batched: &Tensor,
        observed: &Tensor,
        alpha: f64,
    ) -> Result<LossBreakdown> {
        let reconstruction = reconstruction_loss(recon_flat, alpha, observed)?;

        // KL 항은 진단 전용이며 의도적으로 역전파에서 제외한다.
        // detach 된 재구성에서 계산하므로 total 에 섞일 수 없다.
        let et = Self::residual(observed, &recon_flat.detach(), alpha)?;
        let moments = ResidualMoments::of(&et)?;
        let residual_distribution = residual_distribution_loss(&moments)?;

        let smoothness = if self.beta > 0.0 {
            Some(total_variation_3d(recon_batched)?)
        } else {
            None
        };
        let total = self.combine(&reconstruction, smoothness.as_ref())?;

        Ok(LossBreakdown {
            reconstruction,
            smoothness,
            residual_distribution,
            moments,
            total,
        })
    }

    /// 역전파 대상 합성. 잔차 분포 항은 인자로 받지 않는다.
    pub fn combine(&self, reconstruction: &Tensor, smoothness: Option<&Tensor>) -> Result<Tensor> {
        match smoothness {
            Some(tv) if self.beta > 0.0 => Ok((reconstruction + (tv * self.beta)?)?),
            _ => Ok(reconstruction.clone()),
        }
    }
}

impl LossBreakdown {
    pub fn values(&self) -> Result<LossValues> {
        let smoothness = match &self.smoothness {
            Some(tv) => tv.to_scalar::<f32>()?,
            None => 0.0,
        };
        Ok(LossValues {
            reconstruction: self.reconstruction.to_scalar::<f32>()?,
            smoothness,
            residual_distribution: self.residual_distribution.to_scalar::<f32>()?,
            total: self.total.to_scalar::<f32>()?,
            residual_mean: self.moments.mean_value()?,
            residual_var: self.moments.var_value()?,
        })
    }
}
