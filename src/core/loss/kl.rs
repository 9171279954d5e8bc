use anyhow::Result;
use candle_core::Tensor;

/// 잔차 et 의 경험적 모멘트
#[derive(Debug, Clone)]
pub struct ResidualMoments {
    /// 스칼라 텐서
    pub mean: Tensor,
    /// 스칼라 텐서 (불편 분산)
    pub var: Tensor,
}

impl ResidualMoments {
    pub fn of(et: &Tensor) -> Result<Self> {
        // 원소 1개면 분산 분모가 0 이 되지 않도록 1 로 둔다
        let denom = et.elem_count().saturating_sub(1).max(1);
        let flat = et.flatten_all()?;
        let mean = flat.mean_all()?;
        let centered = flat.broadcast_sub(&mean)?;
        let var = (centered.sqr()?.sum_all()? / denom as f64)?;
        Ok(Self { mean, var })
    }

    pub fn mean_value(&self) -> Result<f32> {
        Ok(self.mean.to_scalar::<f32>()?)
    }

    pub fn var_value(&self) -> Result<f32> {
        Ok(self.var.to_scalar::<f32>()?)
    }
}

/// KL(N(μ, σ²) ‖ N(0, 1)) = 0.5 * (σ² + μ² − 1 − ln σ²)
pub fn residual_distribution_loss(moments: &ResidualMoments) -> Result<Tensor> {
    let mean_sq = moments.mean.sqr()?;
    let log_var = moments.var.log()?;
    let kl = (((&moments.var + mean_sq)? - log_var)? - 1.0)?;
    Ok((kl * 0.5)?)
}
