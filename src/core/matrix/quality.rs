use anyhow::{bail, Result};
use candle_core::Tensor;

/// 최대 신호값 (입력은 [0, 1] 스케일)
pub const PEAK_SIGNAL: f64 = 1.0;

/// PSNR (dB). 동일하면 +∞.
pub fn psnr(reference: &Tensor, estimate: &Tensor) -> Result<f64> {
    if reference.dims() != estimate.dims() {
        bail!(
            "PSNR 형태 불일치: {:?} vs {:?}",
            reference.dims(),
            estimate.dims()
        );
    }
    let mse = mean_squared_error(reference, estimate)?;
    Ok(psnr_from_mse(mse))
}

/// [0, 1] 로 자른 추정값의 PSNR
pub fn clipped_psnr(reference: &Tensor, estimate: &Tensor) -> Result<f64> {
    let clipped = estimate.clamp(0f32, 1f32)?;
    psnr(reference, &clipped)
}

pub fn mean_squared_error(reference: &Tensor, estimate: &Tensor) -> Result<f64> {
    let mse = (reference - estimate)?
        .sqr()?
        .mean_all()?
        .to_dtype(candle_core::DType::F64)?
        .to_scalar::<f64>()?;
    Ok(mse)
}

pub fn psnr_from_mse(mse: f64) -> f64 {
    if mse == 0.0 {
        return f64::INFINITY;
    }
    10.0 * (PEAK_SIGNAL * PEAK_SIGNAL / mse).log10()
}

/// PSNR 품질 등급 (로그 요약용)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QualityLevel {
    Ultra,   // PSNR > 50 dB
    High,    // PSNR > 40 dB
    Medium,  // PSNR > 30 dB
    Low,     // PSNR > 20 dB
    Poor,
}

impl QualityLevel {
    pub fn from_psnr(psnr: f64) -> Self {
        if psnr > 50.0 {
            QualityLevel::Ultra
        } else if psnr > 40.0 {
            QualityLevel::High
        } else if psnr > 30.0 {
            QualityLevel::Medium
        } else if psnr > 20.0 {
            QualityLevel::Low
        } else {
            QualityLevel::Poor
        }
    }

    /// 목표 PSNR 값
    pub fn target_psnr(&self) -> f64 {
        match self {
            QualityLevel::Ultra => 50.0,
            QualityLevel::High => 40.0,
            QualityLevel::Medium => 30.0,
            QualityLevel::Low => 20.0,
            QualityLevel::Poor => 0.0,
        }
    }
}
