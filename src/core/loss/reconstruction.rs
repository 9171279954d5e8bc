use anyhow::{bail, Result};
use candle_core::Tensor;

/// MSE(recon_rescaled * sqrt(alpha), target)
pub fn reconstruction_loss(recon_rescaled: &Tensor, alpha: f64, target: &Tensor) -> Result<Tensor> {
    if recon_rescaled.dims() != target.dims() {
        bail!(
            "재구성 {:?} 과 관측 {:?} 형태가 다름",
            recon_rescaled.dims(),
            target.dims()
        );
    }
    let scaled = (recon_rescaled * alpha.sqrt())?;
    Ok((scaled - target)?.sqr()?.mean_all()?)
}
