//! # 3D 총변동 (TV)
//!
//! (N, C, H, W, D) 텐서의 세 공간 축에 대한 비등방 제곱 TV. 채널은 서로 독립.
//! `2 * (Σ(Δh)²/count_h + Σ(Δw)²/count_w + Σ(Δd)²/count_d) / N`
//! 길이 1 인 축은 기여하지 않는다.

use anyhow::{bail, Result};
use candle_core::{DType, Tensor};

pub fn total_variation_3d(volume: &Tensor) -> Result<Tensor> {
    let dims = volume.dims();
    if dims.len() != 5 {
        bail!("TV 입력은 (N, C, H, W, D) 여야 함: {:?}", dims);
    }
    let batch = dims[0];

    let mut total = Tensor::zeros((), DType::F32, volume.device())?;
    for axis in 2..5 {
        let len = dims[axis];
        if len < 2 {
            continue;
        }
        let count = volume.elem_count() / len * (len - 1);
        let forward = volume.narrow(axis, 1, len - 1)?;
        let backward = volume.narrow(axis, 0, len - 1)?;
        let axis_tv = ((forward - backward)?.sqr()?.sum_all()? / count as f64)?;
        total = (total + axis_tv)?;
    }
    Ok((total * (2.0 / batch as f64))?)
}
