//! # 입력 볼륨 준비
//!
//! 파일이 지정되면 읽고, 없으면 합성 팬텀 + 가우시안 노이즈를 만든다.

use anyhow::{bail, Result};
use candle_core::Tensor;
use log::info;
use rand::Rng;

use super::phantom::{add_gaussian_noise, perlin_phantom};
use super::volume::{array_to_tensor, load_volume_tensor};
use crate::core::systems::{DenoiseConfig, RunContext};

/// (기준, 관측) 볼륨
///
/// 팬텀 시드는 실행 RNG 에서 뽑으므로 64 비트 시드 전체가 팬텀에 반영된다.
pub fn prepare_volumes(config: &DenoiseConfig, ctx: &mut RunContext) -> Result<(Tensor, Tensor)> {
    let data = &config.data;
    let clean = match &data.clean_path {
        Some(path) => load_volume_tensor(path, ctx.device())?,
        None => {
            let phantom_seed: u32 = ctx.rng().gen();
            let phantom = perlin_phantom(data.synthetic_size, data.synthetic_channels, phantom_seed)?;
            info!("합성 팬텀 생성: {:?} (팬텀 시드 {})", phantom.dim(), phantom_seed);
            array_to_tensor(&phantom, ctx.device())?
        }
    };
    let noisy = match &data.noisy_path {
        Some(path) => {
            let noisy = load_volume_tensor(path, ctx.device())?;
            if noisy.dims() != clean.dims() {
                bail!(
                    "관측 형태 {:?} 가 기준 형태 {:?} 와 다름",
                    noisy.dims(),
                    clean.dims()
                );
            }
            noisy
        }
        None => add_gaussian_noise(&clean, data.noise_sigma, true, ctx)?,
    };
    Ok((clean, noisy))
}
