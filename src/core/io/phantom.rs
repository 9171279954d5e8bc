//! # 합성 데이터
//!
//! 시드 고정 Perlin 노이즈 팬텀과 가우시안 열화

use anyhow::{bail, Result};
use candle_core::Tensor;
use ndarray::Array4;
use noise::{NoiseFn, Perlin};

use crate::core::systems::RunContext;

/// 팬텀 공간 주파수 (볼륨 한 변당 주기 수)
const PHANTOM_FREQUENCY: f64 = 2.5;

/// [0, 1] 로 정규화된 부드러운 입방체 팬텀 (size, size, size, channels)
///
/// 채널마다 Perlin 필드를 z 축 방향으로 밀어 서로 다른 패턴을 만든다.
pub fn perlin_phantom(size: usize, channels: usize, seed: u32) -> Result<Array4<f32>> {
    if size == 0 || channels == 0 {
        bail!("팬텀 크기와 채널은 1 이상이어야 함: {}, {}", size, channels);
    }
    let perlin = Perlin::new(seed);
    let scale = PHANTOM_FREQUENCY / size as f64;
    let mut volume = Array4::<f32>::from_shape_fn((size, size, size, channels), |(h, w, d, c)| {
        let point = [
            h as f64 * scale,
            w as f64 * scale,
            d as f64 * scale + c as f64 * 7.31,
        ];
        perlin.get(point) as f32
    });

    let min = volume.iter().copied().fold(f32::INFINITY, f32::min);
    let max = volume.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let span = max - min;
    if span > f32::EPSILON {
        volume.mapv_inplace(|v| (v - min) / span);
    } else {
        volume.fill(0.5);
    }
    Ok(volume)
}

/// clean + N(0, sigma²). `clip` 이면 [0, 1] 로 자른다.
pub fn add_gaussian_noise(clean: &Tensor, sigma: f64, clip: bool, ctx: &mut RunContext) -> Result<Tensor> {
    if !sigma.is_finite() || sigma < 0.0 {
        bail!("노이즈 표준편차는 음수가 아닌 유한값이어야 함: {}", sigma);
    }
    let noise = ctx.normal(clean.dims(), sigma as f32)?;
    let noisy = (clean + noise)?;
    if clip {
        Ok(noisy.clamp(0f32, 1f32)?)
    } else {
        Ok(noisy)
    }
}
