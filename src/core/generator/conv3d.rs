//! # 3D 컨볼루션
//!
//! candle 에는 conv3d 가 없으므로 깊이 축을 배치로 펼친 뒤 커널의 깊이 슬라이스마다
//! conv2d 를 적용하고 합산한다. 모든 연산이 미분 가능하므로 역전파가 그대로 흐른다.
//! 경계는 가장자리 값 복제(same) 패딩.

use anyhow::{bail, Result};
use candle_core::{Tensor, Var};

use crate::core::systems::RunContext;

/// 3D 컨볼루션 레이어 (stride 1, 출력 크기 = 입력 크기)
pub struct Conv3d {
    /// (c_out, c_in, k, k, k)
    weight: Var,
    /// (c_out)
    bias: Var,
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
}

impl Conv3d {
    /// PyTorch 기본값과 같은 균등 초기화 (bound = 1/sqrt(fan_in))
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        ctx: &mut RunContext,
    ) -> Result<Self> {
        if kernel_size == 0 || kernel_size % 2 == 0 {
            bail!("커널 크기는 홀수여야 함: {}", kernel_size);
        }
        let fan_in = in_channels * kernel_size.pow(3);
        let bound = 1.0 / (fan_in as f32).sqrt();
        let k = kernel_size;
        let weight = Var::from_tensor(&ctx.uniform((out_channels, in_channels, k, k, k), -bound, bound)?)?;
        let bias = Var::from_tensor(&ctx.uniform(out_channels, -bound, bound)?)?;
        Ok(Self {
            weight,
            bias,
            in_channels,
            out_channels,
            kernel_size,
        })
    }

    /// (c_in, H, W, D) → (c_out, H, W, D)
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let (c_in, _h, _w, d) = xs.dims4()?;
        if c_in != self.in_channels {
            bail!("입력 채널 {} != 기대 채널 {}", c_in, self.in_channels);
        }
        let k = self.kernel_size;
        let pad = k / 2;

        let padded = if pad > 0 {
            xs.pad_with_same(1, pad, pad)?
                .pad_with_same(2, pad, pad)?
                .pad_with_same(3, pad, pad)?
        } else {
            xs.clone()
        };

        // 깊이 축을 배치로: (D + 2p, c_in, H + 2p, W + 2p)
        let slices = padded.permute((3, 0, 1, 2))?.contiguous()?;

        let mut acc: Option<Tensor> = None;
        for kd in 0..k {
            let window = slices.narrow(0, kd, d)?;
            let kernel = self.weight.as_tensor().narrow(2, kd, 1)?.squeeze(2)?.contiguous()?;
            let out = window.conv2d(&kernel, 0, 1, 1, 1)?; // (D, c_out, H, W)
            acc = Some(match acc {
                None => out,
                Some(sum) => (sum + out)?,
            });
        }
        let Some(out) = acc else {
            bail!("빈 커널");
        };

        let bias = self.bias.as_tensor().reshape((1, self.out_channels, 1, 1))?;
        let out = out.broadcast_add(&bias)?;
        Ok(out.permute((1, 2, 3, 0))?) // (c_out, H, W, D)
    }

    pub fn vars(&self) -> Vec<Var> {
        vec![self.weight.clone(), self.bias.clone()]
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }
}
