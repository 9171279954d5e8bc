use anyhow::{bail, Result};
use candle_core::{Tensor, Var};

use super::conv3d::Conv3d;
use super::{leaky_relu, FactorGenerator, LEAKY_SLOPE};
use crate::core::systems::RunContext;

/// 딥 이미지 프라이어 볼륨 생성기 (이미지 가지)
///
/// 고정 잠재 볼륨 (1, H, W, D) → 이미지 인자 볼륨 (1, H, W, D).
/// 마지막 레이어에는 활성화가 없다 (시그모이드 없음).
pub struct DeepPriorVolumeNet {
    layers: Vec<Conv3d>,
}

impl DeepPriorVolumeNet {
    pub fn new(hidden_channels: &[usize], kernel_size: usize, ctx: &mut RunContext) -> Result<Self> {
        if hidden_channels.is_empty() {
            bail!("은닉 채널 목록이 비어 있음");
        }
        let mut widths = Vec::with_capacity(hidden_channels.len() + 2);
        widths.push(1);
        widths.extend_from_slice(hidden_channels);
        widths.push(1);

        let layers = widths
            .windows(2)
            .map(|pair| Conv3d::new(pair[0], pair[1], kernel_size, ctx))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { layers })
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }
}

impl FactorGenerator for DeepPriorVolumeNet {
    fn forward(&self, latent: &Tensor) -> Result<Tensor> {
        let last = self.layers.len() - 1;
        let mut xs = latent.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            xs = layer.forward(&xs)?;
            if i != last {
                xs = leaky_relu(&xs, LEAKY_SLOPE)?;
            }
        }
        Ok(xs)
    }

    fn vars(&self) -> Vec<Var> {
        self.layers.iter().flat_map(|layer| layer.vars()).collect()
    }

    fn name(&self) -> &'static str {
        "deep_prior_volume"
    }
}
