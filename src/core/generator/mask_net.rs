use anyhow::Result;
use candle_core::{Tensor, Var};
use candle_nn::{Linear, Module};

use super::{leaky_relu, FactorGenerator, LEAKY_SLOPE};
use crate::core::systems::RunContext;

/// 완전연결 마스크 생성기 (마스크 가지)
///
/// 고정 잠재 (1, C) → 채널 계수 (1, C)
pub struct MaskNet {
    layers: Vec<Linear>,
    params: Vec<Var>,
}

impl MaskNet {
    pub fn new(channels: usize, hidden: &[usize], ctx: &mut RunContext) -> Result<Self> {
        let mut widths = Vec::with_capacity(hidden.len() + 2);
        widths.push(channels);
        widths.extend_from_slice(hidden);
        widths.push(channels);

        let mut layers = Vec::with_capacity(widths.len() - 1);
        let mut params = Vec::with_capacity(2 * (widths.len() - 1));
        for pair in widths.windows(2) {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            let bound = 1.0 / (fan_in as f32).sqrt();
            let weight = Var::from_tensor(&ctx.uniform((fan_out, fan_in), -bound, bound)?)?;
            let bias = Var::from_tensor(&ctx.uniform(fan_out, -bound, bound)?)?;
            // Linear 는 같은 텐서 id 를 공유하므로 그래디언트가 Var 로 모인다
            layers.push(Linear::new(weight.as_tensor().clone(), Some(bias.as_tensor().clone())));
            params.push(weight);
            params.push(bias);
        }
        Ok(Self { layers, params })
    }
}

impl FactorGenerator for MaskNet {
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
        self.params.clone()
    }

    fn name(&self) -> &'static str {
        "mask_fcn"
    }
}
