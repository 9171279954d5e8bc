use anyhow::Result;
use candle_core::{Shape, Tensor, Var};

use super::FactorGenerator;
use crate::core::systems::RunContext;

/// 자유 파라미터 인자: 잠재 입력을 무시하고 학습 가능한 텐서를 그대로 출력
pub struct DirectFactor {
    value: Var,
}

impl DirectFactor {
    /// [0, scale) 균등 초기화
    pub fn new<S: Into<Shape>>(shape: S, scale: f32, ctx: &mut RunContext) -> Result<Self> {
        let value = Var::from_tensor(&ctx.uniform(shape, 0.0, scale)?)?;
        Ok(Self { value })
    }

    pub fn value(&self) -> &Tensor {
        self.value.as_tensor()
    }
}

impl FactorGenerator for DirectFactor {
    fn forward(&self, _latent: &Tensor) -> Result<Tensor> {
        Ok(self.value.as_tensor().clone())
    }

    fn vars(&self) -> Vec<Var> {
        vec![self.value.clone()]
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}
