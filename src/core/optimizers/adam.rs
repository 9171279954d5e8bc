use anyhow::Result;
use candle_core::backprop::GradStore;
use candle_core::{Tensor, Var};

use super::config::OptimizerConfig;

/// 파라미터 하나의 Adam 모멘트 상태
#[derive(Debug, Clone)]
pub struct AdamState {
    pub m: Tensor, // 1차 모멘트
    pub v: Tensor, // 2차 모멘트
}

/// 텐서 파라미터 묶음에 대한 Adam 최적화기
///
/// 학습률은 생성 시 고정. 모멘트와 시간 스텝은 `reset` 전까지 유지된다.
pub struct TensorAdam {
    vars: Vec<Var>,
    states: Vec<AdamState>,
    t: i32, // 시간 스텝
    config: OptimizerConfig,
}

impl TensorAdam {
    pub fn new(vars: Vec<Var>, config: OptimizerConfig) -> Result<Self> {
        let states = vars
            .iter()
            .map(|var| -> Result<AdamState> {
                Ok(AdamState {
                    m: var.as_tensor().zeros_like()?,
                    v: var.as_tensor().zeros_like()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            vars,
            states,
            t: 0,
            config,
        })
    }

    pub fn learning_rate(&self) -> f64 {
        self.config.learning_rate
    }

    pub fn step_count(&self) -> i32 {
        self.t
    }

    pub fn vars(&self) -> &[Var] {
        &self.vars
    }

    /// Adam 업데이트 수행. 그래디언트가 없는 파라미터는 건너뛴다.
    pub fn step(&mut self, grads: &GradStore) -> Result<()> {
        self.t += 1;
        let adam = self.config.adam;
        let lr = self.config.learning_rate;

        // 편향 보정 계수
        let bias1 = 1.0 - adam.beta1.powi(self.t);
        let bias2 = 1.0 - adam.beta2.powi(self.t);

        for (var, state) in self.vars.iter().zip(self.states.iter_mut()) {
            let Some(gradient) = grads.get(var.as_tensor()) else {
                continue;
            };
            let gradient = gradient.detach();

            // 모멘텀 업데이트
            state.m = ((&state.m * adam.beta1)? + (&gradient * (1.0 - adam.beta1))?)?;
            state.v = ((&state.v * adam.beta2)? + (gradient.sqr()? * (1.0 - adam.beta2))?)?;

            let m_hat = (&state.m / bias1)?;
            let v_hat = (&state.v / bias2)?;

            // 파라미터 업데이트
            let denom = (v_hat.sqrt()? + adam.epsilon)?;
            let delta = ((m_hat / denom)? * lr)?;
            let updated = (var.as_tensor().detach() - delta)?;
            var.set(&updated)?;
        }
        Ok(())
    }

    /// 모든 그래디언트가 유한한지 검사
    pub fn gradients_finite(&self, grads: &GradStore) -> Result<bool> {
        for var in &self.vars {
            if let Some(gradient) = grads.get(var.as_tensor()) {
                let total = gradient
                    .abs()?
                    .sum_all()?
                    .to_dtype(candle_core::DType::F64)?
                    .to_scalar::<f64>()?;
                if !total.is_finite() {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// 상태 초기화
    pub fn reset(&mut self) -> Result<()> {
        self.t = 0;
        for (var, state) in self.vars.iter().zip(self.states.iter_mut()) {
            state.m = var.as_tensor().zeros_like()?;
            state.v = var.as_tensor().zeros_like()?;
        }
        Ok(())
    }
}
