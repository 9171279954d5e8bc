use serde::{Deserialize, Serialize};

/// Optimizer 전체 구성
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerConfig {
    /// Adam 구성
    pub adam: AdamConfig,
    /// 학습률 (고정)
    pub learning_rate: f64,
}

/// Adam 옵티마이저 구성
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdamConfig {
    /// 베타1 파라미터 (1차 모멘트 지수 감소율)
    pub beta1: f64,
    /// 베타2 파라미터 (2차 모멘트 지수 감소율)
    pub beta2: f64,
    /// 엡실론 (수치 안정성을 위한 작은 값)
    pub epsilon: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            adam: AdamConfig::default(),
            learning_rate: 0.001,
        }
    }
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

impl OptimizerConfig {
    /// 새 구성 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// Adam 구성 설정
    pub fn with_adam_config(mut self, config: AdamConfig) -> Self {
        self.adam = config;
        self
    }

    /// 학습률 설정
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }
}
