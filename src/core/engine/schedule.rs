//! # 노이즈 스케줄 / 샘플링 계획
//!
//! 누적 알파 `alphas_cumprod[t] = Π_{s≤t} (1 − beta_s)` 와
//! 역방향으로 방문할 타임스텝 목록.

use anyhow::{bail, Result};

use crate::core::systems::{ConfigError, DiffusionParameters, IterationSchedule};

/// 누적 알파 스케줄
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseSchedule {
    alphas_cumprod: Vec<f64>,
}

impl NoiseSchedule {
    /// 선형 beta 스케줄
    pub fn linear(beta_start: f64, beta_end: f64, num_timesteps: usize) -> Result<Self> {
        if num_timesteps == 0 {
            bail!("타임스텝 수는 1 이상이어야 함");
        }
        if !(beta_start > 0.0 && beta_start <= beta_end && beta_end < 1.0) {
            bail!("0 < beta_start <= beta_end < 1 이어야 함: {}, {}", beta_start, beta_end);
        }
        let span = (num_timesteps.max(2) - 1) as f64;
        let mut acc = 1.0;
        let alphas_cumprod = (0..num_timesteps)
            .map(|i| {
                let beta = beta_start + (beta_end - beta_start) * i as f64 / span;
                acc *= 1.0 - beta;
                acc
            })
            .collect();
        Ok(Self { alphas_cumprod })
    }

    /// 명시적 누적 알파 (각 값 (0, 1])
    pub fn from_alphas_cumprod(values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            bail!("빈 알파 스케줄");
        }
        if let Some(bad) = values.iter().find(|a| !(**a > 0.0 && **a <= 1.0)) {
            bail!("알파는 (0, 1] 범위여야 함: {}", bad);
        }
        Ok(Self {
            alphas_cumprod: values,
        })
    }

    pub fn from_config(params: &DiffusionParameters) -> Result<Self> {
        match &params.alphas_cumprod {
            Some(values) => Self::from_alphas_cumprod(values.clone()),
            None => Self::linear(params.beta_start, params.beta_end, params.num_diffusion_timesteps),
        }
    }

    pub fn len(&self) -> usize {
        self.alphas_cumprod.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alphas_cumprod.is_empty()
    }

    pub fn alphas_cumprod(&self) -> &[f64] {
        &self.alphas_cumprod
    }

    pub fn alpha(&self, timestep: usize) -> Result<f64> {
        match self.alphas_cumprod.get(timestep) {
            Some(alpha) => Ok(*alpha),
            None => bail!("타임스텝 {} 이 스케줄 길이 {} 를 벗어남", timestep, self.len()),
        }
    }

    /// 관측 노이즈 σ ([0,1] 스케일) 에 맞는 시작 타임스텝
    ///
    /// [-1, 1] 로 옮기면 σ 가 2σ 가 되고, sqrt((1-a)/a) = 2σ 인 a = 1/(1+4σ²)
    /// 에 가장 가까운 인덱스를 고른다.
    pub fn start_for_noise_level(&self, sigma: f64) -> usize {
        let target = 1.0 / (1.0 + 4.0 * sigma * sigma);
        let mut best = 0;
        let mut best_gap = f64::INFINITY;
        for (t, alpha) in self.alphas_cumprod.iter().enumerate() {
            let gap = (alpha - target).abs();
            if gap < best_gap {
                best = t;
                best_gap = gap;
            }
        }
        best
    }
}

/// 역방향 샘플링 계획
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingPlan {
    /// 방문할 타임스텝 (내림차순)
    pub timesteps: Vec<usize>,
    /// 스텝별 내부 반복 횟수
    pub iterations: Vec<usize>,
}

impl SamplingPlan {
    /// `start` 에서 0 쪽으로 `skip = max(start / steps, 1)` 간격, 최대 `steps` 개
    pub fn new(start: usize, steps: usize, schedule: &IterationSchedule) -> Result<Self, ConfigError> {
        if steps == 0 {
            return Err(ConfigError::invalid("diffusion.timesteps", "1 이상이어야 함"));
        }
        let skip = (start / steps).max(1);
        let timesteps: Vec<usize> = (0..=start).rev().step_by(skip).take(steps).collect();
        let mut iterations = schedule.expand(steps)?;
        iterations.truncate(timesteps.len());
        Ok(Self {
            timesteps,
            iterations,
        })
    }

    pub fn len(&self) -> usize {
        self.timesteps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timesteps.is_empty()
    }

    /// 총 내부 반복 평가 횟수 (스텝마다 iterations + 1)
    pub fn total_evaluations(&self) -> usize {
        self.iterations.iter().map(|n| n + 1).sum()
    }
}
