//! # 바깥 확산 샘플러
//!
//! 역방향 DDIM 스텝마다 내부 최적화기로 x0 를 추정하고 다음 상태로 진행한다.

use std::time::Instant;

use anyhow::{bail, Context, Result};
use candle_core::Tensor;
use indicatif::ProgressBar;
use log::info;
use serde::Serialize;

use super::inner_optimizer::{format_residual, InnerOptimizer, OptimizeRequest};
use super::schedule::{NoiseSchedule, SamplingPlan};
use crate::core::systems::{DenoiseConfig, RunContext};

/// 확산 스텝 하나의 요약
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepSummary {
    pub index: usize,
    pub timestep: usize,
    pub alpha: f64,
    pub iterations: usize,
    /// 마지막 반복의 잔차 분포 KL (진단용)
    pub kl_loss: f32,
    /// 마지막 반복의 역전파 손실
    pub total_loss: f32,
    /// 마지막 반복의 원본 재구성 PSNR
    pub psnr: f64,
    /// 지금까지의 원본 재구성 최고 PSNR
    pub best_psnr_raw: f64,
    pub psnr_averaged: f64,
    pub best_psnr: f64,
    pub best_inner_step: usize,
    pub relative_residual: Option<f32>,
    pub residual_mean: f32,
    pub residual_var: f32,
    pub skipped_updates: usize,
    pub elapsed_secs: f64,
}

/// 샘플링 결과
#[derive(Debug, Clone)]
pub struct SampleOutcome {
    /// 실행 전체의 최고 평균 재구성 ([0, 1])
    pub best_reconstruction: Tensor,
    pub best_psnr: f64,
    /// 최고 결과가 나온 확산 스텝 인덱스
    pub best_diffusion_step: usize,
    /// 그 스텝 안의 내부 반복 번호
    pub best_inner_step: usize,
    /// 마지막 스텝의 x0 추정
    pub final_estimate: Tensor,
    pub steps: Vec<StepSummary>,
}

/// 역방향 DDIM 샘플러
#[derive(Debug, Clone)]
pub struct DiffusionSampler {
    schedule: NoiseSchedule,
    plan: SamplingPlan,
    eta: f64,
    reset_tracking_per_step: bool,
}

impl DiffusionSampler {
    pub fn new(schedule: NoiseSchedule, plan: SamplingPlan, eta: f64) -> Self {
        Self {
            schedule,
            plan,
            eta,
            reset_tracking_per_step: false,
        }
    }

    pub fn with_reset_tracking_per_step(mut self, reset: bool) -> Self {
        self.reset_tracking_per_step = reset;
        self
    }

    /// 구성에서 스케줄과 계획을 만든다. 시작점이 없으면 노이즈 수준으로 계산.
    pub fn from_config(config: &DenoiseConfig) -> Result<Self> {
        let schedule = NoiseSchedule::from_config(&config.diffusion)?;
        let start = match config.diffusion.start_point {
            Some(start) => start,
            None => schedule.start_for_noise_level(config.data.noise_sigma),
        };
        let plan = SamplingPlan::new(start, config.diffusion.timesteps, &config.model.iter_number)?;
        Ok(Self::new(schedule, plan, config.diffusion.eta)
            .with_reset_tracking_per_step(config.runtime.reset_tracking_per_step))
    }

    pub fn schedule(&self) -> &NoiseSchedule {
        &self.schedule
    }

    pub fn plan(&self) -> &SamplingPlan {
        &self.plan
    }

    pub fn eta(&self) -> f64 {
        self.eta
    }

    /// x_init = sqrt(alpha(t0)) * (2y - 1)
    pub fn initial_state(&self, noisy: &Tensor) -> Result<Tensor> {
        let Some(&start) = self.plan.timesteps.first() else {
            bail!("빈 샘플링 계획");
        };
        let alpha = self.schedule.alpha(start)?;
        Ok((noisy.affine(2.0, -1.0)? * alpha.sqrt())?)
    }

    /// 전체 역방향 샘플링
    pub fn sample(
        &self,
        optimizer: &mut InnerOptimizer,
        noisy: &Tensor,
        clean: &Tensor,
        ctx: &mut RunContext,
        progress: Option<&ProgressBar>,
    ) -> Result<SampleOutcome> {
        info!(
            "[Sampler] 스텝 {} 개, 타임스텝 {:?}, eta={}, 추적 초기화: {}",
            self.plan.len(),
            self.plan.timesteps,
            self.eta,
            if self.reset_tracking_per_step { "스텝마다" } else { "실행 전체" }
        );

        let mut x = self.initial_state(noisy)?;
        let mut average = Tensor::zeros(noisy.dims(), noisy.dtype(), noisy.device())?;
        let mut best: Option<(Tensor, f64, usize, usize)> = None;
        let mut final_estimate = average.clone();
        let mut steps = Vec::with_capacity(self.plan.len());

        for (index, (&timestep, &iterations)) in self
            .plan
            .timesteps
            .iter()
            .zip(self.plan.iterations.iter())
            .enumerate()
        {
            let started = Instant::now();
            let alpha = self.schedule.alpha(timestep)?;
            if self.reset_tracking_per_step {
                optimizer.reset_tracking();
            }

            let outcome = optimizer
                .optimize(&OptimizeRequest {
                    noisy: &x,
                    reference: clean,
                    alpha,
                    iterations,
                    average: &average,
                    apply_updates: true,
                })
                .with_context(|| format!("확산 스텝 {} (t={}) 최적화 실패", index, timestep))?;

            let x0 = outcome.averaged_reconstruction.clone();
            let alpha_next = match self.plan.timesteps.get(index + 1) {
                Some(&next) => self.schedule.alpha(next)?,
                None => 1.0,
            };
            let (c1, _) = ddim_coefficients(alpha, alpha_next, self.eta);
            let noise = if c1 > 0.0 {
                Some(ctx.normal(x.dims(), 1.0)?)
            } else {
                None
            };
            x = ddim_step(&x, &x0, alpha, alpha_next, self.eta, noise.as_ref())?;

            let is_better = match &best {
                None => true,
                Some((_, psnr, _, _)) => *psnr < outcome.best_quality,
            };
            if is_better {
                best = Some((
                    outcome.best_reconstruction.clone(),
                    outcome.best_quality,
                    index,
                    outcome.best_step,
                ));
            }

            let Some(last) = outcome.last_report() else {
                bail!("확산 스텝 {} 에서 반복 기록이 없음", index);
            };
            let summary = StepSummary {
                index,
                timestep,
                alpha,
                iterations,
                kl_loss: last.losses.residual_distribution,
                total_loss: last.losses.total,
                psnr: last.psnr,
                best_psnr_raw: last.best_psnr,
                psnr_averaged: last.psnr_averaged,
                best_psnr: outcome.best_quality,
                best_inner_step: outcome.best_step,
                relative_residual: last.relative_residual,
                residual_mean: last.losses.residual_mean,
                residual_var: last.losses.residual_var,
                skipped_updates: outcome.skipped_updates,
                elapsed_secs: started.elapsed().as_secs_f64(),
            };
            info!(
                "step {:03} | t {:4} | alpha {:.5} | iters {} | kl {:.6} | total {:.6} | psnr {:.4} (max {:.4}) | psnr_av {:.4} | best {:.4} (iter {}) | mean {:.6} var {:.6} | res {} | skipped {} | {:.2}s",
                summary.index,
                summary.timestep,
                summary.alpha,
                summary.iterations,
                summary.kl_loss,
                summary.total_loss,
                summary.psnr,
                summary.best_psnr_raw,
                summary.psnr_averaged,
                summary.best_psnr,
                summary.best_inner_step,
                summary.residual_mean,
                summary.residual_var,
                format_residual(summary.relative_residual),
                summary.skipped_updates,
                summary.elapsed_secs
            );
            steps.push(summary);

            // 잘린 평균 재구성을 다음 스텝의 평균으로 이어받는다
            average = x0.clone();
            final_estimate = x0;

            if let Some(pb) = progress {
                pb.inc(1);
            }
        }

        let Some((best_reconstruction, best_psnr, best_diffusion_step, best_inner_step)) = best else {
            bail!("샘플링 스텝이 실행되지 않음");
        };

        Ok(SampleOutcome {
            best_reconstruction,
            best_psnr,
            best_diffusion_step,
            best_inner_step,
            final_estimate,
            steps,
        })
    }
}

/// DDIM 계수 (c1, c2)
///
/// `c1 = eta * sqrt((1 - a/a_next) * (1 - a_next) / (1 - a))`,
/// `c2 = sqrt(max(1 - a_next - c1², 0))`
pub fn ddim_coefficients(alpha: f64, alpha_next: f64, eta: f64) -> (f64, f64) {
    if alpha >= 1.0 {
        return (0.0, 0.0);
    }
    let c1 = eta * ((1.0 - alpha / alpha_next) * (1.0 - alpha_next) / (1.0 - alpha)).max(0.0).sqrt();
    let c2 = (1.0 - alpha_next - c1 * c1).max(0.0).sqrt();
    (c1, c2)
}

/// DDIM 한 스텝
///
/// * `x` - 현재 상태 ([-1, 1] 스케일)
/// * `x0` - [0, 1] 스케일의 추정
/// * `noise` - 표준정규 노이즈. `c1 > 0` 인데 없으면 오류
pub fn ddim_step(
    x: &Tensor,
    x0: &Tensor,
    alpha: f64,
    alpha_next: f64,
    eta: f64,
    noise: Option<&Tensor>,
) -> Result<Tensor> {
    let x0r = x0.affine(2.0, -1.0)?;
    if alpha >= 1.0 {
        return Ok((x0r * alpha_next.sqrt())?);
    }
    let et = ((x - (&x0r * alpha.sqrt())?)? / (1.0 - alpha).sqrt())?;
    let (c1, c2) = ddim_coefficients(alpha, alpha_next, eta);

    let next = ((x0r * alpha_next.sqrt())? + (et * c2)?)?;
    if c1 <= 0.0 {
        return Ok(next);
    }
    match noise {
        Some(z) => Ok((next + (z * c1)?)?),
        None => bail!("c1 = {} 이지만 노이즈가 주어지지 않음", c1),
    }
}
