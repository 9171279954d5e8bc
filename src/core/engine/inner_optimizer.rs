//! # 내부 최적화기
//!
//! 확산 스텝 하나에서 저랭크 모델을 관측에 맞추는 경사 하강 루프.
//! 한 번의 호출 = `iterations + 1` 번의 평가 (스텝 0 포함).
//!
//! 반복마다:
//! 1. 모든 랭크 성분 forward → 재구성 (열 우선 레이아웃)
//! 2. 이동 평균 갱신 (감쇠 0.98)
//! 3. [-1, 1] 로 스케일 후 손실 조립, 역전파
//! 4. 최고 결과 기록, 상태 로그
//! 5. Adam 업데이트 (손실/그래디언트가 유한할 때만)

use anyhow::{bail, Context, Result};
use candle_core::backprop::GradStore;
use candle_core::Tensor;
use log::{debug, info, warn};

use crate::core::convergence::{BestResultTracker, RunningAverageEstimator};
use crate::core::generator::LowRankImageModel;
use crate::core::loss::{LossAssembly, LossValues};
use crate::core::matrix::layout::{
    flatten_columns, to_batched_channels_first, unflatten_columns, VolumeShape,
};
use crate::core::optimizers::{OptimizerConfig, TensorAdam};
use crate::core::systems::{ModelParameters, RunContext};

/// `optimize` 입력
#[derive(Debug, Clone, Copy)]
pub struct OptimizeRequest<'a> {
    /// 현재 확산 상태 (H, W, D, C)
    pub noisy: &'a Tensor,
    /// 기준 볼륨 (H, W, D, C), [0, 1]. PSNR 계산에만 사용
    pub reference: &'a Tensor,
    /// 누적 알파 (0, 1]
    pub alpha: f64,
    /// 반복 횟수. 평가는 iterations + 1 번
    pub iterations: usize,
    /// 이어받은 이동 평균 (H, W, D, C)
    pub average: &'a Tensor,
    /// false 면 스텝 0 평가만 하고 파라미터를 건드리지 않음
    pub apply_updates: bool,
}

/// 반복 하나의 상태 리포트
#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    pub step: usize,
    pub losses: LossValues,
    pub psnr: f64,
    pub best_psnr: f64,
    pub psnr_averaged: f64,
    pub best_psnr_averaged: f64,
    pub relative_residual: Option<f32>,
    pub best_step: usize,
    pub update_skipped: bool,
}

/// `optimize` 결과
#[derive(Debug, Clone)]
pub struct OptimizeOutcome {
    /// 마지막 평균 재구성, [0, 1] 로 자름
    pub averaged_reconstruction: Tensor,
    /// 자르지 않은 이동 평균 상태
    pub average: Tensor,
    pub best_step: usize,
    /// 지금까지의 최고 평균 재구성
    pub best_reconstruction: Tensor,
    pub best_quality: f64,
    pub evaluations: usize,
    pub skipped_updates: usize,
    pub history: Vec<IterationReport>,
}

impl OptimizeOutcome {
    pub fn last_report(&self) -> Option<&IterationReport> {
        self.history.last()
    }
}

/// 한 반복의 중간 결과
struct StepState {
    reconstruction: Tensor,
    average: Tensor,
    relative_residual: Option<f32>,
    losses: LossValues,
    grads: GradStore,
    finite: bool,
}

/// 저랭크 딥 프라이어 내부 최적화기
pub struct InnerOptimizer {
    model: LowRankImageModel,
    adam: TensorAdam,
    optimizer_config: OptimizerConfig,
    losses: LossAssembly,
    estimator: RunningAverageEstimator,
    tracker: BestResultTracker,
    shape: VolumeShape,
}

impl InnerOptimizer {
    pub fn new(params: &ModelParameters, shape: VolumeShape, ctx: &mut RunContext) -> Result<Self> {
        let model = LowRankImageModel::new(params, shape, ctx)?;
        let optimizer_config = params.optimizer_config();
        let adam = TensorAdam::new(model.vars(), optimizer_config.clone())?;
        let losses = LossAssembly::new(params.beta)?;
        let zeros = Tensor::zeros(shape.dims(), candle_core::DType::F32, ctx.device())?;
        let estimator = RunningAverageEstimator::new(zeros, params.exp_weight)?;

        debug!(
            "[InnerOptimizer] rank={} beta={} lr={} params={} generator={:?}",
            model.rank(),
            params.beta,
            params.learning_rate,
            model.parameter_count(),
            params.generator
        );

        Ok(Self {
            model,
            adam,
            optimizer_config,
            losses,
            estimator,
            tracker: BestResultTracker::new(),
            shape,
        })
    }

    pub fn model(&self) -> &LowRankImageModel {
        &self.model
    }

    pub fn tracker(&self) -> &BestResultTracker {
        &self.tracker
    }

    pub fn estimator(&self) -> &RunningAverageEstimator {
        &self.estimator
    }

    pub fn shape(&self) -> VolumeShape {
        self.shape
    }

    /// 생성기와 Adam 상태를 새로 만든다. 잠재 입력, 이동 평균, 추적 기록은 유지.
    pub fn reinitialize(&mut self, ctx: &mut RunContext) -> Result<()> {
        self.model.rebuild_components(ctx)?;
        self.adam = TensorAdam::new(self.model.vars(), self.optimizer_config.clone())?;
        Ok(())
    }

    /// 최고 결과 추적 초기화
    pub fn reset_tracking(&mut self) {
        self.tracker.reset();
    }

    /// 파라미터 값 복사본 (비교용)
    pub fn parameter_snapshot(&self) -> Result<Vec<Vec<f32>>> {
        self.model
            .vars()
            .iter()
            .map(|var| Ok(var.as_tensor().flatten_all()?.to_vec1::<f32>()?))
            .collect()
    }

    /// 확산 스텝 하나의 최적화
    pub fn optimize(&mut self, request: &OptimizeRequest<'_>) -> Result<OptimizeOutcome> {
        let shape = VolumeShape::of(request.noisy)?;
        if shape != self.shape {
            bail!("관측 형태 {:?} 가 모델 형태 {:?} 와 다름", shape.dims(), self.shape.dims());
        }
        if request.reference.dims() != request.noisy.dims() {
            bail!(
                "기준 형태 {:?} 가 관측 형태 {:?} 와 다름",
                request.reference.dims(),
                request.noisy.dims()
            );
        }
        if !(request.alpha > 0.0 && request.alpha <= 1.0) {
            bail!("알파는 (0, 1] 범위여야 함: {}", request.alpha);
        }

        let observed = flatten_columns(request.noisy)?.contiguous()?;
        self.estimator
            .set_average(request.average)
            .context("이동 평균 주입 실패")?;

        let mut history = Vec::with_capacity(request.iterations + 1);
        let mut evaluations = 0;
        let mut skipped_updates = 0;

        for step in 0..=request.iterations {
            let state = self.closure(&observed, request.alpha)?;
            evaluations += 1;

            self.tracker
                .record(&state.reconstruction, &state.average, request.reference, step)?;
            let mut report = self.report(step, &state)?;

            if !request.apply_updates {
                log_iteration(&report);
                history.push(report);
                break;
            }

            if state.finite {
                self.adam.step(&state.grads)?;
            } else {
                warn!(
                    "[InnerOptimizer] 스텝 {} 에서 비유한 손실/그래디언트 (total={}), 업데이트 건너뜀",
                    step, state.losses.total
                );
                report.update_skipped = true;
                skipped_updates += 1;
            }
            log_iteration(&report);
            history.push(report);
        }

        let Some(current) = self.tracker.current_averaged() else {
            bail!("평가가 한 번도 수행되지 않음");
        };
        let Some(best) = self.tracker.best_averaged() else {
            bail!("최고 결과가 기록되지 않음");
        };

        Ok(OptimizeOutcome {
            averaged_reconstruction: current.reconstruction.clone(),
            average: self.estimator.average().clone(),
            best_step: best.step,
            best_reconstruction: best.reconstruction.clone(),
            best_quality: best.psnr,
            evaluations,
            skipped_updates,
            history,
        })
    }

    /// forward → 평균 갱신 → 손실 → 역전파
    fn closure(&mut self, observed: &Tensor, alpha: f64) -> Result<StepState> {
        let recon_flat = self.model.reconstruct()?;
        let recon_volume = unflatten_columns(&recon_flat, self.shape)?;

        let (average, relative_residual) = self.estimator.update(&recon_volume)?;

        // 확산 모델의 동작 범위 [-1, 1] 로
        let recon_flat_rescaled = recon_flat.affine(2.0, -1.0)?;
        let recon_batched = to_batched_channels_first(&recon_volume.affine(2.0, -1.0)?)?;

        let breakdown = self
            .losses
            .assemble(&recon_flat_rescaled, &recon_batched, observed, alpha)?;
        let grads = breakdown.total.backward()?;
        let losses = breakdown.values()?;
        let finite = losses.total.is_finite() && self.adam.gradients_finite(&grads)?;

        Ok(StepState {
            reconstruction: recon_volume.detach(),
            average,
            relative_residual,
            losses,
            grads,
            finite,
        })
    }

    fn report(&self, step: usize, state: &StepState) -> Result<IterationReport> {
        let (Some(raw), Some(best_raw)) = (self.tracker.current_raw(), self.tracker.best_raw()) else {
            bail!("원본 재구성 기록 없음");
        };
        let (Some(avg), Some(best_avg)) =
            (self.tracker.current_averaged(), self.tracker.best_averaged())
        else {
            bail!("평균 재구성 기록 없음");
        };
        Ok(IterationReport {
            step,
            losses: state.losses,
            psnr: raw.psnr,
            best_psnr: best_raw.psnr,
            psnr_averaged: avg.psnr,
            best_psnr_averaged: best_avg.psnr,
            relative_residual: state.relative_residual,
            best_step: best_avg.step,
            update_skipped: false,
        })
    }
}

/// 상대 변화량 표시용
pub fn format_residual(residual: Option<f32>) -> String {
    match residual {
        Some(res) => format!("{:.6}", res),
        None => "n/a".to_string(),
    }
}

/// 반복 상태 한 줄: 스텝, KL, 전체 손실, PSNR (원본 / 평균), 잔차 평균 / 분산, 상대 변화량, 최고 스텝
pub fn format_iteration(report: &IterationReport) -> String {
    format!(
        "iter {:05} | kl {:.6} | total {:.6} | psnr {:.4} (max {:.4}) | psnr_av {:.4} (max {:.4}) | mean {:.6} var {:.6} | res {} | best_step {}",
        report.step,
        report.losses.residual_distribution,
        report.losses.total,
        report.psnr,
        report.best_psnr,
        report.psnr_averaged,
        report.best_psnr_averaged,
        report.losses.residual_mean,
        report.losses.residual_var,
        format_residual(report.relative_residual),
        report.best_step
    )
}

fn log_iteration(report: &IterationReport) {
    info!("{}", format_iteration(report));
}
