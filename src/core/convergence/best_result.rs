use anyhow::Result;
use candle_core::Tensor;

use crate::core::matrix::quality::psnr;

/// 한 시점의 결과: [0, 1] 로 자른 재구성, PSNR, 반복 스텝
#[derive(Debug, Clone)]
pub struct ResultSnapshot {
    pub reconstruction: Tensor,
    pub psnr: f64,
    pub step: usize,
}

/// 원본 / 평균 재구성 각각의 최고 결과 추적
///
/// 엄격히 더 높은 PSNR 일 때만 교체. `reset()` 전까지 호출 간에 유지된다.
#[derive(Debug, Clone, Default)]
pub struct BestResultTracker {
    best_raw: Option<ResultSnapshot>,
    best_averaged: Option<ResultSnapshot>,
    current_raw: Option<ResultSnapshot>,
    current_averaged: Option<ResultSnapshot>,
}

impl BestResultTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 재구성을 평가하고 기록
    pub fn record(
        &mut self,
        raw: &Tensor,
        averaged: &Tensor,
        reference: &Tensor,
        step: usize,
    ) -> Result<()> {
        let raw = raw.clamp(0f32, 1f32)?;
        let averaged = averaged.clamp(0f32, 1f32)?;
        let raw_psnr = psnr(reference, &raw)?;
        let averaged_psnr = psnr(reference, &averaged)?;
        self.offer(
            ResultSnapshot {
                reconstruction: raw,
                psnr: raw_psnr,
                step,
            },
            ResultSnapshot {
                reconstruction: averaged,
                psnr: averaged_psnr,
                step,
            },
        );
        Ok(())
    }

    /// 이미 점수가 매겨진 후보 제출
    pub fn offer(&mut self, raw: ResultSnapshot, averaged: ResultSnapshot) {
        if improves(&self.best_raw, &raw) {
            self.best_raw = Some(raw.clone());
        }
        if improves(&self.best_averaged, &averaged) {
            self.best_averaged = Some(averaged.clone());
        }
        self.current_raw = Some(raw);
        self.current_averaged = Some(averaged);
    }

    pub fn best_raw(&self) -> Option<&ResultSnapshot> {
        self.best_raw.as_ref()
    }

    pub fn best_averaged(&self) -> Option<&ResultSnapshot> {
        self.best_averaged.as_ref()
    }

    pub fn current_raw(&self) -> Option<&ResultSnapshot> {
        self.current_raw.as_ref()
    }

    pub fn current_averaged(&self) -> Option<&ResultSnapshot> {
        self.current_averaged.as_ref()
    }

    /// 모든 기록 삭제
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn improves(best: &Option<ResultSnapshot>, candidate: &ResultSnapshot) -> bool {
    match best {
        None => true,
        Some(best) => best.psnr < candidate.psnr,
    }
}
