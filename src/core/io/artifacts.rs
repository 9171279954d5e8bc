//! # 결과 저장
//!
//! 최고 평균 재구성 볼륨과 실행 요약 JSON

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::info;
use serde::Serialize;

use super::volume::save_volume_tensor;
use crate::core::engine::{SampleOutcome, StepSummary};

/// `summary.json` 내용
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub logger_name: String,
    pub seed: u64,
    pub rank: usize,
    pub best_psnr: f64,
    pub best_diffusion_step: usize,
    pub best_inner_step: usize,
    pub final_psnr: Option<f64>,
    pub noisy_psnr: Option<f64>,
    pub total_seconds: f64,
    pub finished_at: DateTime<Local>,
    pub steps: Vec<StepSummary>,
}

impl RunSummary {
    pub fn from_outcome(
        logger_name: &str,
        seed: u64,
        rank: usize,
        outcome: &SampleOutcome,
        total_seconds: f64,
    ) -> Self {
        Self {
            logger_name: logger_name.to_string(),
            seed,
            rank,
            best_psnr: outcome.best_psnr,
            best_diffusion_step: outcome.best_diffusion_step,
            best_inner_step: outcome.best_inner_step,
            final_psnr: None,
            noisy_psnr: None,
            total_seconds,
            finished_at: Local::now(),
            steps: outcome.steps.clone(),
        }
    }

    pub fn with_final_psnr(mut self, psnr: f64) -> Self {
        self.final_psnr = Some(psnr);
        self
    }

    pub fn with_noisy_psnr(mut self, psnr: f64) -> Self {
        self.noisy_psnr = Some(psnr);
        self
    }
}

/// 저장된 파일 경로
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPaths {
    pub best_volume: PathBuf,
    pub summary: PathBuf,
}

impl ArtifactPaths {
    /// `<dir>/<name>_best.json`, `<dir>/summary.json`
    pub fn new(output_dir: &Path, logger_name: &str) -> Self {
        Self {
            best_volume: output_dir.join(format!("{}_best.json", logger_name)),
            summary: output_dir.join("summary.json"),
        }
    }
}

/// 최고 재구성과 요약 저장
pub fn write_artifacts(
    output_dir: &Path,
    logger_name: &str,
    outcome: &SampleOutcome,
    summary: &RunSummary,
) -> Result<ArtifactPaths> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("출력 디렉토리 생성 실패: {}", output_dir.display()))?;
    let paths = ArtifactPaths::new(output_dir, logger_name);

    save_volume_tensor(&paths.best_volume, &outcome.best_reconstruction)?;

    let json_string = serde_json::to_string_pretty(summary)?;
    fs::write(&paths.summary, json_string)
        .with_context(|| format!("요약 저장 실패: {}", paths.summary.display()))?;

    info!(
        "결과 저장 완료: {} / {}",
        paths.best_volume.display(),
        paths.summary.display()
    );
    Ok(paths)
}
