//! # 시스템 구성 설정
//!
//! 디노이징 실행 전체의 하이퍼파라미터. JSON 파일에서 읽고,
//! 최적화 시작 전에 `validate()` 로 검증한다.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::error::ConfigError;
use crate::core::optimizers::config::{AdamConfig, OptimizerConfig};

/// 전체 실행 구성
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenoiseConfig {
    /// 저랭크 모델 / 내부 최적화 설정
    pub model: ModelParameters,
    /// 확산 스케줄 / 샘플러 설정
    #[serde(default)]
    pub diffusion: DiffusionParameters,
    /// 입력 데이터 설정
    #[serde(default)]
    pub data: DataParameters,
    /// 실행 환경 설정
    #[serde(default)]
    pub runtime: RuntimeParameters,
}

/// 저랭크 모델 파라미터
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParameters {
    /// 랭크 성분 개수 (필수)
    pub rank: usize,
    /// TV 정규화 가중치
    #[serde(default)]
    pub beta: f64,
    /// Adam 학습률
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// 확산 스텝별 내부 반복 횟수
    #[serde(default = "default_iter_number")]
    pub iter_number: IterationSchedule,
    /// 생성기 종류
    #[serde(default)]
    pub generator: GeneratorKind,
    /// 이미지 생성기 은닉 채널
    #[serde(default = "default_image_channels")]
    pub image_channels: Vec<usize>,
    /// 3D 컨볼루션 커널 크기 (홀수)
    #[serde(default = "default_kernel_size")]
    pub kernel_size: usize,
    /// 마스크 생성기 은닉 폭
    #[serde(default = "default_mask_hidden")]
    pub mask_hidden: Vec<usize>,
    /// 이동 평균 감쇠 계수
    #[serde(default = "default_exp_weight")]
    pub exp_weight: f64,
    /// Adam 모멘트 계수
    #[serde(default)]
    pub adam: AdamConfig,
}

/// 반복 스케줄: 단일 값이면 모든 스텝에 반복 적용
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IterationSchedule {
    Fixed(usize),
    PerStep(Vec<usize>),
}

/// 랭크 성분 생성기 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorKind {
    /// 3D 컨볼루션 이미지 생성기 + 완전연결 마스크 생성기
    #[default]
    DeepPrior,
    /// 자유 파라미터 인자 (기준선)
    Direct,
}

/// 확산 파라미터
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffusionParameters {
    pub beta_start: f64,
    pub beta_end: f64,
    pub num_diffusion_timesteps: usize,
    /// 명시적 누적 알파 스케줄 (있으면 선형 스케줄 대신 사용)
    pub alphas_cumprod: Option<Vec<f64>>,
    /// 샘플링 스텝 수
    pub timesteps: usize,
    /// 시작 타임스텝 (없으면 노이즈 수준에서 계산)
    pub start_point: Option<usize>,
    /// DDIM eta
    pub eta: f64,
}

/// 입력 데이터 파라미터
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataParameters {
    /// 기준(깨끗한) 볼륨 JSON 경로. 없으면 합성 팬텀 사용
    pub clean_path: Option<PathBuf>,
    /// 관측(노이즈) 볼륨 JSON 경로. 없으면 clean 에 가우시안 노이즈 추가
    pub noisy_path: Option<PathBuf>,
    pub synthetic_size: usize,
    pub synthetic_channels: usize,
    /// 관측 노이즈 표준편차 ([0,1] 스케일)
    pub noise_sigma: f64,
}

/// 디바이스 선택
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    #[default]
    Cpu,
    Cuda { ordinal: usize },
}

/// 실행 환경 파라미터
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeParameters {
    pub seed: u64,
    pub device: DeviceKind,
    pub output_dir: PathBuf,
    pub logger_name: String,
    /// true 면 확산 스텝마다 최고 결과 추적을 초기화
    pub reset_tracking_per_step: bool,
}

fn default_learning_rate() -> f64 {
    0.001
}

fn default_iter_number() -> IterationSchedule {
    IterationSchedule::Fixed(100)
}

fn default_image_channels() -> Vec<usize> {
    vec![8, 16, 8]
}

fn default_kernel_size() -> usize {
    3
}

fn default_mask_hidden() -> Vec<usize> {
    vec![128, 256, 256, 128]
}

fn default_exp_weight() -> f64 {
    0.98
}

impl Default for DiffusionParameters {
    fn default() -> Self {
        Self {
            beta_start: 0.0001,
            beta_end: 0.02,
            num_diffusion_timesteps: 1000,
            alphas_cumprod: None,
            timesteps: 20,
            start_point: None,
            eta: 1.0,
        }
    }
}

impl Default for DataParameters {
    fn default() -> Self {
        Self {
            clean_path: None,
            noisy_path: None,
            synthetic_size: 16,
            synthetic_channels: 1,
            noise_sigma: 0.1,
        }
    }
}

impl Default for RuntimeParameters {
    fn default() -> Self {
        Self {
            seed: 1234,
            device: DeviceKind::Cpu,
            output_dir: PathBuf::from("./results"),
            logger_name: "test".to_string(),
            reset_tracking_per_step: false,
        }
    }
}

impl ModelParameters {
    pub fn new(rank: usize) -> Self {
        Self {
            rank,
            beta: 0.0,
            learning_rate: default_learning_rate(),
            iter_number: default_iter_number(),
            generator: GeneratorKind::default(),
            image_channels: default_image_channels(),
            kernel_size: default_kernel_size(),
            mask_hidden: default_mask_hidden(),
            exp_weight: default_exp_weight(),
            adam: AdamConfig::default(),
        }
    }

    /// 옵티마이저 구성으로 변환
    pub fn optimizer_config(&self) -> OptimizerConfig {
        OptimizerConfig::new()
            .with_adam_config(self.adam)
            .with_learning_rate(self.learning_rate)
    }
}

impl IterationSchedule {
    /// 스텝별 반복 횟수 목록으로 펼침
    pub fn expand(&self, steps: usize) -> Result<Vec<usize>, ConfigError> {
        match self {
            IterationSchedule::Fixed(n) => Ok(vec![*n; steps]),
            IterationSchedule::PerStep(list) => {
                if list.len() < steps {
                    return Err(ConfigError::ScheduleTooShort {
                        len: list.len(),
                        steps,
                    });
                }
                Ok(list[..steps].to_vec())
            }
        }
    }
}

impl DenoiseConfig {
    pub fn new(model: ModelParameters) -> Self {
        Self {
            model,
            diffusion: DiffusionParameters::default(),
            data: DataParameters::default(),
            runtime: RuntimeParameters::default(),
        }
    }

    /// JSON 파일에서 읽고 검증
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: DenoiseConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// JSON 문자열에서 읽고 검증
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: DenoiseConfig =
            serde_json::from_str(content).map_err(|source| ConfigError::Parse {
                path: PathBuf::from("<inline>"),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// 스케줄 길이 (누적 알파 개수)
    pub fn schedule_len(&self) -> usize {
        match &self.diffusion.alphas_cumprod {
            Some(alphas) => alphas.len(),
            None => self.diffusion.num_diffusion_timesteps,
        }
    }

    /// 모든 필드 검증. 첫 번째 문제 필드를 보고한다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.model;
        if m.rank < 1 {
            return Err(ConfigError::invalid("model.rank", "1 이상이어야 함"));
        }
        if !m.beta.is_finite() || m.beta < 0.0 {
            return Err(ConfigError::invalid("model.beta", format!("음수가 아닌 유한값이어야 함 ({})", m.beta)));
        }
        if !m.learning_rate.is_finite() || m.learning_rate <= 0.0 {
            return Err(ConfigError::invalid("model.learning_rate", format!("양수여야 함 ({})", m.learning_rate)));
        }
        if !(0.0..1.0).contains(&m.exp_weight) {
            return Err(ConfigError::invalid("model.exp_weight", format!("[0, 1) 범위여야 함 ({})", m.exp_weight)));
        }
        if m.kernel_size == 0 || m.kernel_size % 2 == 0 {
            return Err(ConfigError::invalid("model.kernel_size", "홀수 양의 정수여야 함"));
        }
        if m.image_channels.is_empty() || m.image_channels.contains(&0) {
            return Err(ConfigError::invalid("model.image_channels", "비어 있지 않은 양수 목록이어야 함"));
        }
        if m.mask_hidden.contains(&0) {
            return Err(ConfigError::invalid("model.mask_hidden", "0 폭 레이어는 허용되지 않음"));
        }
        let adam = &m.adam;
        if !(0.0..1.0).contains(&adam.beta1) || !(0.0..1.0).contains(&adam.beta2) {
            return Err(ConfigError::invalid("model.adam", "beta1/beta2 는 [0, 1) 범위여야 함"));
        }
        if adam.epsilon <= 0.0 {
            return Err(ConfigError::invalid("model.adam.epsilon", "양수여야 함"));
        }

        let d = &self.diffusion;
        match &d.alphas_cumprod {
            Some(alphas) => {
                if alphas.is_empty() {
                    return Err(ConfigError::invalid("diffusion.alphas_cumprod", "비어 있음"));
                }
                if let Some(bad) = alphas.iter().find(|a| !(**a > 0.0 && **a <= 1.0)) {
                    return Err(ConfigError::invalid(
                        "diffusion.alphas_cumprod",
                        format!("모든 값은 (0, 1] 범위여야 함 ({})", bad),
                    ));
                }
            }
            None => {
                if d.num_diffusion_timesteps == 0 {
                    return Err(ConfigError::invalid("diffusion.num_diffusion_timesteps", "1 이상이어야 함"));
                }
                if !(d.beta_start > 0.0 && d.beta_start <= d.beta_end && d.beta_end < 1.0) {
                    return Err(ConfigError::invalid(
                        "diffusion.beta_start",
                        format!("0 < beta_start <= beta_end < 1 이어야 함 ({}, {})", d.beta_start, d.beta_end),
                    ));
                }
            }
        }
        if d.timesteps == 0 {
            return Err(ConfigError::invalid("diffusion.timesteps", "1 이상이어야 함"));
        }
        if let Some(start) = d.start_point {
            if start >= self.schedule_len() {
                return Err(ConfigError::invalid(
                    "diffusion.start_point",
                    format!("스케줄 길이 {} 미만이어야 함 ({})", self.schedule_len(), start),
                ));
            }
        }
        if !d.eta.is_finite() || d.eta < 0.0 {
            return Err(ConfigError::invalid("diffusion.eta", "음수가 아닌 유한값이어야 함"));
        }

        let data = &self.data;
        if !data.noise_sigma.is_finite() || data.noise_sigma < 0.0 {
            return Err(ConfigError::invalid("data.noise_sigma", "음수가 아닌 유한값이어야 함"));
        }
        if data.noisy_path.is_some() && data.clean_path.is_none() {
            return Err(ConfigError::invalid("data.clean_path", "noisy_path 를 쓰려면 기준 볼륨이 필요함"));
        }
        if data.clean_path.is_none() && (data.synthetic_size < 2 || data.synthetic_channels < 1) {
            return Err(ConfigError::invalid("data.synthetic_size", "합성 볼륨은 2 이상, 채널은 1 이상"));
        }

        // 반복 스케줄은 샘플링 스텝 수만큼 있어야 함
        m.iter_number.expand(d.timesteps)?;
        Ok(())
    }
}
