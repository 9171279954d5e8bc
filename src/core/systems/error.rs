//! # 구성 오류 타입
//!
//! 최적화 시작 전에 검출되어야 하는 구성 오류들. 어느 필드가 잘못되었는지
//! 항상 필드 경로(`model.rank` 등)로 보고한다.

use std::path::PathBuf;
use thiserror::Error;

/// 구성 검증 / 로딩 오류
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 값이 허용 범위를 벗어남
    #[error("잘못된 구성 값 `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// 반복 스케줄 길이가 샘플링 스텝 수보다 짧음
    #[error("`model.iter_number` 스케줄 길이 {len} 가 샘플링 스텝 수 {steps} 보다 짧음")]
    ScheduleTooShort { len: usize, steps: usize },

    /// 구성 파일 읽기 실패
    #[error("구성 파일 {path:?} 읽기 실패: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON 파싱 실패 (누락된 필수 필드 포함)
    #[error("구성 파일 {path:?} 파싱 실패: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    /// 문제가 된 필드 경로
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ConfigError::InvalidField { field, .. } => Some(*field),
            ConfigError::ScheduleTooShort { .. } => Some("model.iter_number"),
            _ => None,
        }
    }
}
