//! # 볼륨 ↔ 행렬 레이아웃
//!
//! (H, W, D, C) 볼륨을 (H·W·D, C) 행렬로 열 우선(첫 축이 가장 빠름) 평탄화한다.
//! 픽셀 인덱스 p = h + H·w + H·W·d. 저랭크 인자 곱을 볼륨으로 되돌릴 때도
//! 같은 규약을 써야 인자 분해가 구조적으로 맞는다.

use anyhow::{bail, Result};
use candle_core::Tensor;
use serde::{Deserialize, Serialize};

/// 볼륨 형태 (H, W, D, C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeShape {
    pub height: usize,
    pub width: usize,
    pub depth: usize,
    pub channels: usize,
}

impl VolumeShape {
    pub fn new(height: usize, width: usize, depth: usize, channels: usize) -> Self {
        Self {
            height,
            width,
            depth,
            channels,
        }
    }

    /// 텐서에서 형태 추출
    pub fn of(volume: &Tensor) -> Result<Self> {
        let (h, w, d, c) = volume.dims4()?;
        Ok(Self::new(h, w, d, c))
    }

    /// 공간 픽셀 수 H·W·D
    pub fn pixels(&self) -> usize {
        self.height * self.width * self.depth
    }

    pub fn elem_count(&self) -> usize {
        self.pixels() * self.channels
    }

    pub fn dims(&self) -> (usize, usize, usize, usize) {
        (self.height, self.width, self.depth, self.channels)
    }

    /// 공간 부분 (H, W, D)
    pub fn spatial(&self) -> (usize, usize, usize) {
        (self.height, self.width, self.depth)
    }
}

/// (H, W, D, C) → (H·W·D, C), 열 우선
pub fn flatten_columns(volume: &Tensor) -> Result<Tensor> {
    let shape = VolumeShape::of(volume)?;
    let matrix = volume
        .permute((3, 2, 1, 0))?
        .reshape((shape.channels, shape.pixels()))?
        .t()?;
    Ok(matrix)
}

/// (H·W·D, C) → (H, W, D, C), `flatten_columns` 의 역
pub fn unflatten_columns(matrix: &Tensor, shape: VolumeShape) -> Result<Tensor> {
    let (rows, cols) = matrix.dims2()?;
    if rows != shape.pixels() || cols != shape.channels {
        bail!(
            "행렬 형태 ({}, {}) 가 볼륨 {:?} 와 맞지 않음",
            rows,
            cols,
            shape.dims()
        );
    }
    let volume = matrix
        .t()?
        .reshape((shape.channels, shape.depth, shape.width, shape.height))?
        .permute((3, 2, 1, 0))?
        .contiguous()?;
    Ok(volume)
}

/// 공간 볼륨 (H, W, D) → 열 벡터 (H·W·D, 1), 같은 열 우선 규약
pub fn spatial_column(spatial: &Tensor) -> Result<Tensor> {
    let (h, w, d) = spatial.dims3()?;
    Ok(spatial.permute((2, 1, 0))?.reshape((h * w * d, 1))?)
}

/// (H, W, D, C) → (1, C, H, W, D), TV 계산용 배치 레이아웃
pub fn to_batched_channels_first(volume: &Tensor) -> Result<Tensor> {
    Ok(volume.permute((3, 0, 1, 2))?.unsqueeze(0)?)
}
