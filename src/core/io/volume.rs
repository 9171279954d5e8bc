//! # 볼륨 입출력
//!
//! (H, W, D, C) 볼륨을 `ndarray::Array4<f32>` 로 JSON 에 저장/로드하고
//! candle 텐서와 변환한다.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use candle_core::{DType, Device, Tensor};
use ndarray::Array4;

use crate::core::matrix::layout::VolumeShape;

/// 텐서 → Array4 (행 우선 복사)
pub fn tensor_to_array(volume: &Tensor) -> Result<Array4<f32>> {
    let shape = VolumeShape::of(volume)?;
    let values = volume.to_dtype(DType::F32)?.flatten_all()?.to_vec1::<f32>()?;
    Ok(Array4::from_shape_vec(shape.dims(), values)?)
}

/// Array4 → 텐서
pub fn array_to_tensor(array: &Array4<f32>, device: &Device) -> Result<Tensor> {
    let (h, w, d, c) = array.dim();
    let values: Vec<f32> = array.as_standard_layout().iter().copied().collect();
    Ok(Tensor::from_vec(values, (h, w, d, c), device)?)
}

/// JSON 파일에서 볼륨 로드
pub fn load_volume(path: &Path) -> Result<Array4<f32>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("볼륨 파일 읽기 실패: {}", path.display()))?;
    let array: Array4<f32> = serde_json::from_str(&content)
        .with_context(|| format!("볼륨 JSON 파싱 실패: {}", path.display()))?;
    if array.is_empty() {
        bail!("빈 볼륨: {}", path.display());
    }
    Ok(array)
}

/// 볼륨을 JSON 파일로 저장. 상위 디렉토리는 만들어 둔다.
pub fn save_volume(path: &Path, array: &Array4<f32>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("디렉토리 생성 실패: {}", parent.display()))?;
    }
    let json_string = serde_json::to_string(array)?;
    fs::write(path, json_string).with_context(|| format!("볼륨 저장 실패: {}", path.display()))?;
    Ok(())
}

/// JSON 파일 → 텐서
pub fn load_volume_tensor(path: &Path, device: &Device) -> Result<Tensor> {
    let array = load_volume(path)?;
    array_to_tensor(&array, device)
}

/// 텐서 → JSON 파일
pub fn save_volume_tensor(path: &Path, volume: &Tensor) -> Result<()> {
    let array = tensor_to_array(volume)?;
    save_volume(path, &array)
}
