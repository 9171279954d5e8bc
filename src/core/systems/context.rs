//! # 실행 컨텍스트
//!
//! 디바이스 핸들과 시드가 고정된 난수 생성기를 한 곳에 묶는다.
//! 전역 시드/전역 디바이스 대신 생성 시점에 명시적으로 전달된다.

use anyhow::Result;
use candle_core::{Device, Shape, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use super::config::DeviceKind;

/// 디바이스 + 시드 RNG
pub struct RunContext {
    device: Device,
    rng: StdRng,
    seed: u64,
}

impl RunContext {
    pub fn new(device: Device, seed: u64) -> Self {
        Self {
            device,
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    /// CPU 컨텍스트 (테스트 및 기본 실행용)
    pub fn cpu(seed: u64) -> Self {
        Self::new(Device::Cpu, seed)
    }

    /// 구성에 따라 디바이스 선택. CUDA 가 없으면 CPU 로 대체된다.
    pub fn from_kind(kind: DeviceKind, seed: u64) -> Result<Self> {
        let device = match kind {
            DeviceKind::Cpu => Device::Cpu,
            DeviceKind::Cuda { ordinal } => Device::cuda_if_available(ordinal)?,
        };
        Ok(Self::new(device, seed))
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// 균등분포 [low, high) 텐서
    pub fn uniform<S: Into<Shape>>(&mut self, shape: S, low: f32, high: f32) -> Result<Tensor> {
        let shape = shape.into();
        let values: Vec<f32> = (0..shape.elem_count())
            .map(|_| self.rng.gen_range(low..high))
            .collect();
        Ok(Tensor::from_vec(values, shape, &self.device)?)
    }

    /// 표준정규분포 텐서에 std 를 곱한 값
    pub fn normal<S: Into<Shape>>(&mut self, shape: S, std: f32) -> Result<Tensor> {
        let shape = shape.into();
        let values: Vec<f32> = (0..shape.elem_count())
            .map(|_| {
                let z: f32 = self.rng.sample(StandardNormal);
                z * std
            })
            .collect();
        Ok(Tensor::from_vec(values, shape, &self.device)?)
    }
}
