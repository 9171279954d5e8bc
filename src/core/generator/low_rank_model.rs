//! # 저랭크 이미지 모델
//!
//! 랭크 성분 `rank` 개 (이미지 생성기, 마스크 생성기) 쌍의 고정 크기 묶음.
//! 재구성 = (픽셀 × 랭크) 이미지 인자 · (랭크 × 채널) 마스크 인자.

use anyhow::{bail, Result};
use candle_core::{Tensor, Var};

use super::{DeepPriorVolumeNet, DirectFactor, FactorGenerator, MaskNet};
use crate::core::matrix::layout::{spatial_column, VolumeShape};
use crate::core::systems::{GeneratorKind, ModelParameters, RunContext};

/// 한 랭크 성분: 이미지 가지 + 마스크 가지
pub struct RankComponent {
    pub image: Box<dyn FactorGenerator>,
    pub mask: Box<dyn FactorGenerator>,
}

/// 생성기 재구성에 필요한 설계값
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorBlueprint {
    pub kind: GeneratorKind,
    pub rank: usize,
    pub image_channels: Vec<usize>,
    pub kernel_size: usize,
    pub mask_hidden: Vec<usize>,
}

impl GeneratorBlueprint {
    pub fn from_params(params: &ModelParameters) -> Self {
        Self {
            kind: params.generator,
            rank: params.rank,
            image_channels: params.image_channels.clone(),
            kernel_size: params.kernel_size,
            mask_hidden: params.mask_hidden.clone(),
        }
    }

    fn build_component(&self, shape: VolumeShape, ctx: &mut RunContext) -> Result<RankComponent> {
        let component = match self.kind {
            GeneratorKind::DeepPrior => RankComponent {
                image: Box::new(DeepPriorVolumeNet::new(&self.image_channels, self.kernel_size, ctx)?),
                mask: Box::new(MaskNet::new(shape.channels, &self.mask_hidden, ctx)?),
            },
            GeneratorKind::Direct => {
                let (h, w, d) = shape.spatial();
                RankComponent {
                    image: Box::new(DirectFactor::new((1, h, w, d), 1.0, ctx)?),
                    mask: Box::new(DirectFactor::new((1, shape.channels), 1.0 / self.rank as f32, ctx)?),
                }
            }
        };
        Ok(component)
    }
}

/// 저랭크 이미지 모델
pub struct LowRankImageModel {
    components: Vec<RankComponent>,
    /// 이미지 가지 잠재 입력 (1, H, W, D), 생성 후 불변
    image_latent: Tensor,
    /// 마스크 가지 잠재 입력 (1, C), 생성 후 불변
    mask_latent: Tensor,
    shape: VolumeShape,
    blueprint: GeneratorBlueprint,
}

impl LowRankImageModel {
    pub fn new(params: &ModelParameters, shape: VolumeShape, ctx: &mut RunContext) -> Result<Self> {
        if params.rank == 0 {
            bail!("랭크는 1 이상이어야 함");
        }
        let blueprint = GeneratorBlueprint::from_params(params);
        let (h, w, d) = shape.spatial();
        let image_latent = ctx.uniform((1, h, w, d), 0.0, 1.0)?;
        let mask_latent = ctx.uniform((1, shape.channels), 0.0, 1.0)?;

        let components = (0..blueprint.rank)
            .map(|_| blueprint.build_component(shape, ctx))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            components,
            image_latent,
            mask_latent,
            shape,
            blueprint,
        })
    }

    /// 생성기만 새로 만든다. 잠재 입력은 유지.
    pub fn rebuild_components(&mut self, ctx: &mut RunContext) -> Result<()> {
        self.components = (0..self.blueprint.rank)
            .map(|_| self.blueprint.build_component(self.shape, ctx))
            .collect::<Result<Vec<_>>>()?;
        Ok(())
    }

    pub fn rank(&self) -> usize {
        self.components.len()
    }

    pub fn shape(&self) -> VolumeShape {
        self.shape
    }

    pub fn blueprint(&self) -> &GeneratorBlueprint {
        &self.blueprint
    }

    /// 이미지 가지 출력 쌓기 → (픽셀, 랭크)
    pub fn image_factors(&self) -> Result<Tensor> {
        let (h, w, d) = self.shape.spatial();
        let columns = self
            .components
            .iter()
            .map(|component| -> Result<Tensor> {
                let out = component.image.forward(&self.image_latent)?;
                let (_, oh, ow, od) = out.dims4()?;
                if oh < h || ow < w || od < d {
                    bail!(
                        "이미지 생성기 출력 {:?} 이 볼륨 {:?} 보다 작음",
                        out.dims(),
                        self.shape.spatial()
                    );
                }
                // 생성기가 더 크게 출력하면 앞쪽을 잘라 사용
                let cropped = out.narrow(1, 0, h)?.narrow(2, 0, w)?.narrow(3, 0, d)?;
                spatial_column(&cropped.squeeze(0)?)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Tensor::cat(&columns, 1)?)
    }

    /// 마스크 가지 출력 쌓기 → (랭크, 채널)
    pub fn mask_factors(&self) -> Result<Tensor> {
        let rows = self
            .components
            .iter()
            .map(|component| -> Result<Tensor> {
                let out = component.mask.forward(&self.mask_latent)?;
                Ok(out.reshape((1, self.shape.channels))?)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Tensor::cat(&rows, 0)?)
    }

    /// 재구성 행렬 (픽셀, 채널)
    pub fn reconstruct(&self) -> Result<Tensor> {
        let image = self.image_factors()?;
        let mask = self.mask_factors()?;
        Ok(image.matmul(&mask)?)
    }

    /// 모든 학습 파라미터 (이미지 가지 먼저, 그 다음 마스크 가지)
    pub fn vars(&self) -> Vec<Var> {
        let mut vars: Vec<Var> = self.components.iter().flat_map(|c| c.image.vars()).collect();
        vars.extend(self.components.iter().flat_map(|c| c.mask.vars()));
        vars
    }

    pub fn parameter_count(&self) -> usize {
        self.vars().iter().map(|v| v.as_tensor().elem_count()).sum()
    }
}
