//! # 입출력
//!
//! 볼륨 JSON, 합성 팬텀, 입력 준비, 결과 저장

pub mod artifacts;
pub mod dataset;
pub mod phantom;
pub mod volume;


pub use artifacts::{write_artifacts, ArtifactPaths, RunSummary};
pub use dataset::prepare_volumes;
pub use phantom::{add_gaussian_noise, perlin_phantom};
pub use volume::{
    array_to_tensor, load_volume, load_volume_tensor, save_volume, save_volume_tensor,
    tensor_to_array,
};
