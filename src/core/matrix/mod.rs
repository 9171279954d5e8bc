pub mod layout;
pub mod quality;

// 재수출
pub use layout::{flatten_columns, unflatten_columns, VolumeShape};
pub use quality::{clipped_psnr, psnr, QualityLevel};
