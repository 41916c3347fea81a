// Module declarations
mod image_quality;
mod interpolate;
mod special;

// Re-export all public items from sub-modules
pub use image_quality::{calculate_psnr, mean_absolute_error};
pub use interpolate::{remap_with, sample_bilinear, Sample};
pub use special::{erf, normal_cdf, normal_pdf};

#[derive(thiserror::Error, Debug)]
pub enum UtilError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),
    #[error("A margin of {margin} pixels leaves no region to compare")]
    EmptyRegion { margin: u32 },
}
