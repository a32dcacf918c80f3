//! Sprite generation pipeline: ComfyUI job, background removal,
//! post-processing and asset-tree writes.

pub mod config;
pub mod error;
pub mod generate;
pub mod matting;
pub mod writer;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use generate::{AssetRequest, BatchEntry, BatchReport, GenerationOutput, SpriteGenerator, SpriteRequest};
