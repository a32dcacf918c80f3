use std::path::PathBuf;

use spritegen_comfyui::api::ComfyUIApiError;
use spritegen_core::error::CoreError;

use crate::matting::MattingError;

/// Errors from a sprite generation run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Comfy(#[from] ComfyUIApiError),

    #[error("Background removal failed: {0}")]
    BackgroundRemoval(#[from] MattingError),

    #[error("Prompt {prompt_id} finished without producing an image")]
    NoImageProduced { prompt_id: String },

    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("{failed} of {total} batch entries failed")]
    BatchFailed { failed: usize, total: usize },
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
