//! Background removal.
//!
//! The default remover shells out to the `rembg` CLI
//! (`rembg i [-m <model>] <input> <output>`) on scratch files in a private
//! temporary directory. [`PassthroughRemover`] skips matting for images that
//! already carry transparency.

use image::RgbaImage;
use spritegen_core::imaging::decode_rgba;

/// Executable name used when none is configured.
pub const DEFAULT_REMBG_BIN: &str = "rembg";

/// Error type for background removal.
#[derive(Debug, thiserror::Error)]
pub enum MattingError {
    #[error("background removal binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("background removal failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("background removal produced an unreadable image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns a downloaded image into an RGBA bitmap whose background is
/// transparent.
pub trait BackgroundRemover: Send + Sync {
    fn remove_background(
        &self,
        raw: &[u8],
    ) -> impl std::future::Future<Output = Result<RgbaImage, MattingError>> + Send;
}

/// Runs the external `rembg` command.
#[derive(Debug, Clone)]
pub struct RembgCommand {
    binary: String,
    model: Option<String>,
}

impl Default for RembgCommand {
    fn default() -> Self {
        Self::new(DEFAULT_REMBG_BIN, None)
    }
}

impl RembgCommand {
    /// * `binary` - Executable name or path.
    /// * `model` - Passed as `-m <model>` when set.
    pub fn new(binary: impl Into<String>, model: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            model,
        }
    }
}

impl BackgroundRemover for RembgCommand {
    async fn remove_background(&self, raw: &[u8]) -> Result<RgbaImage, MattingError> {
        let scratch = tempfile::tempdir()?;
        let input = scratch.path().join("input.png");
        let output = scratch.path().join("output.png");
        tokio::fs::write(&input, raw).await?;

        let mut command = tokio::process::Command::new(&self.binary);
        command.arg("i");
        if let Some(model) = &self.model {
            command.args(["-m", model]);
        }
        let result = command
            .arg(&input)
            .arg(&output)
            .output()
            .await
            .map_err(MattingError::NotFound)?;

        if !result.status.success() {
            return Err(MattingError::ExecutionFailed {
                exit_code: result.status.code(),
                stderr: String::from_utf8_lossy(&result.stderr).to_string(),
            });
        }

        let matted = tokio::fs::read(&output).await?;
        tracing::debug!(
            binary = %self.binary,
            model = ?self.model,
            input_bytes = raw.len(),
            output_bytes = matted.len(),
            "Background removed",
        );
        Ok(decode_rgba(&matted)?)
    }
}

/// Decodes the image and converts it to RGBA without touching any pixels.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughRemover;

impl BackgroundRemover for PassthroughRemover {
    async fn remove_background(&self, raw: &[u8]) -> Result<RgbaImage, MattingError> {
        Ok(decode_rgba(raw)?)
    }
}

/// Remover picked at runtime from the command line.
#[derive(Debug, Clone)]
pub enum Remover {
    Rembg(RembgCommand),
    Passthrough(PassthroughRemover),
}

impl BackgroundRemover for Remover {
    async fn remove_background(&self, raw: &[u8]) -> Result<RgbaImage, MattingError> {
        match self {
            Self::Rembg(cmd) => cmd.remove_background(raw).await,
            Self::Passthrough(p) => p.remove_background(raw).await,
        }
    }
}
