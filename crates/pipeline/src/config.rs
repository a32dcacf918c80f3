use std::path::PathBuf;
use std::time::Duration;

use spritegen_comfyui::poller::PollConfig;
use spritegen_core::error::CoreError;

use crate::matting::DEFAULT_REMBG_BIN;

/// Pipeline configuration loaded from environment variables.
///
/// Every field has a default suitable for running from the project root
/// against a local ComfyUI. Command-line flags override these values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// ComfyUI base URL.
    pub comfyui_url: String,
    /// Flat working directory for raw, matted and resized files.
    pub output_dir: PathBuf,
    /// Root of the project asset tree.
    pub assets_dir: PathBuf,
    /// Seconds to wait for a prompt to finish.
    pub timeout_secs: u64,
    /// Seconds between history queries.
    pub poll_interval_secs: u64,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,
    /// `rembg` executable.
    pub rembg_bin: String,
    /// Optional `rembg` model name.
    pub rembg_model: Option<String>,
}

impl PipelineConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                        | Default                 |
    /// |--------------------------------|-------------------------|
    /// | `COMFYUI_URL`                  | `http://localhost:8188` |
    /// | `SPRITEGEN_OUTPUT_DIR`         | `sprite-gen/output`     |
    /// | `SPRITEGEN_ASSETS_DIR`         | `src/assets`            |
    /// | `COMFYUI_TIMEOUT_SECS`         | `180`                   |
    /// | `COMFYUI_POLL_INTERVAL_SECS`   | `2`                     |
    /// | `COMFYUI_REQUEST_TIMEOUT_SECS` | `60`                    |
    /// | `REMBG_BIN`                    | `rembg`                 |
    /// | `REMBG_MODEL`                  | unset                   |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads variables through
    /// `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.into());
        let secs = |key: &str, default: u64| -> Result<u64, CoreError> {
            let Some(raw) = lookup(key) else {
                return Ok(default);
            };
            match raw.trim().parse::<u64>() {
                Ok(0) | Err(_) => Err(CoreError::Validation(format!(
                    "{key} must be a positive whole number of seconds, got '{raw}'"
                ))),
                Ok(value) => Ok(value),
            }
        };

        Ok(Self {
            comfyui_url: var("COMFYUI_URL", "http://localhost:8188"),
            output_dir: var("SPRITEGEN_OUTPUT_DIR", "sprite-gen/output").into(),
            assets_dir: var("SPRITEGEN_ASSETS_DIR", "src/assets").into(),
            timeout_secs: secs("COMFYUI_TIMEOUT_SECS", 180)?,
            poll_interval_secs: secs("COMFYUI_POLL_INTERVAL_SECS", 2)?,
            request_timeout_secs: secs("COMFYUI_REQUEST_TIMEOUT_SECS", 60)?,
            rembg_bin: var("REMBG_BIN", DEFAULT_REMBG_BIN),
            rembg_model: lookup("REMBG_MODEL").filter(|m| !m.trim().is_empty()),
        })
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            interval: Duration::from_secs(self.poll_interval_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
