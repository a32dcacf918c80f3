//! End-to-end sprite generation.
//!
//! One run is strictly sequential: submit the job graph, poll until it
//! finishes, download the image, remove the background, trim and square it,
//! then render and write every requested size. Working files written before
//! a failure are left in place.

use std::path::{Path, PathBuf};

use image::RgbaImage;
use serde::Deserialize;
use spritegen_comfyui::api::{ComfyUIApi, ComfyUIApiError};
use spritegen_comfyui::poller::{await_completion, PollConfig};
use spritegen_core::category::Category;
use spritegen_core::error::CoreError;
use spritegen_core::imaging::{prepare_sprite, resize_nearest};
use spritegen_core::naming::{
    batch_filename, nobg_filename, raw_filename, sized_filename, validate_name,
};
use spritegen_core::preset::{build_workflow, GenerationPreset, GenerationRequest};
use spritegen_core::prompt::{sprite_prompt, NegativePrompt};

use crate::error::PipelineError;
use crate::matting::BackgroundRemover;
use crate::writer::AssetWriter;

/// Default rendered edge length.
pub const DEFAULT_SIZE: u32 = 64;

/// Default high-resolution edge length for categorized assets.
pub const DEFAULT_HIRES_SIZE: u32 = 512;

pub const DEFAULT_SEED: u64 = 42;

/// Trim padding for flat sprites.
pub const SPRITE_PADDING: u32 = 2;

/// Trim padding for categorized assets.
pub const ASSET_PADDING: u32 = 4;

/// Parameters shared by both sprite modes.
#[derive(Debug, Clone)]
pub struct SpriteRequest {
    pub prompt: String,
    pub name: String,
    pub seed: u64,
    pub padding: u32,
    pub negative: NegativePrompt,
}

/// A categorized asset: a game-size render plus a high-resolution master.
#[derive(Debug, Clone)]
pub struct AssetRequest {
    pub sprite: SpriteRequest,
    pub category: Category,
    pub size: u32,
    pub hires_size: u32,
}

/// Files produced by one run.
#[derive(Debug, Clone, Default)]
pub struct GenerationOutput {
    pub prompt_id: String,
    /// Everything written to the working directory, in write order.
    pub working_files: Vec<PathBuf>,
    /// Everything written to the asset tree. Empty when commits are off.
    pub committed: Vec<PathBuf>,
}

/// One entry of a batch manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BatchEntry {
    pub prompt: String,
    pub name: String,
}

/// Read a JSON array of `{"prompt": .., "name": ..}` objects.
pub async fn load_manifest(path: &Path) -> Result<Vec<BatchEntry>, PipelineError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(PipelineError::io(path))?;
    let entries: Vec<BatchEntry> = serde_json::from_str(&text).map_err(|e| {
        CoreError::Validation(format!("Invalid manifest {}: {e}", path.display()))
    })?;
    if entries.is_empty() {
        return Err(CoreError::Validation(format!("Manifest {} has no entries", path.display())).into());
    }
    for entry in &entries {
        validate_name(&entry.name)?;
    }
    Ok(entries)
}

/// Outcome of [`SpriteGenerator::run_batch`].
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Entry name and the files downloaded for it.
    pub succeeded: Vec<(String, Vec<PathBuf>)>,
    /// Entry name and the error that stopped it.
    pub failed: Vec<(String, PipelineError)>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// `Err(BatchFailed)` if any entry failed.
    pub fn into_result(self) -> Result<Vec<(String, Vec<PathBuf>)>, PipelineError> {
        if self.failed.is_empty() {
            Ok(self.succeeded)
        } else {
            Err(PipelineError::BatchFailed {
                failed: self.failed.len(),
                total: self.total(),
            })
        }
    }
}

/// Drives ComfyUI and the post-processing chain for one preset.
pub struct SpriteGenerator<R> {
    api: ComfyUIApi,
    remover: R,
    writer: AssetWriter,
    poll: PollConfig,
    preset: GenerationPreset,
}

impl<R: BackgroundRemover> SpriteGenerator<R> {
    pub fn new(
        api: ComfyUIApi,
        remover: R,
        writer: AssetWriter,
        poll: PollConfig,
        preset: GenerationPreset,
    ) -> Self {
        Self {
            api,
            remover,
            writer,
            poll,
            preset,
        }
    }

    /// Flat sprite: renders `size` and `2 * size`, commits `size` to
    /// `sprites/{name}.png`.
    pub async fn generate_sprite(
        &self,
        request: &SpriteRequest,
        size: u32,
    ) -> Result<GenerationOutput, PipelineError> {
        let double = size
            .checked_mul(2)
            .ok_or_else(|| CoreError::Validation(format!("Sprite size {size} is too large")))?;
        let (mut output, prepared) = self.prepare(request).await?;
        let game = self.render(&prepared, &request.name, size, &mut output).await?;
        self.render(&prepared, &request.name, double, &mut output).await?;

        if let Some(path) = self.writer.commit_sprite(&request.name, &game).await? {
            output.committed.push(path);
        }
        Ok(output)
    }

    /// Categorized asset: renders `size` and `hires_size`, commits both into
    /// the categorized trees.
    pub async fn generate_asset(
        &self,
        request: &AssetRequest,
    ) -> Result<GenerationOutput, PipelineError> {
        let name = &request.sprite.name;
        let (mut output, prepared) = self.prepare(&request.sprite).await?;
        let game = self.render(&prepared, name, request.size, &mut output).await?;
        let hires = self.render(&prepared, name, request.hires_size, &mut output).await?;

        if let Some(paths) = self
            .writer
            .commit_categorized(request.category, name, &hires, &game)
            .await?
        {
            output.committed.push(paths.hires);
            output.committed.push(paths.game);
        }
        Ok(output)
    }

    /// Run every manifest entry in order, saving raw outputs only.
    ///
    /// Prompts are sent verbatim. A failing entry is logged and skipped.
    pub async fn run_batch(
        &self,
        entries: &[BatchEntry],
        seed: u64,
        negative: &NegativePrompt,
    ) -> BatchReport {
        let mut report = BatchReport::default();

        for (index, entry) in entries.iter().enumerate() {
            tracing::info!(
                name = %entry.name,
                entry = index + 1,
                total = entries.len(),
                "Generating batch entry",
            );
            match self.batch_entry(entry, seed, negative).await {
                Ok(files) => report.succeeded.push((entry.name.clone(), files)),
                Err(e) => {
                    tracing::error!(name = %entry.name, error = %e, "Batch entry failed");
                    report.failed.push((entry.name.clone(), e));
                }
            }
        }

        tracing::info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Batch finished",
        );
        report
    }

    // ---- private helpers ----

    /// Submit, wait, download, matte and square. Returns the prepared
    /// square bitmap.
    async fn prepare(
        &self,
        request: &SpriteRequest,
    ) -> Result<(GenerationOutput, RgbaImage), PipelineError> {
        validate_name(&request.name)?;
        let positive = sprite_prompt(&request.prompt);
        let (prompt_id, raw) = self
            .fetch_first_image(&positive, &request.name, request.seed, &request.negative)
            .await?;

        let mut output = GenerationOutput {
            prompt_id,
            ..Default::default()
        };
        output.working_files.push(
            self.writer
                .write_working_bytes(&raw_filename(&request.name), &raw)
                .await?,
        );

        let matted = self.remover.remove_background(&raw).await?;
        output.working_files.push(
            self.writer
                .write_working_bitmap(&nobg_filename(&request.name), &matted)
                .await?,
        );

        let (width, height) = matted.dimensions();
        let prepared = prepare_sprite(matted, request.padding);
        tracing::info!(
            name = %request.name,
            source_width = width,
            source_height = height,
            square = prepared.width(),
            padding = request.padding,
            "Sprite trimmed and squared",
        );
        Ok((output, prepared))
    }

    async fn render(
        &self,
        prepared: &RgbaImage,
        name: &str,
        size: u32,
        output: &mut GenerationOutput,
    ) -> Result<RgbaImage, PipelineError> {
        let sized = resize_nearest(prepared, size)?;
        output.working_files.push(
            self.writer
                .write_working_bitmap(&sized_filename(name, size), &sized)
                .await?,
        );
        Ok(sized)
    }

    async fn fetch_first_image(
        &self,
        positive: &str,
        name: &str,
        seed: u64,
        negative: &NegativePrompt,
    ) -> Result<(String, Vec<u8>), PipelineError> {
        let built = build_workflow(
            &self.preset,
            &GenerationRequest {
                positive,
                negative: negative.text(),
                seed,
                filename_prefix: name,
            },
        );
        let prompt_id = self.api.submit_workflow(&built.workflow).await?;
        let result = await_completion(&self.api, &prompt_id, &self.poll).await?;
        if result.is_error() {
            tracing::warn!(%prompt_id, "ComfyUI reported an execution error");
        }

        let image = result
            .first_image(Some(&built.output_node))
            .ok_or_else(|| PipelineError::NoImageProduced {
                prompt_id: prompt_id.clone(),
            })?;
        let raw = self.api.fetch_image(image).await?;
        Ok((prompt_id, raw))
    }

    async fn batch_entry(
        &self,
        entry: &BatchEntry,
        seed: u64,
        negative: &NegativePrompt,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        validate_name(&entry.name)?;
        let built = build_workflow(
            &self.preset,
            &GenerationRequest {
                positive: &entry.prompt,
                negative: negative.text(),
                seed,
                filename_prefix: &entry.name,
            },
        );
        let prompt_id = self.api.submit_workflow(&built.workflow).await?;
        let result = await_completion(&self.api, &prompt_id, &self.poll).await?;

        let mut files = Vec::new();
        for (_, image) in result.output_images() {
            let filename = batch_filename(&entry.name, &image.filename).map_err(|e| {
                ComfyUIApiError::Protocol(format!(
                    "Unusable output filename '{}' for prompt {prompt_id}: {e}",
                    image.filename
                ))
            })?;
            let bytes = self.api.fetch_image(image).await?;
            files.push(self.writer.write_working_bytes(&filename, &bytes).await?);
        }
        if files.is_empty() {
            return Err(PipelineError::NoImageProduced { prompt_id });
        }
        Ok(files)
    }
}
