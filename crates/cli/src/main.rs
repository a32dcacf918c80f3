//! `spritegen` -- pixel-art sprite generator backed by ComfyUI.
//!
//! Submits a text-to-image job, waits for it, removes the background and
//! writes trimmed, squared, nearest-neighbor resized PNGs into the working
//! directory and (optionally) the project asset tree.
//!
//! # Environment variables
//!
//! | Variable                       | Default                 | Description                    |
//! |--------------------------------|-------------------------|--------------------------------|
//! | `COMFYUI_URL`                  | `http://localhost:8188` | ComfyUI base URL               |
//! | `SPRITEGEN_OUTPUT_DIR`         | `sprite-gen/output`     | Working directory              |
//! | `SPRITEGEN_ASSETS_DIR`         | `src/assets`            | Asset tree root                |
//! | `COMFYUI_TIMEOUT_SECS`         | `180`                   | Job completion timeout         |
//! | `COMFYUI_POLL_INTERVAL_SECS`   | `2`                     | Delay between history queries  |
//! | `COMFYUI_REQUEST_TIMEOUT_SECS` | `60`                    | Per-request HTTP timeout       |
//! | `REMBG_BIN`                    | `rembg`                 | Background removal executable  |
//! | `REMBG_MODEL`                  | --                      | Optional `rembg -m` model      |
//! | `RUST_LOG`                     | `spritegen=info,...`    | Log filter                     |

mod args;

use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser;
use spritegen_comfyui::api::ComfyUIApi;
use spritegen_core::preset::GenerationPreset;
use spritegen_pipeline::generate::load_manifest;
use spritegen_pipeline::matting::{PassthroughRemover, RembgCommand, Remover};
use spritegen_pipeline::writer::AssetWriter;
use spritegen_pipeline::{GenerationOutput, PipelineConfig, SpriteGenerator};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::args::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "spritegen=info,spritegen_pipeline=info,spritegen_comfyui=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "spritegen failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = PipelineConfig::from_env().context("invalid configuration")?;
    cli.global.apply(&mut config);
    let preset = GenerationPreset::from_kind(cli.global.preset);

    tracing::info!(
        comfyui_url = %config.comfyui_url,
        preset = %cli.global.preset,
        output_dir = %config.output_dir.display(),
        assets_dir = %config.assets_dir.display(),
        timeout_secs = config.timeout_secs,
        "Starting spritegen",
    );

    let api = ComfyUIApi::with_request_timeout(&config.comfyui_url, config.request_timeout())
        .context("failed to build HTTP client")?;

    match cli.cmd {
        Command::Sprite(args) => {
            let generator = build_generator(api, &config, preset, args.no_matting, !args.no_commit);
            let output = generator
                .generate_sprite(&args.request(), args.size)
                .await
                .with_context(|| format!("sprite '{}' failed", args.name))?;
            log_output(&output);
        }
        Command::Asset(args) => {
            let generator = build_generator(api, &config, preset, args.no_matting, !args.no_copy);
            let output = generator
                .generate_asset(&args.request())
                .await
                .with_context(|| format!("asset '{}' failed", args.name))?;
            log_output(&output);
        }
        Command::Batch(args) => {
            let entries = load_manifest(&args.manifest).await?;
            // Batch mode saves raw outputs only, so no matting and no commit.
            let generator = build_generator(api, &config, preset, true, false);
            let report = generator.run_batch(&entries, args.seed, &args.negative).await;
            for (name, files) in report.into_result()? {
                tracing::info!(name = %name, files = files.len(), "Batch entry saved");
            }
        }
    }

    Ok(())
}

fn build_generator(
    api: ComfyUIApi,
    config: &PipelineConfig,
    preset: GenerationPreset,
    no_matting: bool,
    commit: bool,
) -> SpriteGenerator<Remover> {
    let remover = if no_matting {
        Remover::Passthrough(PassthroughRemover)
    } else {
        Remover::Rembg(RembgCommand::new(
            config.rembg_bin.clone(),
            config.rembg_model.clone(),
        ))
    };
    let writer = AssetWriter::new(&config.output_dir, &config.assets_dir, commit);
    SpriteGenerator::new(api, remover, writer, config.poll_config(), preset)
}

fn log_output(output: &GenerationOutput) {
    for path in &output.working_files {
        tracing::info!(path = %path.display(), "Saved");
    }
    for path in &output.committed {
        tracing::info!(path = %path.display(), "Committed");
    }
    tracing::info!(
        prompt_id = %output.prompt_id,
        working_files = output.working_files.len(),
        committed = output.committed.len(),
        "Done",
    );
}
