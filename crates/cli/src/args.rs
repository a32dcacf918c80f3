use std::path::PathBuf;

use clap::{value_parser, Args, Parser, Subcommand};
use spritegen_core::category::Category;
use spritegen_core::preset::PresetKind;
use spritegen_core::prompt::NegativePrompt;
use spritegen_pipeline::generate::{
    ASSET_PADDING, DEFAULT_HIRES_SIZE, DEFAULT_SEED, DEFAULT_SIZE, SPRITE_PADDING,
};
use spritegen_pipeline::{AssetRequest, PipelineConfig, SpriteRequest};

#[derive(Parser, Debug)]
#[command(name = "spritegen", version, about = "Generate pixel-art sprites with ComfyUI")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub cmd: Command,
}

/// Overrides for the environment configuration.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// ComfyUI base URL (overrides COMFYUI_URL).
    #[arg(long, global = true)]
    pub comfyui_url: Option<String>,

    /// Working directory for intermediate files (overrides SPRITEGEN_OUTPUT_DIR).
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Project asset tree root (overrides SPRITEGEN_ASSETS_DIR).
    #[arg(long, global = true)]
    pub assets_dir: Option<PathBuf>,

    /// Seconds to wait for a job to finish (overrides COMFYUI_TIMEOUT_SECS).
    #[arg(long, global = true, value_parser = value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Model preset: sdxl-pixel-art or sd15.
    #[arg(long, global = true, default_value_t = PresetKind::default())]
    pub preset: PresetKind,
}

impl GlobalArgs {
    pub fn apply(&self, config: &mut PipelineConfig) {
        if let Some(url) = &self.comfyui_url {
            config.comfyui_url = url.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(dir) = &self.assets_dir {
            config.assets_dir = dir.clone();
        }
        if let Some(secs) = self.timeout {
            config.timeout_secs = secs;
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a flat sprite and copy it to sprites/<name>.png.
    Sprite(SpriteArgs),
    /// Generate a categorized asset with a high-resolution master.
    Asset(AssetArgs),
    /// Run a JSON manifest of prompts, saving raw outputs only.
    Batch(BatchArgs),
}

#[derive(Args, Debug)]
pub struct SpriteArgs {
    /// Text prompt describing the sprite.
    #[arg(long)]
    pub prompt: String,

    /// Output file stem.
    #[arg(long)]
    pub name: String,

    /// Edge length of the committed sprite. A 2x render is also written.
    #[arg(long, default_value_t = DEFAULT_SIZE, value_parser = value_parser!(u32).range(1..))]
    pub size: u32,

    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Transparent margin kept around the trimmed content.
    #[arg(long, default_value_t = SPRITE_PADDING)]
    pub padding: u32,

    /// Negative prompt: "full", "basic", or custom text.
    #[arg(long, default_value = "full")]
    pub negative: NegativePrompt,

    /// Only write working files; leave the asset tree alone.
    #[arg(long)]
    pub no_commit: bool,

    /// Skip background removal (output already transparent).
    #[arg(long)]
    pub no_matting: bool,
}

impl SpriteArgs {
    pub fn request(&self) -> SpriteRequest {
        SpriteRequest {
            prompt: self.prompt.clone(),
            name: self.name.clone(),
            seed: self.seed,
            padding: self.padding,
            negative: self.negative.clone(),
        }
    }
}

#[derive(Args, Debug)]
pub struct AssetArgs {
    /// Text prompt describing the asset.
    #[arg(long)]
    pub prompt: String,

    /// Output file stem.
    #[arg(long)]
    pub name: String,

    /// Asset category: characters, items, tiles or ui.
    #[arg(long)]
    pub category: Category,

    /// Game-resolution edge length.
    #[arg(long, default_value_t = DEFAULT_SIZE, value_parser = value_parser!(u32).range(1..))]
    pub size: u32,

    /// High-resolution edge length.
    #[arg(long, default_value_t = DEFAULT_HIRES_SIZE, value_parser = value_parser!(u32).range(1..))]
    pub hires: u32,

    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Transparent margin kept around the trimmed content.
    #[arg(long, default_value_t = ASSET_PADDING)]
    pub padding: u32,

    /// Negative prompt: "full", "basic", or custom text.
    #[arg(long, default_value = "full")]
    pub negative: NegativePrompt,

    /// Only write working files; leave the asset tree alone.
    #[arg(long = "no-copy", alias = "no-commit")]
    pub no_copy: bool,

    /// Skip background removal (output already transparent).
    #[arg(long)]
    pub no_matting: bool,
}

impl AssetArgs {
    pub fn request(&self) -> AssetRequest {
        AssetRequest {
            sprite: SpriteRequest {
                prompt: self.prompt.clone(),
                name: self.name.clone(),
                seed: self.seed,
                padding: self.padding,
                negative: self.negative.clone(),
            },
            category: self.category,
            size: self.size,
            hires_size: self.hires,
        }
    }
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// JSON array of {"prompt": .., "name": ..} objects.
    #[arg(long)]
    pub manifest: PathBuf,

    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Negative prompt: "full", "basic", or custom text.
    #[arg(long, default_value = "basic")]
    pub negative: NegativePrompt,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("spritegen").chain(args.iter().copied()))
    }

    #[test]
    fn sprite_defaults() {
        let cli = parse(&["sprite", "--prompt", "miner", "--name", "miner"]).unwrap();
        let Command::Sprite(args) = cli.cmd else {
            panic!("expected sprite subcommand");
        };
        assert_eq!(args.size, 64);
        assert_eq!(args.seed, 42);
        assert_eq!(args.padding, 2);
        assert_eq!(args.negative, NegativePrompt::Full);
        assert!(!args.no_commit);
        assert!(!args.no_matting);
        assert_eq!(cli.global.preset, PresetKind::SdxlPixelArt);
    }

    #[test]
    fn asset_defaults_and_alias() {
        let cli = parse(&[
            "asset", "--prompt", "crystal", "--name", "crystal", "--category", "items", "--no-commit",
        ])
        .unwrap();
        let Command::Asset(args) = cli.cmd else {
            panic!("expected asset subcommand");
        };
        assert_eq!(args.category, Category::Items);
        assert_eq!(args.size, 64);
        assert_eq!(args.hires, 512);
        assert_eq!(args.padding, 4);
        assert!(args.no_copy);
    }

    #[test]
    fn asset_requires_known_category() {
        assert!(parse(&["asset", "--prompt", "x", "--name", "x"]).is_err());
        let err = parse(&["asset", "--prompt", "x", "--name", "x", "--category", "weapons"])
            .unwrap_err()
            .to_string();
        assert!(err.contains("characters, items, tiles, ui"), "{err}");
    }

    #[test]
    fn batch_uses_basic_negative() {
        let cli = parse(&["batch", "--manifest", "prompts.json"]).unwrap();
        let Command::Batch(args) = cli.cmd else {
            panic!("expected batch subcommand");
        };
        assert_eq!(args.manifest, PathBuf::from("prompts.json"));
        assert_eq!(args.negative, NegativePrompt::Basic);
    }

    #[test]
    fn custom_negative_prompt() {
        let cli = parse(&[
            "sprite", "--prompt", "x", "--name", "x", "--negative", "blurry, text",
        ])
        .unwrap();
        let Command::Sprite(args) = cli.cmd else {
            panic!("expected sprite subcommand");
        };
        assert_eq!(args.negative.text(), "blurry, text");
    }

    #[test]
    fn zero_sizes_are_rejected() {
        assert!(parse(&["sprite", "--prompt", "x", "--name", "x", "--size", "0"]).is_err());
        assert!(parse(&["sprite", "--prompt", "x", "--name", "x", "--timeout", "0"]).is_err());
    }

    #[test]
    fn global_flags_override_config() {
        let cli = parse(&[
            "sprite",
            "--prompt",
            "x",
            "--name",
            "x",
            "--comfyui-url",
            "http://gpu:8188",
            "--assets-dir",
            "game/assets",
            "--timeout",
            "30",
            "--preset",
            "sd15",
        ])
        .unwrap();
        let mut config = PipelineConfig::from_lookup(|_| None).unwrap();
        cli.global.apply(&mut config);

        assert_eq!(config.comfyui_url, "http://gpu:8188");
        assert_eq!(config.assets_dir, PathBuf::from("game/assets"));
        assert_eq!(config.output_dir, PathBuf::from("sprite-gen/output"));
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(cli.global.preset, PresetKind::Sd15);
    }
}
