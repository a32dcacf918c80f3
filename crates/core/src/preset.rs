//! Text-to-image generation presets and the job graph builder.
//!
//! Each preset is a plain checkpoint -> (optional LoRA) -> CLIP encode ->
//! KSampler -> VAE decode -> SaveImage chain. Node IDs are assigned
//! sequentially from `"1"`, so the SDXL preset produces nodes 1..8 and the
//! SD 1.5 preset nodes 1..7.

use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::workflow::{NodeInput, Workflow, WorkflowNode};

/* --------------------------------------------------------------------------
Node class types
-------------------------------------------------------------------------- */

const CHECKPOINT_LOADER_CLASS: &str = "CheckpointLoaderSimple";
const LORA_LOADER_CLASS: &str = "LoraLoader";
const CLIP_TEXT_ENCODE_CLASS: &str = "CLIPTextEncode";
const EMPTY_LATENT_CLASS: &str = "EmptyLatentImage";
const KSAMPLER_CLASS: &str = "KSampler";
const VAE_DECODE_CLASS: &str = "VAEDecode";

/// Node class that writes images to ComfyUI's output folder.
pub const SAVE_IMAGE_CLASS: &str = "SaveImage";

/* --------------------------------------------------------------------------
Checkpoint output slots
-------------------------------------------------------------------------- */

const SLOT_MODEL: u32 = 0;
const SLOT_CLIP: u32 = 1;
const SLOT_VAE: u32 = 2;

/* --------------------------------------------------------------------------
Presets
-------------------------------------------------------------------------- */

/// Named preset selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresetKind {
    /// SDXL base + pixel-art-xl LoRA at 1024x1024.
    #[default]
    SdxlPixelArt,
    /// Stable Diffusion 1.5 at its native 512x512.
    Sd15,
}

impl PresetKind {
    pub const ALL: &'static [PresetKind] = &[Self::SdxlPixelArt, Self::Sd15];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SdxlPixelArt => "sdxl-pixel-art",
            Self::Sd15 => "sd15",
        }
    }
}

impl FromStr for PresetKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|k| k.as_str()).collect();
                CoreError::Validation(format!(
                    "Unknown preset '{s}'. Valid presets: {}",
                    valid.join(", ")
                ))
            })
    }
}

impl fmt::Display for PresetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// LoRA applied on top of the checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct LoraSettings {
    pub name: String,
    pub strength_model: f64,
    pub strength_clip: f64,
}

/// Model and sampler settings for one generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationPreset {
    pub checkpoint: String,
    pub lora: Option<LoraSettings>,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub cfg: f64,
    pub sampler_name: String,
    pub scheduler: String,
    pub denoise: f64,
}

impl GenerationPreset {
    pub fn sdxl_pixel_art() -> Self {
        Self {
            checkpoint: "sd_xl_base_1.0.safetensors".to_string(),
            lora: Some(LoraSettings {
                name: "pixel-art-xl.safetensors".to_string(),
                strength_model: 0.9,
                strength_clip: 0.9,
            }),
            width: 1024,
            height: 1024,
            steps: 30,
            cfg: 7.0,
            sampler_name: "euler_ancestral".to_string(),
            scheduler: "normal".to_string(),
            denoise: 1.0,
        }
    }

    pub fn sd15() -> Self {
        Self {
            checkpoint: "v1-5-pruned-emaonly.safetensors".to_string(),
            lora: None,
            width: 512,
            height: 512,
            steps: 25,
            cfg: 7.5,
            sampler_name: "euler_ancestral".to_string(),
            scheduler: "normal".to_string(),
            denoise: 1.0,
        }
    }

    pub fn from_kind(kind: PresetKind) -> Self {
        match kind {
            PresetKind::SdxlPixelArt => Self::sdxl_pixel_art(),
            PresetKind::Sd15 => Self::sd15(),
        }
    }
}

/// Per-job values substituted into a preset.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub positive: &'a str,
    pub negative: &'a str,
    pub seed: u64,
    /// Prefix ComfyUI uses when naming the saved output file.
    pub filename_prefix: &'a str,
}

/// A built job description plus the ID of its `SaveImage` node.
#[derive(Debug, Clone)]
pub struct BuiltWorkflow {
    pub workflow: Workflow,
    pub output_node: String,
}

/// Build the txt2img job graph for `preset` and `request`.
pub fn build_workflow(preset: &GenerationPreset, request: &GenerationRequest<'_>) -> BuiltWorkflow {
    let mut workflow = Workflow::new();
    let mut next_id = 0u32;
    let mut add = |node: WorkflowNode| -> String {
        next_id += 1;
        let id = next_id.to_string();
        workflow.insert(id.clone(), node);
        id
    };

    let checkpoint = add(
        WorkflowNode::new(CHECKPOINT_LOADER_CLASS)
            .input("ckpt_name", NodeInput::literal(preset.checkpoint.as_str())),
    );

    // Model and CLIP come from the LoRA loader when one is configured.
    let (model_src, clip_src) = match &preset.lora {
        Some(lora) => {
            let lora_id = add(
                WorkflowNode::new(LORA_LOADER_CLASS)
                    .input("model", NodeInput::link(&checkpoint, SLOT_MODEL))
                    .input("clip", NodeInput::link(&checkpoint, SLOT_CLIP))
                    .input("lora_name", NodeInput::literal(lora.name.as_str()))
                    .input("strength_model", NodeInput::literal(lora.strength_model))
                    .input("strength_clip", NodeInput::literal(lora.strength_clip)),
            );
            (NodeInput::link(&lora_id, 0), NodeInput::link(&lora_id, 1))
        }
        None => (
            NodeInput::link(&checkpoint, SLOT_MODEL),
            NodeInput::link(&checkpoint, SLOT_CLIP),
        ),
    };

    let positive = add(
        WorkflowNode::new(CLIP_TEXT_ENCODE_CLASS)
            .input("text", NodeInput::literal(request.positive))
            .input("clip", clip_src.clone()),
    );
    let negative = add(
        WorkflowNode::new(CLIP_TEXT_ENCODE_CLASS)
            .input("text", NodeInput::literal(request.negative))
            .input("clip", clip_src),
    );
    let latent = add(
        WorkflowNode::new(EMPTY_LATENT_CLASS)
            .input("width", NodeInput::literal(preset.width))
            .input("height", NodeInput::literal(preset.height))
            .input("batch_size", NodeInput::literal(1)),
    );
    let sampler = add(
        WorkflowNode::new(KSAMPLER_CLASS)
            .input("model", model_src)
            .input("positive", NodeInput::link(&positive, 0))
            .input("negative", NodeInput::link(&negative, 0))
            .input("latent_image", NodeInput::link(&latent, 0))
            .input("seed", NodeInput::literal(request.seed))
            .input("steps", NodeInput::literal(preset.steps))
            .input("cfg", NodeInput::literal(preset.cfg))
            .input("sampler_name", NodeInput::literal(preset.sampler_name.as_str()))
            .input("scheduler", NodeInput::literal(preset.scheduler.as_str()))
            .input("denoise", NodeInput::literal(preset.denoise)),
    );
    let decoded = add(
        WorkflowNode::new(VAE_DECODE_CLASS)
            .input("samples", NodeInput::link(&sampler, 0))
            .input("vae", NodeInput::link(&checkpoint, SLOT_VAE)),
    );
    let output_node = add(
        WorkflowNode::new(SAVE_IMAGE_CLASS)
            .input("images", NodeInput::link(&decoded, 0))
            .input("filename_prefix", NodeInput::literal(request.filename_prefix)),
    );

    BuiltWorkflow {
        workflow,
        output_node,
    }
}
