//! Typed view of the ComfyUI `/history/{prompt_id}` response.
//!
//! ComfyUI returns `{}` until the prompt has finished. Afterwards the
//! response is keyed by prompt ID:
//!
//! ```json
//! {
//!   "abc-123": {
//!     "outputs": {
//!       "8": { "images": [{ "filename": "pipeline_00001_.png", "subfolder": "", "type": "output" }] }
//!     },
//!     "status": { "status_str": "success", "completed": true }
//!   }
//! }
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::api::ComfyUIApiError;

/// Reference to an image stored in one of ComfyUI's folders.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageRef {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(rename = "type", default = "default_image_type")]
    pub image_type: String,
}

impl ImageRef {
    pub fn is_output(&self) -> bool {
        self.image_type == "output"
    }
}

fn default_image_type() -> String {
    "output".to_string()
}

/// Outputs produced by one node. Nodes that emit no images (or emit
/// other kinds of output) have an empty `images` list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeOutput {
    #[serde(default)]
    pub images: Vec<ImageRef>,
}

/// Execution status block of a history entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutionStatus {
    #[serde(default)]
    pub status_str: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

/// A finished job as reported by the history endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobResult {
    /// Outputs keyed by node ID.
    #[serde(default)]
    pub outputs: BTreeMap<String, NodeOutput>,
    #[serde(default)]
    pub status: Option<ExecutionStatus>,
}

impl JobResult {
    /// Images produced by `node_id` (empty if the node produced none).
    pub fn images_for(&self, node_id: &str) -> &[ImageRef] {
        self.outputs
            .get(node_id)
            .map(|out| out.images.as_slice())
            .unwrap_or_default()
    }

    /// Every `(node id, image)` pair, in node ID order.
    pub fn all_images(&self) -> impl Iterator<Item = (&str, &ImageRef)> {
        self.outputs
            .iter()
            .flat_map(|(node, out)| out.images.iter().map(move |img| (node.as_str(), img)))
    }

    /// Images saved to ComfyUI's `output` folder, the only folder
    /// [`ComfyUIApi::fetch_image`](crate::api::ComfyUIApi::fetch_image) reads.
    /// Previews land in `temp` and are skipped.
    pub fn output_images(&self) -> impl Iterator<Item = (&str, &ImageRef)> {
        self.all_images().filter(|(_, img)| img.is_output())
    }

    /// First image of `preferred_node` if it produced one, otherwise the
    /// first `output` image of any node. Node IDs are compared as strings,
    /// so `"10"` sorts before `"9"`.
    pub fn first_image(&self, preferred_node: Option<&str>) -> Option<&ImageRef> {
        preferred_node
            .and_then(|node| self.images_for(node).first())
            .or_else(|| self.output_images().next().map(|(_, img)| img))
    }

    /// Whether ComfyUI flagged the execution as failed.
    pub fn is_error(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.status_str.as_deref())
            .is_some_and(|s| s == "error")
    }
}

/// Extract the entry for `prompt_id` from a `/history` response.
///
/// Returns `Ok(None)` when the prompt is not (yet) in the history.
pub fn parse_history(
    prompt_id: &str,
    history: serde_json::Value,
) -> Result<Option<JobResult>, ComfyUIApiError> {
    let serde_json::Value::Object(mut entries) = history else {
        return Err(ComfyUIApiError::Protocol(format!(
            "/history/{prompt_id} did not return a JSON object"
        )));
    };

    let Some(entry) = entries.remove(prompt_id) else {
        return Ok(None);
    };

    serde_json::from_value(entry).map(Some).map_err(|e| {
        ComfyUIApiError::Protocol(format!("Malformed history entry for {prompt_id}: {e}"))
    })
}
