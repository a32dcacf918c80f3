//! ComfyUI job description model and graph validation.
//!
//! A job description is an object keyed by node ID where every value has a
//! `class_type` and an `inputs` map. An input is either a literal value or
//! a link to another node's output slot, encoded by ComfyUI as a two-element
//! array `["<node id>", <slot index>]`:
//!
//! ```json
//! {
//!   "1": { "class_type": "CheckpointLoaderSimple", "inputs": { "ckpt_name": "x.safetensors" } },
//!   "2": { "class_type": "CLIPTextEncode", "inputs": { "text": "a cat", "clip": ["1", 1] } }
//! }
//! ```
//!
//! The links form the edges of a directed graph that must be acyclic and
//! closed (every link points at a node present in the same description).

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// A single node input value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeInput {
    /// Reference to output slot `.1` of node `.0`.
    Link(String, u32),
    /// Any other JSON value (text, number, model filename, ...).
    Literal(serde_json::Value),
}

impl NodeInput {
    /// Link to `slot` of the node with ID `node_id`.
    pub fn link(node_id: impl Into<String>, slot: u32) -> Self {
        Self::Link(node_id.into(), slot)
    }

    /// Literal input value.
    pub fn literal(value: impl Into<serde_json::Value>) -> Self {
        Self::Literal(value.into())
    }
}

/// One processing node in a job description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    /// ComfyUI node class (e.g. `"KSampler"`).
    pub class_type: String,
    /// Named inputs, literal or linked.
    #[serde(default)]
    pub inputs: BTreeMap<String, NodeInput>,
}

impl WorkflowNode {
    pub fn new(class_type: impl Into<String>) -> Self {
        Self {
            class_type: class_type.into(),
            inputs: BTreeMap::new(),
        }
    }

    /// Builder-style setter for a single input.
    pub fn input(mut self, name: impl Into<String>, value: NodeInput) -> Self {
        self.inputs.insert(name.into(), value);
        self
    }

    /// Iterate over `(input name, source node id, source slot)` for every
    /// linked input of this node.
    pub fn links(&self) -> impl Iterator<Item = (&str, &str, u32)> {
        self.inputs.iter().filter_map(|(name, value)| match value {
            NodeInput::Link(node_id, slot) => Some((name.as_str(), node_id.as_str(), *slot)),
            NodeInput::Literal(_) => None,
        })
    }
}

/// A complete job description, serialized exactly as ComfyUI expects it
/// in the `prompt` field of `POST /prompt`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Workflow {
    nodes: BTreeMap<String, WorkflowNode>,
}

impl Workflow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a node, returning the previous node with that ID.
    pub fn insert(&mut self, id: impl Into<String>, node: WorkflowNode) -> Option<WorkflowNode> {
        self.nodes.insert(id.into(), node)
    }

    pub fn get(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// IDs of all nodes with the given class type.
    pub fn nodes_of_class<'a>(&'a self, class_type: &'a str) -> impl Iterator<Item = &'a str> {
        self.nodes
            .iter()
            .filter(move |(_, node)| node.class_type == class_type)
            .map(|(id, _)| id.as_str())
    }

    /// Check the structural invariants of the graph.
    ///
    /// - at least one node
    /// - every `class_type` is non-empty
    /// - every link targets a node in this description
    /// - the link graph has no cycles
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.nodes.is_empty() {
            return Err(CoreError::Validation(
                "Workflow must contain at least one node".to_string(),
            ));
        }

        for (id, node) in &self.nodes {
            if node.class_type.trim().is_empty() {
                return Err(CoreError::Validation(format!(
                    "Node '{id}' has an empty 'class_type'"
                )));
            }
            for (input, source, _) in node.links() {
                if !self.nodes.contains_key(source) {
                    return Err(CoreError::Validation(format!(
                        "Node '{id}' input '{input}' references missing node '{source}'"
                    )));
                }
            }
        }

        self.topological_order().map(|_| ())
    }

    /// Node IDs ordered so that every node comes after all nodes it links
    /// to (Kahn's algorithm, ties broken by ID).
    ///
    /// Links to unknown nodes are ignored here; [`validate`](Self::validate)
    /// reports them.
    pub fn topological_order(&self) -> Result<Vec<&str>, CoreError> {
        let mut in_degree: BTreeMap<&str, usize> =
            self.nodes.keys().map(|id| (id.as_str(), 0)).collect();
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for (id, node) in &self.nodes {
            for (_, source, _) in node.links() {
                if !self.nodes.contains_key(source) {
                    continue;
                }
                if let Some(degree) = in_degree.get_mut(id.as_str()) {
                    *degree += 1;
                }
                dependents.entry(source).or_default().push(id.as_str());
            }
        }

        let mut ready: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(id) = ready.pop_front() {
            order.push(id);
            for dependent in dependents.get(id).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(*dependent);
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            let stuck: Vec<&str> = in_degree
                .iter()
                .filter(|(_, degree)| **degree > 0)
                .map(|(id, _)| *id)
                .collect();
            return Err(CoreError::Validation(format!(
                "Workflow contains a cycle through nodes: {}",
                stuck.join(", ")
            )));
        }

        Ok(order)
    }

    /// Serialize to the JSON value sent to ComfyUI.
    pub fn to_json(&self) -> Result<serde_json::Value, CoreError> {
        serde_json::to_value(self)
            .map_err(|e| CoreError::Internal(format!("Failed to serialize workflow: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn two_node_workflow() -> Workflow {
        let mut wf = Workflow::new();
        wf.insert(
            "1",
            WorkflowNode::new("CheckpointLoaderSimple")
                .input("ckpt_name", NodeInput::literal("model.safetensors")),
        );
        wf.insert(
            "2",
            WorkflowNode::new("CLIPTextEncode")
                .input("text", NodeInput::literal("a cat"))
                .input("clip", NodeInput::link("1", 1)),
        );
        wf
    }

    #[test]
    fn links_serialize_as_id_slot_pairs() {
        let value = two_node_workflow().to_json().unwrap();
        assert_eq!(value["2"]["inputs"]["clip"], json!(["1", 1]));
        assert_eq!(value["2"]["inputs"]["text"], json!("a cat"));
        assert_eq!(value["1"]["class_type"], json!("CheckpointLoaderSimple"));
    }

    #[test]
    fn parses_comfyui_json() {
        let value = json!({
            "1": { "class_type": "EmptyLatentImage", "inputs": { "width": 512, "height": 512 } },
            "2": { "class_type": "KSampler", "inputs": { "latent_image": ["1", 0], "seed": 7 } }
        });
        let wf: Workflow = serde_json::from_value(value).unwrap();
        let sampler = wf.get("2").unwrap();
        assert_eq!(
            sampler.inputs.get("latent_image"),
            Some(&NodeInput::link("1", 0))
        );
        assert_eq!(sampler.inputs.get("seed"), Some(&NodeInput::literal(7)));
        wf.validate().unwrap();
    }

    #[test]
    fn valid_workflow_passes() {
        two_node_workflow().validate().unwrap();
    }

    #[test]
    fn empty_workflow_rejected() {
        assert_matches!(Workflow::new().validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn empty_class_type_rejected() {
        let mut wf = two_node_workflow();
        wf.insert("3", WorkflowNode::new("  "));
        assert_matches!(wf.validate(), Err(CoreError::Validation(msg)) if msg.contains("'3'"));
    }

    #[test]
    fn dangling_link_rejected() {
        let mut wf = two_node_workflow();
        wf.insert(
            "3",
            WorkflowNode::new("VAEDecode").input("vae", NodeInput::link("9", 2)),
        );
        assert_matches!(
            wf.validate(),
            Err(CoreError::Validation(msg)) if msg.contains("missing node '9'")
        );
    }

    #[test]
    fn cycle_rejected() {
        let mut wf = Workflow::new();
        wf.insert("a", WorkflowNode::new("X").input("in", NodeInput::link("b", 0)));
        wf.insert("b", WorkflowNode::new("Y").input("in", NodeInput::link("a", 0)));
        wf.insert("c", WorkflowNode::new("Z"));
        assert_matches!(
            wf.validate(),
            Err(CoreError::Validation(msg)) if msg.contains("cycle") && msg.contains("a, b")
        );
    }

    #[test]
    fn self_link_is_a_cycle() {
        let mut wf = Workflow::new();
        wf.insert("1", WorkflowNode::new("X").input("in", NodeInput::link("1", 0)));
        assert!(wf.validate().is_err());
    }

    #[test]
    fn topological_order_puts_sources_first() {
        let mut wf = two_node_workflow();
        wf.insert(
            "0",
            WorkflowNode::new("SaveImage").input("images", NodeInput::link("2", 0)),
        );
        let order = wf.topological_order().unwrap();
        assert_eq!(order, vec!["1", "2", "0"]);
    }

    #[test]
    fn nodes_of_class_filters() {
        let wf = two_node_workflow();
        let ids: Vec<&str> = wf.nodes_of_class("CLIPTextEncode").collect();
        assert_eq!(ids, vec!["2"]);
    }
}
