//! Pure domain logic for the sprite generation pipeline.
//!
//! No network or filesystem access lives here: the ComfyUI job graph,
//! the deterministic bitmap transforms, asset categories and the file
//! naming conventions are all plain functions over in-memory values.

pub mod category;
pub mod error;
pub mod imaging;
pub mod naming;
pub mod preset;
pub mod prompt;
pub mod workflow;
