//! File naming conventions for working files and committed assets.
//!
//! Working files live flat in the output directory:
//!
//! - `{name}_raw.png`: bytes exactly as downloaded
//! - `{name}_nobg.png`: after background removal
//! - `{name}_{n}x{n}.png`: one per rendered size
//!
//! Committed sprites go into the project asset tree:
//!
//! - `{root}/sprites/{name}.png` for uncategorized sprites
//! - `{root}/sprites-hires/{category}/{name}.png` and
//!   `{root}/sprites/{category}/{name}.png` for categorized sprites

use std::path::PathBuf;

use crate::category::Category;
use crate::error::CoreError;

/// Tree holding game-resolution sprites.
pub const GAME_TREE: &str = "sprites";

/// Tree holding high-resolution source-of-truth sprites.
pub const HIRES_TREE: &str = "sprites-hires";

/// Maximum length of a sprite name.
pub const MAX_NAME_LENGTH: usize = 128;

/// Validate that `name` can be used as a single file stem.
pub fn validate_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation(
            "Sprite name must not be empty".to_string(),
        ));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "Sprite name must be at most {MAX_NAME_LENGTH} characters, got {}",
            name.len()
        )));
    }
    if name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(CoreError::Validation(format!(
            "Sprite name '{name}' must be a plain file stem without path separators"
        )));
    }
    Ok(())
}

/// `{name}_raw.png`
pub fn raw_filename(name: &str) -> String {
    format!("{name}_raw.png")
}

/// `{name}_nobg.png`
pub fn nobg_filename(name: &str) -> String {
    format!("{name}_nobg.png")
}

/// `{name}_{size}x{size}.png`
pub fn sized_filename(name: &str, size: u32) -> String {
    format!("{name}_{size}x{size}.png")
}

/// `{name}_{comfy filename}`, used when saving unprocessed batch outputs.
///
/// The server-reported filename must itself be a plain file name, so the
/// result always stays inside the working directory.
pub fn batch_filename(name: &str, comfy_filename: &str) -> Result<String, CoreError> {
    validate_name(name)?;
    validate_name(comfy_filename)?;
    Ok(format!("{name}_{comfy_filename}"))
}

/// High-resolution and game-resolution destinations for one sprite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPathPair {
    pub hires: PathBuf,
    pub game: PathBuf,
}

/// Root of the project asset tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLayout {
    root: PathBuf,
}

impl AssetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `{root}/sprites/{name}.png`
    pub fn sprite_path(&self, name: &str) -> Result<PathBuf, CoreError> {
        validate_name(name)?;
        Ok(self.root.join(GAME_TREE).join(format!("{name}.png")))
    }

    /// Both categorized destinations for `(category, name)`.
    pub fn categorized_paths(
        &self,
        category: Category,
        name: &str,
    ) -> Result<AssetPathPair, CoreError> {
        validate_name(name)?;
        let file = format!("{name}.png");
        Ok(AssetPathPair {
            hires: self.root.join(HIRES_TREE).join(category.as_str()).join(&file),
            game: self.root.join(GAME_TREE).join(category.as_str()).join(&file),
        })
    }
}
