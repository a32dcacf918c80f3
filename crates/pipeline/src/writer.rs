//! Working-file and asset-tree writes.
//!
//! Every write is a plain overwrite of the destination, creating parent
//! directories as needed. Commits into the asset tree are skipped entirely
//! when the writer was built with `commit = false`.

use std::path::{Path, PathBuf};

use image::RgbaImage;
use spritegen_core::category::Category;
use spritegen_core::imaging::encode_png;
use spritegen_core::naming::{AssetLayout, AssetPathPair};

use crate::error::PipelineError;

/// Write `bytes` to `path`, creating parent directories.
pub async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(PipelineError::io(parent))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(PipelineError::io(path))
}

/// PNG-encode `img` and write it to `path`.
pub async fn write_bitmap(img: &RgbaImage, path: &Path) -> Result<(), PipelineError> {
    let png = encode_png(img)?;
    write_file(path, &png).await
}

/// Destination for everything a pipeline run writes.
#[derive(Debug, Clone)]
pub struct AssetWriter {
    output_dir: PathBuf,
    layout: AssetLayout,
    commit: bool,
}

impl AssetWriter {
    /// * `output_dir` - Flat working directory for intermediate files.
    /// * `assets_root` - Root of the project asset tree.
    /// * `commit` - When `false`, nothing is written under `assets_root`.
    pub fn new(output_dir: impl Into<PathBuf>, assets_root: impl Into<PathBuf>, commit: bool) -> Self {
        Self {
            output_dir: output_dir.into(),
            layout: AssetLayout::new(assets_root),
            commit,
        }
    }

    /// Write raw bytes as `{output_dir}/{filename}`.
    pub async fn write_working_bytes(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, PipelineError> {
        let path = self.output_dir.join(filename);
        write_file(&path, bytes).await?;
        tracing::debug!(path = %path.display(), size_bytes = bytes.len(), "Wrote working file");
        Ok(path)
    }

    /// Write a bitmap as `{output_dir}/{filename}`.
    pub async fn write_working_bitmap(
        &self,
        filename: &str,
        img: &RgbaImage,
    ) -> Result<PathBuf, PipelineError> {
        let path = self.output_dir.join(filename);
        write_bitmap(img, &path).await?;
        tracing::debug!(
            path = %path.display(),
            width = img.width(),
            height = img.height(),
            "Wrote working file",
        );
        Ok(path)
    }

    /// Copy a game-size sprite to `{assets}/sprites/{name}.png`.
    ///
    /// Returns `None` without touching the filesystem when commits are
    /// disabled.
    pub async fn commit_sprite(
        &self,
        name: &str,
        img: &RgbaImage,
    ) -> Result<Option<PathBuf>, PipelineError> {
        let path = self.layout.sprite_path(name)?;
        if !self.commit {
            tracing::info!(name, skipped = %path.display(), "Commit disabled, asset tree untouched");
            return Ok(None);
        }
        write_bitmap(img, &path).await?;
        tracing::info!(name, path = %path.display(), "Committed sprite");
        Ok(Some(path))
    }

    /// Copy the high-resolution and game-size renders into the categorized
    /// trees.
    pub async fn commit_categorized(
        &self,
        category: Category,
        name: &str,
        hires: &RgbaImage,
        game: &RgbaImage,
    ) -> Result<Option<AssetPathPair>, PipelineError> {
        let paths = self.layout.categorized_paths(category, name)?;
        if !self.commit {
            tracing::info!(name, %category, "Commit disabled, asset tree untouched");
            return Ok(None);
        }
        write_bitmap(hires, &paths.hires).await?;
        write_bitmap(game, &paths.game).await?;
        tracing::info!(
            name,
            %category,
            hires = %paths.hires.display(),
            game = %paths.game.display(),
            "Committed categorized sprite",
        );
        Ok(Some(paths))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use image::Rgba;
    use spritegen_core::error::CoreError;
    use spritegen_core::imaging::decode_rgba;

    use super::*;

    fn solid(size: u32) -> RgbaImage {
        RgbaImage::from_pixel(size, size, Rgba([200, 100, 50, 255]))
    }

    #[tokio::test]
    async fn working_files_land_in_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let writer = AssetWriter::new(dir.path().join("out"), dir.path().join("assets"), true);

        let raw = writer.write_working_bytes("hero_raw.png", b"raw bytes").await.unwrap();
        assert_eq!(raw, dir.path().join("out/hero_raw.png"));
        assert_eq!(std::fs::read(&raw).unwrap(), b"raw bytes");

        let sized = writer.write_working_bitmap("hero_64x64.png", &solid(64)).await.unwrap();
        let decoded = decode_rgba(&std::fs::read(sized).unwrap()).unwrap();
        assert_eq!(decoded.dimensions(), (64, 64));
    }

    #[tokio::test]
    async fn existing_files_are_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let writer = AssetWriter::new(dir.path(), dir.path().join("assets"), true);

        writer.write_working_bytes("a.png", b"first version").await.unwrap();
        let path = writer.write_working_bytes("a.png", b"second").await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"second");
    }

    #[tokio::test]
    async fn commit_sprite_writes_flat_tree() {
        let dir = tempfile::tempdir().unwrap();
        let assets = dir.path().join("assets");
        let writer = AssetWriter::new(dir.path().join("out"), &assets, true);

        let path = writer.commit_sprite("hero", &solid(64)).await.unwrap();
        assert_eq!(path, Some(assets.join("sprites/hero.png")));
        assert!(assets.join("sprites/hero.png").is_file());
    }

    #[tokio::test]
    async fn commit_categorized_writes_both_trees() {
        let dir = tempfile::tempdir().unwrap();
        let assets = dir.path().join("assets");
        let writer = AssetWriter::new(dir.path().join("out"), &assets, true);

        let paths = writer
            .commit_categorized(Category::Items, "crystal", &solid(512), &solid(64))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(paths.hires, assets.join("sprites-hires/items/crystal.png"));
        assert_eq!(paths.game, assets.join("sprites/items/crystal.png"));
        let hires = decode_rgba(&std::fs::read(&paths.hires).unwrap()).unwrap();
        let game = decode_rgba(&std::fs::read(&paths.game).unwrap()).unwrap();
        assert_eq!(hires.width(), 512);
        assert_eq!(game.width(), 64);
    }

    #[tokio::test]
    async fn disabled_commit_leaves_tree_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let assets = dir.path().join("assets");
        let writer = AssetWriter::new(dir.path().join("out"), &assets, false);

        assert!(writer.commit_sprite("hero", &solid(64)).await.unwrap().is_none());
        assert!(writer
            .commit_categorized(Category::Ui, "button", &solid(8), &solid(4))
            .await
            .unwrap()
            .is_none());
        assert!(!assets.exists());
    }

    #[tokio::test]
    async fn unsafe_names_are_rejected_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let assets = dir.path().join("assets");
        let writer = AssetWriter::new(dir.path().join("out"), &assets, true);

        let result = writer.commit_sprite("../escape", &solid(4)).await;
        assert_matches!(result, Err(PipelineError::Core(CoreError::Validation(_))));
        assert!(!assets.exists());
    }
}
