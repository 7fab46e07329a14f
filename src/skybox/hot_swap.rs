//! File-drop filtering for runtime skybox replacement

use crate::error::SkyboxResult;
use crate::resources::{is_accepted_extension, CubemapFaces, TextureData};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why a drop was not turned into a swap
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DropRejection {
    #[error("expected exactly one dropped file, got {0}")]
    MultipleFiles(usize),

    #[error("unsupported file extension: {}", .0.display())]
    UnsupportedExtension(PathBuf),

    #[error("{} cannot replace this skybox: {reason}", path.display())]
    Incompatible { path: PathBuf, reason: String },
}

/// Result of [`Skybox::update`](super::Skybox::update)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapOutcome {
    /// Nothing was dropped this frame
    NoDrop,
    /// A drop happened but was ignored; the active cubemap is untouched
    Rejected(DropRejection),
    /// The cubemap was rebaked from `path`
    Swapped { path: PathBuf },
}

/// Pick the one acceptable file out of a drop event.
///
/// Returns `Ok(None)` when nothing was dropped.
pub fn select_drop<'a>(
    files: &'a [PathBuf],
    accepted_extensions: &[String],
) -> Result<Option<&'a Path>, DropRejection> {
    match files {
        [] => Ok(None),
        [path] if is_accepted_extension(path, accepted_extensions) => Ok(Some(path)),
        [path] => Err(DropRejection::UnsupportedExtension(path.clone())),
        _ => Err(DropRejection::MultipleFiles(files.len())),
    }
}

/// Source image decoded on the CPU, ready to bake
#[derive(Debug, Clone)]
pub enum PreparedSource {
    Panorama(TextureData),
    Cross(CubemapFaces),
}

impl PreparedSource {
    /// Decode `path` for the bake path selected by `uses_hdr`.
    ///
    /// Non-HDR sources must have a detectable cross or line layout.
    pub fn load(path: &Path, uses_hdr: bool) -> SkyboxResult<Self> {
        if uses_hdr {
            Ok(PreparedSource::Panorama(TextureData::panorama_from_file(
                path,
            )?))
        } else {
            let image = TextureData::from_file(path)?;
            Ok(PreparedSource::Cross(CubemapFaces::extract(&image)?))
        }
    }

    /// Like [`PreparedSource::load`], reporting failures as a drop rejection
    pub fn validate_drop(path: &Path, uses_hdr: bool) -> Result<Self, DropRejection> {
        Self::load(path, uses_hdr).map_err(|e| DropRejection::Incompatible {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}
