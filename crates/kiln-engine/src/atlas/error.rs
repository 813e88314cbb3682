use std::fmt;

use super::PixelRect;

/// Texture packer failures.
///
/// Everything except `UnknownImage` and `StaleRemap` is raised while the
/// packer is built and aborts construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtlasError {
    /// The descriptor JSON could not be parsed.
    Descriptor(String),
    /// The descriptor names an atlas index with no page image supplied.
    MissingPage { atlas: u32 },
    /// A page image was supplied but the descriptor does not describe it.
    UndescribedPage { atlas: u32 },
    /// Two descriptor entries share one atlas index.
    DuplicatePage { atlas: u32 },
    /// The page image size disagrees with the descriptor, or with page 0
    /// (all pages share one texture array).
    PageSizeMismatch {
        atlas: u32,
        expected: (u32, u32),
        found: (u32, u32),
    },
    /// An image region references an atlas that is not described.
    UnknownAtlas { image: String, atlas: u32 },
    /// An image region is empty or extends past its page.
    RegionOutOfBounds {
        image: String,
        atlas: u32,
        region: PixelRect,
    },
    /// Two image regions in one page overlap.
    OverlappingRegions {
        atlas: u32,
        first: String,
        second: String,
    },
    /// `remap` was asked about an image the descriptor does not contain.
    UnknownImage(String),
    /// A mesh was packed by a different packer than the one checking it.
    StaleRemap { packed: u64, current: u64 },
}

impl fmt::Display for AtlasError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtlasError::Descriptor(msg) => write!(f, "invalid atlas descriptor: {msg}"),
            AtlasError::MissingPage { atlas } => {
                write!(f, "atlas {atlas} is described but no page image was given")
            }
            AtlasError::UndescribedPage { atlas } => {
                write!(f, "page image {atlas} has no atlas entry in the descriptor")
            }
            AtlasError::DuplicatePage { atlas } => write!(f, "atlas {atlas} is described twice"),
            AtlasError::PageSizeMismatch {
                atlas,
                expected,
                found,
            } => write!(
                f,
                "atlas {atlas}: descriptor says {}x{}, image is {}x{}",
                expected.0, expected.1, found.0, found.1
            ),
            AtlasError::UnknownAtlas { image, atlas } => {
                write!(f, "image '{image}' references undescribed atlas {atlas}")
            }
            AtlasError::RegionOutOfBounds {
                image,
                atlas,
                region,
            } => write!(
                f,
                "image '{image}': region {}x{} at ({}, {}) does not fit atlas {atlas}",
                region.width, region.height, region.x, region.y
            ),
            AtlasError::OverlappingRegions {
                atlas,
                first,
                second,
            } => write!(f, "atlas {atlas}: regions of '{first}' and '{second}' overlap"),
            AtlasError::UnknownImage(id) => write!(f, "unknown source image '{id}'"),
            AtlasError::StaleRemap { packed, current } => write!(
                f,
                "mesh was packed against atlas generation {packed}, current is {current}"
            ),
        }
    }
}

impl std::error::Error for AtlasError {}
